//! Spatial hashing of positions onto a voxel grid

use nalgebra::Point3;
use rayon::prelude::*;
use splatlod_core::{Error, PointRecord, PointSet, Result};

/// Integer coordinates of a cubic cell of a voxel grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VoxelKey {
    pub ix: i64,
    pub iy: i64,
    pub iz: i64,
}

impl VoxelKey {
    pub fn new(ix: i64, iy: i64, iz: i64) -> Self {
        Self { ix, iy, iz }
    }
}

/// Check that a voxel size is usable as a grid cell size
pub fn validate_voxel_size(voxel_size: f64) -> Result<()> {
    if !voxel_size.is_finite() || voxel_size <= 0.0 {
        return Err(Error::InvalidParameter(format!(
            "voxel_size must be positive and finite, got {}",
            voxel_size
        )));
    }
    Ok(())
}

fn floor_axis(coord: f64, voxel_size: f64, axis: char) -> Result<i64> {
    let cell = (coord / voxel_size).floor();
    // i64::MAX as f64 rounds up to 2^63, hence the exclusive upper bound
    if !cell.is_finite() || cell < i64::MIN as f64 || cell >= i64::MAX as f64 {
        return Err(Error::Processing(format!(
            "{} coordinate {} cannot be hashed with voxel size {}",
            axis, coord, voxel_size
        )));
    }
    Ok(cell as i64)
}

/// Map a position to the voxel containing it.
///
/// Each axis is `floor(coord / voxel_size)`, so `-0.005` with a voxel size
/// of `0.01` lands in cell `-1`, not `0`.
///
/// # Example
/// ```rust
/// use nalgebra::Point3;
/// use splatlod_reduction::{compute_voxel_key, VoxelKey};
///
/// let key = compute_voxel_key(&Point3::new(0.015, -0.005, 0.0), 0.01).unwrap();
/// assert_eq!(key, VoxelKey::new(1, -1, 0));
/// ```
pub fn compute_voxel_key(position: &Point3<f64>, voxel_size: f64) -> Result<VoxelKey> {
    validate_voxel_size(voxel_size)?;
    key_for(position, voxel_size)
}

fn key_for(position: &Point3<f64>, voxel_size: f64) -> Result<VoxelKey> {
    Ok(VoxelKey {
        ix: floor_axis(position.x, voxel_size, 'x')?,
        iy: floor_axis(position.y, voxel_size, 'y')?,
        iz: floor_axis(position.z, voxel_size, 'z')?,
    })
}

/// Hash every point of a set. The result is index-aligned with the input,
/// whether or not the work is spread over the rayon pool.
pub fn compute_voxel_keys(points: &PointSet, voxel_size: f64, parallel: bool) -> Result<Vec<VoxelKey>> {
    validate_voxel_size(voxel_size)?;

    let hash = |(index, record): (usize, &PointRecord)| {
        key_for(&points.position_of(record), voxel_size).map_err(|e| match e {
            Error::Processing(msg) => Error::Processing(format!("point {}: {}", index, msg)),
            other => other,
        })
    };

    if parallel {
        points.records().par_iter().enumerate().map(hash).collect()
    } else {
        points.records().iter().enumerate().map(hash).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positive_coordinates() {
        let key = compute_voxel_key(&Point3::new(0.0, 0.005, 1.0), 0.01).unwrap();
        assert_eq!(key, VoxelKey::new(0, 0, 100));
    }

    #[test]
    fn test_negative_coordinates_use_floor() {
        let key = compute_voxel_key(&Point3::new(-0.005, -0.01, -1.5), 0.01).unwrap();
        assert_eq!(key, VoxelKey::new(-1, -1, -150));

        let key = compute_voxel_key(&Point3::new(-0.5, -2.5, -0.0), 1.0).unwrap();
        assert_eq!(key, VoxelKey::new(-1, -3, 0));
    }

    #[test]
    fn test_invalid_voxel_size() {
        let p = Point3::new(0.0, 0.0, 0.0);
        for size in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                compute_voxel_key(&p, size),
                Err(Error::InvalidParameter(_))
            ));
        }
    }

    #[test]
    fn test_non_finite_coordinate() {
        let result = compute_voxel_key(&Point3::new(f64::NAN, 0.0, 0.0), 0.1);
        assert!(matches!(result, Err(Error::Processing(_))));

        let result = compute_voxel_key(&Point3::new(1e300, 0.0, 0.0), 1e-300);
        assert!(matches!(result, Err(Error::Processing(_))));
    }

    #[test]
    fn test_batch_hashing_matches_single() {
        let points = PointSet::from_positions(&[
            [0.0, 0.0, 0.0],
            [0.25, -0.25, 0.5],
            [-3.0, 2.0, 7.75],
            [0.49, 0.51, -0.01],
        ])
        .unwrap();

        let sequential = compute_voxel_keys(&points, 0.5, false).unwrap();
        let parallel = compute_voxel_keys(&points, 0.5, true).unwrap();
        assert_eq!(sequential, parallel);

        for (i, key) in sequential.iter().enumerate() {
            let expected = compute_voxel_key(&points.position(i).unwrap(), 0.5).unwrap();
            assert_eq!(*key, expected);
        }
        assert_eq!(sequential[1], VoxelKey::new(0, -1, 1));
        assert_eq!(sequential[3], VoxelKey::new(0, 1, -1));
    }

    #[test]
    fn test_batch_hashing_validates_size_first() {
        let points = PointSet::from_positions(&[]).unwrap();
        assert!(matches!(
            compute_voxel_keys(&points, 0.0, true),
            Err(Error::InvalidParameter(_))
        ));
    }
}
