//! Uniform random subsampling

use crate::PointSetReducer;
use rand::rngs::StdRng;
use rand::SeedableRng;
use splatlod_core::{Error, PointSet, Result};

/// Check that a keep ratio lies in `[0, 1]`
pub fn validate_keep_ratio(keep_ratio: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&keep_ratio) {
        return Err(Error::InvalidParameter(format!(
            "keep_ratio must be between 0.0 and 1.0, got {}",
            keep_ratio
        )));
    }
    Ok(())
}

/// `floor(n * keep_ratio)`
pub fn keep_count(n: usize, keep_ratio: f64) -> usize {
    ((n as f64 * keep_ratio).floor() as usize).min(n)
}

/// Draw `floor(n * keep_ratio)` distinct indices from `0..n`, uniformly and
/// without replacement, returned in ascending order.
///
/// With a seed the draw is reproducible; without one the generator is
/// seeded from the operating system.
pub fn select_indices(n: usize, keep_ratio: f64, seed: Option<u64>) -> Result<Vec<usize>> {
    validate_keep_ratio(keep_ratio)?;
    let amount = keep_count(n, keep_ratio);

    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let mut indices = rand::seq::index::sample(&mut rng, n, amount).into_vec();
    indices.sort_unstable();
    Ok(indices)
}

/// Keep a uniform random subset of the points, in original order
///
/// # Example
/// ```rust
/// use splatlod_core::PointSet;
/// use splatlod_reduction::select;
///
/// let positions: Vec<[f32; 3]> = (0..100).map(|i| [i as f32, 0.0, 0.0]).collect();
/// let points = PointSet::from_positions(&positions).unwrap();
/// let kept = select(&points, 0.25, Some(7)).unwrap();
/// assert_eq!(kept.len(), 25);
/// ```
pub fn select(points: &PointSet, keep_ratio: f64, seed: Option<u64>) -> Result<PointSet> {
    let indices = select_indices(points.len(), keep_ratio, seed)?;
    points.select(&indices)
}

/// Random subsampling reducer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RandomSubsampler {
    /// Fraction of points to keep, in `[0, 1]`
    pub keep_ratio: f64,
    /// Seed for reproducible draws
    pub seed: Option<u64>,
}

impl RandomSubsampler {
    pub fn new(keep_ratio: f64) -> Self {
        Self {
            keep_ratio,
            seed: None,
        }
    }

    pub fn with_seed(keep_ratio: f64, seed: u64) -> Self {
        Self {
            keep_ratio,
            seed: Some(seed),
        }
    }
}

impl PointSetReducer for RandomSubsampler {
    fn reduce(&self, points: &PointSet) -> Result<PointSet> {
        select(points, self.keep_ratio, self.seed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn line(n: usize) -> PointSet {
        let positions: Vec<[f32; 3]> = (0..n).map(|i| [i as f32, 0.0, 0.0]).collect();
        PointSet::from_positions(&positions).unwrap()
    }

    #[test]
    fn test_quarter_of_hundred() {
        let indices = select_indices(100, 0.25, Some(42)).unwrap();
        assert_eq!(indices.len(), 25);
        assert!(indices.windows(2).all(|w| w[0] < w[1]));
        assert!(indices.iter().all(|&i| i < 100));
    }

    #[test]
    fn test_keep_count_floors() {
        assert_eq!(keep_count(10, 0.33), 3);
        assert_eq!(keep_count(7, 0.5), 3);
        assert_eq!(keep_count(0, 0.5), 0);
        assert_eq!(keep_count(9, 1.0), 9);
    }

    #[test]
    fn test_ratio_bounds() {
        assert!(select_indices(10, 0.0, Some(1)).unwrap().is_empty());
        assert_eq!(
            select_indices(10, 1.0, Some(1)).unwrap(),
            (0..10).collect::<Vec<_>>()
        );
        for ratio in [-0.1, 1.1, f64::NAN] {
            assert!(matches!(
                select_indices(10, ratio, Some(1)),
                Err(Error::InvalidParameter(_))
            ));
        }
    }

    #[test]
    fn test_seeded_draw_is_reproducible() {
        let a = select_indices(1000, 0.3, Some(1234)).unwrap();
        let b = select_indices(1000, 0.3, Some(1234)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_select_keeps_original_records() {
        let points = line(50);
        let kept = select(&points, 0.2, Some(9)).unwrap();
        assert_eq!(kept.len(), 10);

        let xs: Vec<f64> = (0..kept.len())
            .map(|i| kept.position(i).unwrap().x)
            .collect();
        assert!(xs.windows(2).all(|w| w[0] < w[1]));
        let unique: HashSet<u64> = xs.iter().map(|x| x.to_bits()).collect();
        assert_eq!(unique.len(), xs.len());
    }

    #[test]
    fn test_empty_input() {
        let points = PointSet::from_positions(&[]).unwrap();
        assert!(RandomSubsampler::new(0.5).reduce(&points).unwrap().is_empty());
    }

    #[test]
    fn test_draw_is_roughly_uniform() {
        // every index should be kept about half of the time
        let mut hits = [0usize; 10];
        for seed in 0..2000u64 {
            for i in select_indices(10, 0.5, Some(seed)).unwrap() {
                hits[i] += 1;
            }
        }
        for count in hits {
            assert!((850..=1150).contains(&count), "skewed selection: {:?}", hits);
        }
    }
}
