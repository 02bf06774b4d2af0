//! Voxel-grid merging
//!
//! Points are bucketed by the voxel that contains them and every bucket is
//! collapsed into a single record. The grouping is insertion ordered: voxels
//! appear in the order their first point appears in the input, and members of
//! a voxel keep their original relative order. Output order is therefore a
//! pure function of the input and the voxel size, independent of hashing or
//! of how many threads did the work.

use crate::policy::{AggregationPolicy, Reducer};
use crate::spatial_hash::{compute_voxel_keys, validate_voxel_size, VoxelKey};
use crate::PointSetReducer;
use indexmap::IndexMap;
use rayon::prelude::*;
use splatlod_core::{
    AttributeDef, AttributeType, AttributeValue, Error, PointRecord, PointSet, Result,
};

/// Point indices bucketed by voxel, in first-seen voxel order
#[derive(Debug, Clone, Default)]
pub struct VoxelGroups {
    buckets: IndexMap<VoxelKey, Vec<usize>>,
}

impl VoxelGroups {
    /// Bucket indices `0..keys.len()` by their key
    pub fn from_keys(keys: &[VoxelKey]) -> Self {
        let mut buckets: IndexMap<VoxelKey, Vec<usize>> = IndexMap::new();
        for (index, key) in keys.iter().enumerate() {
            buckets.entry(*key).or_default().push(index);
        }
        Self { buckets }
    }

    /// Number of occupied voxels
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Total number of grouped points
    pub fn point_count(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    pub fn get(&self, key: &VoxelKey) -> Option<&[usize]> {
        self.buckets.get(key).map(Vec::as_slice)
    }

    pub fn keys(&self) -> impl Iterator<Item = &VoxelKey> {
        self.buckets.keys()
    }

    /// Voxels and their member indices, in first-seen order
    pub fn iter(&self) -> impl Iterator<Item = (&VoxelKey, &[usize])> {
        self.buckets.iter().map(|(k, v)| (k, v.as_slice()))
    }

    /// Size of the largest voxel
    pub fn max_occupancy(&self) -> usize {
        self.buckets.values().map(Vec::len).max().unwrap_or(0)
    }
}

/// Group points by voxel, scanning them in original order
pub fn group(points: &PointSet, voxel_size: f64) -> Result<VoxelGroups> {
    group_with(points, voxel_size, false)
}

/// Like [`group`], optionally hashing on the rayon pool. Bucket construction
/// stays sequential so the result does not depend on `parallel`.
pub fn group_with(points: &PointSet, voxel_size: f64, parallel: bool) -> Result<VoxelGroups> {
    let keys = compute_voxel_keys(points, voxel_size, parallel)?;
    Ok(VoxelGroups::from_keys(&keys))
}

/// Collapse every voxel group into one record, in group order
pub fn aggregate(
    points: &PointSet,
    groups: &VoxelGroups,
    policy: &AggregationPolicy,
) -> Result<PointSet> {
    aggregate_with(points, groups, policy, false)
}

/// Like [`aggregate`], optionally spreading voxels over the rayon pool.
/// Records are collected in group order either way.
pub fn aggregate_with(
    points: &PointSet,
    groups: &VoxelGroups,
    policy: &AggregationPolicy,
    parallel: bool,
) -> Result<PointSet> {
    if groups.point_count() != points.len() {
        return Err(Error::Processing(format!(
            "voxel groups cover {} points but the point set has {}",
            groups.point_count(),
            points.len()
        )));
    }

    let schema = points.schema();
    let reducers = policy.resolve(schema);
    let attributes = schema.attributes();
    let records = points.records();

    let merge_one = |members: &[usize]| -> Result<PointRecord> {
        if let Some(&bad) = members.iter().find(|&&i| i >= records.len()) {
            return Err(Error::Processing(format!(
                "voxel member {} out of range for {} points",
                bad,
                records.len()
            )));
        }
        attributes
            .iter()
            .zip(&reducers)
            .enumerate()
            .map(|(column, (attr, reducer))| {
                reduce_column(records, members, column, attr, *reducer)
            })
            .collect()
    };

    let merged: Vec<PointRecord> = if parallel {
        let buckets: Vec<&[usize]> = groups.iter().map(|(_, members)| members).collect();
        buckets
            .par_iter()
            .map(|members| merge_one(*members))
            .collect::<Result<_>>()?
    } else {
        groups
            .iter()
            .map(|(_, members)| merge_one(members))
            .collect::<Result<_>>()?
    };

    PointSet::new(schema.clone(), merged)
}

/// Group then aggregate, sequentially
pub fn merge(points: &PointSet, voxel_size: f64, policy: &AggregationPolicy) -> Result<PointSet> {
    validate_voxel_size(voxel_size)?;
    let groups = group(points, voxel_size)?;
    aggregate(points, &groups, policy)
}

fn reduce_column(
    records: &[PointRecord],
    members: &[usize],
    column: usize,
    attr: &AttributeDef,
    reducer: Reducer,
) -> Result<AttributeValue> {
    let first = members
        .first()
        .map(|&i| &records[i][column])
        .ok_or_else(|| Error::Processing("empty voxel group".to_string()))?;

    match reducer {
        Reducer::First => Ok(first.clone()),
        Reducer::Mode => Ok(mode_of(records, members, column).clone()),
        Reducer::Mean => match attr.ty {
            AttributeType::Scalar(ty) => {
                let mean = mean_of(members.iter().map(|&i| &records[i][column]), &attr.name)?;
                Ok(ty.cast(mean))
            }
            AttributeType::List { .. } => list_mean_of(records, members, column, &attr.name),
        },
    }
}

fn mean_of<'a>(values: impl Iterator<Item = &'a AttributeValue>, name: &str) -> Result<f64> {
    let mut sum = 0.0f64;
    let mut count = 0usize;
    let mut all_finite = true;
    for value in values {
        let v = value.as_f64().ok_or_else(|| {
            Error::Processing(format!("attribute '{}' holds a non-numeric value", name))
        })?;
        all_finite &= v.is_finite();
        sum += v;
        count += 1;
    }
    if all_finite && !sum.is_finite() {
        return Err(Error::Processing(format!(
            "overflow while averaging attribute '{}'",
            name
        )));
    }
    Ok(sum / count as f64)
}

fn list_mean_of(
    records: &[PointRecord],
    members: &[usize],
    column: usize,
    name: &str,
) -> Result<AttributeValue> {
    let lists = members
        .iter()
        .map(|&i| {
            records[i][column].as_list().ok_or_else(|| {
                Error::Processing(format!("attribute '{}' holds a non-list value", name))
            })
        })
        .collect::<Result<Vec<&[f64]>>>()?;

    let width = lists[0].len();
    if lists.iter().any(|l| l.len() != width) {
        return Err(Error::Processing(format!(
            "cannot average list attribute '{}': lengths differ within a voxel",
            name
        )));
    }

    let mut sums = vec![0.0f64; width];
    for list in &lists {
        for (sum, v) in sums.iter_mut().zip(list.iter()) {
            *sum += v;
        }
    }
    let n = lists.len() as f64;
    if sums.iter().any(|s| !s.is_finite()) && lists.iter().all(|l| l.iter().all(|v| v.is_finite())) {
        return Err(Error::Processing(format!(
            "overflow while averaging attribute '{}'",
            name
        )));
    }
    Ok(AttributeValue::List(sums.into_iter().map(|s| s / n).collect()))
}

/// Most frequent value of a column; on a tie the value seen first wins
fn mode_of<'a>(records: &'a [PointRecord], members: &[usize], column: usize) -> &'a AttributeValue {
    // (value, occurrences) in first-seen order
    let mut tallies: Vec<(&AttributeValue, usize)> = Vec::new();
    for &i in members {
        let value = &records[i][column];
        match tallies.iter().position(|(seen, _)| seen.bit_eq(value)) {
            Some(slot) => tallies[slot].1 += 1,
            None => tallies.push((value, 1)),
        }
    }

    let mut best = tallies[0];
    for &(value, count) in &tallies[1..] {
        if count > best.1 {
            best = (value, count);
        }
    }
    best.0
}

/// Voxel-grid merge reducer.
///
/// Buckets points into cubic cells of `voxel_size` and replaces each
/// occupied cell with a single aggregated record.
#[derive(Debug, Clone, PartialEq)]
pub struct VoxelMerger {
    /// Edge length of a voxel, in the units of the positions
    pub voxel_size: f64,
    /// How attribute values are combined within a voxel
    pub policy: AggregationPolicy,
    /// Hash and aggregate on the rayon pool
    pub parallel: bool,
}

impl VoxelMerger {
    pub fn new(voxel_size: f64) -> Self {
        Self {
            voxel_size,
            policy: AggregationPolicy::default(),
            parallel: true,
        }
    }

    pub fn with_params(voxel_size: f64, policy: AggregationPolicy, parallel: bool) -> Self {
        Self {
            voxel_size,
            policy,
            parallel,
        }
    }
}

impl PointSetReducer for VoxelMerger {
    fn reduce(&self, points: &PointSet) -> Result<PointSet> {
        validate_voxel_size(self.voxel_size)?;
        if points.is_empty() {
            return Ok(PointSet::empty(points.schema().clone()));
        }
        let groups = group_with(points, self.voxel_size, self.parallel)?;
        aggregate_with(points, &groups, &self.policy, self.parallel)
    }
}
