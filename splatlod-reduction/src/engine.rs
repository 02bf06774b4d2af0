//! Level-of-detail engine
//!
//! Ties the two reduction strategies together behind one entry point and
//! reports what was done.

use crate::config::LodConfig;
use crate::normals::renormalize;
use crate::policy::AggregationPolicy;
use crate::spatial_hash::validate_voxel_size;
use crate::subsample::{keep_count, validate_keep_ratio, RandomSubsampler};
use crate::voxel_merge::{aggregate_with, group_with};
use crate::PointSetReducer;
use serde::{Deserialize, Serialize};
use splatlod_core::{PointSet, Result};
use std::fmt;
use tracing::{debug, info, info_span};

/// How a point set is reduced
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReductionStrategy {
    /// Keep `floor(N * keep_ratio)` points chosen uniformly at random
    Subsample { keep_ratio: f64 },
    /// Merge all points sharing a voxel of edge `voxel_size`
    VoxelMerge { voxel_size: f64 },
}

impl ReductionStrategy {
    /// Check the strategy parameter without touching any points
    pub fn validate(&self) -> Result<()> {
        match *self {
            ReductionStrategy::Subsample { keep_ratio } => validate_keep_ratio(keep_ratio),
            ReductionStrategy::VoxelMerge { voxel_size } => validate_voxel_size(voxel_size),
        }
    }
}

impl Default for ReductionStrategy {
    fn default() -> Self {
        ReductionStrategy::Subsample { keep_ratio: 0.25 }
    }
}

impl fmt::Display for ReductionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReductionStrategy::Subsample { keep_ratio } => {
                write!(f, "subsample (keep ratio {})", keep_ratio)
            }
            ReductionStrategy::VoxelMerge { voxel_size } => {
                write!(f, "voxel merge (voxel size {})", voxel_size)
            }
        }
    }
}

/// What a reduction did
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReductionSummary {
    pub original_count: usize,
    pub kept_count: usize,
    pub strategy_used: ReductionStrategy,
}

impl ReductionSummary {
    /// Fraction of the input that survived, 1.0 for an empty input
    pub fn kept_fraction(&self) -> f64 {
        if self.original_count == 0 {
            1.0
        } else {
            self.kept_count as f64 / self.original_count as f64
        }
    }
}

/// A reduced point set and its summary
#[derive(Debug, Clone)]
pub struct Reduction {
    pub points: PointSet,
    pub summary: ReductionSummary,
}

/// Orchestrates point set reduction.
///
/// The engine only carries configuration; every call to
/// [`reduce`](LodEngine::reduce) is independent, so one engine can serve
/// concurrent callers.
#[derive(Debug, Clone, PartialEq)]
pub struct LodEngine {
    /// Seed for subsampling. `None` draws a fresh seed per call.
    pub seed: Option<u64>,
    /// Attribute aggregation used when merging voxels
    pub policy: AggregationPolicy,
    /// Spread hashing and aggregation over the rayon pool
    pub parallel: bool,
    /// Rescale merged normals to unit length
    pub renormalize_normals: bool,
}

impl Default for LodEngine {
    fn default() -> Self {
        Self {
            seed: None,
            policy: AggregationPolicy::default(),
            parallel: true,
            renormalize_normals: true,
        }
    }
}

impl LodEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an engine from configuration
    pub fn from_config(config: &LodConfig) -> Self {
        Self {
            seed: config.seed,
            policy: config.policy.clone(),
            parallel: config.parallel,
            renormalize_normals: config.renormalize_normals,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_policy(mut self, policy: AggregationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_renormalize_normals(mut self, renormalize: bool) -> Self {
        self.renormalize_normals = renormalize;
        self
    }

    /// Reduce `points` with `strategy`.
    ///
    /// Parameters are validated before any point is looked at. An empty input
    /// yields an empty output with the same schema.
    pub fn reduce(&self, points: &PointSet, strategy: &ReductionStrategy) -> Result<Reduction> {
        strategy.validate()?;

        let original_count = points.len();
        let _span = info_span!("reduce", points = original_count).entered();
        info!("Reducing {} points with {}", original_count, strategy);

        let reduced = match *strategy {
            ReductionStrategy::Subsample { keep_ratio } => {
                debug!(
                    "Keeping {} points ({:.1}%)",
                    keep_count(original_count, keep_ratio),
                    keep_ratio * 100.0
                );
                let subsampler = RandomSubsampler {
                    keep_ratio,
                    seed: self.seed,
                };
                subsampler.reduce(points)?
            }
            ReductionStrategy::VoxelMerge { voxel_size } => self.merge(points, voxel_size)?,
        };

        let summary = ReductionSummary {
            original_count,
            kept_count: reduced.len(),
            strategy_used: *strategy,
        };
        info!(
            "Kept {}/{} points ({:.1}%)",
            summary.kept_count,
            summary.original_count,
            summary.kept_fraction() * 100.0
        );

        Ok(Reduction {
            points: reduced,
            summary,
        })
    }

    fn merge(&self, points: &PointSet, voxel_size: f64) -> Result<PointSet> {
        let groups = group_with(points, voxel_size, self.parallel)?;
        debug!(
            "Voxels created: {} (largest holds {} points)",
            groups.len(),
            groups.max_occupancy()
        );

        let merged = aggregate_with(points, &groups, &self.policy, self.parallel)?;
        if self.renormalize_normals {
            renormalize(merged)
        } else {
            Ok(merged)
        }
    }
}
