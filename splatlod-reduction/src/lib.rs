//! Point set reduction for level-of-detail
//!
//! This crate provides the two reduction strategies of splatlod:
//! - Voxel-grid merging (spatial hashing, per-voxel aggregation, normal
//!   renormalization)
//! - Uniform random subsampling
//!
//! and the [`LodEngine`] that dispatches between them.

pub mod spatial_hash;
pub mod policy;
pub mod voxel_merge;
pub mod normals;
pub mod subsample;
pub mod engine;
pub mod config;

pub use spatial_hash::*;
pub use policy::*;
pub use voxel_merge::*;
pub use normals::*;
pub use subsample::*;
pub use engine::*;
pub use config::*;

use splatlod_core::{PointSet, Result};

/// Reduce a point set to fewer points sharing its schema
pub trait PointSetReducer {
    fn reduce(&self, points: &PointSet) -> Result<PointSet>;
}
