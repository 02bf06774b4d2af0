//! # splatlod
//!
//! Level-of-detail reduction for point clouds and Gaussian splats.
//!
//! This is the umbrella crate that provides convenient access to all splatlod
//! functionality. Use the individual crates for more granular control over
//! dependencies.
//!
//! ## Features
//!
//! - **Core**: Point records with named, typed attributes and the shared error type
//! - **Reduction**: Voxel-grid merging, random subsampling and the LOD engine
//! - **I/O**: PLY reading and writing for arbitrary vertex layouts
//!
//! ## Quick Start
//!
//! ```rust
//! use splatlod::prelude::*;
//!
//! let points = PointSet::from_positions(&[
//!     [0.0, 0.0, 0.0],
//!     [0.005, 0.0, 0.0],
//!     [1.0, 1.0, 1.0],
//! ])?;
//!
//! let engine = LodEngine::new();
//! let reduction = engine.reduce(&points, &ReductionStrategy::VoxelMerge { voxel_size: 0.01 })?;
//! assert_eq!(reduction.points.len(), 2);
//! # Ok::<(), splatlod::Error>(())
//! ```
//!
//! ## Feature Flags
//!
//! - `default`: Enables core, reduction and io
//! - `reduction`: Reduction strategies and engine
//! - `io`: PLY file support
//! - `all`: Enables all features

// Re-export core functionality
pub use splatlod_core::*;

// Re-export sub-crates
#[cfg(feature = "reduction")]
pub use splatlod_reduction as reduction;

#[cfg(feature = "io")]
pub use splatlod_io as io;

/// Convenient imports for common use cases
pub mod prelude {
    pub use splatlod_core::*;

    #[cfg(feature = "reduction")]
    pub use splatlod_reduction::*;

    #[cfg(feature = "io")]
    pub use splatlod_io::*;
}
