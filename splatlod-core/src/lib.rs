//! Core data structures for splatlod
//!
//! This crate provides the typed, named-attribute point records that every
//! reduction strategy consumes and produces, together with the shared error
//! type.

pub mod attribute;
pub mod error;
pub mod point_set;

pub use attribute::*;
pub use error::*;
pub use point_set::*;

/// Re-export commonly used types from nalgebra
pub use nalgebra::{Point3, Vector3};
