//! I/O operations for point sets
//!
//! This crate reads and writes splat and point cloud files with arbitrary
//! per-vertex attributes. PLY is the supported format.

pub mod ply;

pub use ply::{PlyEncoding, PlyPointSet, PlyReader, PlyWriter};

use splatlod_core::{Error, PointSet, Result};
use std::path::Path;

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_ascii_lowercase())
}

/// Auto-detect format and read a point set
pub fn read_point_set<P: AsRef<Path>>(path: P) -> Result<PlyPointSet> {
    let path = path.as_ref();
    match extension_of(path).as_deref() {
        Some("ply") => PlyReader::read_point_set(path),
        _ => Err(Error::UnsupportedFormat(format!(
            "Unsupported point set format: {:?}",
            path.extension()
        ))),
    }
}

/// Auto-detect format and write a point set
pub fn write_point_set<P: AsRef<Path>>(
    points: &PointSet,
    encoding: PlyEncoding,
    path: P,
) -> Result<()> {
    let path = path.as_ref();
    match extension_of(path).as_deref() {
        Some("ply") => PlyWriter::write_point_set(points, encoding, path),
        _ => Err(Error::UnsupportedFormat(format!(
            "Unsupported point set format: {:?}",
            path.extension()
        ))),
    }
}
