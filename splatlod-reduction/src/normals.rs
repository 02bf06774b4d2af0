//! Normal vector renormalization
//!
//! Averaging unit normals component-wise does not give a unit vector, so
//! merged records get their normals rescaled before they are handed back.

use nalgebra::Vector3;
use splatlod_core::{AttributeType, PointRecord, PointSet, Result, Schema};

/// Added to the norm so that zero normals stay zero instead of becoming NaN
pub const NORMAL_EPSILON: f64 = 1e-9;

/// Rescale the `nx`, `ny`, `nz` attributes of every record to unit length.
///
/// Sets whose schema lacks any of the three normal attributes are returned
/// unchanged.
pub fn renormalize(points: PointSet) -> Result<PointSet> {
    if points.schema().normal_indices().is_none() {
        return Ok(points);
    }
    let (schema, mut records) = points.into_parts();
    renormalize_records(&schema, &mut records);
    PointSet::new(schema, records)
}

/// In-place variant of [`renormalize`] over raw records of `schema`
pub fn renormalize_records(schema: &Schema, records: &mut [PointRecord]) {
    let Some(indices) = schema.normal_indices() else {
        return;
    };
    let attributes = schema.attributes();
    let widths = indices.map(|i| match attributes[i].ty {
        AttributeType::Scalar(ty) => Some(ty),
        AttributeType::List { .. } => None,
    });
    let [Some(wx), Some(wy), Some(wz)] = widths else {
        return;
    };
    let [ix, iy, iz] = indices;

    for record in records.iter_mut() {
        let component = |i: usize| record[i].as_f64().unwrap_or(0.0);
        let normal = Vector3::new(component(ix), component(iy), component(iz));
        let unit = normal / (normal.norm() + NORMAL_EPSILON);

        record[ix] = wx.cast(unit.x);
        record[iy] = wy.cast(unit.y);
        record[iz] = wz.cast(unit.z);
    }
}
