//! Point set data structures and functionality

use crate::attribute::{AttributeDef, AttributeType, AttributeValue, ScalarType};
use crate::error::{Error, Result};
use nalgebra::{Point3, Vector3};
use std::collections::HashSet;
use std::ops::Index;

/// One point: a value per schema attribute, in schema order
pub type PointRecord = Vec<AttributeValue>;

/// Ordered attribute layout shared by every record of a [`PointSet`].
///
/// A schema always has floating point `x`, `y` and `z` attributes. Normal
/// columns are recognised when all of `nx`, `ny` and `nz` are numeric
/// scalars; every other attribute is opaque to the reduction code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    attributes: Vec<AttributeDef>,
    position: [usize; 3],
    normal: Option<[usize; 3]>,
}

impl Schema {
    /// Create a schema, checking name uniqueness and the position attributes
    pub fn new(attributes: Vec<AttributeDef>) -> Result<Self> {
        let mut seen = HashSet::new();
        for attr in &attributes {
            if !seen.insert(attr.name.as_str()) {
                return Err(Error::SchemaMismatch(format!(
                    "duplicate attribute '{}'",
                    attr.name
                )));
            }
        }

        let find = |name: &str| attributes.iter().position(|a| a.name == name);

        let mut position = [0usize; 3];
        for (slot, axis) in position.iter_mut().zip(["x", "y", "z"]) {
            let index = find(axis).ok_or_else(|| {
                Error::SchemaMismatch(format!("missing position attribute '{}'", axis))
            })?;
            match attributes[index].ty {
                AttributeType::Scalar(ty) if ty.is_float() => *slot = index,
                ty => {
                    return Err(Error::SchemaMismatch(format!(
                        "position attribute '{}' must be floating point, found {:?}",
                        axis, ty
                    )))
                }
            }
        }

        let normal = match (find("nx"), find("ny"), find("nz")) {
            (Some(nx), Some(ny), Some(nz))
                if [nx, ny, nz].iter().all(|&i| attributes[i].ty.is_numeric()) =>
            {
                Some([nx, ny, nz])
            }
            _ => None,
        };

        Ok(Self {
            attributes,
            position,
            normal,
        })
    }

    /// Schema holding only `x`, `y`, `z` in the given floating point width
    pub fn xyz(ty: ScalarType) -> Result<Self> {
        Self::new(vec![
            AttributeDef::scalar("x", ty),
            AttributeDef::scalar("y", ty),
            AttributeDef::scalar("z", ty),
        ])
    }

    pub fn attributes(&self) -> &[AttributeDef] {
        &self.attributes
    }

    /// Number of attributes per record
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.attributes.iter().position(|a| a.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.attributes.iter().map(|a| a.name.as_str())
    }

    /// Column indices of `x`, `y`, `z`
    pub fn position_indices(&self) -> [usize; 3] {
        self.position
    }

    /// Column indices of `nx`, `ny`, `nz`, if the schema has normals
    pub fn normal_indices(&self) -> Option<[usize; 3]> {
        self.normal
    }

    /// Check one record against this schema
    pub fn validate_record(&self, index: usize, record: &PointRecord) -> Result<()> {
        if record.len() != self.attributes.len() {
            return Err(Error::SchemaMismatch(format!(
                "record {} has {} values, schema has {} attributes",
                index,
                record.len(),
                self.attributes.len()
            )));
        }
        for (value, attr) in record.iter().zip(&self.attributes) {
            if !value.matches(&attr.ty) {
                return Err(Error::SchemaMismatch(format!(
                    "record {}: attribute '{}' declared as {:?} but holds {:?}",
                    index, attr.name, attr.ty, value
                )));
            }
        }
        Ok(())
    }
}

/// An ordered sequence of point records sharing one schema
#[derive(Debug, Clone, PartialEq)]
pub struct PointSet {
    schema: Schema,
    records: Vec<PointRecord>,
}

impl PointSet {
    /// Create a point set, failing fast on the first record that does not
    /// fit the schema
    pub fn new(schema: Schema, records: Vec<PointRecord>) -> Result<Self> {
        for (index, record) in records.iter().enumerate() {
            schema.validate_record(index, record)?;
        }
        Ok(Self { schema, records })
    }

    /// Create an empty point set with the given schema
    pub fn empty(schema: Schema) -> Self {
        Self {
            schema,
            records: Vec::new(),
        }
    }

    /// Create a point set of `Float` positions with no other attributes
    pub fn from_positions(positions: &[[f32; 3]]) -> Result<Self> {
        let records = positions
            .iter()
            .map(|p| p.iter().map(|&c| AttributeValue::Float(c)).collect())
            .collect();
        Self::new(Schema::xyz(ScalarType::Float)?, records)
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn records(&self) -> &[PointRecord] {
        &self.records
    }

    /// Get the number of points in the set
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if the point set is empty
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Get an iterator over the records
    pub fn iter(&self) -> std::slice::Iter<'_, PointRecord> {
        self.records.iter()
    }

    pub fn get(&self, index: usize) -> Option<&PointRecord> {
        self.records.get(index)
    }

    /// Position of a record of this set.
    ///
    /// The schema guarantees floating point positions, so this only yields
    /// NaN for a record that was not validated against this schema.
    pub fn position_of(&self, record: &PointRecord) -> Point3<f64> {
        let [ix, iy, iz] = self.schema.position;
        let coord = |i: usize| {
            record
                .get(i)
                .and_then(AttributeValue::as_f64)
                .unwrap_or(f64::NAN)
        };
        Point3::new(coord(ix), coord(iy), coord(iz))
    }

    /// Position of the point at `index`
    pub fn position(&self, index: usize) -> Option<Point3<f64>> {
        self.records.get(index).map(|r| self.position_of(r))
    }

    /// Normal of the point at `index`, if the schema has normals
    pub fn normal(&self, index: usize) -> Option<Vector3<f64>> {
        let [nx, ny, nz] = self.schema.normal?;
        let record = self.records.get(index)?;
        Some(Vector3::new(
            record[nx].as_f64()?,
            record[ny].as_f64()?,
            record[nz].as_f64()?,
        ))
    }

    /// Copy the records at `indices`, in the order given, into a new set
    pub fn select(&self, indices: &[usize]) -> Result<PointSet> {
        let records = indices
            .iter()
            .map(|&i| {
                self.records.get(i).cloned().ok_or_else(|| {
                    Error::Processing(format!(
                        "index {} out of range for point set of {} records",
                        i,
                        self.records.len()
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            schema: self.schema.clone(),
            records,
        })
    }

    /// Split into schema and records
    pub fn into_parts(self) -> (Schema, Vec<PointRecord>) {
        (self.schema, self.records)
    }
}

impl Index<usize> for PointSet {
    type Output = PointRecord;

    fn index(&self, index: usize) -> &Self::Output {
        &self.records[index]
    }
}

impl<'a> IntoIterator for &'a PointSet {
    type Item = &'a PointRecord;
    type IntoIter = std::slice::Iter<'a, PointRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
