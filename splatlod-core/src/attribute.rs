//! Attribute types and values carried by point records

use serde::{Deserialize, Serialize};

/// Numeric storage width of a point attribute.
///
/// These mirror the scalar types of the PLY format, which is where splat
/// datasets usually come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarType {
    Char,
    UChar,
    Short,
    UShort,
    Int,
    UInt,
    Float,
    Double,
}

impl ScalarType {
    /// Whether this is a floating point width
    pub fn is_float(self) -> bool {
        matches!(self, ScalarType::Float | ScalarType::Double)
    }

    /// Store an `f64` in this width.
    ///
    /// Integer widths truncate toward zero and saturate at the bounds of the
    /// type, so a mean colour of 127.5 stored as `UChar` becomes 127.
    pub fn cast(self, value: f64) -> AttributeValue {
        match self {
            ScalarType::Char => AttributeValue::Char(value as i8),
            ScalarType::UChar => AttributeValue::UChar(value as u8),
            ScalarType::Short => AttributeValue::Short(value as i16),
            ScalarType::UShort => AttributeValue::UShort(value as u16),
            ScalarType::Int => AttributeValue::Int(value as i32),
            ScalarType::UInt => AttributeValue::UInt(value as u32),
            ScalarType::Float => AttributeValue::Float(value as f32),
            ScalarType::Double => AttributeValue::Double(value),
        }
    }
}

/// Declared type of a point attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttributeType {
    /// A single number. The reduction core treats these as numeric.
    Scalar(ScalarType),
    /// A variable length list. Treated as "other" by the reduction core.
    List { count: ScalarType, item: ScalarType },
}

impl AttributeType {
    pub fn is_numeric(&self) -> bool {
        matches!(self, AttributeType::Scalar(_))
    }

    pub fn scalar_type(&self) -> Option<ScalarType> {
        match self {
            AttributeType::Scalar(ty) => Some(*ty),
            AttributeType::List { .. } => None,
        }
    }
}

/// A named, typed attribute of a schema
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttributeDef {
    pub name: String,
    pub ty: AttributeType,
}

impl AttributeDef {
    pub fn new(name: impl Into<String>, ty: AttributeType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }

    /// Create a scalar attribute definition
    pub fn scalar(name: impl Into<String>, ty: ScalarType) -> Self {
        Self::new(name, AttributeType::Scalar(ty))
    }

    /// Create a list attribute definition
    pub fn list(name: impl Into<String>, count: ScalarType, item: ScalarType) -> Self {
        Self::new(name, AttributeType::List { count, item })
    }
}

/// The value of one attribute of one point.
///
/// List items are held as `f64`, which represents every PLY item type
/// exactly; codecs convert back to the declared item width on output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    Char(i8),
    UChar(u8),
    Short(i16),
    UShort(u16),
    Int(i32),
    UInt(u32),
    Float(f32),
    Double(f64),
    List(Vec<f64>),
}

impl AttributeValue {
    /// Numeric value widened to `f64`, `None` for lists
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            AttributeValue::Char(v) => Some(v as f64),
            AttributeValue::UChar(v) => Some(v as f64),
            AttributeValue::Short(v) => Some(v as f64),
            AttributeValue::UShort(v) => Some(v as f64),
            AttributeValue::Int(v) => Some(v as f64),
            AttributeValue::UInt(v) => Some(v as f64),
            AttributeValue::Float(v) => Some(v as f64),
            AttributeValue::Double(v) => Some(v),
            AttributeValue::List(_) => None,
        }
    }

    pub fn as_list(&self) -> Option<&[f64]> {
        match self {
            AttributeValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// Storage width of a scalar value
    pub fn scalar_type(&self) -> Option<ScalarType> {
        match self {
            AttributeValue::Char(_) => Some(ScalarType::Char),
            AttributeValue::UChar(_) => Some(ScalarType::UChar),
            AttributeValue::Short(_) => Some(ScalarType::Short),
            AttributeValue::UShort(_) => Some(ScalarType::UShort),
            AttributeValue::Int(_) => Some(ScalarType::Int),
            AttributeValue::UInt(_) => Some(ScalarType::UInt),
            AttributeValue::Float(_) => Some(ScalarType::Float),
            AttributeValue::Double(_) => Some(ScalarType::Double),
            AttributeValue::List(_) => None,
        }
    }

    /// Whether this value can be stored under the declared attribute type
    pub fn matches(&self, ty: &AttributeType) -> bool {
        match (self, ty) {
            (AttributeValue::List(_), AttributeType::List { .. }) => true,
            (value, AttributeType::Scalar(expected)) => value.scalar_type() == Some(*expected),
            _ => false,
        }
    }

    /// Bit-exact equality. Unlike `==`, a NaN equals an identical NaN and
    /// `0.0` differs from `-0.0`.
    pub fn bit_eq(&self, other: &AttributeValue) -> bool {
        match (self, other) {
            (AttributeValue::Float(a), AttributeValue::Float(b)) => a.to_bits() == b.to_bits(),
            (AttributeValue::Double(a), AttributeValue::Double(b)) => a.to_bits() == b.to_bits(),
            (AttributeValue::List(a), AttributeValue::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.to_bits() == y.to_bits())
            }
            (a, b) => a == b,
        }
    }
}
