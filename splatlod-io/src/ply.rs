//! PLY format support
//!
//! Only the `vertex` element is read and written. Its property definitions
//! become the [`Schema`] of the point set, in file order and with their
//! declared widths, so a reduced file has exactly the layout of its input.

use byteorder::{BigEndian, ByteOrder, LittleEndian, WriteBytesExt};
use ply_rs::{
    parser::Parser,
    ply::{
        Addable, DefaultElement, ElementDef, Encoding, Ply, Property, PropertyDef, PropertyType,
        ScalarType as PlyScalar,
    },
    writer::Writer,
};
use splatlod_core::{
    AttributeDef, AttributeType, AttributeValue, Error, PointRecord, PointSet, Result, ScalarType,
    Schema,
};
use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use tracing::{debug, warn};

const VERTEX: &str = "vertex";

/// Storage mode of a PLY body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PlyEncoding {
    #[default]
    Ascii,
    BinaryLittleEndian,
    BinaryBigEndian,
}

impl PlyEncoding {
    pub fn is_binary(self) -> bool {
        !matches!(self, PlyEncoding::Ascii)
    }
}

impl fmt::Display for PlyEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PlyEncoding::Ascii => "ascii",
            PlyEncoding::BinaryLittleEndian => "binary_little_endian",
            PlyEncoding::BinaryBigEndian => "binary_big_endian",
        };
        f.write_str(name)
    }
}

impl From<Encoding> for PlyEncoding {
    fn from(encoding: Encoding) -> Self {
        match encoding {
            Encoding::Ascii => PlyEncoding::Ascii,
            Encoding::BinaryLittleEndian => PlyEncoding::BinaryLittleEndian,
            Encoding::BinaryBigEndian => PlyEncoding::BinaryBigEndian,
        }
    }
}

impl From<PlyEncoding> for Encoding {
    fn from(encoding: PlyEncoding) -> Self {
        match encoding {
            PlyEncoding::Ascii => Encoding::Ascii,
            PlyEncoding::BinaryLittleEndian => Encoding::BinaryLittleEndian,
            PlyEncoding::BinaryBigEndian => Encoding::BinaryBigEndian,
        }
    }
}

/// A point set read from a PLY file, with the encoding it was stored in
#[derive(Debug, Clone, PartialEq)]
pub struct PlyPointSet {
    pub points: PointSet,
    pub encoding: PlyEncoding,
}

pub struct PlyReader;
pub struct PlyWriter;

impl PlyReader {
    /// Read the vertex element of a PLY file
    pub fn read_point_set<P: AsRef<Path>>(path: P) -> Result<PlyPointSet> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        Self::read_point_set_from(&mut reader)
    }

    /// Read the vertex element of a PLY stream
    pub fn read_point_set_from<R: BufRead>(reader: &mut R) -> Result<PlyPointSet> {
        let parser = Parser::<DefaultElement>::new();
        let ply = parser.read_ply(reader).map_err(parse_error)?;

        let Some(vertex_def) = ply.header.elements.get(VERTEX) else {
            return Err(Error::InvalidData("PLY file has no vertex element".to_string()));
        };

        for (name, element) in ply.header.elements.iter() {
            if name != VERTEX {
                warn!("Ignoring PLY element '{}' ({} entries)", name, element.count);
            }
        }

        let attributes = vertex_def
            .properties
            .values()
            .map(attribute_def)
            .collect::<Vec<_>>();
        let schema = Schema::new(attributes)?;

        let records = match ply.payload.get(VERTEX) {
            Some(vertices) => vertices
                .iter()
                .enumerate()
                .map(|(index, vertex)| record_from_element(&schema, index, vertex))
                .collect::<Result<Vec<_>>>()?,
            None => Vec::new(),
        };

        let encoding = PlyEncoding::from(ply.header.encoding);
        debug!(
            "Read {} vertices with {} properties ({})",
            records.len(),
            schema.len(),
            encoding
        );

        Ok(PlyPointSet {
            points: PointSet::new(schema, records)?,
            encoding,
        })
    }
}

impl PlyWriter {
    /// Write a point set as the vertex element of a PLY file
    pub fn write_point_set<P: AsRef<Path>>(
        points: &PointSet,
        encoding: PlyEncoding,
        path: P,
    ) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        Self::write_point_set_to(points, encoding, &mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Write a point set to a stream, returning the number of bytes written
    pub fn write_point_set_to<W: Write>(
        points: &PointSet,
        encoding: PlyEncoding,
        writer: &mut W,
    ) -> Result<usize> {
        let written = match encoding {
            PlyEncoding::Ascii => write_ascii(points, writer)?,
            PlyEncoding::BinaryLittleEndian => {
                write_binary::<LittleEndian, _>(points, encoding, writer)?
            }
            PlyEncoding::BinaryBigEndian => write_binary::<BigEndian, _>(points, encoding, writer)?,
        };
        debug!("Wrote {} vertices ({}, {} bytes)", points.len(), encoding, written);
        Ok(written)
    }
}

fn write_ascii<W: Write>(points: &PointSet, writer: &mut W) -> Result<usize> {
    let schema = points.schema();
    let mut ply = Ply::<DefaultElement>::new();
    ply.header.encoding = Encoding::Ascii;

    let mut vertex_element = ElementDef::new(VERTEX.to_string());
    vertex_element.count = points.len();
    for def in schema.attributes() {
        vertex_element
            .properties
            .add(PropertyDef::new(def.name.clone(), property_type(&def.ty)));
    }
    ply.header.elements.add(vertex_element);

    let mut vertices = Vec::with_capacity(points.len());
    for record in points {
        let mut vertex = DefaultElement::new();
        for (def, value) in schema.attributes().iter().zip(record) {
            vertex.insert(def.name.clone(), to_property(def, value)?);
        }
        vertices.push(vertex);
    }
    ply.payload.insert(VERTEX.to_string(), vertices);

    Ok(Writer::new().write_ply(writer, &mut ply)?)
}

/// Binary bodies are written here rather than by ply-rs, whose binary
/// writer prefixes every list with the element count instead of the list
/// length.
fn write_binary<B: ByteOrder, W: Write>(
    points: &PointSet,
    encoding: PlyEncoding,
    writer: &mut W,
) -> Result<usize> {
    let schema = points.schema();

    let mut header = format!(
        "ply\nformat {} 1.0\nelement {} {}\n",
        encoding,
        VERTEX,
        points.len()
    );
    for def in schema.attributes() {
        match def.ty {
            AttributeType::Scalar(ty) => {
                header.push_str(&format!("property {} {}\n", type_name(ty), def.name))
            }
            AttributeType::List { count, item } => header.push_str(&format!(
                "property list {} {} {}\n",
                type_name(count),
                type_name(item),
                def.name
            )),
        }
    }
    header.push_str("end_header\n");
    writer.write_all(header.as_bytes())?;

    let mut written = header.len();
    for (index, record) in points.iter().enumerate() {
        for (def, value) in schema.attributes().iter().zip(record) {
            written += match (def.ty, value) {
                (AttributeType::Scalar(ty), value) => {
                    let v = value.as_f64().ok_or_else(|| {
                        Error::SchemaMismatch(format!(
                            "attribute '{}' is a scalar but holds a list",
                            def.name
                        ))
                    })?;
                    write_binary_scalar::<B, _>(writer, ty, v)?
                }
                (AttributeType::List { count, item }, AttributeValue::List(items)) => {
                    if items.len() as f64 > max_list_len(count) {
                        return Err(Error::InvalidData(format!(
                            "vertex {}: list '{}' has {} items, too many for a {} length",
                            index,
                            def.name,
                            items.len(),
                            type_name(count)
                        )));
                    }
                    let mut bytes =
                        write_binary_scalar::<B, _>(writer, count, items.len() as f64)?;
                    for &v in items {
                        bytes += write_binary_scalar::<B, _>(writer, item, v)?;
                    }
                    bytes
                }
                (AttributeType::List { .. }, _) => {
                    return Err(Error::SchemaMismatch(format!(
                        "attribute '{}' is a list but holds a scalar",
                        def.name
                    )));
                }
            };
        }
    }
    Ok(written)
}

fn write_binary_scalar<B: ByteOrder, W: Write>(
    writer: &mut W,
    ty: ScalarType,
    value: f64,
) -> io::Result<usize> {
    match ty {
        ScalarType::Char => writer.write_i8(value as i8)?,
        ScalarType::UChar => writer.write_u8(value as u8)?,
        ScalarType::Short => writer.write_i16::<B>(value as i16)?,
        ScalarType::UShort => writer.write_u16::<B>(value as u16)?,
        ScalarType::Int => writer.write_i32::<B>(value as i32)?,
        ScalarType::UInt => writer.write_u32::<B>(value as u32)?,
        ScalarType::Float => writer.write_f32::<B>(value as f32)?,
        ScalarType::Double => writer.write_f64::<B>(value)?,
    }
    Ok(scalar_size(ty))
}

fn scalar_size(ty: ScalarType) -> usize {
    match ty {
        ScalarType::Char | ScalarType::UChar => 1,
        ScalarType::Short | ScalarType::UShort => 2,
        ScalarType::Int | ScalarType::UInt | ScalarType::Float => 4,
        ScalarType::Double => 8,
    }
}

/// Longest list a length prefix of this type can describe
fn max_list_len(ty: ScalarType) -> f64 {
    match ty {
        ScalarType::Char => i8::MAX as f64,
        ScalarType::UChar => u8::MAX as f64,
        ScalarType::Short => i16::MAX as f64,
        ScalarType::UShort => u16::MAX as f64,
        ScalarType::Int => i32::MAX as f64,
        ScalarType::UInt => u32::MAX as f64,
        ScalarType::Float | ScalarType::Double => f64::MAX,
    }
}

fn type_name(ty: ScalarType) -> &'static str {
    match ty {
        ScalarType::Char => "char",
        ScalarType::UChar => "uchar",
        ScalarType::Short => "short",
        ScalarType::UShort => "ushort",
        ScalarType::Int => "int",
        ScalarType::UInt => "uint",
        ScalarType::Float => "float",
        ScalarType::Double => "double",
    }
}

/// Malformed content is a data error, anything else stays an I/O error
fn parse_error(err: io::Error) -> Error {
    match err.kind() {
        io::ErrorKind::InvalidInput
        | io::ErrorKind::InvalidData
        | io::ErrorKind::UnexpectedEof
        | io::ErrorKind::Other => Error::InvalidData(format!("malformed PLY: {}", err)),
        _ => Error::Io(err),
    }
}

fn from_ply_scalar(ty: &PlyScalar) -> ScalarType {
    match ty {
        PlyScalar::Char => ScalarType::Char,
        PlyScalar::UChar => ScalarType::UChar,
        PlyScalar::Short => ScalarType::Short,
        PlyScalar::UShort => ScalarType::UShort,
        PlyScalar::Int => ScalarType::Int,
        PlyScalar::UInt => ScalarType::UInt,
        PlyScalar::Float => ScalarType::Float,
        PlyScalar::Double => ScalarType::Double,
    }
}

fn to_ply_scalar(ty: ScalarType) -> PlyScalar {
    match ty {
        ScalarType::Char => PlyScalar::Char,
        ScalarType::UChar => PlyScalar::UChar,
        ScalarType::Short => PlyScalar::Short,
        ScalarType::UShort => PlyScalar::UShort,
        ScalarType::Int => PlyScalar::Int,
        ScalarType::UInt => PlyScalar::UInt,
        ScalarType::Float => PlyScalar::Float,
        ScalarType::Double => PlyScalar::Double,
    }
}

fn attribute_def(def: &PropertyDef) -> AttributeDef {
    match &def.data_type {
        PropertyType::Scalar(ty) => AttributeDef::scalar(def.name.clone(), from_ply_scalar(ty)),
        PropertyType::List(count, item) => AttributeDef::list(
            def.name.clone(),
            from_ply_scalar(count),
            from_ply_scalar(item),
        ),
    }
}

fn property_type(ty: &AttributeType) -> PropertyType {
    match *ty {
        AttributeType::Scalar(ty) => PropertyType::Scalar(to_ply_scalar(ty)),
        AttributeType::List { count, item } => {
            PropertyType::List(to_ply_scalar(count), to_ply_scalar(item))
        }
    }
}

fn list_of<T: Copy + Into<f64>>(values: &[T]) -> AttributeValue {
    AttributeValue::List(values.iter().map(|&v| v.into()).collect())
}

fn from_property(property: &Property) -> AttributeValue {
    match property {
        Property::Char(v) => AttributeValue::Char(*v),
        Property::UChar(v) => AttributeValue::UChar(*v),
        Property::Short(v) => AttributeValue::Short(*v),
        Property::UShort(v) => AttributeValue::UShort(*v),
        Property::Int(v) => AttributeValue::Int(*v),
        Property::UInt(v) => AttributeValue::UInt(*v),
        Property::Float(v) => AttributeValue::Float(*v),
        Property::Double(v) => AttributeValue::Double(*v),
        Property::ListChar(v) => list_of(v),
        Property::ListUChar(v) => list_of(v),
        Property::ListShort(v) => list_of(v),
        Property::ListUShort(v) => list_of(v),
        Property::ListInt(v) => list_of(v),
        Property::ListUInt(v) => list_of(v),
        Property::ListFloat(v) => list_of(v),
        Property::ListDouble(v) => list_of(v),
    }
}

fn record_from_element(
    schema: &Schema,
    index: usize,
    element: &DefaultElement,
) -> Result<PointRecord> {
    schema
        .attributes()
        .iter()
        .map(|def| {
            element.get(&def.name).map(from_property).ok_or_else(|| {
                Error::InvalidData(format!(
                    "vertex {} has no property '{}'",
                    index, def.name
                ))
            })
        })
        .collect()
}

fn to_property(def: &AttributeDef, value: &AttributeValue) -> Result<Property> {
    let property = match (value, def.ty) {
        (AttributeValue::Char(v), _) => Property::Char(*v),
        (AttributeValue::UChar(v), _) => Property::UChar(*v),
        (AttributeValue::Short(v), _) => Property::Short(*v),
        (AttributeValue::UShort(v), _) => Property::UShort(*v),
        (AttributeValue::Int(v), _) => Property::Int(*v),
        (AttributeValue::UInt(v), _) => Property::UInt(*v),
        (AttributeValue::Float(v), _) => Property::Float(*v),
        (AttributeValue::Double(v), _) => Property::Double(*v),
        (AttributeValue::List(values), AttributeType::List { item, .. }) => match item {
            ScalarType::Char => Property::ListChar(values.iter().map(|&v| v as i8).collect()),
            ScalarType::UChar => Property::ListUChar(values.iter().map(|&v| v as u8).collect()),
            ScalarType::Short => Property::ListShort(values.iter().map(|&v| v as i16).collect()),
            ScalarType::UShort => {
                Property::ListUShort(values.iter().map(|&v| v as u16).collect())
            }
            ScalarType::Int => Property::ListInt(values.iter().map(|&v| v as i32).collect()),
            ScalarType::UInt => Property::ListUInt(values.iter().map(|&v| v as u32).collect()),
            ScalarType::Float => Property::ListFloat(values.iter().map(|&v| v as f32).collect()),
            ScalarType::Double => Property::ListDouble(values.clone()),
        },
        (AttributeValue::List(_), AttributeType::Scalar(_)) => {
            return Err(Error::SchemaMismatch(format!(
                "attribute '{}' is a scalar but holds a list",
                def.name
            )))
        }
    };
    Ok(property)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::io::Cursor;

    const SPLAT_ASCII: &str = "ply
format ascii 1.0
comment written by a splat trainer
element vertex 3
property float x
property float y
property float z
property float nx
property float ny
property float nz
property uchar red
property float opacity
property list uchar int tags
element face 1
property list uchar int vertex_indices
end_header
0 0 0 0 0 1 255 0.5 2 1 2
1 0 0 0 0 1 128 0.25 0
0 1 0 0 0 1 0 1 1 7
3 0 1 2
";

    fn read_str(source: &str) -> Result<PlyPointSet> {
        PlyReader::read_point_set_from(&mut Cursor::new(source.as_bytes()))
    }

    #[test]
    fn test_read_schema_and_values() {
        let ply = read_str(SPLAT_ASCII).unwrap();
        assert_eq!(ply.encoding, PlyEncoding::Ascii);

        let points = &ply.points;
        let names: Vec<&str> = points.schema().names().collect();
        assert_eq!(
            names,
            vec!["x", "y", "z", "nx", "ny", "nz", "red", "opacity", "tags"]
        );
        assert_eq!(
            points.schema().attributes()[6].ty,
            AttributeType::Scalar(ScalarType::UChar)
        );
        assert_eq!(
            points.schema().attributes()[8].ty,
            AttributeType::List {
                count: ScalarType::UChar,
                item: ScalarType::Int
            }
        );
        assert!(points.schema().normal_indices().is_some());

        assert_eq!(points.len(), 3);
        assert_eq!(points[0][6], AttributeValue::UChar(255));
        assert_eq!(points[0][8], AttributeValue::List(vec![1.0, 2.0]));
        assert_eq!(points[1][8], AttributeValue::List(vec![]));
        let p = points.position(2).unwrap();
        assert_relative_eq!(p.y, 1.0);
    }

    #[test]
    fn test_missing_vertex_element() {
        let source = "ply
format ascii 1.0
element face 1
property list uchar int vertex_indices
end_header
3 0 1 2
";
        assert!(matches!(read_str(source), Err(Error::InvalidData(_))));
    }

    #[test]
    fn test_missing_position_is_schema_mismatch() {
        let source = "ply
format ascii 1.0
element vertex 1
property float x
property float y
end_header
0 0
";
        assert!(matches!(read_str(source), Err(Error::SchemaMismatch(_))));
    }

    #[test]
    fn test_garbage_is_invalid_data() {
        assert!(matches!(
            read_str("this is not a ply file\n"),
            Err(Error::InvalidData(_))
        ));
    }

    #[test]
    fn test_round_trip_every_encoding() {
        let original = read_str(SPLAT_ASCII).unwrap().points;

        for encoding in [
            PlyEncoding::Ascii,
            PlyEncoding::BinaryLittleEndian,
            PlyEncoding::BinaryBigEndian,
        ] {
            let mut buffer = Vec::new();
            let written = PlyWriter::write_point_set_to(&original, encoding, &mut buffer).unwrap();
            assert_eq!(written, buffer.len());

            let reread = PlyReader::read_point_set_from(&mut Cursor::new(buffer)).unwrap();
            assert_eq!(reread.encoding, encoding);
            assert_eq!(reread.points, original, "round trip through {}", encoding);
        }
    }

    fn tagged_points(tags: &[Vec<f64>]) -> PointSet {
        let schema = Schema::new(vec![
            AttributeDef::scalar("x", ScalarType::Float),
            AttributeDef::scalar("y", ScalarType::Float),
            AttributeDef::scalar("z", ScalarType::Float),
            AttributeDef::list("tags", ScalarType::UChar, ScalarType::Int),
        ])
        .unwrap();
        let records = tags
            .iter()
            .enumerate()
            .map(|(i, tag)| {
                vec![
                    AttributeValue::Float(i as f32),
                    AttributeValue::Float(0.0),
                    AttributeValue::Float(0.0),
                    AttributeValue::List(tag.clone()),
                ]
            })
            .collect();
        PointSet::new(schema, records).unwrap()
    }

    fn body_of(buffer: &[u8]) -> &[u8] {
        let marker = b"end_header\n";
        let start = buffer
            .windows(marker.len())
            .position(|w| w == marker)
            .unwrap();
        &buffer[start + marker.len()..]
    }

    #[test]
    fn test_binary_list_length_prefix() {
        let points = tagged_points(&[vec![7.0], vec![8.0]]);

        let mut little = Vec::new();
        PlyWriter::write_point_set_to(&points, PlyEncoding::BinaryLittleEndian, &mut little)
            .unwrap();
        let body = body_of(&little);
        // three floats, a one byte count, one int
        assert_eq!(body.len(), 2 * (12 + 1 + 4));
        assert_eq!(body[12], 1);
        assert_eq!(LittleEndian::read_i32(&body[13..17]), 7);
        assert_eq!(body[17 + 12], 1);
        assert_eq!(LittleEndian::read_i32(&body[17 + 13..]), 8);

        let mut big = Vec::new();
        PlyWriter::write_point_set_to(&points, PlyEncoding::BinaryBigEndian, &mut big).unwrap();
        let body = body_of(&big);
        assert_eq!(body[12], 1);
        assert_eq!(BigEndian::read_i32(&body[13..17]), 7);

        for buffer in [little, big] {
            let reread = PlyReader::read_point_set_from(&mut Cursor::new(buffer)).unwrap();
            assert_eq!(reread.points, points);
            assert_eq!(reread.points[0][3], AttributeValue::List(vec![7.0]));
            assert_eq!(reread.points[1][3], AttributeValue::List(vec![8.0]));
        }
    }

    #[test]
    fn test_binary_lists_of_mixed_lengths() {
        let points = tagged_points(&[vec![], vec![1.0, -2.0, 3.0], vec![4.0]]);
        for encoding in [
            PlyEncoding::BinaryLittleEndian,
            PlyEncoding::BinaryBigEndian,
        ] {
            let mut buffer = Vec::new();
            let written = PlyWriter::write_point_set_to(&points, encoding, &mut buffer).unwrap();
            assert_eq!(written, buffer.len());

            let reread = PlyReader::read_point_set_from(&mut Cursor::new(buffer)).unwrap();
            assert_eq!(reread.points, points, "round trip through {}", encoding);
        }
    }

    #[test]
    fn test_list_too_long_for_its_count_type() {
        let points = tagged_points(&[vec![0.0; 256]]);
        let mut buffer = Vec::new();
        let result =
            PlyWriter::write_point_set_to(&points, PlyEncoding::BinaryLittleEndian, &mut buffer);
        assert!(matches!(result, Err(Error::InvalidData(_))));
    }

    #[test]
    fn test_empty_point_set_round_trip() {
        let empty = PointSet::empty(Schema::xyz(ScalarType::Double).unwrap());
        let mut buffer = Vec::new();
        PlyWriter::write_point_set_to(&empty, PlyEncoding::BinaryLittleEndian, &mut buffer)
            .unwrap();

        let reread = PlyReader::read_point_set_from(&mut Cursor::new(buffer)).unwrap();
        assert!(reread.points.is_empty());
        assert_eq!(reread.points.schema(), empty.schema());
    }

    #[test]
    fn test_encoding_conversions() {
        for encoding in [
            PlyEncoding::Ascii,
            PlyEncoding::BinaryLittleEndian,
            PlyEncoding::BinaryBigEndian,
        ] {
            assert_eq!(PlyEncoding::from(Encoding::from(encoding)), encoding);
        }
        assert!(!PlyEncoding::Ascii.is_binary());
        assert!(PlyEncoding::BinaryBigEndian.is_binary());
        assert_eq!(PlyEncoding::default(), PlyEncoding::Ascii);
    }
}
