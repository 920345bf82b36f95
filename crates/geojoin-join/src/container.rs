//! The record container: a fixed-schema binary table of joined records.
//!
//! ```text
//! "GJRC"                 magic
//! u32                    version (1)
//! u32                    field count
//!   u16 + bytes          field name (UTF-8), per field
//! u32                    attribute count
//!   u16 + bytes, f64     attribute name and value, per attribute
//! u64                    row count
//!   i64 * field count    per row
//! u32                    CRC32 of everything above
//! ```
//!
//! All integers are little-endian. Absent values are stored as `-1`.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::JoinConfig;
use crate::engine::JoinOutput;
use crate::error::{ContainerError, JoinError, JoinResult};

pub const MAGIC: &[u8; 4] = b"GJRC";
pub const VERSION: u32 = 1;
/// Stored for absent identifiers, coordinates and values.
pub const ABSENT: i64 = -1;

pub const SPATIAL_FIELD: &str = "stare_spatial";
pub const TEMPORAL_FIELD: &str = "stare_temporal";
pub const SCALE_ATTRIBUTE: &str = "value_scale";
pub const OFFSET_ATTRIBUTE: &str = "value_offset";

/// Scale a value for storage: `(value - offset) / scale`, truncated toward
/// zero. Absent and non-finite values become [`ABSENT`].
pub fn encode_value(value: Option<f64>, scale: f64, offset: f64) -> i64 {
    match value {
        Some(v) if v.is_finite() => {
            let scaled = (v - offset) / scale;
            if scaled.is_finite() {
                scaled as i64
            } else {
                ABSENT
            }
        }
        _ => ABSENT,
    }
}

/// Inverse of [`encode_value`], up to truncation.
pub fn decode_value(stored: i64, scale: f64, offset: f64) -> Option<f64> {
    (stored != ABSENT).then(|| stored as f64 * scale + offset)
}

fn coord(value: Option<usize>) -> i64 {
    value.map_or(ABSENT, |c| c as i64)
}

/// A table of named `i64` columns with `f64` attributes.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RecordTable {
    pub fields: Vec<String>,
    pub attributes: Vec<(String, f64)>,
    pub rows: Vec<Vec<i64>>,
}

/// Result of writing a container file.
#[derive(Clone, Debug)]
pub struct ContainerFile {
    pub path: PathBuf,
    pub row_count: usize,
    pub checksum: u32,
}

impl RecordTable {
    pub fn new(fields: Vec<String>) -> Self {
        Self {
            fields,
            ..Default::default()
        }
    }

    /// Lay out a join result: identifiers, the primary coordinate, each
    /// secondary's coordinate and scaled value, then the primary bands.
    pub fn from_output(output: &JoinOutput, config: &JoinConfig) -> Self {
        let mut fields = vec![
            SPATIAL_FIELD.to_string(),
            TEMPORAL_FIELD.to_string(),
            format!("{}_src_coord", output.primary),
        ];
        for key in &output.secondaries {
            fields.push(format!("{key}_src_coord"));
            fields.push(format!("{key}_value"));
        }
        fields.extend(output.bands.iter().cloned());

        let (scale, offset) = (config.value_scale, config.value_offset);
        let rows = output
            .records
            .iter()
            .map(|record| {
                let mut row = Vec::with_capacity(fields.len());
                row.push(record.spatial.map_or(ABSENT, |id| id.to_i64()));
                row.push(record.temporal.map_or(ABSENT, |t| t.to_i64()));
                row.push(coord(Some(record.primary_coord)));
                for m in &record.secondaries {
                    row.push(coord(m.coord));
                    row.push(encode_value(m.value, scale, offset));
                }
                row.extend(record.bands.iter().map(|&b| encode_value(Some(b), 1.0, 0.0)));
                row
            })
            .collect();

        Self {
            fields,
            attributes: vec![
                (SCALE_ATTRIBUTE.to_string(), scale),
                (OFFSET_ATTRIBUTE.to_string(), offset),
            ],
            rows,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn push_row(&mut self, row: Vec<i64>) -> JoinResult<()> {
        if self.fields.is_empty() {
            return Err(JoinError::ShapeMismatch {
                what: "container fields".into(),
                expected: 1,
                actual: 0,
            });
        }
        if row.len() != self.fields.len() {
            return Err(JoinError::ShapeMismatch {
                what: "container row".into(),
                expected: self.fields.len(),
                actual: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn attribute(&self, name: &str) -> Option<f64> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }

    pub fn column(&self, name: &str) -> Option<Vec<i64>> {
        let i = self.fields.iter().position(|f| f == name)?;
        Some(self.rows.iter().map(|row| row[i]).collect())
    }

    // ---------------------------------------------------------------
    // Encoding
    // ---------------------------------------------------------------

    pub fn to_bytes(&self) -> JoinResult<Vec<u8>> {
        let mut out = Vec::with_capacity(64 + self.rows.len() * self.fields.len() * 8);
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&VERSION.to_le_bytes());

        out.extend_from_slice(&(self.fields.len() as u32).to_le_bytes());
        for name in &self.fields {
            put_name(&mut out, name)?;
        }
        out.extend_from_slice(&(self.attributes.len() as u32).to_le_bytes());
        for (name, value) in &self.attributes {
            put_name(&mut out, name)?;
            out.extend_from_slice(&value.to_le_bytes());
        }

        out.extend_from_slice(&(self.rows.len() as u64).to_le_bytes());
        for row in &self.rows {
            if row.len() != self.fields.len() {
                return Err(JoinError::ShapeMismatch {
                    what: "container row".into(),
                    expected: self.fields.len(),
                    actual: row.len(),
                });
            }
            for v in row {
                out.extend_from_slice(&v.to_le_bytes());
            }
        }

        let crc = crc32fast::hash(&out);
        out.extend_from_slice(&crc.to_le_bytes());
        Ok(out)
    }

    pub fn from_bytes(data: &[u8]) -> JoinResult<Self> {
        if data.len() < MAGIC.len() + 4 + 4 {
            return Err(corrupt(0, "container too short"));
        }
        let body_len = data.len() - 4;
        let mut trailer = [0u8; 4];
        trailer.copy_from_slice(&data[body_len..]);
        let stored = u32::from_le_bytes(trailer);
        let computed = crc32fast::hash(&data[..body_len]);
        if stored != computed {
            return Err(ContainerError::ChecksumMismatch { stored, computed }.into());
        }

        let mut cursor = Cursor {
            data: &data[..body_len],
            pos: 0,
        };
        let magic = cursor.take(4)?;
        if magic != MAGIC {
            return Err(ContainerError::InvalidMagic {
                actual: String::from_utf8_lossy(magic).into(),
            }
            .into());
        }
        let version = cursor.u32()?;
        if version != VERSION {
            return Err(ContainerError::UnsupportedVersion(version).into());
        }

        let field_count = cursor.u32()? as usize;
        let mut fields = Vec::with_capacity(field_count.min(1024));
        for _ in 0..field_count {
            fields.push(cursor.name()?);
        }
        let attribute_count = cursor.u32()? as usize;
        let mut attributes = Vec::with_capacity(attribute_count.min(1024));
        for _ in 0..attribute_count {
            let name = cursor.name()?;
            let value = f64::from_le_bytes(cursor.array()?);
            attributes.push((name, value));
        }

        let row_count = cursor.u64()?;
        if field_count == 0 && row_count != 0 {
            return Err(corrupt(cursor.pos, "rows without fields"));
        }
        let expected = row_count
            .checked_mul(field_count as u64)
            .and_then(|n| n.checked_mul(8));
        if expected != Some(cursor.remaining() as u64) {
            return Err(corrupt(cursor.pos, "row data does not match the row count"));
        }
        let mut rows = Vec::with_capacity(cursor.remaining() / (8 * field_count.max(1)));
        for _ in 0..row_count {
            let mut row = Vec::with_capacity(field_count);
            for _ in 0..field_count {
                row.push(i64::from_le_bytes(cursor.array()?));
            }
            rows.push(row);
        }

        Ok(Self {
            fields,
            attributes,
            rows,
        })
    }

    // ---------------------------------------------------------------
    // Files
    // ---------------------------------------------------------------

    pub fn write_to(&self, path: &Path) -> JoinResult<ContainerFile> {
        let bytes = self.to_bytes()?;
        std::fs::write(path, &bytes)?;
        let mut trailer = [0u8; 4];
        trailer.copy_from_slice(&bytes[bytes.len() - 4..]);
        let file = ContainerFile {
            path: path.to_path_buf(),
            row_count: self.rows.len(),
            checksum: u32::from_le_bytes(trailer),
        };
        debug!(path = %path.display(), rows = file.row_count, "container written");
        Ok(file)
    }

    pub fn read_from(path: &Path) -> JoinResult<Self> {
        let data = std::fs::read(path)?;
        Self::from_bytes(&data)
    }
}

fn corrupt(offset: usize, reason: &str) -> JoinError {
    ContainerError::Corrupt {
        offset,
        reason: reason.to_string(),
    }
    .into()
}

fn put_name(out: &mut Vec<u8>, name: &str) -> JoinResult<()> {
    let len = u16::try_from(name.len()).map_err(|_| {
        JoinError::Config(format!("container name longer than {} bytes", u16::MAX))
    })?;
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(name.as_bytes());
    Ok(())
}

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, n: usize) -> JoinResult<&'a [u8]> {
        if self.remaining() < n {
            return Err(corrupt(self.pos, "unexpected end of data"));
        }
        let bytes = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    fn array<const N: usize>(&mut self) -> JoinResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u32(&mut self) -> JoinResult<u32> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    fn u64(&mut self) -> JoinResult<u64> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    fn name(&mut self) -> JoinResult<String> {
        let at = self.pos;
        let len = u16::from_le_bytes(self.array()?) as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| corrupt(at, "name is not UTF-8"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{JoinRecord, JoinStats, SecondaryMatch};
    use geojoin_types::{Resolution, SourceKey, SpatialId, TemporalId, TemporalResolution};

    fn sample_output() -> JoinOutput {
        let id = SpatialId::from_path(2, &[1, 2, 3]).unwrap();
        let t = TemporalId::new(1_134_606_615_000, TemporalResolution::FINEST).unwrap();
        JoinOutput {
            resolution: Resolution::new(3).unwrap(),
            primary: SourceKey::Goes,
            secondaries: vec![SourceKey::Merra2],
            bands: vec!["goes_b5".into()],
            records: vec![
                JoinRecord {
                    spatial: Some(id),
                    temporal: Some(t),
                    primary_coord: 0,
                    secondaries: vec![SecondaryMatch {
                        coord: Some(12),
                        value: Some(41.2345),
                    }],
                    bands: vec![873.0],
                },
                JoinRecord {
                    spatial: None,
                    temporal: Some(t),
                    primary_coord: 1,
                    secondaries: vec![SecondaryMatch::default()],
                    bands: vec![f64::NAN],
                },
            ],
            stats: JoinStats::default(),
        }
    }

    #[test]
    fn encode_value_scales_and_truncates() {
        assert_eq!(encode_value(Some(41.2345), 0.001, 0.0), 41234);
        assert_eq!(encode_value(Some(-2.5), 1.0, 0.0), -2);
        assert_eq!(encode_value(Some(10.0), 0.5, 2.0), 16);
        assert_eq!(encode_value(None, 0.001, 0.0), ABSENT);
        assert_eq!(encode_value(Some(f64::NAN), 0.001, 0.0), ABSENT);
        assert_eq!(encode_value(Some(f64::INFINITY), 1.0, 0.0), ABSENT);
        assert_eq!(decode_value(16, 0.5, 2.0), Some(10.0));
        assert_eq!(decode_value(ABSENT, 0.5, 2.0), None);
    }

    #[test]
    fn layout_follows_the_join() {
        let table = RecordTable::from_output(&sample_output(), &JoinConfig::default());
        assert_eq!(
            table.fields,
            vec![
                "stare_spatial",
                "stare_temporal",
                "goes_src_coord",
                "m2_src_coord",
                "m2_value",
                "goes_b5"
            ]
        );
        assert_eq!(table.column("m2_value"), Some(vec![41234, ABSENT]));
        assert_eq!(table.column("m2_src_coord"), Some(vec![12, ABSENT]));
        assert_eq!(table.column("stare_spatial").unwrap()[1], ABSENT);
        assert_eq!(table.column("goes_b5"), Some(vec![873, ABSENT]));
        assert_eq!(table.attribute(SCALE_ATTRIBUTE), Some(0.001));
    }

    #[test]
    fn file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("joined.gjrc");
        let table = RecordTable::from_output(&sample_output(), &JoinConfig::default());
        let file = table.write_to(&path).unwrap();
        assert_eq!(file.row_count, 2);

        let back = RecordTable::read_from(&path).unwrap();
        assert_eq!(back, table);
    }

    #[test]
    fn corrupted_checksum_is_rejected() {
        let table = RecordTable::from_output(&sample_output(), &JoinConfig::default());
        let mut bytes = table.to_bytes().unwrap();
        let mid = bytes.len() / 2;
        bytes[mid] ^= 0xff;
        assert!(matches!(
            RecordTable::from_bytes(&bytes),
            Err(JoinError::Container(ContainerError::ChecksumMismatch { .. }))
        ));
    }

    #[test]
    fn rows_without_fields_are_rejected() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&VERSION.to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(&u64::MAX.to_le_bytes());
        let crc = crc32fast::hash(&bytes);
        bytes.extend_from_slice(&crc.to_le_bytes());
        assert!(matches!(
            RecordTable::from_bytes(&bytes),
            Err(JoinError::Container(ContainerError::Corrupt { .. }))
        ));

        let mut table = RecordTable::new(vec![]);
        assert!(matches!(table.push_row(vec![]), Err(JoinError::ShapeMismatch { .. })));
        let empty = RecordTable::from_bytes(&table.to_bytes().unwrap()).unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn wrong_magic_and_version_are_rejected() {
        let mut bytes = RecordTable::new(vec!["a".into()]).to_bytes().unwrap();
        bytes[0] = b'X';
        let body = bytes.len() - 4;
        let crc = crc32fast::hash(&bytes[..body]);
        bytes[body..].copy_from_slice(&crc.to_le_bytes());
        assert!(matches!(
            RecordTable::from_bytes(&bytes),
            Err(JoinError::Container(ContainerError::InvalidMagic { .. }))
        ));

        let mut bytes = RecordTable::new(vec![]).to_bytes().unwrap();
        bytes[4] = 2;
        let body = bytes.len() - 4;
        let crc = crc32fast::hash(&bytes[..body]);
        bytes[body..].copy_from_slice(&crc.to_le_bytes());
        assert!(matches!(
            RecordTable::from_bytes(&bytes),
            Err(JoinError::Container(ContainerError::UnsupportedVersion(2)))
        ));
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let mut table = RecordTable::new(vec!["a".into(), "b".into()]);
        assert!(table.push_row(vec![1, 2]).is_ok());
        assert!(matches!(
            table.push_row(vec![1]),
            Err(JoinError::ShapeMismatch { expected: 2, actual: 1, .. })
        ));
        assert_eq!(table.len(), 1);
    }
}
