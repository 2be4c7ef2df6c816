//! Typed index keys.
//!
//! A key occupies a fixed number of bytes inside a tree-node entry: 4 for
//! integers, 8 for doubles, and the declared field size for text, which is
//! NUL-padded on disk and compared after trimming the padding.

use crate::access::error::{IndexError, IndexResult};
use byteorder::{ByteOrder, LittleEndian};
use std::cmp::Ordering;

/// The type of the indexed field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Int,
    Float,
    Text,
}

impl FieldType {
    /// On-disk type tag stored in the index meta page.
    pub fn to_tag(self) -> i32 {
        match self {
            FieldType::Int => 0,
            FieldType::Float => 1,
            FieldType::Text => 2,
        }
    }

    pub fn from_tag(tag: i32) -> IndexResult<Self> {
        match tag {
            0 => Ok(FieldType::Int),
            1 => Ok(FieldType::Float),
            2 => Ok(FieldType::Text),
            _ => Err(IndexError::FieldType(format!("unknown type tag {}", tag))),
        }
    }

    /// Validate the declared field size for this type.
    pub fn check_size(self, field_size: usize) -> IndexResult<()> {
        let ok = match self {
            FieldType::Int => field_size == 4,
            FieldType::Float => field_size == 8,
            FieldType::Text => field_size >= 1,
        };
        if ok {
            Ok(())
        } else {
            Err(IndexError::FieldType(format!(
                "{:?} key cannot have field size {}",
                self, field_size
            )))
        }
    }
}

/// A key value with natural ordering per field type.
#[derive(Debug, Clone, PartialEq)]
pub enum IndexKey {
    Int(i32),
    Float(f64),
    Text(String),
}

impl IndexKey {
    pub fn field_type(&self) -> FieldType {
        match self {
            IndexKey::Int(_) => FieldType::Int,
            IndexKey::Float(_) => FieldType::Float,
            IndexKey::Text(_) => FieldType::Text,
        }
    }

    /// Natural ordering: numeric for `Int`/`Float`, lexicographic for
    /// `Text`. Comparing keys of different types is a caller bug; the
    /// mismatch is ordered by type tag so it stays deterministic.
    pub fn compare(&self, other: &IndexKey) -> Ordering {
        match (self, other) {
            (IndexKey::Int(a), IndexKey::Int(b)) => a.cmp(b),
            (IndexKey::Float(a), IndexKey::Float(b)) => {
                a.partial_cmp(b).unwrap_or(Ordering::Equal)
            }
            (IndexKey::Text(a), IndexKey::Text(b)) => a.cmp(b),
            _ => (self.field_type().to_tag()).cmp(&other.field_type().to_tag()),
        }
    }

    /// Serialize into exactly `field_size` bytes.
    pub fn write_to(&self, buf: &mut [u8], field_size: usize) -> IndexResult<()> {
        debug_assert_eq!(buf.len(), field_size);
        match self {
            IndexKey::Int(v) => {
                self.field_type().check_size(field_size)?;
                LittleEndian::write_i32(buf, *v);
            }
            IndexKey::Float(v) => {
                self.field_type().check_size(field_size)?;
                LittleEndian::write_f64(buf, *v);
            }
            IndexKey::Text(s) => {
                let bytes = s.as_bytes();
                if bytes.len() > field_size {
                    return Err(IndexError::FieldType(format!(
                        "text key of {} bytes exceeds field size {}",
                        bytes.len(),
                        field_size
                    )));
                }
                buf[..bytes.len()].copy_from_slice(bytes);
                buf[bytes.len()..].fill(0);
            }
        }
        Ok(())
    }

    /// Deserialize from exactly `field_size` bytes.
    pub fn read_from(field_type: FieldType, buf: &[u8]) -> IndexResult<Self> {
        match field_type {
            FieldType::Int => {
                field_type.check_size(buf.len())?;
                Ok(IndexKey::Int(LittleEndian::read_i32(buf)))
            }
            FieldType::Float => {
                field_type.check_size(buf.len())?;
                Ok(IndexKey::Float(LittleEndian::read_f64(buf)))
            }
            FieldType::Text => {
                let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
                let s = std::str::from_utf8(&buf[..end])
                    .map_err(|e| IndexError::FieldType(format!("invalid text key: {}", e)))?;
                Ok(IndexKey::Text(s.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_round_trip() {
        let key = IndexKey::Int(-42);
        let mut buf = [0u8; 4];
        key.write_to(&mut buf, 4).unwrap();
        assert_eq!(IndexKey::read_from(FieldType::Int, &buf).unwrap(), key);
    }

    #[test]
    fn test_float_round_trip() {
        let key = IndexKey::Float(3.25);
        let mut buf = [0u8; 8];
        key.write_to(&mut buf, 8).unwrap();
        assert_eq!(IndexKey::read_from(FieldType::Float, &buf).unwrap(), key);
    }

    #[test]
    fn test_text_padding_trimmed() {
        let key = IndexKey::Text("ab".to_string());
        let mut buf = [0u8; 8];
        key.write_to(&mut buf, 8).unwrap();
        assert_eq!(&buf, b"ab\0\0\0\0\0\0");
        let back = IndexKey::read_from(FieldType::Text, &buf).unwrap();
        assert_eq!(back, key);
        // Padded and unpadded forms compare equal.
        assert_eq!(back.compare(&key), Ordering::Equal);
    }

    #[test]
    fn test_text_too_long() {
        let key = IndexKey::Text("toolong".to_string());
        let mut buf = [0u8; 4];
        assert!(matches!(
            key.write_to(&mut buf, 4),
            Err(IndexError::FieldType(_))
        ));
    }

    #[test]
    fn test_ordering() {
        assert_eq!(
            IndexKey::Int(1).compare(&IndexKey::Int(2)),
            Ordering::Less
        );
        assert_eq!(
            IndexKey::Float(2.0).compare(&IndexKey::Float(1.5)),
            Ordering::Greater
        );
        assert_eq!(
            IndexKey::Text("abc".into()).compare(&IndexKey::Text("abd".into())),
            Ordering::Less
        );
    }

    #[test]
    fn test_bad_sizes_rejected() {
        assert!(FieldType::Int.check_size(8).is_err());
        assert!(FieldType::Float.check_size(4).is_err());
        assert!(FieldType::Text.check_size(0).is_err());
        assert!(FieldType::from_tag(9).is_err());
    }
}
