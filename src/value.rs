//! Typed values carried by records and persisted in containers.
//!
//! A [`Value`] is the unit a generator writes into a [`Record`](crate::record::Record)
//! and the unit a container stores per index. Every value has a [`ValueKind`]; a
//! container holds values of exactly one kind.
//!
//! ## Encoding
//!
//! All integers and floats are fixed-width little-endian:
//!
//! | Kind     | Layout                                                   |
//! |----------|----------------------------------------------------------|
//! | `int`    | `i64`                                                    |
//! | `float`  | `f64`                                                    |
//! | `text`   | `i32` byte length, UTF-8 bytes                           |
//! | `bytes`  | `i64` count, bytes                                       |
//! | `f32s`   | `i64` count, `count * f32`                               |
//! | `f64s`   | `i64` count, `count * f64`                               |
//! | `raster` | `i64` width, `i64` height, `i64` channels, `bytes` layout |

use std::fmt;
use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};

use crate::error::{FeatError, Result};

/// The kind tag of a [`Value`], stored in a container's metadata under `__kind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    /// Signed 64-bit integer.
    Int,
    /// 64-bit float.
    Float,
    /// UTF-8 string.
    Text,
    /// Opaque byte vector.
    Bytes,
    /// Vector of 32-bit floats (the usual feature vector).
    F32s,
    /// Vector of 64-bit floats.
    F64s,
    /// 8-bit interleaved image.
    Raster,
}

impl ValueKind {
    /// The tag written into container metadata.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::Float => "float",
            Self::Text => "text",
            Self::Bytes => "bytes",
            Self::F32s => "f32s",
            Self::F64s => "f64s",
            Self::Raster => "raster",
        }
    }

    /// Parses a metadata tag back into a kind.
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "int" => Some(Self::Int),
            "float" => Some(Self::Float),
            "text" => Some(Self::Text),
            "bytes" => Some(Self::Bytes),
            "f32s" => Some(Self::F32s),
            "f64s" => Some(Self::F64s),
            "raster" => Some(Self::Raster),
            _ => None,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An 8-bit interleaved image, row-major, `channels` bytes per pixel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raster {
    /// Width in pixels.
    pub width: usize,
    /// Height in pixels.
    pub height: usize,
    /// Bytes per pixel (3 for RGB).
    pub channels: usize,
    /// Pixel data, `width * height * channels` bytes.
    pub data: Vec<u8>,
}

impl Raster {
    /// Builds a raster, checking that the buffer matches the dimensions.
    pub fn new(width: usize, height: usize, channels: usize, data: Vec<u8>) -> Result<Self> {
        let expected = width
            .checked_mul(height)
            .and_then(|n| n.checked_mul(channels))
            .ok_or_else(|| FeatError::config("raster dimensions overflow"))?;
        if data.len() != expected {
            return Err(FeatError::config(format!(
                "raster buffer holds {} bytes, {width}x{height}x{channels} needs {expected}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            channels,
            data,
        })
    }

    /// Returns the channel values of the pixel at `(x, y)`, or `None` outside the raster.
    pub fn pixel(&self, x: usize, y: usize) -> Option<&[u8]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let start = (y * self.width + x) * self.channels;
        self.data.get(start..start + self.channels)
    }
}

/// A single typed value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// See [`ValueKind::Int`].
    Int(i64),
    /// See [`ValueKind::Float`].
    Float(f64),
    /// See [`ValueKind::Text`].
    Text(String),
    /// See [`ValueKind::Bytes`].
    Bytes(Vec<u8>),
    /// See [`ValueKind::F32s`].
    F32s(Vec<f32>),
    /// See [`ValueKind::F64s`].
    F64s(Vec<f64>),
    /// See [`ValueKind::Raster`].
    Raster(Raster),
}

impl Value {
    /// The kind of this value.
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Int(_) => ValueKind::Int,
            Self::Float(_) => ValueKind::Float,
            Self::Text(_) => ValueKind::Text,
            Self::Bytes(_) => ValueKind::Bytes,
            Self::F32s(_) => ValueKind::F32s,
            Self::F64s(_) => ValueKind::F64s,
            Self::Raster(_) => ValueKind::Raster,
        }
    }

    /// Borrows the payload of an `F32s` value.
    pub fn as_f32s(&self) -> Option<&[f32]> {
        match self {
            Self::F32s(v) => Some(v),
            _ => None,
        }
    }

    /// Borrows the payload of a `Raster` value.
    pub fn as_raster(&self) -> Option<&Raster> {
        match self {
            Self::Raster(r) => Some(r),
            _ => None,
        }
    }

    /// Borrows the payload of a `Text` value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Number of bytes [`Value::encode`] will produce.
    pub fn encoded_len(&self) -> usize {
        match self {
            Self::Int(_) | Self::Float(_) => 8,
            Self::Text(s) => 4 + s.len(),
            Self::Bytes(b) => 8 + b.len(),
            Self::F32s(v) => 8 + v.len() * 4,
            Self::F64s(v) => 8 + v.len() * 8,
            Self::Raster(r) => 24 + 8 + r.data.len(),
        }
    }

    /// Serializes the value. Returns the number of bytes written.
    pub fn encode<W: Write>(&self, w: &mut W) -> Result<usize> {
        match self {
            Self::Int(v) => w.write_i64::<LittleEndian>(*v)?,
            Self::Float(v) => w.write_f64::<LittleEndian>(*v)?,
            Self::Text(s) => write_string(w, s)?,
            Self::Bytes(b) => write_bytes(w, b)?,
            Self::F32s(v) => {
                w.write_i64::<LittleEndian>(len_to_i64(v.len())?)?;
                for x in v {
                    w.write_f32::<LittleEndian>(*x)?;
                }
            }
            Self::F64s(v) => {
                w.write_i64::<LittleEndian>(len_to_i64(v.len())?)?;
                for x in v {
                    w.write_f64::<LittleEndian>(*x)?;
                }
            }
            Self::Raster(r) => {
                w.write_i64::<LittleEndian>(len_to_i64(r.width)?)?;
                w.write_i64::<LittleEndian>(len_to_i64(r.height)?)?;
                w.write_i64::<LittleEndian>(len_to_i64(r.channels)?)?;
                write_bytes(w, &r.data)?;
            }
        }
        Ok(self.encoded_len())
    }

    /// Deserializes one value of the given kind.
    ///
    /// `limit` bounds every length prefix, so a corrupted count cannot trigger a huge
    /// allocation; pass the number of bytes actually available.
    pub fn decode<R: Read>(kind: ValueKind, r: &mut R, limit: usize) -> Result<Self> {
        let value = match kind {
            ValueKind::Int => Self::Int(r.read_i64::<LittleEndian>()?),
            ValueKind::Float => Self::Float(r.read_f64::<LittleEndian>()?),
            ValueKind::Text => Self::Text(read_string(r, limit)?),
            ValueKind::Bytes => Self::Bytes(read_bytes(r, limit)?),
            ValueKind::F32s => {
                let n = read_count(r, limit / 4)?;
                let mut v = vec![0f32; n];
                r.read_f32_into::<LittleEndian>(&mut v)?;
                Self::F32s(v)
            }
            ValueKind::F64s => {
                let n = read_count(r, limit / 8)?;
                let mut v = vec![0f64; n];
                r.read_f64_into::<LittleEndian>(&mut v)?;
                Self::F64s(v)
            }
            ValueKind::Raster => {
                let width = read_count(r, limit)?;
                let height = read_count(r, limit)?;
                let channels = read_count(r, limit)?;
                let data = read_bytes(r, limit)?;
                Self::Raster(
                    Raster::new(width, height, channels, data)
                        .map_err(|e| FeatError::corrupt(e.to_string()))?,
                )
            }
        };
        Ok(value)
    }
}

// --- PRIMITIVE HELPERS (shared with the footer codec) ---

pub(crate) fn len_to_i64(len: usize) -> Result<i64> {
    i64::try_from(len).map_err(|_| FeatError::Internal(format!("length {len} exceeds i64")))
}

/// Reads an `i64` count and checks it against `limit`.
pub(crate) fn read_count<R: Read>(r: &mut R, limit: usize) -> Result<usize> {
    let raw = r.read_i64::<LittleEndian>()?;
    usize::try_from(raw)
        .ok()
        .filter(|n| *n <= limit)
        .ok_or_else(|| FeatError::corrupt(format!("count {raw} exceeds available data")))
}

pub(crate) fn write_string<W: Write>(w: &mut W, s: &str) -> Result<()> {
    let len = i32::try_from(s.len())
        .map_err(|_| FeatError::Internal(format!("string of {} bytes too long", s.len())))?;
    w.write_i32::<LittleEndian>(len)?;
    w.write_all(s.as_bytes())?;
    Ok(())
}

pub(crate) fn read_string<R: Read>(r: &mut R, limit: usize) -> Result<String> {
    let raw = r.read_i32::<LittleEndian>()?;
    let len = usize::try_from(raw)
        .ok()
        .filter(|n| *n <= limit)
        .ok_or_else(|| FeatError::corrupt(format!("string length {raw} exceeds available data")))?;
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf)?;
    String::from_utf8(buf).map_err(|e| FeatError::corrupt(format!("invalid UTF-8: {e}")))
}

fn write_bytes<W: Write>(w: &mut W, b: &[u8]) -> Result<()> {
    w.write_i64::<LittleEndian>(len_to_i64(b.len())?)?;
    w.write_all(b)?;
    Ok(())
}

fn read_bytes<R: Read>(r: &mut R, limit: usize) -> Result<Vec<u8>> {
    let n = read_count(r, limit)?;
    let mut buf = vec![0u8; n];
    r.read_exact(&mut buf)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn encoded_len_matches_written_bytes() {
        let raster = Raster::new(2, 1, 3, vec![1, 2, 3, 4, 5, 6]).unwrap();
        let values = [
            Value::Int(-7),
            Value::Text("gist".into()),
            Value::F32s(vec![0.5; 13]),
            Value::Raster(raster),
        ];
        for v in &values {
            let mut buf = Vec::new();
            let written = v.encode(&mut buf).unwrap();
            assert_eq!(written, buf.len(), "{:?}", v.kind());
        }
    }

    #[test]
    fn pixel_outside_raster_is_none() {
        let raster = Raster::new(2, 1, 3, vec![1, 2, 3, 4, 5, 6]).unwrap();
        assert_eq!(raster.pixel(1, 0), Some(&[4u8, 5, 6][..]));
        assert_eq!(raster.pixel(2, 0), None);
        assert_eq!(raster.pixel(0, 1), None);
        assert_eq!(raster.pixel(usize::MAX, 0), None);
    }

    #[test]
    fn f32_vector_layout_is_count_then_elements() {
        let mut buf = Vec::new();
        Value::F32s(vec![1.0, 2.0]).encode(&mut buf).unwrap();
        assert_eq!(&buf[0..8], &2i64.to_le_bytes());
        assert_eq!(&buf[8..12], &1.0f32.to_le_bytes());
        assert_eq!(&buf[12..16], &2.0f32.to_le_bytes());
    }

    #[test]
    fn oversized_count_is_rejected() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&1_000_000i64.to_le_bytes());
        let err = Value::decode(ValueKind::F32s, &mut Cursor::new(&buf), buf.len()).unwrap_err();
        assert!(matches!(err, FeatError::CorruptContainer(_)));
    }

    #[test]
    fn kind_tags_parse_back() {
        for kind in [ValueKind::Int, ValueKind::F32s, ValueKind::Raster] {
            assert_eq!(ValueKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(ValueKind::parse("complex"), None);
    }
}
