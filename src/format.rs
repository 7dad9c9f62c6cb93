//! Defines the physical binary layout of featpipe container files.
//!
//! # Layout
//! A container holds one output stream. Records are appended back to back from the
//! start of the file; the index structures follow them:
//!
//! ```text
//! [record_0] [record_1] ... [record_{n-1}]
//! [offset table: i64 count, count * i64 offset]
//! [metadata map: i64 count, count * (string key, string value)]
//! [trailer: i64 absolute position of the metadata map]
//! ```
//!
//! The 8-byte trailer is the one fixed-layout anchor in the file: every other
//! position is reached from it, so it must keep its size across format versions.
//! Strings are an `i32` length followed by that many bytes; every integer is
//! little-endian.

use std::collections::BTreeMap;
use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{FeatError, Result};
use crate::value::{len_to_i64, read_count, read_string, write_string};

/// Highest format version this build writes and reads.
pub const FORMAT_VERSION: u32 = 1;

/// Size of the trailer at the very end of the file.
pub const TRAILER_SIZE: usize = 8;

/// Metadata key holding the format version.
pub const KEY_VERSION: &str = "__version";
/// Metadata key holding the absolute position of the offset table.
pub const KEY_OFFSETS: &str = "__offsets";
/// Metadata key holding the absolute position of record 0.
pub const KEY_FEATURES: &str = "__features";
/// Metadata key holding the value kind of the stream.
pub const KEY_KIND: &str = "__kind";

/// Keys starting with this prefix are reserved for the format itself.
pub const RESERVED_PREFIX: &str = "__";

/// The string-to-string footer map.
pub type MetadataMap = BTreeMap<String, String>;

/// The fixed trailer: a pointer to the metadata map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trailer {
    /// Absolute byte position where the metadata map begins.
    pub metadata_position: u64,
}

impl Trailer {
    /// Serializes the trailer to bytes.
    pub fn to_bytes(&self) -> [u8; TRAILER_SIZE] {
        (self.metadata_position as i64).to_le_bytes()
    }

    /// Parses the trailer from the last [`TRAILER_SIZE`] bytes of a file.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let raw: [u8; TRAILER_SIZE] = bytes
            .try_into()
            .map_err(|_| FeatError::corrupt("trailer must be exactly 8 bytes"))?;
        let position = i64::from_le_bytes(raw);
        let metadata_position = u64::try_from(position)
            .map_err(|_| FeatError::corrupt(format!("negative metadata position {position}")))?;
        Ok(Self { metadata_position })
    }
}

// --- OFFSET TABLE ---

/// Writes the offset table. Returns the number of bytes written.
pub fn write_offsets<W: Write>(w: &mut W, offsets: &[u64]) -> Result<usize> {
    w.write_i64::<LittleEndian>(len_to_i64(offsets.len())?)?;
    for offset in offsets {
        w.write_i64::<LittleEndian>(*offset as i64)?;
    }
    Ok(8 + offsets.len() * 8)
}

/// Reads an offset table of at most `available` bytes.
pub fn read_offsets<R: Read>(r: &mut R, available: usize) -> Result<Vec<u64>> {
    let count = read_count(r, available.saturating_sub(8) / 8)
        .map_err(|e| FeatError::corrupt(format!("offset table: {e}")))?;
    let mut offsets = Vec::with_capacity(count);
    for _ in 0..count {
        let raw = r.read_i64::<LittleEndian>()?;
        let offset = u64::try_from(raw)
            .map_err(|_| FeatError::corrupt(format!("negative record offset {raw}")))?;
        offsets.push(offset);
    }
    Ok(offsets)
}

// --- METADATA MAP ---

/// Writes the metadata map. Returns the number of bytes written.
pub fn write_metadata<W: Write>(w: &mut W, map: &MetadataMap) -> Result<usize> {
    w.write_i64::<LittleEndian>(len_to_i64(map.len())?)?;
    let mut written = 8;
    for (key, value) in map {
        write_string(w, key)?;
        write_string(w, value)?;
        written += 8 + key.len() + value.len();
    }
    Ok(written)
}

/// Reads a metadata map of at most `available` bytes.
pub fn read_metadata<R: Read>(r: &mut R, available: usize) -> Result<MetadataMap> {
    // Each entry takes at least two 4-byte length prefixes.
    let count = read_count(r, available / 8)
        .map_err(|e| FeatError::corrupt(format!("metadata map: {e}")))?;
    let mut map = MetadataMap::new();
    for _ in 0..count {
        let key = read_string(r, available)?;
        let value = read_string(r, available)?;
        map.insert(key, value);
    }
    Ok(map)
}

/// Fetches a required numeric metadata entry.
pub fn required_number(map: &MetadataMap, key: &str) -> Result<u64> {
    let raw = map
        .get(key)
        .ok_or_else(|| FeatError::corrupt(format!("metadata lacks required key {key}")))?;
    raw.trim()
        .parse::<u64>()
        .map_err(|_| FeatError::corrupt(format!("metadata key {key} is not a number: {raw:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn metadata_map_survives_encoding() {
        let mut map = MetadataMap::new();
        map.insert(KEY_VERSION.into(), "1".into());
        map.insert("generator".into(), "tiny_image".into());

        let mut buf = Vec::new();
        let written = write_metadata(&mut buf, &map).unwrap();
        assert_eq!(written, buf.len());

        let back = read_metadata(&mut Cursor::new(&buf), buf.len()).unwrap();
        assert_eq!(back, map);
    }

    #[test]
    fn negative_trailer_is_corrupt() {
        let err = Trailer::from_bytes(&(-5i64).to_le_bytes()).unwrap_err();
        assert!(matches!(err, FeatError::CorruptContainer(_)));
    }

    #[test]
    fn required_number_rejects_garbage() {
        let mut map = MetadataMap::new();
        map.insert(KEY_OFFSETS.into(), "twelve".into());
        assert!(required_number(&map, KEY_OFFSETS).is_err());
        assert!(required_number(&map, KEY_FEATURES).is_err());
    }
}
