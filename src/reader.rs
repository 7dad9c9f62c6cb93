//! The read side of a container.
//!
//! Memory-maps the file, locates the footer through the trailer, validates the
//! index structures once at open time, and then serves records by index.

use std::fs::File;
use std::io::Cursor;
use std::path::Path;

use memmap2::Mmap;
use tracing::debug;

use crate::error::{FeatError, Result};
use crate::format::{
    self, FORMAT_VERSION, KEY_FEATURES, KEY_KIND, KEY_OFFSETS, KEY_VERSION, MetadataMap,
    TRAILER_SIZE, Trailer,
};
use crate::value::{Value, ValueKind};

/// Random-access reader of a sealed container.
#[derive(Debug)]
pub struct ContainerReader {
    mmap: Mmap,
    file_size: u64,
    version: u32,
    kind: ValueKind,
    features_position: u64,
    offsets_position: u64,
    metadata_position: u64,
    offsets: Vec<u64>,
    metadata: MetadataMap,
}

/// Any I/O hiccup while parsing the footer means the bytes are not what we expect.
fn corrupt_in(context: &str, err: FeatError) -> FeatError {
    match err {
        FeatError::CorruptContainer(msg) => FeatError::corrupt(format!("{context}: {msg}")),
        other => FeatError::corrupt(format!("{context}: {other}")),
    }
}

impl ContainerReader {
    /// Opens a container and validates its footer.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let file_size = file.metadata()?.len();

        if file_size < TRAILER_SIZE as u64 {
            return Err(FeatError::corrupt(format!(
                "file of {file_size} bytes is smaller than the trailer"
            )));
        }

        // Safety: the map is only valid while nobody truncates the file underneath us.
        // Containers are written once and never modified in place.
        #[allow(unsafe_code)]
        let mmap = unsafe { Mmap::map(&file)? };

        // 1. Trailer -> metadata map position.
        let trailer_start = file_size - TRAILER_SIZE as u64;
        let trailer = Trailer::from_bytes(&mmap[trailer_start as usize..])?;
        let metadata_position = trailer.metadata_position;
        if metadata_position > trailer_start.saturating_sub(8) {
            return Err(FeatError::corrupt(format!(
                "metadata position {metadata_position} outside file of {file_size} bytes"
            )));
        }

        // 2. Metadata map.
        let map_bytes = &mmap[metadata_position as usize..trailer_start as usize];
        let metadata = format::read_metadata(&mut Cursor::new(map_bytes), map_bytes.len())
            .map_err(|e| corrupt_in("metadata map", e))?;

        let version = format::required_number(&metadata, KEY_VERSION)?;
        let offsets_position = format::required_number(&metadata, KEY_OFFSETS)?;
        let features_position = format::required_number(&metadata, KEY_FEATURES)?;

        if version > u64::from(FORMAT_VERSION) {
            return Err(FeatError::corrupt(format!(
                "format version {version} is newer than supported version {FORMAT_VERSION}"
            )));
        }

        let kind = match metadata.get(KEY_KIND) {
            Some(tag) => ValueKind::parse(tag)
                .ok_or_else(|| FeatError::corrupt(format!("unknown value kind {tag:?}")))?,
            None => ValueKind::F32s,
        };

        // 3. Offset table.
        if features_position > offsets_position
            || offsets_position.saturating_add(8) > metadata_position
        {
            return Err(FeatError::corrupt(format!(
                "offset table position {offsets_position} inconsistent with \
                 payload start {features_position} and metadata at {metadata_position}"
            )));
        }
        let table_bytes = &mmap[offsets_position as usize..metadata_position as usize];
        let offsets = format::read_offsets(&mut Cursor::new(table_bytes), table_bytes.len())
            .map_err(|e| corrupt_in("offset table", e))?;

        // 4. Offsets must be ordered and stay inside the payload region.
        let payload_len = offsets_position - features_position;
        let mut previous = 0u64;
        for (i, offset) in offsets.iter().copied().enumerate() {
            if offset < previous || offset > payload_len {
                return Err(FeatError::corrupt(format!(
                    "record {i} offset {offset} out of order or beyond payload of {payload_len} bytes"
                )));
            }
            previous = offset;
        }

        debug!(
            path = %path.display(),
            records = offsets.len(),
            version,
            kind = %kind,
            "container opened"
        );

        Ok(Self {
            mmap,
            file_size,
            version: version as u32,
            kind,
            features_position,
            offsets_position,
            metadata_position,
            offsets,
            metadata,
        })
    }

    /// Number of records in the container.
    pub fn size(&self) -> usize {
        self.offsets.len()
    }

    /// Returns true if the container holds no records.
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Format version the file was written with.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Kind of the stored values.
    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    /// The footer metadata map, reserved keys included.
    pub fn metadata(&self) -> &MetadataMap {
        &self.metadata
    }

    /// The record offsets, relative to the payload start.
    pub fn offsets(&self) -> &[u64] {
        &self.offsets
    }

    /// Total file size in bytes.
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Bytes occupied by records.
    pub fn payload_len(&self) -> u64 {
        self.offsets_position - self.features_position
    }

    /// Bytes occupied by the offset table, metadata map and trailer.
    pub fn footer_len(&self) -> u64 {
        self.file_size - self.offsets_position
    }

    /// Absolute position of the metadata map.
    pub fn metadata_position(&self) -> u64 {
        self.metadata_position
    }

    /// Raw encoded bytes of record `index`.
    ///
    /// A record runs up to the next record's offset; the last one runs up to the
    /// offset table.
    pub fn raw(&self, index: usize) -> Result<&[u8]> {
        let start = *self.offsets.get(index).ok_or(FeatError::IndexOutOfRange {
            index,
            size: self.offsets.len(),
        })?;
        let end = self
            .offsets
            .get(index + 1)
            .copied()
            .unwrap_or(self.payload_len());
        let base = self.features_position;
        Ok(&self.mmap[(base + start) as usize..(base + end) as usize])
    }

    /// Decodes record `index`.
    pub fn get(&self, index: usize) -> Result<Value> {
        let bytes = self.raw(index)?;
        Value::decode(self.kind, &mut Cursor::new(bytes), bytes.len())
            .map_err(|e| corrupt_in(&format!("record {index}"), e))
    }

    /// Iterates over all records in index order.
    pub fn iter(&self) -> impl Iterator<Item = Result<Value>> + '_ {
        (0..self.size()).map(move |i| self.get(i))
    }

    /// Decodes every record.
    pub fn load_all(&self) -> Result<Vec<Value>> {
        self.iter().collect()
    }
}
