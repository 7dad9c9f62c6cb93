//! The write side of a container.
//!
//! A [`ContainerWriter`] appends encoded values to a file, remembering where each
//! one starts, and seals the file with the offset table, the metadata map and the
//! trailer (see [`crate::format`]). Sealing happens exactly once: explicitly via
//! [`ContainerWriter::close`], or on drop as a fallback.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{FeatError, Result};
use crate::format::{
    self, FORMAT_VERSION, KEY_FEATURES, KEY_KIND, KEY_OFFSETS, KEY_VERSION, MetadataMap,
    RESERVED_PREFIX, Trailer,
};
use crate::io::SeqWriter;
use crate::value::{Value, ValueKind};

/// Destination for an ordered stream of values.
///
/// The [`OrderedAssembler`](crate::assembler::OrderedAssembler) forwards values to a
/// sink strictly in index order. [`ContainerWriter`] is the file-backed sink; `Vec<Value>`
/// is an in-memory one.
pub trait RecordSink: Send {
    /// Appends the next value. Returns its position in the sink.
    fn append(&mut self, value: Value) -> Result<u64>;

    /// Finalizes the sink. Must be idempotent.
    fn seal(&mut self) -> Result<()>;

    /// Number of values appended so far.
    fn appended(&self) -> usize;
}

impl RecordSink for Vec<Value> {
    fn append(&mut self, value: Value) -> Result<u64> {
        self.push(value);
        Ok((self.len() - 1) as u64)
    }

    fn seal(&mut self) -> Result<()> {
        Ok(())
    }

    fn appended(&self) -> usize {
        self.len()
    }
}

/// Sequential writer of one container file.
#[derive(Debug)]
pub struct ContainerWriter {
    path: PathBuf,
    kind: ValueKind,
    out: Option<SeqWriter>,
    offsets: Vec<u64>,
    metadata: MetadataMap,
}

impl ContainerWriter {
    /// Creates (or truncates) the container at `path` for values of `kind`.
    pub fn create<P: AsRef<Path>>(path: P, kind: ValueKind) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let out = SeqWriter::create(&path)?;

        let mut metadata = MetadataMap::new();
        metadata.insert(KEY_VERSION.into(), FORMAT_VERSION.to_string());
        metadata.insert(KEY_KIND.into(), kind.as_str().into());

        Ok(Self {
            path,
            kind,
            out: Some(out),
            offsets: Vec::new(),
            metadata,
        })
    }

    /// Path of the file being written.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Kind of values this container accepts.
    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    /// Number of records appended so far.
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    /// Returns true if nothing has been appended.
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Returns true once the footer has been written.
    pub fn is_closed(&self) -> bool {
        self.out.is_none()
    }

    /// Appends one value and returns the offset it was written at.
    pub fn append(&mut self, value: &Value) -> Result<u64> {
        if value.kind() != self.kind {
            return Err(FeatError::KindMismatch {
                expected: self.kind.to_string(),
                found: value.kind().to_string(),
            });
        }
        let out = self.out.as_mut().ok_or_else(|| {
            FeatError::Internal(format!("append to closed container {}", self.path.display()))
        })?;

        let offset = out.position();
        value.encode(out)?;
        self.offsets.push(offset);
        Ok(offset)
    }

    /// Adds a user metadata entry to the footer.
    ///
    /// Returns false if the key is reserved (`__` prefix), already present, or the
    /// container is closed.
    pub fn insert_metadata(&mut self, key: impl Into<String>, value: impl Into<String>) -> bool {
        let key = key.into();
        if self.is_closed() || key.starts_with(RESERVED_PREFIX) || self.metadata.contains_key(&key)
        {
            return false;
        }
        self.metadata.insert(key, value.into());
        true
    }

    /// Writes the offset table, the metadata map and the trailer, then syncs the file.
    ///
    /// Calling it again is a no-op.
    pub fn close(&mut self) -> Result<()> {
        let Some(mut out) = self.out.take() else {
            return Ok(());
        };

        // Records start at the beginning of the file, so offsets are absolute.
        let offsets_position = out.position();
        self.metadata.insert(KEY_FEATURES.into(), "0".into());
        self.metadata
            .insert(KEY_OFFSETS.into(), offsets_position.to_string());
        format::write_offsets(&mut out, &self.offsets)?;

        let metadata_position = out.position();
        format::write_metadata(&mut out, &self.metadata)?;

        let trailer = Trailer { metadata_position };
        std::io::Write::write_all(&mut out, &trailer.to_bytes())?;
        out.finish()?;

        debug!(
            path = %self.path.display(),
            records = self.offsets.len(),
            bytes = out.position(),
            "container sealed"
        );
        Ok(())
    }
}

impl RecordSink for ContainerWriter {
    fn append(&mut self, value: Value) -> Result<u64> {
        ContainerWriter::append(self, &value)
    }

    fn seal(&mut self) -> Result<()> {
        self.close()
    }

    fn appended(&self) -> usize {
        self.len()
    }
}

impl Drop for ContainerWriter {
    fn drop(&mut self) {
        if self.is_closed() {
            return;
        }
        if let Err(e) = self.close() {
            warn!(path = %self.path.display(), error = %e, "failed to seal container on drop");
        }
    }
}
