//! Low-level sequential file output.
//!
//! [`SeqWriter`] is a buffered, append-only file handle that always knows its
//! current position, so callers can record where each record starts without
//! asking the OS (`tell` would force a buffer flush).

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::constants::DEFAULT_BUFFER_SIZE;
use crate::error::Result;

/// An append-only writer that tracks the current byte offset.
#[derive(Debug)]
pub struct SeqWriter {
    writer: BufWriter<File>,
    current_offset: u64,
}

impl SeqWriter {
    /// Creates the file at `path`, truncating any existing content.
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            writer: BufWriter::with_capacity(DEFAULT_BUFFER_SIZE, file),
            current_offset: 0,
        })
    }

    /// Returns the position the next byte will be written at.
    pub fn position(&self) -> u64 {
        self.current_offset
    }

    /// Flushes buffered data and syncs the file to disk.
    pub fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        Ok(())
    }
}

impl Write for SeqWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.writer.write(buf)?;
        self.current_offset += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}
