//! Tools for inspecting the physical structure of container files.
//! Useful for checking partial runs and debugging corrupt outputs.

use std::fmt;
use std::path::Path;

use serde::Serialize;

use crate::error::Result;
use crate::format::{MetadataMap, RESERVED_PREFIX};
use crate::reader::ContainerReader;

/// A structural report of a container file.
#[derive(Debug, Serialize)]
pub struct ContainerReport {
    /// Total size of the file on disk.
    pub file_size: u64,
    /// Format version.
    pub version: u32,
    /// Value kind of the stream.
    pub kind: String,
    /// Number of records.
    pub records: usize,
    /// Bytes occupied by records.
    pub payload_bytes: u64,
    /// Bytes occupied by the offset table, metadata map and trailer.
    pub footer_bytes: u64,
    /// Size statistics over all records.
    pub record_sizes: Option<SizeStats>,
    /// Non-reserved metadata entries.
    pub metadata: MetadataMap,
}

/// Min / max / mean record size in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SizeStats {
    /// Smallest record.
    pub min: u64,
    /// Largest record.
    pub max: u64,
    /// Mean record size.
    pub mean: f64,
}

/// The container inspector tool.
#[derive(Debug)]
pub struct ContainerInspector;

impl ContainerInspector {
    /// Analyzes a file and returns a structural report.
    pub fn inspect<P: AsRef<Path>>(path: P) -> Result<ContainerReport> {
        let reader = ContainerReader::open(path)?;

        let mut stats: Option<SizeStats> = None;
        let mut total = 0u64;
        for i in 0..reader.size() {
            let len = reader.raw(i)?.len() as u64;
            total += len;
            stats = Some(match stats {
                None => SizeStats {
                    min: len,
                    max: len,
                    mean: 0.0,
                },
                Some(s) => SizeStats {
                    min: s.min.min(len),
                    max: s.max.max(len),
                    mean: 0.0,
                },
            });
        }
        let record_sizes = stats.map(|s| SizeStats {
            mean: total as f64 / reader.size() as f64,
            ..s
        });

        let metadata = reader
            .metadata()
            .iter()
            .filter(|(k, _)| !k.starts_with(RESERVED_PREFIX))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        Ok(ContainerReport {
            file_size: reader.file_size(),
            version: reader.version(),
            kind: reader.kind().to_string(),
            records: reader.size(),
            payload_bytes: reader.payload_len(),
            footer_bytes: reader.footer_len(),
            record_sizes,
            metadata,
        })
    }
}

impl fmt::Display for ContainerReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== CONTAINER REPORT ===")?;
        writeln!(f, "File Size:      {}b", self.file_size)?;
        writeln!(f, "Version:        {}", self.version)?;
        writeln!(f, "Kind:           {}", self.kind)?;
        writeln!(f, "Records:        {}", self.records)?;
        writeln!(f, "Payload:        {}b", self.payload_bytes)?;
        writeln!(f, "Footer:         {}b", self.footer_bytes)?;
        if let Some(s) = &self.record_sizes {
            writeln!(
                f,
                "Record Size:    min {}b | max {}b | mean {:.1}b",
                s.min, s.max, s.mean
            )?;
        }
        if !self.metadata.is_empty() {
            writeln!(f, "\n[METADATA]")?;
            for (key, value) in &self.metadata {
                writeln!(f, "{key:<16}{value}")?;
            }
        }
        Ok(())
    }
}
