//! # featpipe
//!
//! Parallel feature-descriptor computation with ordered, footer-indexed binary
//! persistence.
//!
//! ## Overview
//!
//! A run takes an indexed [`DataSource`] (typically a list of image files), a
//! configured [`Generator`] (a descriptor algorithm such as [`TinyImage`]) and one
//! [`ContainerWriter`] per declared output. Worker threads claim indices from a
//! shared counter and compute records in any order; an [`OrderedAssembler`] per
//! output releases values to the writer strictly in index order. The result is one
//! container file per output whose record *i* belongs to source item *i*.
//!
//! ### Key Features
//!
//! *   **Parallel Compute:** Items are processed by a Rayon pool, one generator clone
//!     per worker, so generators can keep scratch state without locks.
//! *   **Deterministic Output:** Completion order never leaks into the files.
//! *   **Fail-Fast Abort:** The first per-item failure stops further claims; the
//!     containers still hold the complete prefix before the failed index.
//! *   **Random Access:** Readers memory-map a container and decode any record in O(1)
//!     through the offset table in the footer.
//! *   **Reproducible Runs:** Generator parameters are normalized into a JSON
//!     [`Configuration`] and saved next to the outputs.
//!
//! ## File Format
//!
//! ```text
//! [Record 0] [Record 1] ... [Offset Table] [Metadata Map] [Trailer (8b)]
//! ```
//!
//! All integers are little-endian. The trailer holds the position of the metadata
//! map, whose reserved `__offsets` key locates the offset table. See [`format`].
//!
//! ## Usage
//!
//! ```rust,no_run
//! use featpipe::{Configuration, GeneratorRegistry, ImageListSource, Pipeline, RunOptions};
//!
//! # fn main() -> featpipe::Result<()> {
//! let registry = GeneratorRegistry::with_builtin();
//! let config = Configuration::parse_assignments(["params.width=8", "params.height=8"])?;
//! let generator = registry.create("tiny_image", config)?;
//!
//! let source = ImageListSource::from_filelist("images/", "images/list.txt")?;
//! let report = Pipeline::run(generator, Box::new(source), "out/tiny_", &RunOptions::default())?;
//! assert!(report.is_success());
//! # Ok(())
//! # }
//! ```
//!
//! ### Safety and Error Handling
//!
//! * **Encapsulated Unsafe:** the only `unsafe` is the memory map in the [`reader`].
//! * **No Panics:** No `unwrap()` or `panic!()` calls in the library (enforced by clippy lints).
//! * **Comprehensive Errors:** All failures correspond to a [`FeatError`] variant.

#![deny(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]
#![warn(missing_docs)]

// --- PUBLIC API MODULES ---
pub mod api;
pub mod config;
pub mod coordinator;
pub mod descriptors;
pub mod error;
pub mod format;
pub mod generator;
pub mod inspector;
pub mod progress;
pub mod reader;
pub mod record;
pub mod registry;
pub mod source;
pub mod value;
pub mod writer;

// --- INTERNAL IMPLEMENTATION MODULES (Hidden from Docs) ---
#[doc(hidden)]
pub mod assembler;
#[doc(hidden)]
pub mod io;

// --- RE-EXPORTS ---

pub use api::{Pipeline, RunOptions};
pub use assembler::OrderedAssembler;
pub use config::Configuration;
pub use coordinator::{ComputeCoordinator, Progress, RunReport, RunState};
pub use descriptors::{ColorHistogram, TinyImage};
pub use error::{FeatError, Result};
pub use generator::{Generator, OutputSpec};
pub use inspector::ContainerInspector;
pub use progress::ProgressObserver;
pub use reader::ContainerReader;
pub use record::Record;
pub use registry::GeneratorRegistry;
pub use source::{DataSource, FnSource, ImageListSource, VecSource};
pub use value::{Raster, Value, ValueKind};
pub use writer::{ContainerWriter, RecordSink};

/// Constants used throughout the library.
pub mod constants {
    /// The default buffer size for I/O operations.
    pub const DEFAULT_BUFFER_SIZE: usize = 8 * 1024;
}
