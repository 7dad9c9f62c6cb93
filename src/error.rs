//! Centralized error handling for featpipe.
//!
//! Every fallible operation in the crate returns [`Result`], and every failure maps
//! onto one variant of [`FeatError`]. The library never panics on bad input; a
//! malformed container, an unknown generator or a failing item all surface as values.
//!
//! ## Error Categories
//!
//! - **Configuration** ([`FeatError::UnknownGenerator`], [`FeatError::InvalidConfiguration`]):
//!   raised synchronously by the registry or a generator's `configure`, before any work starts.
//! - **Computation** ([`FeatError::ComputeFailure`]): one item could not be processed. Inside a
//!   run this sets the shared abort flag; output already flushed stays valid.
//! - **Container** ([`FeatError::CorruptContainer`], [`FeatError::IndexOutOfRange`],
//!   [`FeatError::KindMismatch`]): read-side corruption or misuse of a container.
//! - **Lifecycle** ([`FeatError::AlreadyStarted`]): a coordinator was started twice.
//! - **I/O** ([`FeatError::Io`]) and **Internal** ([`FeatError::Internal`]).
//!
//! ## Cloneability
//!
//! [`FeatError`] is `Clone` so that the first error raised by a worker thread can be
//! captured in shared state and handed back to the caller once the pool has joined.
//! I/O errors are wrapped in an `Arc` for that reason.
//!
//! ```rust
//! use featpipe::{ContainerReader, FeatError};
//!
//! match ContainerReader::open("does-not-exist.fp") {
//!     Err(FeatError::Io(e)) => println!("cannot open: {e}"),
//!     Err(FeatError::CorruptContainer(msg)) => println!("corrupt: {msg}"),
//!     Err(e) => println!("other: {e}"),
//!     Ok(_) => unreachable!(),
//! }
//! ```

use std::fmt;
use std::io;
use std::sync::Arc;

/// A specialized `Result` type for featpipe operations.
pub type Result<T> = std::result::Result<T, FeatError>;

/// The error enum covering every failure domain of the pipeline.
#[derive(Debug, Clone)]
pub enum FeatError {
    /// No generator is registered under the requested name.
    UnknownGenerator(String),

    /// A parameter is missing, has the wrong type or is out of range.
    ///
    /// Also raised when the outputs wired into a run do not match the generator's
    /// declared outputs (missing sink, unknown sink, or a duplicated output name).
    InvalidConfiguration(String),

    /// A single item could not be processed.
    ComputeFailure {
        /// Index of the failing item in the data source.
        index: usize,
        /// Human-readable identity of the item (e.g. its filename), when known.
        item: Option<String>,
        /// What went wrong.
        message: String,
    },

    /// The container file is malformed: bad trailer, missing required keys,
    /// unsupported version, or offsets pointing outside the file.
    CorruptContainer(String),

    /// A reader was asked for an index beyond its record count.
    IndexOutOfRange {
        /// Requested index.
        index: usize,
        /// Number of records available.
        size: usize,
    },

    /// `start` was called on a coordinator that already ran.
    AlreadyStarted,

    /// A value of one kind was written to (or decoded as) a stream of another kind.
    KindMismatch {
        /// Kind declared by the stream.
        expected: String,
        /// Kind actually supplied.
        found: String,
    },

    /// Low-level I/O failure.
    ///
    /// The underlying `io::Error` is wrapped in an `Arc` to make the error `Clone`.
    Io(Arc<io::Error>),

    /// Logic error inside the crate (poisoned lock, broken invariant).
    ///
    /// This should not occur in production.
    Internal(String),
}

impl FeatError {
    /// Shorthand for building a [`FeatError::ComputeFailure`].
    pub fn compute(index: usize, item: Option<&str>, message: impl Into<String>) -> Self {
        Self::ComputeFailure {
            index,
            item: item.map(str::to_owned),
            message: message.into(),
        }
    }

    /// Shorthand for building a [`FeatError::InvalidConfiguration`].
    pub fn config(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration(message.into())
    }

    /// Shorthand for building a [`FeatError::CorruptContainer`].
    pub fn corrupt(message: impl Into<String>) -> Self {
        Self::CorruptContainer(message.into())
    }
}

impl fmt::Display for FeatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownGenerator(name) => write!(f, "Unknown generator: <{name}>"),
            Self::InvalidConfiguration(s) => write!(f, "Invalid configuration: {s}"),
            Self::ComputeFailure {
                index,
                item: Some(item),
                message,
            } => write!(f, "Compute failure at item {index} ({item}): {message}"),
            Self::ComputeFailure { index, message, .. } => {
                write!(f, "Compute failure at item {index}: {message}")
            }
            Self::CorruptContainer(s) => write!(f, "Corrupt container: {s}"),
            Self::IndexOutOfRange { index, size } => {
                write!(f, "Index {index} out of range (size {size})")
            }
            Self::AlreadyStarted => write!(f, "Computation already started"),
            Self::KindMismatch { expected, found } => {
                write!(f, "Kind mismatch: expected {expected}, found {found}")
            }
            Self::Io(e) => write!(f, "I/O Error: {e}"),
            Self::Internal(s) => write!(f, "Internal Logic Error: {s}"),
        }
    }
}

impl std::error::Error for FeatError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for FeatError {
    fn from(err: io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}

impl From<serde_json::Error> for FeatError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidConfiguration(err.to_string())
    }
}
