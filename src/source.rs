//! Input collections addressed by a dense index range `[0, len)`.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::descriptors::IMAGE_FIELD;
use crate::error::{FeatError, Result};
use crate::record::Record;
use crate::value::{Raster, Value};

/// Record field holding the path an image was loaded from.
pub const FILENAME_FIELD: &str = "image_filename";

/// Supplies one [`Record`] per index.
///
/// Called concurrently from every worker thread.
pub trait DataSource: Send + Sync {
    /// Number of items.
    fn len(&self) -> usize;

    /// Returns true if there are no items.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Loads the record for `index`.
    ///
    /// Fails with [`FeatError::ComputeFailure`] if the raw input cannot be loaded.
    fn get(&self, index: usize) -> Result<Record>;
}

/// In-memory records, cloned out on every `get`.
#[derive(Debug, Clone, Default)]
pub struct VecSource {
    records: Vec<Record>,
}

impl VecSource {
    /// Wraps a list of records. Record `i` should have index `i`.
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }
}

impl DataSource for VecSource {
    fn len(&self) -> usize {
        self.records.len()
    }

    fn get(&self, index: usize) -> Result<Record> {
        self.records
            .get(index)
            .cloned()
            .ok_or_else(|| FeatError::compute(index, None, "index beyond data source"))
    }
}

/// Records produced on demand by a closure.
pub struct FnSource<F> {
    len: usize,
    load: F,
}

impl<F> FnSource<F>
where
    F: Fn(usize) -> Result<Record> + Send + Sync,
{
    /// Creates a source of `len` items, each built by `load(index)`.
    pub fn new(len: usize, load: F) -> Self {
        Self { len, load }
    }
}

impl<F> DataSource for FnSource<F>
where
    F: Fn(usize) -> Result<Record> + Send + Sync,
{
    fn len(&self) -> usize {
        self.len
    }

    fn get(&self, index: usize) -> Result<Record> {
        (self.load)(index)
    }
}

impl<F> fmt::Debug for FnSource<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnSource").field("len", &self.len).finish()
    }
}

/// Image files listed in a text file, relative to a root directory.
///
/// Each record carries the decoded RGB raster in `image` and the full path in
/// `image_filename`.
#[derive(Debug, Clone)]
pub struct ImageListSource {
    root: PathBuf,
    files: Vec<String>,
}

impl ImageListSource {
    /// Creates a source over explicit relative paths.
    pub fn new(root: impl Into<PathBuf>, files: Vec<String>) -> Self {
        Self {
            root: root.into(),
            files,
        }
    }

    /// Reads a file list (one relative path per line, blank lines ignored).
    pub fn from_filelist<P: AsRef<Path>>(root: impl Into<PathBuf>, filelist: P) -> Result<Self> {
        let text = fs::read_to_string(filelist)?;
        let files = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_owned)
            .collect();
        Ok(Self::new(root, files))
    }

    /// Absolute path of item `index`.
    pub fn filename(&self, index: usize) -> Option<PathBuf> {
        self.files.get(index).map(|f| self.root.join(f))
    }
}

impl DataSource for ImageListSource {
    fn len(&self) -> usize {
        self.files.len()
    }

    fn get(&self, index: usize) -> Result<Record> {
        let path = self
            .filename(index)
            .ok_or_else(|| FeatError::compute(index, None, "index beyond file list"))?;
        let identity = path.display().to_string();

        let image = image::open(&path)
            .map_err(|e| FeatError::compute(index, Some(&identity), format!("decode failed: {e}")))?
            .to_rgb8();
        let (width, height) = image.dimensions();
        let raster = Raster::new(width as usize, height as usize, 3, image.into_raw())
            .map_err(|e| FeatError::compute(index, Some(&identity), e.to_string()))?;

        Ok(Record::new(index)
            .with_identity(identity.clone())
            .with(IMAGE_FIELD, Value::Raster(raster))
            .with(FILENAME_FIELD, Value::Text(identity)))
    }
}
