//! The transient per-item bag of named fields.
//!
//! A [`Record`] is created by a [`DataSource`](crate::source::DataSource) for one index,
//! enriched by a generator's `compute`, drained into the output assemblers, and dropped.
//! It is owned by a single worker for its whole life and never crosses threads.

use std::collections::HashMap;

use crate::error::{FeatError, Result};
use crate::value::{Raster, Value};

/// Named fields for one input item.
#[derive(Debug, Clone, Default)]
pub struct Record {
    index: usize,
    identity: Option<String>,
    fields: HashMap<String, Value>,
}

impl Record {
    /// Creates an empty record for the item at `index`.
    pub fn new(index: usize) -> Self {
        Self {
            index,
            identity: None,
            fields: HashMap::new(),
        }
    }

    /// Attaches a human-readable identity (filename, key) used in error reports.
    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = Some(identity.into());
        self
    }

    /// Builder-style [`Record::insert`].
    pub fn with(mut self, name: impl Into<String>, value: Value) -> Self {
        self.insert(name, value);
        self
    }

    /// Index of the item in its data source.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Identity of the item, if the source provided one.
    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    /// Sets a field, replacing any previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.fields.insert(name.into(), value);
    }

    /// Borrows a field.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Moves a field out of the record.
    pub fn take(&mut self, name: &str) -> Option<Value> {
        self.fields.remove(name)
    }

    /// Returns true if the field is present.
    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if the record has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Builds a [`FeatError::ComputeFailure`] tagged with this record's index and identity.
    pub fn failure(&self, message: impl Into<String>) -> FeatError {
        FeatError::compute(self.index, self.identity(), message)
    }

    /// Borrows a required raster field, failing the item if absent or mistyped.
    pub fn require_raster(&self, name: &str) -> Result<&Raster> {
        match self.fields.get(name) {
            Some(Value::Raster(r)) => Ok(r),
            Some(other) => Err(self.failure(format!(
                "field <{name}> holds {}, expected raster",
                other.kind()
            ))),
            None => Err(self.failure(format!("missing input field <{name}>"))),
        }
    }
}
