//! The pluggable feature-extraction interface.
//!
//! A [`Generator`] turns one [`Record`] into one or more named output values. The
//! coordinator gives every worker thread its own clone (see [`Generator::clone_box`]),
//! so implementations may keep scratch buffers in `&mut self` without any locking.

use std::collections::HashSet;
use std::fmt;

use crate::config::Configuration;
use crate::error::{FeatError, Result};
use crate::record::Record;
use crate::value::ValueKind;

/// One output stream a generator promises to populate.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OutputSpec {
    /// Field name in the record, and suffix of the container file.
    pub name: String,
    /// Kind of every value written to this stream.
    pub kind: ValueKind,
}

impl OutputSpec {
    /// Creates an output declaration.
    pub fn new(name: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// A feature-extraction algorithm.
pub trait Generator: Send + Sync + fmt::Debug {
    /// Name under which the generator is registered.
    fn name(&self) -> &str;

    /// Validates and stores the parameters.
    ///
    /// Called once by the registry, before first use. Implementations read every
    /// parameter through [`Configuration::get_or`] and keep the resulting tree, so
    /// [`Generator::parameters`] reports all defaults that were not overridden.
    fn configure(&mut self, config: Configuration) -> Result<()>;

    /// The normalized parameter tree.
    fn parameters(&self) -> &Configuration;

    /// Output fields this generator guarantees to populate on success.
    fn outputs(&self) -> &[OutputSpec];

    /// Computes the outputs for one record, writing them into it.
    ///
    /// Must depend only on the record and this instance's configuration. Malformed
    /// input fails with [`FeatError::ComputeFailure`] (see [`Record::failure`]).
    fn compute(&mut self, record: &mut Record) -> Result<()>;

    /// Produces an independent instance with identical configuration.
    fn clone_box(&self) -> Box<dyn Generator>;
}

impl Clone for Box<dyn Generator> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Checks that no output name is declared twice.
pub fn check_unique_outputs(outputs: &[OutputSpec]) -> Result<()> {
    let mut seen = HashSet::new();
    for output in outputs {
        if !seen.insert(output.name.as_str()) {
            return Err(FeatError::config(format!(
                "output <{}> is declared more than once",
                output.name
            )));
        }
    }
    Ok(())
}
