//! Name-based generator lookup.
//!
//! The registry maps a generator name to a factory producing an unconfigured
//! instance. It is an ordinary value built by the application at startup and
//! passed to whoever needs it; there is no process-wide table.

use std::collections::BTreeMap;
use std::fmt;

use crate::config::{Configuration, NAME_KEY};
use crate::descriptors::{ColorHistogram, TinyImage};
use crate::error::{FeatError, Result};
use crate::generator::{Generator, check_unique_outputs};

/// Factory producing an unconfigured generator.
pub type GeneratorFactory = Box<dyn Fn() -> Box<dyn Generator> + Send + Sync>;

/// Table of available generators.
#[derive(Default)]
pub struct GeneratorRegistry {
    factories: BTreeMap<String, GeneratorFactory>,
}

impl GeneratorRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the built-in generators.
    ///
    /// *   `tiny_image`
    /// *   `color_histogram`
    pub fn with_builtin() -> Self {
        let mut reg = Self::new();
        reg.register(TinyImage::NAME, || Box::new(TinyImage::default()));
        reg.register(ColorHistogram::NAME, || Box::new(ColorHistogram::default()));
        reg
    }

    /// Binds `name` to `factory`.
    ///
    /// If a factory is already registered under that name, it is overwritten.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn Generator> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Box::new(factory));
    }

    /// Returns true if `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn list(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    /// Creates and configures the generator registered as `name`.
    ///
    /// The name is stamped into the configuration before `configure`, so the
    /// resulting [`Generator::parameters`] tree identifies the generator on its own.
    ///
    /// # Errors
    /// [`FeatError::UnknownGenerator`] if `name` is absent;
    /// [`FeatError::InvalidConfiguration`] if the generator rejects the parameters.
    pub fn create(&self, name: &str, mut config: Configuration) -> Result<Box<dyn Generator>> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| FeatError::UnknownGenerator(name.to_owned()))?;

        config.set(NAME_KEY, name)?;
        let mut generator = factory();
        generator.configure(config)?;
        check_unique_outputs(generator.outputs())?;
        Ok(generator)
    }

    /// Creates the generator named inside the configuration itself.
    ///
    /// This is the inverse of persisting [`Generator::parameters`].
    pub fn create_from_configuration(&self, config: Configuration) -> Result<Box<dyn Generator>> {
        let name = config
            .name()
            .ok_or_else(|| FeatError::config(format!("configuration lacks a {NAME_KEY:?} key")))?
            .to_owned();
        self.create(&name, config)
    }

    /// Creates the generator registered as `name` with all-default parameters.
    pub fn create_default(&self, name: &str) -> Result<Box<dyn Generator>> {
        self.create(name, Configuration::new())
    }
}

impl fmt::Debug for GeneratorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratorRegistry")
            .field("generators", &self.list())
            .finish()
    }
}
