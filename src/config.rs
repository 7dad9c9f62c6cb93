//! Generator configuration trees.
//!
//! A [`Configuration`] is a nested key/value tree (a JSON object). Generators read
//! their parameters through [`Configuration::get_or`], which writes the default back
//! into the tree when a key is absent. After `configure`, the stored tree therefore
//! lists every effective parameter, and saving it reproduces the generator exactly.
//!
//! Paths are dotted: `"params.width"` addresses `{"params": {"width": ...}}`.

use std::fs;
use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value as Json};

use crate::error::{FeatError, Result};

/// Key holding the generator name at the top level of a configuration.
pub const NAME_KEY: &str = "name";

/// A nested key/value parameter tree.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Configuration {
    root: Map<String, Json>,
}

impl Configuration {
    /// An empty tree: every parameter takes its default.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a JSON object.
    pub fn from_json_str(text: &str) -> Result<Self> {
        match serde_json::from_str::<Json>(text)? {
            Json::Object(root) => Ok(Self { root }),
            other => Err(FeatError::config(format!(
                "configuration must be a JSON object, got {other}"
            ))),
        }
    }

    /// Builds a tree from `key=value` assignments (a bare `key` maps to `""`).
    ///
    /// Values are stored as strings; [`Configuration::get_or`] parses them on demand.
    pub fn parse_assignments<I, S>(assignments: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut config = Self::new();
        for assignment in assignments {
            let assignment = assignment.as_ref();
            let mut parts = assignment.splitn(2, '=');
            let key = parts.next().unwrap_or_default().trim();
            if key.is_empty() {
                return Err(FeatError::config(format!(
                    "cannot parse parameter: {assignment:?}"
                )));
            }
            let value = parts.next().unwrap_or_default();
            config.set(key, value)?;
        }
        Ok(config)
    }

    /// Loads a tree saved with [`Configuration::save`].
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Writes the tree as pretty-printed JSON.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, self.to_json_string_pretty()?)?;
        Ok(())
    }

    /// Serializes the tree as pretty-printed JSON.
    pub fn to_json_string_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.root)?)
    }

    /// The generator name stored at the top level, if any.
    pub fn name(&self) -> Option<&str> {
        self.root.get(NAME_KEY).and_then(Json::as_str)
    }

    /// Borrows the raw JSON node at `path`.
    pub fn get(&self, path: &str) -> Option<&Json> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut node = self.root.get(first)?;
        for segment in segments {
            node = node.as_object()?.get(segment)?;
        }
        Some(node)
    }

    /// Borrows the object node at `path` (e.g. the `"params"` subtree).
    pub fn subtree(&self, path: &str) -> Option<&Map<String, Json>> {
        self.get(path).and_then(Json::as_object)
    }

    /// Sets the value at `path`, creating intermediate objects.
    pub fn set<T: Serialize>(&mut self, path: &str, value: T) -> Result<()> {
        let json = serde_json::to_value(value)?;
        let segments: Vec<&str> = path.split('.').collect();
        let (leaf, parents) = segments
            .split_last()
            .ok_or_else(|| FeatError::config("empty parameter path"))?;

        let mut node = &mut self.root;
        for segment in parents {
            let entry = node
                .entry((*segment).to_owned())
                .or_insert_with(|| Json::Object(Map::new()));
            node = match entry {
                Json::Object(map) => map,
                _ => {
                    return Err(FeatError::config(format!(
                        "parameter path {path:?} crosses non-object at {segment:?}"
                    )));
                }
            };
        }
        node.insert((*leaf).to_owned(), json);
        Ok(())
    }

    /// Reads the parameter at `path`, inserting `default` if it is absent.
    ///
    /// A string leaf that does not deserialize as `T` directly is parsed as JSON
    /// (`"32"` becomes `32`) and stored back in normalized form.
    pub fn get_or<T>(&mut self, path: &str, default: T) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
    {
        let Some(node) = self.get(path).cloned() else {
            self.set(path, &default)?;
            return Ok(default);
        };

        if let Ok(value) = serde_json::from_value::<T>(node.clone()) {
            return Ok(value);
        }

        if let Json::String(text) = &node
            && let Ok(value) = serde_json::from_str::<T>(text)
        {
            self.set(path, &value)?;
            return Ok(value);
        }

        Err(FeatError::config(format!(
            "parameter {path} has unexpected value {node}"
        )))
    }

    /// Reads a required parameter.
    pub fn require<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let node = self
            .get(path)
            .ok_or_else(|| FeatError::config(format!("missing required parameter {path}")))?;
        serde_json::from_value(node.clone())
            .map_err(|e| FeatError::config(format!("parameter {path}: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_or_inserts_defaults() {
        let mut config = Configuration::new();
        assert_eq!(config.get_or("params.width", 16usize).unwrap(), 16);
        assert_eq!(config.get("params.width"), Some(&Json::from(16)));
    }

    #[test]
    fn string_assignments_are_parsed_and_normalized() {
        let mut config =
            Configuration::parse_assignments(["params.width=32", "params.colorspace=rgb"])
                .unwrap();
        assert_eq!(config.get_or("params.width", 16usize).unwrap(), 32);
        assert_eq!(config.get("params.width"), Some(&Json::from(32)));
        assert_eq!(
            config.get_or("params.colorspace", String::from("lab")).unwrap(),
            "rgb"
        );
    }

    #[test]
    fn mistyped_parameter_is_rejected() {
        let mut config = Configuration::parse_assignments(["params.width=wide"]).unwrap();
        let err = config.get_or("params.width", 16usize).unwrap_err();
        assert!(matches!(err, FeatError::InvalidConfiguration(_)));
    }

    #[test]
    fn set_refuses_to_descend_into_scalars() {
        let mut config = Configuration::new();
        config.set("params", 3).unwrap();
        assert!(config.set("params.width", 4).is_err());
    }

    #[test]
    fn non_object_json_is_rejected() {
        assert!(Configuration::from_json_str("[1, 2]").is_err());
    }
}
