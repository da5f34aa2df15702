//! Hierarchical configuration store.
//!
//! A `Config` is a JSON sub-tree plus the `/`-separated path it was
//! taken from, so every error names the exact key that was missing or
//! mistyped. Components read only their own sub-tree.

use crate::error::{GenError, GenResult};
use anyhow::Context;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::Path;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    path:  String,
    value: Value,
}

impl Config {
    pub fn new(value: Value) -> Self {
        Self { path: String::new(), value }
    }

    /// Read a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> GenResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let value: Value = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        log::info!("Loaded configuration from {}", path.display());
        Ok(Self::new(value))
    }

    pub fn from_json_str(json: &str) -> GenResult<Self> {
        Ok(Self::new(serde_json::from_str(json)?))
    }

    /// Path of this sub-tree from the root ("" for the root itself).
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    fn full_path(&self, key: &str) -> String {
        if self.path.is_empty() {
            key.to_string()
        } else {
            format!("{}/{key}", self.path)
        }
    }

    fn lookup(&self, key: &str) -> Option<&Value> {
        key.split('/')
            .filter(|k| !k.is_empty())
            .try_fold(&self.value, |node, k| match node {
                Value::Object(map) => map.get(k),
                Value::Array(items) => k.parse::<usize>().ok().and_then(|i| items.get(i)),
                _ => None,
            })
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lookup(key).is_some_and(|v| !v.is_null())
    }

    /// Typed read of a required key.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> GenResult<T> {
        let node = self
            .lookup(key)
            .ok_or_else(|| GenError::config(self.full_path(key), "missing key"))?;
        serde_json::from_value(node.clone())
            .map_err(|e| GenError::config(self.full_path(key), e.to_string()))
    }

    /// Typed read of an optional key. A present but mistyped key is
    /// still an error.
    pub fn get_optional<T: DeserializeOwned>(&self, key: &str) -> GenResult<Option<T>> {
        if !self.contains(key) {
            return Ok(None);
        }
        self.get(key).map(Some)
    }

    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> GenResult<T> {
        Ok(self.get_optional(key)?.unwrap_or(default))
    }

    /// The sub-tree under `key`.
    pub fn section(&self, key: &str) -> GenResult<Config> {
        let node = self
            .lookup(key)
            .ok_or_else(|| GenError::config(self.full_path(key), "missing section"))?;
        Ok(Config { path: self.full_path(key), value: node.clone() })
    }

    /// The elements of the array under `key` (empty if absent).
    pub fn sections(&self, key: &str) -> GenResult<Vec<Config>> {
        match self.lookup(key) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Array(items)) => Ok(items
                .iter()
                .enumerate()
                .map(|(i, v)| Config { path: self.full_path(&format!("{key}/{i}")), value: v.clone() })
                .collect()),
            Some(_) => Err(GenError::config(self.full_path(key), "expected a list")),
        }
    }

    /// The `"type"` key that selects a constructor in a registry.
    pub fn type_name(&self) -> GenResult<String> {
        self.get("type")
    }

    /// Replace (or insert) a value at `key`, creating objects on the way.
    pub fn set(&mut self, key: &str, new_value: Value) -> GenResult<()> {
        let mut node = &mut self.value;
        let parts: Vec<&str> = key.split('/').filter(|k| !k.is_empty()).collect();
        for (i, part) in parts.iter().enumerate() {
            if node.is_null() {
                *node = Value::Object(Default::default());
            }
            let Value::Object(map) = node else {
                return Err(GenError::config(self.path.clone() + "/" + key, "not an object"));
            };
            if i + 1 == parts.len() {
                map.insert((*part).to_string(), new_value);
                return Ok(());
            }
            node = map.entry((*part).to_string()).or_insert(Value::Null);
        }
        self.value = new_value;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Config {
        Config::new(json!({
            "seed": 42,
            "generator": {
                "beam": { "type": "constant", "energy": 10.6, "dir": [0.0, 0.0, 1.0] },
                "decay": [ { "type": "vm_leptonic" }, { "type": "two_body" } ]
            }
        }))
    }

    #[test]
    fn nested_paths_resolve() {
        let cfg = sample();
        assert_eq!(cfg.get::<u64>("seed").unwrap(), 42);
        assert_eq!(cfg.get::<f64>("generator/beam/energy").unwrap(), 10.6);
        assert_eq!(cfg.get::<f64>("generator/beam/dir/2").unwrap(), 1.0);
        let beam = cfg.section("generator/beam").unwrap();
        assert_eq!(beam.path(), "generator/beam");
        assert_eq!(beam.type_name().unwrap(), "constant");
    }

    #[test]
    fn missing_key_names_the_full_path() {
        let beam = sample().section("generator/beam").unwrap();
        let err = beam.get::<f64>("mass").unwrap_err();
        match err {
            GenError::Config { path, .. } => assert_eq!(path, "generator/beam/mass"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn mistyped_key_is_an_error_even_when_optional() {
        let cfg = sample();
        assert!(cfg.get_optional::<f64>("generator/beam/type").is_err());
        assert_eq!(cfg.get_optional::<f64>("generator/beam/width").unwrap(), None);
        assert_eq!(cfg.get_or("generator/beam/width", 0.5).unwrap(), 0.5);
    }

    #[test]
    fn list_sections_carry_indices() {
        let decays = sample().sections("generator/decay").unwrap();
        assert_eq!(decays.len(), 2);
        assert_eq!(decays[1].path(), "generator/decay/1");
        assert_eq!(decays[1].type_name().unwrap(), "two_body");
        assert!(sample().sections("generator/detector").unwrap().is_empty());
    }

    #[test]
    fn set_overrides_and_creates() {
        let mut cfg = sample();
        cfg.set("seed", json!(7)).unwrap();
        cfg.set("generator/mode", json!("weighted")).unwrap();
        assert_eq!(cfg.get::<u64>("seed").unwrap(), 7);
        assert_eq!(cfg.get::<String>("generator/mode").unwrap(), "weighted");
    }
}
