//! Keyed Document Store
//!
//! A JSON mapping persisted under one option key. The mapping is fetched
//! lazily on first access, mutated in memory and written back on an explicit
//! [`Document::save`]. Every mutation compares old and new values and only
//! marks the document dirty on a real change, so saving an untouched document
//! is a no-op.
//!
//! Malformed stored values never fail a read: they are replaced by the
//! document's default mapping and reported through `tracing`.

use crate::error::StorageError;
use crate::store::OptionStore;
use crate::value::{deep_merge, Map};
use serde_json::Value;
use std::cell::OnceCell;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// JSON mapping bound to one option key, with dirty tracking.
pub struct Document {
    store: Arc<dyn OptionStore>,
    option_key: String,
    default: Map,
    data: OnceCell<Map>,
    dirty: bool,
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("option_key", &self.option_key)
            .field("loaded", &self.data.get().is_some())
            .field("dirty", &self.dirty)
            .finish()
    }
}

impl Document {
    pub fn new(store: Arc<dyn OptionStore>, option_key: impl Into<String>, default: Map) -> Self {
        Self {
            store,
            option_key: option_key.into(),
            default,
            data: OnceCell::new(),
            dirty: false,
        }
    }

    pub fn option_key(&self) -> &str {
        &self.option_key
    }

    /// The mapping this document falls back to and resets to.
    pub fn default_value(&self) -> &Map {
        &self.default
    }

    pub fn is_modified(&self) -> bool {
        self.dirty
    }

    /// Re-read the stored value, discarding in-memory changes.
    pub fn load(&mut self) -> &mut Self {
        self.data = OnceCell::from(self.fetch());
        self.dirty = false;
        self
    }

    /// Persist the mapping if it changed since the last load or save.
    pub fn save(&mut self) -> Result<(), StorageError> {
        if !self.dirty {
            debug!(option = %self.option_key, "Document unchanged, skipping save");
            return Ok(());
        }
        let value = Value::Object(self.get().clone());
        self.store.set(&self.option_key, &value)?;
        self.dirty = false;
        debug!(option = %self.option_key, "Document saved");
        Ok(())
    }

    /// The whole mapping.
    pub fn get(&self) -> &Map {
        self.data.get_or_init(|| self.fetch())
    }

    /// Replace the whole mapping.
    pub fn replace(&mut self, data: Map) -> &mut Self {
        if *self.get() != data {
            self.update(|current| *current = data);
            self.dirty = true;
        }
        self
    }

    pub fn get_key(&self, key: &str) -> Option<&Value> {
        self.get().get(key)
    }

    pub fn get_key_or(&self, key: &str, default: Value) -> Value {
        self.get_key(key).cloned().unwrap_or(default)
    }

    pub fn has_key(&self, key: &str) -> bool {
        self.get().contains_key(key)
    }

    pub fn set_key(&mut self, key: &str, value: Value) -> &mut Self {
        if self.get_key(key) != Some(&value) {
            self.update(|data| {
                data.insert(key.to_string(), value);
            });
            self.dirty = true;
        }
        self
    }

    pub fn remove_key(&mut self, key: &str) -> &mut Self {
        if self.has_key(key) {
            self.update(|data| {
                data.shift_remove(key);
            });
            self.dirty = true;
        }
        self
    }

    /// Walk `path` through nested mappings. Any missing or non-mapping
    /// segment yields `None`.
    pub fn get_nested(&self, path: &[&str]) -> Option<&Value> {
        let (first, rest) = path.split_first()?;
        let mut current = self.get().get(*first)?;
        for segment in rest {
            current = current.as_object()?.get(*segment)?;
        }
        Some(current)
    }

    pub fn get_nested_or(&self, path: &[&str], default: Value) -> Value {
        self.get_nested(path).cloned().unwrap_or(default)
    }

    /// Set the value at `path`, creating intermediate mappings as needed.
    /// Intermediate values that are not mappings are replaced.
    pub fn set_nested(&mut self, path: &[&str], value: Value) -> &mut Self {
        let Some((last, parents)) = path.split_last() else {
            warn!(option = %self.option_key, "Ignoring set_nested with an empty path");
            return self;
        };
        if self.get_nested(path) == Some(&value) {
            return self;
        }
        self.update(|data| insert_path(data, parents, last, value));
        self.dirty = true;
        self
    }

    pub fn remove_nested(&mut self, path: &[&str]) -> &mut Self {
        if self.get_nested(path).is_none() {
            return self;
        }
        if self.update(|data| remove_path(data, path)) {
            self.dirty = true;
        }
        self
    }

    /// Merge `other` into the mapping.
    ///
    /// Recursive merges deep-merge mappings and concatenate arrays found
    /// under the same key; a shallow merge overwrites top-level keys.
    /// Always marks the document dirty.
    pub fn merge(&mut self, other: &Map, recursive: bool) -> &mut Self {
        self.update(|data| {
            if recursive {
                deep_merge(data, other, true);
            } else {
                for (key, value) in other {
                    data.insert(key.clone(), value.clone());
                }
            }
        });
        self.dirty = true;
        self
    }

    /// Restore the default mapping.
    pub fn reset(&mut self) -> &mut Self {
        let default = self.default.clone();
        self.update(|data| *data = default);
        self.dirty = true;
        self
    }

    /// Run `f` on the loaded mapping, fetching it first if needed.
    fn update<R>(&mut self, f: impl FnOnce(&mut Map) -> R) -> R {
        let mut data = match self.data.take() {
            Some(data) => data,
            None => self.fetch(),
        };
        let out = f(&mut data);
        self.data = OnceCell::from(data);
        out
    }

    fn fetch(&self) -> Map {
        let raw = match self.store.get(&self.option_key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return self.default.clone(),
            Err(err) => {
                warn!(
                    option = %self.option_key,
                    error = %err,
                    "Failed to read option, using default"
                );
                return self.default.clone();
            }
        };

        match raw {
            Value::Object(map) => map,
            Value::String(encoded) if encoded.trim().is_empty() => self.default.clone(),
            Value::String(encoded) => match serde_json::from_str::<Value>(&encoded) {
                Ok(Value::Object(map)) => map,
                Ok(_) => {
                    warn!(
                        option = %self.option_key,
                        "Stored option decodes to a non-mapping value, using default"
                    );
                    self.default.clone()
                }
                Err(err) => {
                    warn!(
                        option = %self.option_key,
                        error = %err,
                        "Stored option is not valid JSON, using default"
                    );
                    self.default.clone()
                }
            },
            other => {
                warn!(
                    option = %self.option_key,
                    kind = value_kind(&other),
                    "Stored option is not a mapping, using default"
                );
                self.default.clone()
            }
        }
    }
}

fn insert_path(root: &mut Map, parents: &[&str], last: &str, value: Value) {
    let mut node = root;
    for segment in parents {
        let entry = node
            .entry(*segment)
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        node = match entry {
            Value::Object(next) => next,
            _ => return,
        };
    }
    node.insert(last.to_string(), value);
}

fn remove_path(root: &mut Map, path: &[&str]) -> bool {
    let Some((last, parents)) = path.split_last() else {
        return false;
    };
    let mut node = root;
    for segment in parents {
        match node.get_mut(*segment) {
            Some(Value::Object(next)) => node = next,
            _ => return false,
        }
    }
    node.shift_remove(*last).is_some()
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
