//! Option Store
//!
//! Generic persistent key/value store backing every settings document.
//! Values are JSON; the store owns their encoding.

pub mod persistence;

pub use persistence::SledOptionStore;

use crate::error::StorageError;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;

/// Option store interface
///
/// Writes are atomic per key. No multi-key transactions are assumed.
pub trait OptionStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Value>, StorageError>;
    fn set(&self, key: &str, value: &Value) -> Result<(), StorageError>;
    fn delete(&self, key: &str) -> Result<(), StorageError>;
}

/// In-memory option store
#[derive(Debug, Default)]
pub struct MemoryOptionStore {
    options: RwLock<HashMap<String, Value>>,
}

impl MemoryOptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with raw values, bypassing any document logic.
    pub fn with_options<I, K>(options: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let store = Self::new();
        {
            let mut guard = store.options.write();
            for (key, value) in options {
                guard.insert(key.into(), value);
            }
        }
        store
    }

    pub fn len(&self) -> usize {
        self.options.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.read().is_empty()
    }
}

impl OptionStore for MemoryOptionStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        Ok(self.options.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &Value) -> Result<(), StorageError> {
        self.options.write().insert(key.to_string(), value.clone());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.options.write().remove(key);
        Ok(())
    }
}
