//! Persistence layer for the option store

use crate::error::StorageError;
use crate::store::OptionStore;
use serde_json::Value;
use sled;
use std::path::Path;

/// Sled-based implementation of OptionStore
///
/// Each option is one sled key holding the JSON encoding of its value.
pub struct SledOptionStore {
    db: sled::Db,
}

impl SledOptionStore {
    /// Create a new SledOptionStore at the given path
    ///
    /// The path can be a directory (sled will create a database there) or
    /// a file path (sled will use it as the database file).
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let db = sled::open(path)
            .map_err(|e| StorageError::Backend(format!("Failed to open sled database: {}", e)))?;
        Ok(Self { db })
    }

    /// Wrap an already opened database (e.g. a temporary one)
    pub fn from_db(db: sled::Db) -> Self {
        Self { db }
    }

    /// Get the underlying sled database (for advanced operations)
    pub fn db(&self) -> &sled::Db {
        &self.db
    }

    /// List all stored option keys
    pub fn keys(&self) -> Result<Vec<String>, StorageError> {
        let mut keys = Vec::new();
        for item in self.db.iter() {
            let (key, _) = item?;
            keys.push(String::from_utf8_lossy(&key).into_owned());
        }
        Ok(keys)
    }

    /// Flush all pending writes to disk
    pub fn flush(&self) -> Result<(), StorageError> {
        self.db
            .flush()
            .map_err(|e| StorageError::Backend(format!("Failed to flush database: {}", e)))?;
        Ok(())
    }
}

impl OptionStore for SledOptionStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        let Some(raw) = self.db.get(key.as_bytes())? else {
            return Ok(None);
        };
        let value = serde_json::from_slice(&raw).map_err(|source| StorageError::Decode {
            key: key.to_string(),
            source,
        })?;
        Ok(Some(value))
    }

    fn set(&self, key: &str, value: &Value) -> Result<(), StorageError> {
        let encoded = serde_json::to_vec(value).map_err(|source| StorageError::Encode {
            key: key.to_string(),
            source,
        })?;
        self.db.insert(key.as_bytes(), encoded)?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.db.remove(key.as_bytes())?;
        Ok(())
    }
}
