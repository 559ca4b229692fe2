//! Durable keyed record store — one JSON object, string-encoded integer ids
//! as keys.
//!
//! Writes are read-merge-replace: load the full store, insert the one new
//! entry, atomically swap the file. Fine for the store sizes a harvesting
//! session produces, and the atomic swap means a crash mid-put leaves every
//! previously written record untouched.

use std::path::{Path, PathBuf};
use tracing::debug;

use super::{write_atomic, StoreError};
use crate::core::ProfileRecord;

pub struct RecordStore {
    path: PathBuf,
}

impl RecordStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<serde_json::Map<String, serde_json::Value>, StoreError> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(serde_json::Map::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Persist one record under its id. Existing keys for other ids are
    /// carried over byte-for-byte in value terms; only this key changes.
    pub fn put(&self, record: &ProfileRecord) -> Result<(), StoreError> {
        let mut all = self.load()?;
        all.insert(record.id.to_string(), serde_json::to_value(record)?);
        let body = serde_json::to_vec_pretty(&serde_json::Value::Object(all))?;
        write_atomic(&self.path, &body)?;
        debug!("stored profile {} ({})", record.id, self.path.display());
        Ok(())
    }

    pub fn get(&self, id: u64) -> Result<Option<ProfileRecord>, StoreError> {
        let all = self.load()?;
        match all.get(&id.to_string()) {
            Some(v) => Ok(Some(serde_json::from_value(v.clone())?)),
            None => Ok(None),
        }
    }

    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self.load()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.load()?.is_empty())
    }
}
