//! Persistence contract and snapshot helpers.
//!
//! The engine never touches the filesystem directly; everything durable goes
//! through [`KvStore`] as an opaque blob.  Snapshots are JSON so a torn or
//! foreign blob fails deserialization cleanly instead of being reinterpreted.

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::warn;

/// Upper bound for any single snapshot blob.  The largest entity (the
/// 48-entry cache) stays well under this.
pub const MAX_BLOB_LEN: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("key '{0}' not found")]
    NotFound(String),
    #[error("blob for key '{key}' exceeds {max} bytes")]
    TooLarge { key: String, max: usize },
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Durable key-value collaborator.  Writes are synchronous; a returned `Ok`
/// means the blob survives a power loss.
pub trait KvStore {
    fn save(&mut self, key: &str, bytes: &[u8]) -> Result<(), PersistenceError>;
    fn load(&mut self, key: &str, max_len: usize) -> Result<Vec<u8>, PersistenceError>;
    fn delete(&mut self, key: &str) -> Result<(), PersistenceError>;
}

/// Storage keys used by the analysis core.
pub mod keys {
    pub fn sensor_history(serial: &str) -> String {
        format!("sensor-history/{serial}")
    }

    pub fn water_pattern(serial: &str) -> String {
        format!("water/{serial}")
    }

    pub fn habitat(plant_name: &str, plant_variety: &str) -> String {
        format!("habitat/{plant_name}_{plant_variety}")
    }

    pub fn cache(serial: &str) -> String {
        format!("cache/{serial}")
    }
}

/// Serialize and persist an entity snapshot.
pub fn save_snapshot<T: Serialize>(
    store: &mut dyn KvStore,
    key: &str,
    value: &T,
) -> Result<(), PersistenceError> {
    let bytes = serde_json::to_vec(value)
        .map_err(|e| PersistenceError::Backend(format!("encode '{key}': {e}")))?;
    store.save(key, &bytes)
}

/// Load an entity snapshot.  Absence and corruption both come back as
/// `None`; the caller starts from an empty entity in either case.
pub fn load_snapshot<T: DeserializeOwned>(store: &mut dyn KvStore, key: &str) -> Option<T> {
    let bytes = match store.load(key, MAX_BLOB_LEN) {
        Ok(b) => b,
        Err(PersistenceError::NotFound(_)) => return None,
        Err(e) => {
            warn!(key, error = %e, "snapshot load failed");
            return None;
        }
    };
    match serde_json::from_slice(&bytes) {
        Ok(v) => Some(v),
        Err(e) => {
            warn!(key, error = %e, "snapshot corrupt, starting fresh");
            None
        }
    }
}

/// In-memory store for tests and dry runs.
#[derive(Debug, Default, Clone)]
pub struct MemStore {
    entries: std::collections::HashMap<String, Vec<u8>>,
    /// When set, every save fails.  Lets tests exercise persistence-fault
    /// paths.
    pub fail_saves: bool,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn raw(&self, key: &str) -> Option<&[u8]> {
        self.entries.get(key).map(|v| v.as_slice())
    }

    pub fn insert_raw(&mut self, key: &str, bytes: Vec<u8>) {
        self.entries.insert(key.to_string(), bytes);
    }
}

impl KvStore for MemStore {
    fn save(&mut self, key: &str, bytes: &[u8]) -> Result<(), PersistenceError> {
        if self.fail_saves {
            return Err(PersistenceError::Backend("simulated save failure".into()));
        }
        self.entries.insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn load(&mut self, key: &str, max_len: usize) -> Result<Vec<u8>, PersistenceError> {
        let bytes = self
            .entries
            .get(key)
            .ok_or_else(|| PersistenceError::NotFound(key.to_string()))?;
        if bytes.len() > max_len {
            return Err(PersistenceError::TooLarge {
                key: key.to_string(),
                max: max_len,
            });
        }
        Ok(bytes.clone())
    }

    fn delete(&mut self, key: &str) -> Result<(), PersistenceError> {
        self.entries.remove(key);
        Ok(())
    }
}

// ===========================================================================
// Tests
// ===========================================================================
