//! File-backed key-value store: one file per key under the data directory,
//! written atomically via a temp file and rename so a power cut mid-write
//! leaves the previous blob intact.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use plantmon_engine::{KvStore, PersistenceError};
use tracing::debug;

pub struct FsStore {
    dir: PathBuf,
}

impl FsStore {
    /// Open (creating if needed) the data directory.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .map_err(|e| PersistenceError::Backend(format!("create {}: {e}", dir.display())))?;
        Ok(Self { dir })
    }

    /// Keys may contain '/' separators; flatten them so every blob is a
    /// plain file directly under the data directory.
    fn path_for(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            })
            .collect();
        self.dir.join(name)
    }
}

impl KvStore for FsStore {
    fn save(&mut self, key: &str, bytes: &[u8]) -> Result<(), PersistenceError> {
        let path = self.path_for(key);
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, bytes)
            .map_err(|e| PersistenceError::Backend(format!("write {}: {e}", tmp.display())))?;
        fs::rename(&tmp, &path)
            .map_err(|e| PersistenceError::Backend(format!("rename {}: {e}", path.display())))?;
        debug!(key, len = bytes.len(), "blob written");
        Ok(())
    }

    fn load(&mut self, key: &str, max_len: usize) -> Result<Vec<u8>, PersistenceError> {
        let path = self.path_for(key);
        let bytes = match fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(PersistenceError::NotFound(key.to_string()))
            }
            Err(e) => {
                return Err(PersistenceError::Backend(format!(
                    "read {}: {e}",
                    path.display()
                )))
            }
        };
        if bytes.len() > max_len {
            return Err(PersistenceError::TooLarge {
                key: key.to_string(),
                max: max_len,
            });
        }
        Ok(bytes)
    }

    fn delete(&mut self, key: &str) -> Result<(), PersistenceError> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PersistenceError::Backend(format!(
                "remove {}: {e}",
                path.display()
            ))),
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
