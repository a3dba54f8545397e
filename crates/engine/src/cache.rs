//! Bounded offline cache of fully-computed readings awaiting upload.
//!
//! Replay is strictly oldest-first and all-or-nothing: the first transmit
//! failure stops the pass and leaves the cache untouched so the same backlog
//! is retried next cycle.  Every mutation is mirrored to durable storage
//! before returning.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::classifier::HealthClass;
use crate::history::SensorSample;
use crate::ring::Ring;
use crate::store::{self, KvStore};

/// 48 hourly cycles of backlog.
pub const CACHE_CAPACITY: usize = 48;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("failed to persist cache: {0}")]
    Persist(#[from] crate::store::PersistenceError),
}

/// A complete reading plus the analysis summary, ready for upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedReading {
    pub sample: SensorSample,
    pub health: HealthClass,
    pub mismatch_summary: String,
    pub plant_status: String,
    pub valid: bool,
}

/// Outcome of a replay pass.
#[derive(Debug, PartialEq, Eq)]
pub enum ReplayOutcome {
    /// Every entry transmitted; cache cleared and empty state persisted.
    Complete { sent: usize },
    /// Transmission failed partway; cache left exactly as it was.
    Aborted { sent: usize, remaining: usize },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OfflineCache {
    entries: Ring<CachedReading, CACHE_CAPACITY>,
}

impl OfflineCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter_oldest_first(&self) -> impl Iterator<Item = &CachedReading> {
        self.entries.iter_oldest_first()
    }

    /// Load the persisted cache, re-initializing empty on absence or
    /// corruption.  Never fatal.
    pub fn load(store: &mut dyn KvStore, key: &str) -> Self {
        match store::load_snapshot::<Self>(store, key) {
            Some(cache) if cache.entries.is_well_formed() => {
                info!(entries = cache.len(), "offline cache restored");
                cache
            }
            Some(_) => {
                warn!(key, "cache snapshot malformed, starting empty");
                Self::new()
            }
            None => Self::new(),
        }
    }

    /// Append a reading, overwriting the oldest entry when full, and
    /// persist the updated cache before returning.
    pub fn enqueue(
        &mut self,
        reading: CachedReading,
        store: &mut dyn KvStore,
        key: &str,
    ) -> Result<(), CacheError> {
        self.entries.push(reading);
        store::save_snapshot(store, key, self)?;
        debug!(entries = self.len(), "reading cached for later upload");
        Ok(())
    }

    /// Transmit the backlog oldest-first.  Entries marked invalid are
    /// dropped rather than transmitted.  The pass aborts on the first
    /// failure with the cache unchanged; only a fully successful pass
    /// clears it and persists the empty state.
    pub fn replay<E>(
        &mut self,
        store: &mut dyn KvStore,
        key: &str,
        mut transmit: impl FnMut(&CachedReading) -> Result<(), E>,
    ) -> Result<ReplayOutcome, CacheError>
    where
        E: std::fmt::Display,
    {
        let total = self.len();
        if total == 0 {
            return Ok(ReplayOutcome::Complete { sent: 0 });
        }

        let mut sent = 0;
        let mut skipped = 0;
        for reading in self.entries.iter_oldest_first() {
            if !reading.valid {
                skipped += 1;
                continue;
            }
            match transmit(reading) {
                Ok(()) => sent += 1,
                Err(e) => {
                    warn!(
                        sent,
                        remaining = total - sent - skipped,
                        error = %e,
                        "replay aborted, backlog kept for retry"
                    );
                    return Ok(ReplayOutcome::Aborted {
                        sent,
                        remaining: total - sent - skipped,
                    });
                }
            }
        }
        if skipped > 0 {
            debug!(skipped, "invalid cache entries dropped during replay");
        }

        self.entries.clear();
        store::save_snapshot(store, key, self)?;
        info!(sent, "backlog replayed and cache cleared");
        Ok(ReplayOutcome::Complete { sent })
    }
}

// ===========================================================================
// Tests
// ===========================================================================
