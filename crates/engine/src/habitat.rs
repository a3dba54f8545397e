//! Habitat profiles: the ideal environmental ranges used as the mismatch
//! baseline, with a 24-hour staleness rule and built-in fallback ranges.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Cached habitat data older than this is considered stale.
pub const STALE_AFTER_SEC: i64 = 86_400;

#[derive(Debug, Error)]
pub enum HabitatError {
    #[error("no habitat data for plant '{0}'")]
    NotFound(String),
    #[error("habitat source unavailable: {0}")]
    Unavailable(String),
}

/// An inclusive ideal range for one environmental dimension.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IdealRange {
    pub min: f32,
    pub max: f32,
}

impl IdealRange {
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    pub fn midpoint(&self) -> f32 {
        (self.min + self.max) / 2.0
    }

    pub fn contains(&self, value: f32) -> bool {
        value >= self.min && value <= self.max
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HabitatProfile {
    pub plant_id: String,
    pub temperature: IdealRange,
    pub humidity: IdealRange,
    pub soil_moisture: IdealRange,
    pub light_level: IdealRange,
    pub native_region: String,
    pub growing_season: String,
    pub valid: bool,
    /// When this profile was fetched, seconds since the node epoch.
    pub fetched_at: i64,
}

impl HabitatProfile {
    /// Built-in fallback ranges used when no fresh or cached profile is
    /// available.  Deliberately broad houseplant defaults.
    pub fn default_ranges(now: i64) -> Self {
        Self {
            plant_id: String::from("default"),
            temperature: IdealRange::new(18.0, 26.0),
            humidity: IdealRange::new(40.0, 70.0),
            soil_moisture: IdealRange::new(30.0, 70.0),
            light_level: IdealRange::new(30.0, 80.0),
            native_region: String::new(),
            growing_season: String::new(),
            valid: true,
            fetched_at: now,
        }
    }

    /// Staleness is evaluated lazily on use, never stored.
    pub fn is_stale(&self, now: i64) -> bool {
        now - self.fetched_at > STALE_AFTER_SEC
    }
}

/// Collaborator contract for the remote habitat data source.
pub trait HabitatSource {
    fn fetch(&mut self, plant_name: &str, plant_variety: &str)
        -> Result<HabitatProfile, HabitatError>;
}

// ===========================================================================
// Tests
// ===========================================================================
