//! Environment-mismatch detection: pure comparisons of readings against a
//! habitat profile's ideal ranges.  Air movement has no ideal range and is
//! never flagged.

use serde::{Deserialize, Serialize};

use crate::habitat::{HabitatProfile, IdealRange};
use crate::history::SensorSample;

/// Per-dimension out-of-range flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MismatchSet {
    pub temperature: bool,
    pub humidity: bool,
    pub soil_moisture: bool,
    pub light_level: bool,
}

impl MismatchSet {
    pub fn any(&self) -> bool {
        self.temperature || self.humidity || self.soil_moisture || self.light_level
    }

    /// Short comma-joined summary used in upload records and cache entries,
    /// e.g. `"temp,moist"`, or `"none"` when everything is in range.
    pub fn summary(&self) -> String {
        let mut parts: Vec<&str> = Vec::new();
        if self.temperature {
            parts.push("temp");
        }
        if self.humidity {
            parts.push("humid");
        }
        if self.soil_moisture {
            parts.push("moist");
        }
        if self.light_level {
            parts.push("light");
        }
        if parts.is_empty() {
            "none".to_string()
        } else {
            parts.join(",")
        }
    }
}

/// Signed deviations from each range midpoint, used as classifier features.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DeviationSet {
    pub temperature: f32,
    pub humidity: f32,
    pub soil_moisture: f32,
    pub light_level: f32,
}

fn out_of_range(value: f32, range: &IdealRange) -> bool {
    value < range.min || value > range.max
}

/// Evaluate a sample against a profile.  Deterministic, no side effects.
pub fn detect(sample: &SensorSample, profile: &HabitatProfile) -> MismatchSet {
    MismatchSet {
        temperature: out_of_range(sample.temperature, &profile.temperature),
        humidity: out_of_range(sample.humidity, &profile.humidity),
        soil_moisture: out_of_range(sample.soil_moisture, &profile.soil_moisture),
        light_level: out_of_range(sample.light_level, &profile.light_level),
    }
}

/// Signed distance of each reading from its ideal-range midpoint.
pub fn deviations(sample: &SensorSample, profile: &HabitatProfile) -> DeviationSet {
    DeviationSet {
        temperature: sample.temperature - profile.temperature.midpoint(),
        humidity: sample.humidity - profile.humidity.midpoint(),
        soil_moisture: sample.soil_moisture - profile.soil_moisture.midpoint(),
        light_level: sample.light_level - profile.light_level.midpoint(),
    }
}

// ===========================================================================
// Tests
// ===========================================================================
