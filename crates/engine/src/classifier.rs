//! Classifier adapter: builds the 15-element feature vector, invokes the
//! external classification engine through the [`Classifier`] trait, and
//! interprets the probability output.
//!
//! Feature layout (fixed, the engine is trained against this order):
//! `[moisture, light, temp, humidity, air]` raw current values, then
//! `[temp, humidity, moisture, light]` midpoint deviations with a `0.0`
//! air-movement placeholder, then the five rolling averages in raw order.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::habitat::HabitatProfile;
use crate::history::{Metric, SensorHistory};
use crate::mismatch::{self, MismatchSet};

pub const FEATURE_LEN: usize = 15;
pub const CLASS_COUNT: usize = 3;

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("classifier reported shape mismatch: {0}")]
    ShapeMismatch(String),
    #[error("classification engine fault: {0}")]
    EngineFault(String),
}

/// Contract boundary to the external health-classification engine.
/// Synchronous and deterministic for identical input.
pub trait Classifier {
    fn infer(&mut self, features: &[f32; FEATURE_LEN])
        -> Result<[f32; CLASS_COUNT], InferenceError>;
}

/// Health classes in engine output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthClass {
    Healthy,
    Stressed,
    Critical,
}

impl HealthClass {
    fn from_index(i: usize) -> Self {
        match i {
            0 => HealthClass::Healthy,
            1 => HealthClass::Stressed,
            _ => HealthClass::Critical,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HealthClass::Healthy => "Healthy",
            HealthClass::Stressed => "Stressed",
            HealthClass::Critical => "Critical",
        }
    }
}

/// Combined classification output for one cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub health: HealthClass,
    /// Winning class probability, 0..=1.
    pub confidence: f32,
    pub mismatch: MismatchSet,
    pub recommendation: String,
}

impl ClassificationResult {
    /// Short status label for upload records and the offline cache.
    pub fn status_label(&self) -> &'static str {
        match self.health {
            HealthClass::Critical => "Critical",
            HealthClass::Stressed => "Stressed",
            HealthClass::Healthy if self.mismatch.any() => "Adjustment Needed",
            HealthClass::Healthy => "Healthy",
        }
    }
}

/// Deterministic recommendation text derived from the class and mismatch set.
pub fn recommendation(health: HealthClass, mismatch: &MismatchSet) -> String {
    if health == HealthClass::Healthy && !mismatch.any() {
        return "Plant is healthy.".to_string();
    }
    let mut parts: Vec<&str> = Vec::new();
    if mismatch.temperature {
        parts.push("Adjust temperature.");
    }
    if mismatch.humidity {
        parts.push("Adjust humidity level.");
    }
    if mismatch.soil_moisture {
        parts.push("Adjust watering schedule.");
    }
    if mismatch.light_level {
        parts.push("Adjust light exposure.");
    }
    if parts.is_empty() {
        // Stressed/critical with every reading in range: nothing actionable
        // from the environment, flag for observation instead.
        parts.push("Monitor plant closely.");
    }
    parts.join(" ")
}

/// Assemble the fixed 15-element feature vector from the current history
/// state and the resolved habitat profile.
pub fn build_features(history: &SensorHistory, profile: &HabitatProfile) -> [f32; FEATURE_LEN] {
    let mut features = [0.0f32; FEATURE_LEN];

    if let Some(sample) = history.current() {
        features[0] = sample.soil_moisture;
        features[1] = sample.light_level;
        features[2] = sample.temperature;
        features[3] = sample.humidity;
        features[4] = sample.air_movement;

        let dev = mismatch::deviations(sample, profile);
        features[5] = dev.temperature;
        features[6] = dev.humidity;
        features[7] = dev.soil_moisture;
        features[8] = dev.light_level;
        features[9] = 0.0; // no ideal range for air movement
    }

    for (i, metric) in Metric::ALL.iter().enumerate() {
        features[10 + i] = history.rolling_average(*metric);
    }

    features
}

/// Run inference and pick the winning class.  Ties resolve to the lowest
/// class index (strict `>` while scanning from index 0).
pub fn classify<C: Classifier + ?Sized>(
    classifier: &mut C,
    features: &[f32; FEATURE_LEN],
) -> Result<(HealthClass, f32), InferenceError> {
    let probs = classifier.infer(features)?;

    let mut best = 0;
    for i in 1..CLASS_COUNT {
        if probs[i] > probs[best] {
            best = i;
        }
    }
    Ok((HealthClass::from_index(best), probs[best]))
}

/// Classifier that always returns the same probabilities.  Deterministic
/// stand-in for tests and dry runs.
#[derive(Debug, Clone)]
pub struct ConstantClassifier {
    pub probs: [f32; CLASS_COUNT],
}

impl Classifier for ConstantClassifier {
    fn infer(&mut self, _: &[f32; FEATURE_LEN]) -> Result<[f32; CLASS_COUNT], InferenceError> {
        Ok(self.probs)
    }
}

// ===========================================================================
// Tests
// ===========================================================================
