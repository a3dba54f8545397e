//! Deterministic health classifier: scores the midpoint deviations in the
//! feature vector against fixed tolerances and turns the overall stress
//! level into class probabilities.  Stands behind the same trait a trained
//! model adapter would, so swapping one in touches nothing else.

use plantmon_engine::classifier::{Classifier, InferenceError, CLASS_COUNT, FEATURE_LEN};

/// Deviation magnitudes at which a dimension counts as fully stressed.
/// Roughly the half-widths of the default ideal ranges.
const TEMP_TOLERANCE: f32 = 4.0;
const HUMIDITY_TOLERANCE: f32 = 15.0;
const MOISTURE_TOLERANCE: f32 = 20.0;
const LIGHT_TOLERANCE: f32 = 25.0;

pub struct HeuristicClassifier;

impl HeuristicClassifier {
    pub fn new() -> Self {
        Self
    }
}

impl Default for HeuristicClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Classifier for HeuristicClassifier {
    fn infer(
        &mut self,
        features: &[f32; FEATURE_LEN],
    ) -> Result<[f32; CLASS_COUNT], InferenceError> {
        // Deviation features sit at indices 5..9: temp, humidity, moisture,
        // light (index 9 is the air placeholder).
        let stresses = [
            (features[5].abs() / TEMP_TOLERANCE).min(2.0) / 2.0,
            (features[6].abs() / HUMIDITY_TOLERANCE).min(2.0) / 2.0,
            (features[7].abs() / MOISTURE_TOLERANCE).min(2.0) / 2.0,
            (features[8].abs() / LIGHT_TOLERANCE).min(2.0) / 2.0,
        ];
        let overall = stresses.iter().sum::<f32>() / stresses.len() as f32;
        let worst = stresses.iter().cloned().fold(0.0f32, f32::max);

        // Blend mean and worst-case so one badly off dimension can push a
        // plant to critical even when the others look fine.
        let stress = 0.5 * overall + 0.5 * worst;

        let healthy = (1.0 - stress).max(0.0);
        let critical = stress * stress;
        let stressed = (1.0 - (stress - 0.5).abs() * 2.0).max(0.0);

        let sum = healthy + stressed + critical;
        Ok([healthy / sum, stressed / sum, critical / sum])
    }
}

// ===========================================================================
// Tests
// ===========================================================================
