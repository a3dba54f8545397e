//! Water-consumption trend prediction from the 7-day moisture history.
//!
//! The predictor walks the history backward from the most recent sample and
//! accumulates per-step moisture decline until it hits a watering event (a
//! jump of more than 5 points), so only the latest uninterrupted drying
//! segment feeds the rate estimate.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::ring::Ring;

/// 7 days of hourly samples.
pub const WATER_HISTORY_SLOTS: usize = 168;

/// Minimum samples (2 days) before any prediction is attempted.
pub const MIN_PREDICTION_SAMPLES: usize = 48;

/// Adjacent samples further apart than this carry no decline evidence.
const MAX_STEP_GAP_SEC: i64 = 7200;

/// A moisture rise beyond this magnitude is treated as a watering event.
const WATERING_JUMP_POINTS: f32 = 5.0;

/// Steps needed for full data-quantity weight (3 days of hourly samples).
const FULL_WEIGHT_STEPS: f32 = 72.0;

/// Daily rates at or below this are too flat to predict from.
const MIN_DAILY_RATE: f32 = 0.01;

/// One entry of the moisture history.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MoisturePoint {
    pub moisture: f32,
    pub timestamp: i64,
}

/// Prediction output for one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WaterPrediction {
    /// Moisture loss in %/day over the recent decline segment.
    pub daily_consumption_rate: f32,
    /// Consumption slowing down (plant may be dormant or less active).
    pub declining_consumption: bool,
    /// Predicted watering time, 0 = no prediction.
    pub next_watering_timestamp: i64,
    /// 0..=100.
    pub confidence: f32,
}

impl WaterPrediction {
    fn null_with_rate(daily_rate: f32) -> Self {
        Self {
            daily_consumption_rate: daily_rate,
            declining_consumption: false,
            next_watering_timestamp: 0,
            confidence: 0.0,
        }
    }
}

/// Moisture-only history plus the derived prediction logic.  The whole
/// struct is the persisted water-pattern snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WaterPredictor {
    history: Ring<MoisturePoint, WATER_HISTORY_SLOTS>,
}

impl WaterPredictor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append unconditionally; capacity is the only bound.
    pub fn add_reading(&mut self, moisture: f32, timestamp: i64) {
        self.history.push(MoisturePoint {
            moisture,
            timestamp,
        });
    }

    pub fn sample_count(&self) -> usize {
        self.history.len()
    }

    pub fn is_well_formed(&self) -> bool {
        self.history.is_well_formed()
    }

    /// Derive the consumption pattern and next-watering estimate.
    ///
    /// Insufficient data is not an error: fewer than 48 samples yields a
    /// zero-confidence null prediction.
    pub fn predict(&self, current_moisture: f32, threshold: f32, now: i64) -> WaterPrediction {
        if self.history.len() < MIN_PREDICTION_SAMPLES {
            warn!(
                samples = self.history.len(),
                needed = MIN_PREDICTION_SAMPLES,
                "insufficient data for water prediction"
            );
            return WaterPrediction::null_with_rate(0.0);
        }

        let declines = self.recent_decline_steps();
        let count = declines.len();

        let hourly_rate = if count > 0 {
            declines.iter().sum::<f32>() / count as f32
        } else {
            0.0
        };
        let daily_rate = hourly_rate * 24.0;

        let declining = declining_trend(&declines);

        if daily_rate <= MIN_DAILY_RATE {
            debug!(daily_rate, "decline rate too flat for a prediction");
            let mut p = WaterPrediction::null_with_rate(daily_rate);
            p.declining_consumption = declining;
            return p;
        }

        let hours_until_threshold = if current_moisture > threshold {
            (current_moisture - threshold) / hourly_rate
        } else {
            0.0 // already at or below threshold: water now
        };
        let next_watering = now + (hours_until_threshold * 3600.0) as i64;

        let confidence = confidence(&declines, hourly_rate);

        debug!(
            daily_rate,
            next_watering, confidence, "water prediction computed"
        );

        WaterPrediction {
            daily_consumption_rate: daily_rate,
            declining_consumption: declining,
            next_watering_timestamp: next_watering,
            confidence,
        }
    }

    /// Per-step positive declines of the most recent uninterrupted drying
    /// segment, newest step first.
    ///
    /// A step is decline evidence iff its timestamps are sequential within
    /// two hours and moisture fell.  A rise beyond the watering-jump
    /// magnitude terminates the walk; smaller irregularities are skipped.
    fn recent_decline_steps(&self) -> Vec<f32> {
        let points: Vec<&MoisturePoint> = self.history.iter_newest_first().collect();
        let mut declines = Vec::new();

        for pair in points.windows(2) {
            let (newer, older) = (pair[0], pair[1]);
            let time_diff = newer.timestamp - older.timestamp;
            let moisture_diff = older.moisture - newer.moisture;

            if moisture_diff < -WATERING_JUMP_POINTS {
                // Watering event: everything before it belongs to the
                // previous drying cycle.
                break;
            }
            if time_diff > 0 && time_diff < MAX_STEP_GAP_SEC && moisture_diff > 0.0 {
                declines.push(moisture_diff);
            }
        }

        declines
    }
}

/// Compare mean decline between the newer and older halves of the walked
/// window.  Needs two full days of steps to call a trend.
fn declining_trend(declines: &[f32]) -> bool {
    let count = declines.len();
    if count < MIN_PREDICTION_SAMPLES {
        return false;
    }
    let halfway = count / 2;
    let newer_mean = declines[..halfway].iter().sum::<f32>() / halfway as f32;
    let older_mean = declines[halfway..].iter().sum::<f32>() / (count - halfway) as f32;
    newer_mean < older_mean
}

/// Confidence from data quantity and step-to-step consistency.
///
/// The consistency factor divides by the mean rate; near-zero rates are
/// forced to zero confidence instead of trusting the division.
fn confidence(declines: &[f32], hourly_rate: f32) -> f32 {
    let count = declines.len();
    if count == 0 {
        return 0.0;
    }

    let data_quantity = (count as f32 / FULL_WEIGHT_STEPS).min(1.0);

    let variance = declines
        .iter()
        .map(|d| {
            let dev = d - hourly_rate;
            dev * dev
        })
        .sum::<f32>()
        / count as f32;
    let stddev = variance.sqrt();

    let consistency = if hourly_rate > 0.001 {
        (1.0 / (1.0 + 10.0 * stddev / hourly_rate)).clamp(0.0, 1.0)
    } else {
        0.0
    };

    data_quantity * consistency * 100.0
}

// ===========================================================================
// Tests
// ===========================================================================
