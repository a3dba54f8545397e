//! Per-metric sensor history: five hourly 24-slot ring buffers plus the
//! live current values, with admission throttled to one sample per rolling
//! hour across all metrics.

use serde::{Deserialize, Serialize};

use crate::ring::Ring;

/// Slots per metric history: one per hour for a day.
pub const HISTORY_SLOTS: usize = 24;

/// Minimum spacing between admitted history samples, in seconds.
const ADMIT_INTERVAL_SEC: i64 = 3600;

/// One raw sampling of all five metrics.  Immutable once produced.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorSample {
    pub soil_moisture: f32,
    pub light_level: f32,
    pub temperature: f32,
    pub humidity: f32,
    pub air_movement: f32,
    /// Seconds since an arbitrary monotonic epoch.
    pub timestamp: i64,
}

/// The five monitored metrics, in feature-vector order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    SoilMoisture,
    LightLevel,
    Temperature,
    Humidity,
    AirMovement,
}

impl Metric {
    pub const ALL: [Metric; 5] = [
        Metric::SoilMoisture,
        Metric::LightLevel,
        Metric::Temperature,
        Metric::Humidity,
        Metric::AirMovement,
    ];
}

impl SensorSample {
    pub fn value(&self, metric: Metric) -> f32 {
        match metric {
            Metric::SoilMoisture => self.soil_moisture,
            Metric::LightLevel => self.light_level,
            Metric::Temperature => self.temperature,
            Metric::Humidity => self.humidity,
            Metric::AirMovement => self.air_movement,
        }
    }
}

/// Rolling per-metric histories plus the most recent sample.
///
/// Persisted as a single snapshot; `is_well_formed` gates snapshots loaded
/// back from storage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SensorHistory {
    soil_moisture: Ring<f32, HISTORY_SLOTS>,
    light_level: Ring<f32, HISTORY_SLOTS>,
    temperature: Ring<f32, HISTORY_SLOTS>,
    humidity: Ring<f32, HISTORY_SLOTS>,
    air_movement: Ring<f32, HISTORY_SLOTS>,
    current: Option<SensorSample>,
    /// Timestamp of the last sample admitted into the hourly rings, shared
    /// across all five metrics.  `None` until the first admission; a plain
    /// sentinel value would collide with legitimate timestamps.
    last_admitted: Option<i64>,
}

impl SensorHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a sample.  The current values always update; the hourly rings
    /// admit at most one sample per rolling hour.
    pub fn record(&mut self, sample: SensorSample) {
        self.current = Some(sample);

        if let Some(last) = self.last_admitted {
            if sample.timestamp - last < ADMIT_INTERVAL_SEC {
                return;
            }
        }

        self.soil_moisture.push(sample.soil_moisture);
        self.light_level.push(sample.light_level);
        self.temperature.push(sample.temperature);
        self.humidity.push(sample.humidity);
        self.air_movement.push(sample.air_movement);
        self.last_admitted = Some(sample.timestamp);
    }

    pub fn current(&self) -> Option<&SensorSample> {
        self.current.as_ref()
    }

    fn ring(&self, metric: Metric) -> &Ring<f32, HISTORY_SLOTS> {
        match metric {
            Metric::SoilMoisture => &self.soil_moisture,
            Metric::LightLevel => &self.light_level,
            Metric::Temperature => &self.temperature,
            Metric::Humidity => &self.humidity,
            Metric::AirMovement => &self.air_movement,
        }
    }

    /// Mean over the admitted entries for a metric.  With no history yet
    /// this falls back to the current value (0.0 before the first sample),
    /// so the classifier's averaged features degrade gracefully at boot.
    pub fn rolling_average(&self, metric: Metric) -> f32 {
        let ring = self.ring(metric);
        if ring.is_empty() {
            return self.current.map(|s| s.value(metric)).unwrap_or(0.0);
        }
        let sum: f32 = ring.iter_oldest_first().sum();
        sum / ring.len() as f32
    }

    pub fn is_well_formed(&self) -> bool {
        self.soil_moisture.is_well_formed()
            && self.light_level.is_well_formed()
            && self.temperature.is_well_formed()
            && self.humidity.is_well_formed()
            && self.air_movement.is_well_formed()
    }
}

// ===========================================================================
// Tests
// ===========================================================================
