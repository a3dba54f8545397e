//! Stateful plant-environment simulator for development without hardware.
//!
//! Models realistic sensor behaviour:
//! - Soil drying via a slow drift with mean-reverting random walk
//! - Automatic "someone watered the plant" jumps once the soil gets dry
//! - Diurnal (day/night) cycle driving light, temperature, and humidity
//! - Per-reading electronic noise on every channel

use plantmon_engine::{SensorError, SensorSample, SensorSource};
use tracing::debug;

// ---------------------------------------------------------------------------
// Gaussian approximation (no extra dependency)
// ---------------------------------------------------------------------------

/// Approximate a sample from N(0,1) using the Irwin-Hall method:
/// sum of 12 uniform [0,1) values minus 6.
fn approx_std_normal() -> f64 {
    let mut sum: f64 = 0.0;
    for _ in 0..12 {
        sum += fastrand::f64();
    }
    sum - 6.0
}

/// Sample from N(mean, sigma).
fn gaussian(mean: f64, sigma: f64) -> f64 {
    mean + sigma * approx_std_normal()
}

// ---------------------------------------------------------------------------
// Simulator
// ---------------------------------------------------------------------------

/// Soil moisture (%) below which the simulated owner waters the plant.
const WATERING_POINT: f64 = 28.0;

/// Moisture gain from one simulated watering.
const WATERING_AMOUNT: f64 = 38.0;

pub struct SimulatedSensors {
    /// Current "true" soil moisture in percent.  Evolves each tick.
    moisture: f64,
    /// Moisture lost per sampling tick.
    drying_per_tick: f64,
    /// Day/night cycle length in seconds.
    diurnal_period_s: f64,
}

impl SimulatedSensors {
    /// `diurnal_period_s` controls the day/night cycle length.  Use 600
    /// (10 min) for fast dev iteration or 86400 for real-time.
    pub fn new(diurnal_period_s: f64) -> Self {
        Self {
            moisture: 65.0,
            drying_per_tick: 0.6,
            diurnal_period_s,
        }
    }

    fn now_unix() -> i64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }

    /// Sinusoidal day fraction in [-1, 1], peaking mid-"afternoon".
    fn diurnal(&self, now: i64) -> f64 {
        let phase = 2.0 * std::f64::consts::PI * now as f64 / self.diurnal_period_s;
        phase.sin()
    }

    fn step_moisture(&mut self) {
        self.moisture += gaussian(-self.drying_per_tick, 0.2);
        if self.moisture < WATERING_POINT {
            debug!(moisture = self.moisture, "simulated watering event");
            self.moisture += WATERING_AMOUNT;
        }
        self.moisture = self.moisture.clamp(0.0, 100.0);
    }
}

impl SensorSource for SimulatedSensors {
    fn sample(&mut self) -> Result<SensorSample, SensorError> {
        self.step_moisture();

        let now = Self::now_unix();
        let day = self.diurnal(now);

        // Light follows the day curve, dark at "night".
        let light = (55.0 + 40.0 * day + gaussian(0.0, 3.0)).clamp(0.0, 100.0);
        // Temperature tracks the light with a small swing; humidity runs
        // opposite to it.
        let temperature = (22.0 + 2.5 * day + gaussian(0.0, 0.4)).clamp(-10.0, 50.0);
        let humidity = (55.0 - 8.0 * day + gaussian(0.0, 2.0)).clamp(0.0, 100.0);
        let air = gaussian(1.5, 0.5).clamp(0.0, 10.0);

        Ok(SensorSample {
            soil_moisture: self.moisture as f32,
            light_level: light as f32,
            temperature: temperature as f32,
            humidity: humidity as f32,
            air_movement: air as f32,
            timestamp: now,
        })
    }
}

// ===========================================================================
// Tests
// ===========================================================================
