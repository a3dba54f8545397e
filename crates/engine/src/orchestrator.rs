//! Per-cycle analysis orchestration: sample → history → mismatch +
//! classification → water prediction → transmit-or-cache, with persisted
//! state updated at the end of every cycle.
//!
//! All mutable analysis state lives in [`Orchestrator`]; collaborators are
//! passed in per call so the node binary owns their lifecycles.  No
//! collaborator failure is fatal to a cycle.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::cache::{CachedReading, OfflineCache, ReplayOutcome};
use crate::classifier::{self, Classifier, ClassificationResult, HealthClass};
use crate::habitat::{HabitatProfile, HabitatSource};
use crate::history::{SensorHistory, SensorSample};
use crate::mismatch::{self, MismatchSet};
use crate::store::{self, keys, KvStore};
use crate::water::{WaterPrediction, WaterPredictor};

/// Prediction records are only uploaded above this confidence.
pub const PREDICTION_UPLOAD_MIN_CONFIDENCE: f32 = 30.0;

/// Default moisture threshold (%) at which watering is due.
pub const DEFAULT_MOISTURE_THRESHOLD: f32 = 30.0;

#[derive(Debug, Error)]
pub enum SensorError {
    #[error("sensor read failed: {0}")]
    ReadFailed(String),
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("sink not connected")]
    NotConnected,
    #[error("upload rejected: {0}")]
    Rejected(String),
}

/// Collaborator producing one sample per cycle.
pub trait SensorSource {
    fn sample(&mut self) -> Result<SensorSample, SensorError>;
}

/// Collaborator exposing the link state.  The core never drives
/// reconnection itself.
pub trait Connectivity {
    fn is_connected(&self) -> bool;
}

/// Remote data sink for combined readings and water predictions.
pub trait DataSink {
    fn upload_reading(&mut self, record: &CombinedRecord) -> Result<(), UploadError>;
    fn upload_prediction(&mut self, record: &PredictionRecord) -> Result<(), UploadError>;
}

/// Sensor + analysis record uploaded each cycle (and replayed from cache).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedRecord {
    pub soil_moisture: f32,
    pub light_level: f32,
    pub temperature: f32,
    pub humidity: f32,
    pub air_movement: f32,
    pub timestamp: i64,
    pub plant_name: String,
    pub plant_variety: String,
    pub health_status: String,
    pub mismatch_summary: String,
    pub recommendation: String,
    pub plant_status: String,
}

/// Water-prediction record, uploaded when confidence is high enough.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub daily_consumption_rate: f32,
    pub next_watering_timestamp: i64,
    pub confidence: f32,
}

/// Static identity and thresholds for this node.
#[derive(Debug, Clone)]
pub struct PlantConfig {
    pub serial: String,
    pub plant_name: String,
    pub plant_variety: String,
    pub moisture_threshold: f32,
}

/// What a cycle did, for logging and tests.
#[derive(Debug, Default, PartialEq)]
pub struct CycleOutcome {
    pub sampled: bool,
    pub replay: Option<ReplayOutcome>,
    pub transmitted: bool,
    pub prediction_sent: bool,
    pub cached: bool,
}

/// Everything the orchestrator calls out to during a cycle.
pub struct Collaborators<'a> {
    pub sensors: &'a mut dyn SensorSource,
    pub connectivity: &'a dyn Connectivity,
    pub classifier: &'a mut dyn Classifier,
    pub habitat: &'a mut dyn HabitatSource,
    pub sink: &'a mut dyn DataSink,
    pub store: &'a mut dyn KvStore,
}

/// Owner of all mutable analysis state for one plant.
pub struct Orchestrator {
    config: PlantConfig,
    history: SensorHistory,
    water: WaterPredictor,
    cache: OfflineCache,
    /// Resolved profile kept across cycles; staleness checked on use.
    habitat: Option<HabitatProfile>,
    /// Health fields from the last successful classification.  Kept when
    /// inference fails so a transient fault never erases a valid status.
    last_health: Option<(HealthClass, f32)>,
    /// Non-reentrancy guard for the connectivity-restored re-run path.
    in_progress: bool,
}

impl Orchestrator {
    /// Boot-time construction: restore persisted history, water pattern,
    /// and cache, each falling back to empty on absence or corruption.
    pub fn boot(config: PlantConfig, store: &mut dyn KvStore) -> Self {
        let history = store::load_snapshot::<SensorHistory>(store, &keys::sensor_history(&config.serial))
            .filter(SensorHistory::is_well_formed)
            .unwrap_or_default();
        let water = store::load_snapshot::<WaterPredictor>(store, &keys::water_pattern(&config.serial))
            .filter(WaterPredictor::is_well_formed)
            .unwrap_or_default();
        let cache = OfflineCache::load(store, &keys::cache(&config.serial));

        info!(
            serial = %config.serial,
            plant = %config.plant_name,
            cached_readings = cache.len(),
            water_samples = water.sample_count(),
            "analysis state restored"
        );

        Self {
            config,
            history,
            water,
            cache,
            habitat: None,
            last_health: None,
            in_progress: false,
        }
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    pub fn last_health(&self) -> Option<(HealthClass, f32)> {
        self.last_health
    }

    /// Run one sensing cycle.  Returns `None` when a cycle is already in
    /// progress (re-entrant trigger), otherwise what the cycle did.
    pub fn run_cycle(&mut self, collab: &mut Collaborators<'_>, now: i64) -> Option<CycleOutcome> {
        if self.in_progress {
            warn!("cycle already in progress, skipping re-entrant trigger");
            return None;
        }
        self.in_progress = true;
        let outcome = self.cycle_inner(collab, now);
        self.in_progress = false;
        Some(outcome)
    }

    fn cycle_inner(&mut self, collab: &mut Collaborators<'_>, now: i64) -> CycleOutcome {
        let mut outcome = CycleOutcome::default();

        // ── Sample ───────────────────────────────────────────────
        let sample = match collab.sensors.sample() {
            Ok(s) => s,
            Err(e) => {
                // Skip this cycle's analysis entirely; never crash.
                error!(error = %e, "sensor read failed, skipping cycle");
                return outcome;
            }
        };
        outcome.sampled = true;

        debug!(
            moisture = sample.soil_moisture,
            light = sample.light_level,
            temp = sample.temperature,
            humidity = sample.humidity,
            air = sample.air_movement,
            "sensor sample"
        );

        // ── Histories ────────────────────────────────────────────
        self.history.record(sample);
        self.water.add_reading(sample.soil_moisture, sample.timestamp);

        // ── Habitat + mismatch + classification ──────────────────
        let profile = self.resolve_habitat(collab, now);
        let mismatch = mismatch::detect(&sample, &profile);

        let features = classifier::build_features(&self.history, &profile);
        match classifier::classify(collab.classifier, &features) {
            Ok((health, confidence)) => {
                self.last_health = Some((health, confidence));
                info!(
                    health = health.as_str(),
                    confidence,
                    mismatch = %mismatch.summary(),
                    "plant health classified"
                );
            }
            Err(e) => {
                // Health fields keep their previous value for this cycle;
                // mismatch detection and prediction still run.
                error!(error = %e, "inference failed, keeping previous health status");
            }
        }

        // ── Water prediction ─────────────────────────────────────
        let prediction = self
            .water
            .predict(sample.soil_moisture, self.config.moisture_threshold, now);

        // ── Transmit or cache ────────────────────────────────────
        let record = self.combined_record(&sample, &mismatch);

        if collab.connectivity.is_connected() {
            outcome.replay = self.flush_backlog(collab, &record.recommendation);

            match collab.sink.upload_reading(&record) {
                Ok(()) => outcome.transmitted = true,
                Err(e) => error!(error = %e, "failed to upload reading"),
            }

            if prediction.confidence > PREDICTION_UPLOAD_MIN_CONFIDENCE {
                outcome.prediction_sent = self.send_prediction(collab, &prediction);
            }
        } else {
            info!("offline, caching reading");
            let cached = CachedReading {
                sample,
                health: self.last_health.map(|(h, _)| h).unwrap_or(HealthClass::Healthy),
                mismatch_summary: record.mismatch_summary.clone(),
                plant_status: record.plant_status.clone(),
                valid: true,
            };
            match self
                .cache
                .enqueue(cached, collab.store, &keys::cache(&self.config.serial))
            {
                Ok(()) => outcome.cached = true,
                Err(e) => error!(error = %e, "failed to cache reading"),
            }
        }

        // ── Persist analysis state ───────────────────────────────
        self.persist_state(collab.store);

        outcome
    }

    /// Resolve the habitat profile: fresh fetch when connected, cached copy
    /// when not stale, built-in defaults otherwise.
    fn resolve_habitat(&mut self, collab: &mut Collaborators<'_>, now: i64) -> HabitatProfile {
        let key = keys::habitat(&self.config.plant_name, &self.config.plant_variety);

        if collab.connectivity.is_connected() {
            match collab
                .habitat
                .fetch(&self.config.plant_name, &self.config.plant_variety)
            {
                Ok(mut profile) => {
                    profile.valid = true;
                    profile.fetched_at = now;
                    if let Err(e) = store::save_snapshot(collab.store, &key, &profile) {
                        warn!(error = %e, "failed to cache habitat profile");
                    }
                    self.habitat = Some(profile.clone());
                    return profile;
                }
                Err(e) => warn!(error = %e, "habitat fetch failed, trying cached profile"),
            }
        }

        if self.habitat.is_none() {
            self.habitat = store::load_snapshot::<HabitatProfile>(collab.store, &key);
        }

        match &self.habitat {
            Some(p) if p.valid && !p.is_stale(now) => p.clone(),
            _ => {
                debug!("no fresh habitat profile, using default ranges");
                HabitatProfile::default_ranges(now)
            }
        }
    }

    /// Replay the cached backlog oldest-first; abort on the first failure.
    fn flush_backlog(
        &mut self,
        collab: &mut Collaborators<'_>,
        recommendation: &str,
    ) -> Option<ReplayOutcome> {
        if self.cache.is_empty() {
            return None;
        }
        info!(backlog = self.cache.len(), "connectivity available, replaying backlog");

        let config = self.config.clone();
        let sink = &mut *collab.sink;
        let result = self.cache.replay(
            collab.store,
            &keys::cache(&config.serial),
            |cached| {
                let record = CombinedRecord::from_cached(cached, &config, recommendation);
                sink.upload_reading(&record)
            },
        );

        match result {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                error!(error = %e, "failed to persist cleared cache");
                None
            }
        }
    }

    fn send_prediction(
        &self,
        collab: &mut Collaborators<'_>,
        prediction: &WaterPrediction,
    ) -> bool {
        let record = PredictionRecord {
            daily_consumption_rate: prediction.daily_consumption_rate,
            next_watering_timestamp: prediction.next_watering_timestamp,
            confidence: prediction.confidence,
        };
        match collab.sink.upload_prediction(&record) {
            Ok(()) => {
                info!(
                    rate = record.daily_consumption_rate,
                    next = record.next_watering_timestamp,
                    confidence = record.confidence,
                    "water prediction uploaded"
                );
                true
            }
            Err(e) => {
                error!(error = %e, "failed to upload water prediction");
                false
            }
        }
    }

    fn combined_record(&self, sample: &SensorSample, mismatch: &MismatchSet) -> CombinedRecord {
        let (health_status, plant_status, recommendation) = match self.last_health {
            Some((health, confidence)) => {
                let result = ClassificationResult {
                    health,
                    confidence,
                    mismatch: *mismatch,
                    recommendation: classifier::recommendation(health, mismatch),
                };
                (
                    health.as_str().to_string(),
                    result.status_label().to_string(),
                    result.recommendation,
                )
            }
            None => {
                let recommendation = if mismatch.any() {
                    classifier::recommendation(HealthClass::Stressed, mismatch)
                } else {
                    "Awaiting classification.".to_string()
                };
                ("Unknown".to_string(), "Unknown".to_string(), recommendation)
            }
        };

        CombinedRecord {
            soil_moisture: sample.soil_moisture,
            light_level: sample.light_level,
            temperature: sample.temperature,
            humidity: sample.humidity,
            air_movement: sample.air_movement,
            timestamp: sample.timestamp,
            plant_name: self.config.plant_name.clone(),
            plant_variety: self.config.plant_variety.clone(),
            health_status,
            mismatch_summary: mismatch.summary(),
            recommendation,
            plant_status,
        }
    }

    fn persist_state(&self, store: &mut dyn KvStore) {
        if let Err(e) = store::save_snapshot(
            store,
            &keys::sensor_history(&self.config.serial),
            &self.history,
        ) {
            // Analysis continues in-memory; a later cycle retries the write.
            warn!(error = %e, "failed to persist sensor history");
        }
        if let Err(e) = store::save_snapshot(
            store,
            &keys::water_pattern(&self.config.serial),
            &self.water,
        ) {
            warn!(error = %e, "failed to persist water pattern");
        }
    }
}

impl CombinedRecord {
    /// Rebuild an upload record from a cached reading during replay.
    fn from_cached(cached: &CachedReading, config: &PlantConfig, recommendation: &str) -> Self {
        Self {
            soil_moisture: cached.sample.soil_moisture,
            light_level: cached.sample.light_level,
            temperature: cached.sample.temperature,
            humidity: cached.sample.humidity,
            air_movement: cached.sample.air_movement,
            timestamp: cached.sample.timestamp,
            plant_name: config.plant_name.clone(),
            plant_variety: config.plant_variety.clone(),
            health_status: cached.health.as_str().to_string(),
            mismatch_summary: cached.mismatch_summary.clone(),
            recommendation: recommendation.to_string(),
            plant_status: cached.plant_status.clone(),
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::ConstantClassifier;
    use crate::habitat::HabitatError;
    use crate::store::MemStore;

    // -- Test collaborators ----------------------------------------------

    struct FixedSensor {
        sample: SensorSample,
        fail: bool,
    }

    impl SensorSource for FixedSensor {
        fn sample(&mut self) -> Result<SensorSample, SensorError> {
            if self.fail {
                Err(SensorError::ReadFailed("i2c timeout".into()))
            } else {
                Ok(self.sample)
            }
        }
    }

    struct Link(bool);

    impl Connectivity for Link {
        fn is_connected(&self) -> bool {
            self.0
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        readings: Vec<CombinedRecord>,
        predictions: Vec<PredictionRecord>,
        fail_after: Option<usize>,
    }

    impl DataSink for RecordingSink {
        fn upload_reading(&mut self, record: &CombinedRecord) -> Result<(), UploadError> {
            if let Some(n) = self.fail_after {
                if self.readings.len() >= n {
                    return Err(UploadError::Rejected("server 500".into()));
                }
            }
            self.readings.push(record.clone());
            Ok(())
        }

        fn upload_prediction(&mut self, record: &PredictionRecord) -> Result<(), UploadError> {
            self.predictions.push(record.clone());
            Ok(())
        }
    }

    struct NoHabitat;

    impl HabitatSource for NoHabitat {
        fn fetch(&mut self, name: &str, _: &str) -> Result<HabitatProfile, HabitatError> {
            Err(HabitatError::NotFound(name.to_string()))
        }
    }

    struct FixedHabitat(HabitatProfile);

    impl HabitatSource for FixedHabitat {
        fn fetch(&mut self, _: &str, _: &str) -> Result<HabitatProfile, HabitatError> {
            Ok(self.0.clone())
        }
    }

    // -- Helpers ----------------------------------------------------------

    fn config() -> PlantConfig {
        PlantConfig {
            serial: "dev-1".into(),
            plant_name: "ficus".into(),
            plant_variety: "lyrata".into(),
            moisture_threshold: DEFAULT_MOISTURE_THRESHOLD,
        }
    }

    fn sample(ts: i64) -> SensorSample {
        SensorSample {
            soil_moisture: 45.0,
            light_level: 55.0,
            temperature: 22.0,
            humidity: 50.0,
            air_movement: 1.0,
            timestamp: ts,
        }
    }

    struct Rig {
        store: MemStore,
        sink: RecordingSink,
        classifier: ConstantClassifier,
        habitat: NoHabitat,
    }

    impl Rig {
        fn new() -> Self {
            Self {
                store: MemStore::new(),
                sink: RecordingSink::default(),
                classifier: ConstantClassifier {
                    probs: [0.8, 0.15, 0.05],
                },
                habitat: NoHabitat,
            }
        }
    }

    fn run(
        orch: &mut Orchestrator,
        rig: &mut Rig,
        connected: bool,
        ts: i64,
    ) -> CycleOutcome {
        let mut sensors = FixedSensor {
            sample: sample(ts),
            fail: false,
        };
        let link = Link(connected);
        let mut collab = Collaborators {
            sensors: &mut sensors,
            connectivity: &link,
            classifier: &mut rig.classifier,
            habitat: &mut rig.habitat,
            sink: &mut rig.sink,
            store: &mut rig.store,
        };
        orch.run_cycle(&mut collab, ts).unwrap()
    }

    // -- Cycles -----------------------------------------------------------

    #[test]
    fn connected_cycle_transmits_current_record() {
        let mut rig = Rig::new();
        let mut orch = Orchestrator::boot(config(), &mut rig.store);

        let outcome = run(&mut orch, &mut rig, true, 60);
        assert!(outcome.sampled);
        assert!(outcome.transmitted);
        assert!(!outcome.cached);

        let record = &rig.sink.readings[0];
        assert_eq!(record.health_status, "Healthy");
        assert_eq!(record.plant_status, "Healthy");
        assert_eq!(record.mismatch_summary, "none");
        assert_eq!(record.plant_name, "ficus");
        assert_eq!(record.recommendation, "Plant is healthy.");
    }

    #[test]
    fn offline_cycle_caches_instead() {
        let mut rig = Rig::new();
        let mut orch = Orchestrator::boot(config(), &mut rig.store);

        let outcome = run(&mut orch, &mut rig, false, 60);
        assert!(outcome.cached);
        assert!(!outcome.transmitted);
        assert_eq!(orch.cache_len(), 1);
        assert!(rig.sink.readings.is_empty());
    }

    #[test]
    fn reconnect_flushes_backlog_oldest_first_then_current() {
        let mut rig = Rig::new();
        let mut orch = Orchestrator::boot(config(), &mut rig.store);

        for i in 0..3 {
            run(&mut orch, &mut rig, false, (i + 1) * 3600);
        }
        assert_eq!(orch.cache_len(), 3);

        let outcome = run(&mut orch, &mut rig, true, 4 * 3600);
        assert_eq!(outcome.replay, Some(ReplayOutcome::Complete { sent: 3 }));
        assert!(outcome.transmitted);
        assert_eq!(orch.cache_len(), 0);

        let timestamps: Vec<i64> = rig.sink.readings.iter().map(|r| r.timestamp).collect();
        assert_eq!(timestamps, vec![3600, 7200, 10800, 14400]);
    }

    #[test]
    fn failed_replay_keeps_backlog_and_retries_next_cycle() {
        let mut rig = Rig::new();
        let mut orch = Orchestrator::boot(config(), &mut rig.store);

        for i in 0..4 {
            run(&mut orch, &mut rig, false, (i + 1) * 3600);
        }

        // First replay pass: accept 2 then fail everything.
        rig.sink.fail_after = Some(2);
        let outcome = run(&mut orch, &mut rig, true, 5 * 3600);
        assert_eq!(
            outcome.replay,
            Some(ReplayOutcome::Aborted { sent: 2, remaining: 2 })
        );
        // Current record also failed (sink still failing); nothing lost
        // from the cache.
        assert_eq!(orch.cache_len(), 4);

        // Link recovers: full backlog goes out from the oldest entry.
        rig.sink.fail_after = None;
        let outcome = run(&mut orch, &mut rig, true, 6 * 3600);
        assert_eq!(outcome.replay, Some(ReplayOutcome::Complete { sent: 4 }));
        assert_eq!(orch.cache_len(), 0);
    }

    #[test]
    fn sensor_failure_skips_cycle_without_crashing() {
        let mut rig = Rig::new();
        let mut orch = Orchestrator::boot(config(), &mut rig.store);

        let mut sensors = FixedSensor {
            sample: sample(60),
            fail: true,
        };
        let link = Link(true);
        let mut collab = Collaborators {
            sensors: &mut sensors,
            connectivity: &link,
            classifier: &mut rig.classifier,
            habitat: &mut rig.habitat,
            sink: &mut rig.sink,
            store: &mut rig.store,
        };
        let outcome = orch.run_cycle(&mut collab, 60).unwrap();
        assert!(!outcome.sampled);
        assert!(rig.sink.readings.is_empty());
        assert_eq!(orch.cache_len(), 0);
    }

    #[test]
    fn inference_failure_keeps_previous_health() {
        struct Flaky {
            fail: bool,
        }
        impl Classifier for Flaky {
            fn infer(
                &mut self,
                _: &[f32; classifier::FEATURE_LEN],
            ) -> Result<[f32; 3], classifier::InferenceError> {
                if self.fail {
                    Err(classifier::InferenceError::EngineFault("oom".into()))
                } else {
                    Ok([0.1, 0.7, 0.2])
                }
            }
        }

        let mut rig = Rig::new();
        let mut orch = Orchestrator::boot(config(), &mut rig.store);
        let mut flaky = Flaky { fail: false };
        let link = Link(true);

        let mut sensors = FixedSensor {
            sample: sample(60),
            fail: false,
        };
        let mut collab = Collaborators {
            sensors: &mut sensors,
            connectivity: &link,
            classifier: &mut flaky,
            habitat: &mut rig.habitat,
            sink: &mut rig.sink,
            store: &mut rig.store,
        };
        orch.run_cycle(&mut collab, 60).unwrap();
        assert_eq!(orch.last_health().unwrap().0, HealthClass::Stressed);

        // Engine goes down: health fields survive, records keep the old class.
        flaky.fail = true;
        let mut sensors = FixedSensor {
            sample: sample(120),
            fail: false,
        };
        let mut collab = Collaborators {
            sensors: &mut sensors,
            connectivity: &link,
            classifier: &mut flaky,
            habitat: &mut rig.habitat,
            sink: &mut rig.sink,
            store: &mut rig.store,
        };
        orch.run_cycle(&mut collab, 120).unwrap();
        assert_eq!(orch.last_health().unwrap().0, HealthClass::Stressed);
        assert_eq!(rig.sink.readings[1].health_status, "Stressed");
    }

    #[test]
    fn unclassified_record_is_marked_unknown() {
        struct Broken;
        impl Classifier for Broken {
            fn infer(
                &mut self,
                _: &[f32; classifier::FEATURE_LEN],
            ) -> Result<[f32; 3], classifier::InferenceError> {
                Err(classifier::InferenceError::ShapeMismatch("bad model".into()))
            }
        }

        let mut rig = Rig::new();
        let mut orch = Orchestrator::boot(config(), &mut rig.store);
        let link = Link(true);
        let mut broken = Broken;
        let mut sensors = FixedSensor {
            sample: sample(60),
            fail: false,
        };
        let mut collab = Collaborators {
            sensors: &mut sensors,
            connectivity: &link,
            classifier: &mut broken,
            habitat: &mut rig.habitat,
            sink: &mut rig.sink,
            store: &mut rig.store,
        };
        orch.run_cycle(&mut collab, 60).unwrap();

        assert_eq!(rig.sink.readings[0].health_status, "Unknown");
        assert_eq!(rig.sink.readings[0].plant_status, "Unknown");
    }

    #[test]
    fn stale_cached_habitat_falls_back_to_defaults() {
        let mut rig = Rig::new();

        // A stale profile sits in the store under the habitat key.
        let mut stale = HabitatProfile::default_ranges(0);
        stale.plant_id = "ficus".into();
        stale.temperature = crate::habitat::IdealRange::new(5.0, 10.0);
        stale.fetched_at = 0;
        store::save_snapshot(&mut rig.store, &keys::habitat("ficus", "lyrata"), &stale).unwrap();

        let mut orch = Orchestrator::boot(config(), &mut rig.store);

        // Offline, now > 86400: the stale profile must not be used.  With
        // default ranges, a 22°C reading shows no temperature mismatch.
        let outcome = run(&mut orch, &mut rig, false, 200_000);
        assert!(outcome.cached);
        let cached_summary = orch.cache.iter_oldest_first().next().unwrap();
        assert_eq!(cached_summary.mismatch_summary, "none");
    }

    #[test]
    fn fresh_fetch_is_cached_for_offline_use() {
        let mut rig = Rig::new();
        let mut orch = Orchestrator::boot(config(), &mut rig.store);

        let mut profile = HabitatProfile::default_ranges(0);
        profile.plant_id = "ficus-lyrata".into();
        let mut habitat = FixedHabitat(profile);

        let link = Link(true);
        let mut sensors = FixedSensor {
            sample: sample(60),
            fail: false,
        };
        let mut collab = Collaborators {
            sensors: &mut sensors,
            connectivity: &link,
            classifier: &mut rig.classifier,
            habitat: &mut habitat,
            sink: &mut rig.sink,
            store: &mut rig.store,
        };
        orch.run_cycle(&mut collab, 60).unwrap();

        let stored: HabitatProfile =
            store::load_snapshot(&mut rig.store, &keys::habitat("ficus", "lyrata")).unwrap();
        assert_eq!(stored.plant_id, "ficus-lyrata");
        assert_eq!(stored.fetched_at, 60);
        assert!(stored.valid);
    }

    #[test]
    fn prediction_uploaded_only_above_confidence_threshold() {
        let mut rig = Rig::new();
        let mut orch = Orchestrator::boot(config(), &mut rig.store);

        // Feed a clean 3-day decline via offline cycles (hourly).
        for i in 0..72 {
            let mut sensors = FixedSensor {
                sample: SensorSample {
                    soil_moisture: 90.0 - 0.5 * i as f32,
                    timestamp: (i + 1) * 3600,
                    ..sample(0)
                },
                fail: false,
            };
            let link = Link(false);
            let mut collab = Collaborators {
                sensors: &mut sensors,
                connectivity: &link,
                classifier: &mut rig.classifier,
                habitat: &mut rig.habitat,
                sink: &mut rig.sink,
                store: &mut rig.store,
            };
            orch.run_cycle(&mut collab, (i + 1) * 3600).unwrap();
        }

        // Connected cycle: constant decline gives high confidence.
        let mut sensors = FixedSensor {
            sample: SensorSample {
                soil_moisture: 90.0 - 0.5 * 72.0,
                timestamp: 73 * 3600,
                ..sample(0)
            },
            fail: false,
        };
        let link = Link(true);
        let mut collab = Collaborators {
            sensors: &mut sensors,
            connectivity: &link,
            classifier: &mut rig.classifier,
            habitat: &mut rig.habitat,
            sink: &mut rig.sink,
            store: &mut rig.store,
        };
        let outcome = orch.run_cycle(&mut collab, 73 * 3600).unwrap();
        assert!(outcome.prediction_sent);
        assert_eq!(rig.sink.predictions.len(), 1);
        let p = &rig.sink.predictions[0];
        assert!((p.daily_consumption_rate - 12.0).abs() < 0.1);
        assert!(p.confidence > PREDICTION_UPLOAD_MIN_CONFIDENCE);
    }

    #[test]
    fn state_persists_across_reboot() {
        let mut rig = Rig::new();
        {
            let mut orch = Orchestrator::boot(config(), &mut rig.store);
            for i in 0..5 {
                run(&mut orch, &mut rig, false, (i + 1) * 3600);
            }
            assert_eq!(orch.cache_len(), 5);
        }

        // "Reboot": everything restored from the store.
        let orch = Orchestrator::boot(config(), &mut rig.store);
        assert_eq!(orch.cache_len(), 5);
    }

    #[test]
    fn persistence_failure_does_not_abort_cycle() {
        let mut rig = Rig::new();
        let mut orch = Orchestrator::boot(config(), &mut rig.store);
        rig.store.fail_saves = true;

        let outcome = run(&mut orch, &mut rig, true, 60);
        assert!(outcome.sampled);
        assert!(outcome.transmitted);
    }
}
