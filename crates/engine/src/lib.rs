//! Plant-monitoring analysis core.
//!
//! Everything here is deterministic and I/O-free: sensors, connectivity,
//! the classification engine, the habitat source, the upload sink, and
//! durable storage are all collaborator traits implemented by the host
//! binary.  [`orchestrator::Orchestrator`] wires the pieces into the
//! per-cycle pipeline: sample, update histories, resolve the habitat
//! profile, detect mismatches, classify health, predict watering, then
//! transmit (replaying any offline backlog first) or cache.

pub mod cache;
pub mod classifier;
pub mod habitat;
pub mod history;
pub mod mismatch;
pub mod orchestrator;
pub mod ring;
pub mod store;
pub mod water;

pub use cache::{CachedReading, OfflineCache, ReplayOutcome};
pub use classifier::{Classifier, ClassificationResult, HealthClass, InferenceError};
pub use habitat::{HabitatError, HabitatProfile, HabitatSource, IdealRange};
pub use history::{Metric, SensorHistory, SensorSample};
pub use mismatch::MismatchSet;
pub use orchestrator::{
    Collaborators, CombinedRecord, Connectivity, CycleOutcome, DataSink, Orchestrator,
    PlantConfig, PredictionRecord, SensorError, SensorSource, UploadError,
};
pub use store::{KvStore, MemStore, PersistenceError};
pub use water::{WaterPrediction, WaterPredictor};
