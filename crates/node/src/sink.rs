//! MQTT upload sink and link-state tracking.
//!
//! Publishes JSON records to `plant/<serial>/reading` and
//! `plant/<serial>/prediction`.  Connectivity is tracked by the MQTT event
//! loop task in main and read here through a shared flag; publishing itself
//! never blocks the analysis cycle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use plantmon_engine::{CombinedRecord, Connectivity, DataSink, PredictionRecord, UploadError};
use rumqttc::{AsyncClient, QoS};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::info;

pub fn reading_topic(serial: &str) -> String {
    format!("plant/{serial}/reading")
}

pub fn prediction_topic(serial: &str) -> String {
    format!("plant/{serial}/prediction")
}

/// Shared broker-connection flag, written by the event loop task.
#[derive(Clone)]
pub struct LinkState(Arc<AtomicBool>);

impl LinkState {
    pub fn new(flag: Arc<AtomicBool>) -> Self {
        Self(flag)
    }
}

impl Connectivity for LinkState {
    fn is_connected(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

pub struct MqttSink {
    client: AsyncClient,
    serial: String,
}

impl MqttSink {
    pub fn new(client: AsyncClient, serial: String) -> Self {
        Self { client, serial }
    }

    fn publish(&self, topic: String, payload: Vec<u8>) -> Result<(), UploadError> {
        // try_publish queues without awaiting; a full queue surfaces as a
        // failed upload and the record goes to the offline cache instead.
        self.client
            .try_publish(topic, QoS::AtLeastOnce, false, payload)
            .map_err(|e| UploadError::Rejected(e.to_string()))
    }
}

impl DataSink for MqttSink {
    fn upload_reading(&mut self, record: &CombinedRecord) -> Result<(), UploadError> {
        let payload =
            serde_json::to_vec(record).map_err(|e| UploadError::Rejected(e.to_string()))?;
        self.publish(reading_topic(&self.serial), payload)?;
        info!(ts = record.timestamp, status = %record.plant_status, "reading published");
        Ok(())
    }

    fn upload_prediction(&mut self, record: &PredictionRecord) -> Result<(), UploadError> {
        let payload =
            serde_json::to_vec(record).map_err(|e| UploadError::Rejected(e.to_string()))?;
        self.publish(prediction_topic(&self.serial), payload)?;

        let next = OffsetDateTime::from_unix_timestamp(record.next_watering_timestamp)
            .ok()
            .and_then(|t| t.format(&Rfc3339).ok())
            .unwrap_or_else(|| "unknown".to_string());
        info!(
            rate = record.daily_consumption_rate,
            next_watering = %next,
            "prediction published"
        );
        Ok(())
    }
}

// ===========================================================================
// Tests
// ===========================================================================
