//! Plant-monitoring node: samples the (simulated) environment on a fixed
//! interval, runs the analysis pipeline, and publishes results over MQTT,
//! caching them while the broker is unreachable.

mod catalog;
mod config;
mod health;
mod sensors;
mod serial;
mod sink;
mod store;

use anyhow::{Context, Result};
use rumqttc::{AsyncClient, Event, MqttOptions, Packet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::{env, time::Duration};
use tokio::sync::Notify;
use tokio::time::{sleep, MissedTickBehavior};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use plantmon_engine::{Collaborators, Orchestrator, PlantConfig};

use crate::catalog::HabitatCatalog;
use crate::health::HeuristicClassifier;
use crate::sensors::SimulatedSensors;
use crate::sink::{LinkState, MqttSink};
use crate::store::FsStore;

fn now_unix() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // ── Config ──────────────────────────────────────────────────────
    let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
    let cfg = config::load(&config_path)?;

    // Broker location can be overridden without editing the file.
    let broker = env::var("MQTT_HOST").unwrap_or_else(|_| cfg.mqtt.host.clone());
    let port: u16 = env::var("MQTT_PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(cfg.mqtt.port);

    // ── Storage + identity ──────────────────────────────────────────
    let mut store = FsStore::open(&cfg.storage.data_dir)
        .with_context(|| format!("failed to open data dir '{}'", cfg.storage.data_dir))?;
    let device_serial = match env::var("DEVICE_SERIAL") {
        Ok(s) if !s.trim().is_empty() => s.trim().to_string(),
        _ => serial::load_or_generate(&mut store)?,
    };
    info!(
        serial = %device_serial,
        plant = %cfg.device.plant_name,
        variety = %cfg.device.plant_variety,
        "node starting"
    );

    // ── MQTT ────────────────────────────────────────────────────────
    let client_id = format!("plantmon-node-{device_serial}");
    let mut mqttoptions = MqttOptions::new(client_id, broker, port);
    mqttoptions.set_keep_alive(Duration::from_secs(30));

    let (client, mut eventloop) = AsyncClient::new(mqttoptions, 20);

    let connected = Arc::new(AtomicBool::new(false));
    let reconnected = Arc::new(Notify::new());
    {
        let connected = Arc::clone(&connected);
        let reconnected = Arc::clone(&reconnected);
        tokio::spawn(async move {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        info!("mqtt connected");
                        if !connected.swap(true, Ordering::Relaxed) {
                            // Wake the cycle loop so the backlog drains now
                            // instead of next tick.
                            reconnected.notify_one();
                        }
                    }
                    Ok(Event::Incoming(Packet::Disconnect)) => {
                        warn!("mqtt disconnected");
                        connected.store(false, Ordering::Relaxed);
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(error = %e, "mqtt error, reconnecting");
                        connected.store(false, Ordering::Relaxed);
                        sleep(Duration::from_secs(2)).await;
                    }
                }
            }
        });
    }

    // ── Analysis state + collaborators ──────────────────────────────
    let plant = PlantConfig {
        serial: device_serial.clone(),
        plant_name: cfg.device.plant_name.clone(),
        plant_variety: cfg.device.plant_variety.clone(),
        moisture_threshold: cfg.device.moisture_threshold,
    };
    let mut orchestrator = Orchestrator::boot(plant, &mut store);

    let diurnal_period_s: f64 = env::var("SIM_DAY_SECONDS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(86_400.0);
    let mut sensors = SimulatedSensors::new(diurnal_period_s);
    let mut classifier = HeuristicClassifier::new();
    let mut habitats = HabitatCatalog::from_config(&cfg.habitats);
    info!(habitats = habitats.len(), "habitat catalog loaded");

    let link = LinkState::new(Arc::clone(&connected));
    let mut sink = MqttSink::new(client, device_serial);

    // ── Cycle loop ──────────────────────────────────────────────────
    let mut ticker = tokio::time::interval(Duration::from_secs(cfg.device.sample_interval_sec));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = reconnected.notified() => {
                info!("connectivity restored, running catch-up cycle");
            }
        }

        let mut collab = Collaborators {
            sensors: &mut sensors,
            connectivity: &link,
            classifier: &mut classifier,
            habitat: &mut habitats,
            sink: &mut sink,
            store: &mut store,
        };
        if let Some(outcome) = orchestrator.run_cycle(&mut collab, now_unix()) {
            debug!(?outcome, "cycle complete");
        }
    }
}
