//! TOML config file loading and validation: device identity, MQTT broker,
//! storage location, and the bundled habitat catalog.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashSet;

// ---------------------------------------------------------------------------
// Config file structures
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct Config {
    pub device: DeviceSection,
    pub mqtt: MqttSection,
    pub storage: StorageSection,
    #[serde(default)]
    pub habitats: Vec<HabitatEntry>,
}

#[derive(Debug, Deserialize)]
pub struct DeviceSection {
    pub plant_name: String,
    pub plant_variety: String,
    /// Soil moisture (%) at which watering is due.
    pub moisture_threshold: f32,
    pub sample_interval_sec: u64,
}

#[derive(Debug, Deserialize)]
pub struct MqttSection {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
pub struct StorageSection {
    pub data_dir: String,
}

/// One catalog entry of ideal ranges, each range as `[min, max]`.
#[derive(Debug, Deserialize)]
pub struct HabitatEntry {
    pub plant_name: String,
    pub plant_variety: String,
    pub temperature: [f32; 2],
    pub humidity: [f32; 2],
    pub soil_moisture: [f32; 2],
    pub light_level: [f32; 2],
    #[serde(default)]
    pub native_region: String,
    #[serde(default)]
    pub growing_season: String,
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Sensor readings are percentages; ranges must stay inside this.
const PERCENT_MIN: f32 = 0.0;
const PERCENT_MAX: f32 = 100.0;

/// Sanity bounds for configured temperature ranges (°C).
const TEMP_MIN: f32 = -40.0;
const TEMP_MAX: f32 = 60.0;

impl Config {
    /// Validate all config entries. Returns `Ok(())` or an error describing
    /// every violation found (not just the first one).
    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        self.validate_device(&mut errors);
        self.validate_mqtt(&mut errors);
        self.validate_storage(&mut errors);
        self.validate_habitats(&mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            bail!(
                "config validation failed ({} error{}):\n  - {}",
                errors.len(),
                if errors.len() == 1 { "" } else { "s" },
                errors.join("\n  - ")
            );
        }
    }

    fn validate_device(&self, errors: &mut Vec<String>) {
        let d = &self.device;
        if d.plant_name.trim().is_empty() {
            errors.push("device: plant_name is empty".to_string());
        }
        if d.plant_variety.trim().is_empty() {
            errors.push("device: plant_variety is empty".to_string());
        }
        if !(PERCENT_MIN..=PERCENT_MAX).contains(&d.moisture_threshold) {
            errors.push(format!(
                "device: moisture_threshold {} out of range [0, 100]",
                d.moisture_threshold
            ));
        }
        if d.sample_interval_sec == 0 {
            errors.push("device: sample_interval_sec must be positive".to_string());
        }
    }

    fn validate_mqtt(&self, errors: &mut Vec<String>) {
        if self.mqtt.host.trim().is_empty() {
            errors.push("mqtt: host is empty".to_string());
        }
        if self.mqtt.port == 0 {
            errors.push("mqtt: port must be nonzero".to_string());
        }
    }

    fn validate_storage(&self, errors: &mut Vec<String>) {
        if self.storage.data_dir.trim().is_empty() {
            errors.push("storage: data_dir is empty".to_string());
        }
    }

    fn validate_habitats(&self, errors: &mut Vec<String>) {
        let mut seen: HashSet<(String, String)> = HashSet::new();

        for (i, h) in self.habitats.iter().enumerate() {
            let ctx = || {
                if h.plant_name.is_empty() {
                    format!("habitats[{i}]")
                } else {
                    format!("habitat '{} {}'", h.plant_name, h.plant_variety)
                }
            };

            // ── Identity ────────────────────────────────────────
            if h.plant_name.trim().is_empty() {
                errors.push(format!("{}: plant_name is empty", ctx()));
            } else if !seen.insert((h.plant_name.clone(), h.plant_variety.clone())) {
                errors.push(format!("{}: duplicate plant_name/plant_variety", ctx()));
            }

            // ── Range sanity ────────────────────────────────────
            let mut check_range = |label: &str, range: &[f32; 2], lo: f32, hi: f32| {
                let [min, max] = *range;
                if min >= max {
                    errors.push(format!(
                        "{}: {label} range [{min}, {max}] has min >= max",
                        ctx()
                    ));
                }
                if min < lo || max > hi {
                    errors.push(format!(
                        "{}: {label} range [{min}, {max}] outside [{lo}, {hi}]",
                        ctx()
                    ));
                }
            };

            check_range("temperature", &h.temperature, TEMP_MIN, TEMP_MAX);
            check_range("humidity", &h.humidity, PERCENT_MIN, PERCENT_MAX);
            check_range("soil_moisture", &h.soil_moisture, PERCENT_MIN, PERCENT_MAX);
            check_range("light_level", &h.light_level, PERCENT_MIN, PERCENT_MAX);
        }
    }
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

/// Read, parse, and validate a TOML config file.
pub fn load(path: &str) -> Result<Config> {
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("failed to read config: {path}"))?;
    let config: Config =
        toml::from_str(&contents).with_context(|| format!("failed to parse config: {path}"))?;
    config
        .validate()
        .with_context(|| format!("invalid config: {path}"))?;
    Ok(config)
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // -- Helper: build a valid baseline config that passes validation ------

    fn valid_habitat() -> HabitatEntry {
        HabitatEntry {
            plant_name: "ficus".into(),
            plant_variety: "lyrata".into(),
            temperature: [18.0, 27.0],
            humidity: [40.0, 65.0],
            soil_moisture: [35.0, 70.0],
            light_level: [40.0, 80.0],
            native_region: "West Africa".into(),
            growing_season: "spring-summer".into(),
        }
    }

    fn valid_config() -> Config {
        Config {
            device: DeviceSection {
                plant_name: "ficus".into(),
                plant_variety: "lyrata".into(),
                moisture_threshold: 30.0,
                sample_interval_sec: 3600,
            },
            mqtt: MqttSection {
                host: "127.0.0.1".into(),
                port: 1883,
            },
            storage: StorageSection {
                data_dir: "data".into(),
            },
            habitats: vec![valid_habitat()],
        }
    }

    /// Assert validation fails and the error message contains `needle`.
    fn assert_validation_err(cfg: &Config, needle: &str) {
        let err = cfg.validate().unwrap_err();
        let msg = format!("{err:#}");
        assert!(
            msg.contains(needle),
            "expected error containing {needle:?}, got: {msg}"
        );
    }

    // -- Parsing ----------------------------------------------------------

    #[test]
    fn parse_full_config() {
        let toml_str = r#"
[device]
plant_name = "ficus"
plant_variety = "lyrata"
moisture_threshold = 30.0
sample_interval_sec = 3600

[mqtt]
host = "127.0.0.1"
port = 1883

[storage]
data_dir = "data"

[[habitats]]
plant_name = "ficus"
plant_variety = "lyrata"
temperature = [18.0, 27.0]
humidity = [40.0, 65.0]
soil_moisture = [35.0, 70.0]
light_level = [40.0, 80.0]
native_region = "West Africa"
growing_season = "spring-summer"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.device.plant_name, "ficus");
        assert_eq!(config.mqtt.port, 1883);
        assert_eq!(config.habitats.len(), 1);
        assert_eq!(config.habitats[0].temperature, [18.0, 27.0]);
        config.validate().unwrap();
    }

    #[test]
    fn habitats_are_optional() {
        let toml_str = r#"
[device]
plant_name = "ficus"
plant_variety = "lyrata"
moisture_threshold = 30.0
sample_interval_sec = 3600

[mqtt]
host = "broker.local"
port = 1883

[storage]
data_dir = "data"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert!(config.habitats.is_empty());
        config.validate().unwrap();
    }

    // -- Validation: valid configs pass -----------------------------------

    #[test]
    fn valid_config_passes() {
        valid_config().validate().unwrap();
    }

    // -- Device section ---------------------------------------------------

    #[test]
    fn empty_plant_name_rejected() {
        let mut cfg = valid_config();
        cfg.device.plant_name = " ".into();
        assert_validation_err(&cfg, "plant_name is empty");
    }

    #[test]
    fn empty_plant_variety_rejected() {
        let mut cfg = valid_config();
        cfg.device.plant_variety = "".into();
        assert_validation_err(&cfg, "plant_variety is empty");
    }

    #[test]
    fn threshold_out_of_range_rejected() {
        let mut cfg = valid_config();
        cfg.device.moisture_threshold = 101.0;
        assert_validation_err(&cfg, "moisture_threshold");

        let mut cfg = valid_config();
        cfg.device.moisture_threshold = -0.1;
        assert_validation_err(&cfg, "moisture_threshold");
    }

    #[test]
    fn zero_sample_interval_rejected() {
        let mut cfg = valid_config();
        cfg.device.sample_interval_sec = 0;
        assert_validation_err(&cfg, "sample_interval_sec must be positive");
    }

    // -- MQTT / storage sections ------------------------------------------

    #[test]
    fn empty_mqtt_host_rejected() {
        let mut cfg = valid_config();
        cfg.mqtt.host = "".into();
        assert_validation_err(&cfg, "host is empty");
    }

    #[test]
    fn zero_mqtt_port_rejected() {
        let mut cfg = valid_config();
        cfg.mqtt.port = 0;
        assert_validation_err(&cfg, "port must be nonzero");
    }

    #[test]
    fn empty_data_dir_rejected() {
        let mut cfg = valid_config();
        cfg.storage.data_dir = "  ".into();
        assert_validation_err(&cfg, "data_dir is empty");
    }

    // -- Habitat catalog --------------------------------------------------

    #[test]
    fn duplicate_habitat_rejected() {
        let mut cfg = valid_config();
        cfg.habitats.push(valid_habitat());
        assert_validation_err(&cfg, "duplicate plant_name/plant_variety");
    }

    #[test]
    fn same_name_different_variety_allowed() {
        let mut cfg = valid_config();
        cfg.habitats.push(HabitatEntry {
            plant_variety: "benjamina".into(),
            ..valid_habitat()
        });
        cfg.validate().unwrap();
    }

    #[test]
    fn inverted_range_rejected() {
        let mut cfg = valid_config();
        cfg.habitats[0].humidity = [65.0, 40.0];
        assert_validation_err(&cfg, "humidity range [65, 40] has min >= max");
    }

    #[test]
    fn percent_range_out_of_bounds_rejected() {
        let mut cfg = valid_config();
        cfg.habitats[0].light_level = [40.0, 120.0];
        assert_validation_err(&cfg, "light_level range [40, 120] outside [0, 100]");
    }

    #[test]
    fn implausible_temperature_rejected() {
        let mut cfg = valid_config();
        cfg.habitats[0].temperature = [18.0, 90.0];
        assert_validation_err(&cfg, "temperature range");
    }

    #[test]
    fn empty_habitat_name_rejected() {
        let mut cfg = valid_config();
        cfg.habitats[0].plant_name = "".into();
        assert_validation_err(&cfg, "habitats[0]: plant_name is empty");
    }

    // -- Multiple errors reported at once ---------------------------------

    #[test]
    fn multiple_errors_collected() {
        let mut cfg = valid_config();
        cfg.device.plant_name = "".into();
        cfg.device.sample_interval_sec = 0;
        cfg.mqtt.host = "".into();
        cfg.habitats[0].soil_moisture = [70.0, 35.0];

        let err = cfg.validate().unwrap_err();
        let msg = format!("{err:#}");
        // Should report every violation, not bail after the first
        assert!(msg.contains("plant_name is empty"), "in: {msg}");
        assert!(msg.contains("sample_interval_sec"), "in: {msg}");
        assert!(msg.contains("host is empty"), "in: {msg}");
        assert!(msg.contains("soil_moisture"), "in: {msg}");
    }
}
