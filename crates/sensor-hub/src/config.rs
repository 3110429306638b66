//! Hub configuration, loaded from TOML.
//!
//! ```toml
//! model_id = "default"
//!
//! [dispatcher]
//! record_event_types = ["AUTO_ROTATION", "PROXIMITY"]
//! max_batch_events = 64
//! default_poll_interval_ms = 100
//!
//! [fusion]
//! mode = "accel_gyro_mag"
//! stale_timeout_ms = 500
//!
//! [[sensor]]
//! type = "TILT"
//! model = "default"
//! values = { pitch_rotation_compensation = 1.0, roll_rotation_compensation = 1.0, output_degrees = 0.0 }
//! ```
//!
//! Model entries the file does not mention are filled from the built-in set
//! for the configured `model_id`.

use anyhow::{Context, Result};
use sensor_core::{DeviceConfig, ModelConfig, SensorType};
use sensor_fusion::FusionConfig;
use sensor_virtual::{orientation, tilt};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

const DEFAULT_MODEL: &str = "default";
const BUILTIN_VENDOR: &str = "generic";
const DEFAULT_SAMPLING_TIME_MS: u32 = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Sensor types whose CHANGE_STATE event is cached for late joiners.
    pub record_event_types: Vec<SensorType>,
    /// A batched client is flushed once this many frames are pending.
    pub max_batch_events: usize,
    /// Poll period of a started physical sensor no one requested a rate for.
    pub default_poll_interval_ms: u32,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            record_event_types: vec![SensorType::AutoRotation, SensorType::Proximity],
            max_batch_events: 64,
            default_poll_interval_ms: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    pub model_id: String,
    pub dispatcher: DispatcherConfig,
    pub fusion: FusionConfig,
    #[serde(rename = "sensor")]
    pub sensors: DeviceConfig,
}

impl Default for HubConfig {
    fn default() -> Self {
        let mut config = Self {
            model_id: DEFAULT_MODEL.to_string(),
            dispatcher: DispatcherConfig::default(),
            fusion: FusionConfig::default(),
            sensors: DeviceConfig::default(),
        };
        config.fill_model_defaults();
        config
    }
}

impl HubConfig {
    /// Adds the built-in entry for every virtual sensor the configuration
    /// does not already describe for `model_id`.
    pub fn fill_model_defaults(&mut self) {
        for entry in builtin_model_entries(&self.model_id) {
            if self.sensors.find(entry.sensor_type, &entry.model).is_none() {
                self.sensors.entries.push(entry);
            }
        }
    }
}

/// Calibration entries that let every stock virtual sensor start.
pub fn builtin_model_entries(model: &str) -> Vec<ModelConfig> {
    let entry = |sensor_type| ModelConfig::new(sensor_type, model, BUILTIN_VENDOR);
    vec![
        entry(SensorType::RotationVector).with_sampling_time(DEFAULT_SAMPLING_TIME_MS),
        entry(SensorType::Gravity).with_sampling_time(DEFAULT_SAMPLING_TIME_MS),
        entry(SensorType::LinearAcceleration).with_sampling_time(DEFAULT_SAMPLING_TIME_MS),
        entry(SensorType::Orientation)
            .with_value(orientation::AZIMUTH_COMPENSATION, 1.0)
            .with_value(orientation::PITCH_COMPENSATION, -1.0)
            .with_value(orientation::ROLL_COMPENSATION, 1.0),
        entry(SensorType::Tilt)
            .with_value(orientation::PITCH_COMPENSATION, 1.0)
            .with_value(orientation::ROLL_COMPENSATION, 1.0)
            .with_value(tilt::OUTPUT_DEGREES, 1.0),
    ]
}

/// Load config from disk, or return defaults if not found.
pub fn load_config(path: &Path) -> Result<HubConfig> {
    if path.exists() {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let mut config: HubConfig =
            toml::from_str(&contents).with_context(|| format!("parsing {}", path.display()))?;
        config.fill_model_defaults();
        info!(?path, "Loaded config");
        Ok(config)
    } else {
        info!(?path, "No config found, using defaults");
        Ok(HubConfig::default())
    }
}

/// Save config to disk.
pub fn save_config(path: &Path, config: &HubConfig) -> Result<()> {
    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    info!(?path, "Saved config");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sensor_fusion::FusionMode;

    #[test]
    fn defaults_cover_every_required_key() {
        let config = HubConfig::default();
        let entries = &config.sensors;
        for t in [SensorType::RotationVector, SensorType::Gravity, SensorType::LinearAcceleration] {
            assert_eq!(
                entries.require(t, "default").unwrap().require_sampling_time(),
                Ok(DEFAULT_SAMPLING_TIME_MS)
            );
        }
        let orientation = entries.require(SensorType::Orientation, "default").unwrap();
        assert_eq!(orientation.require_value(orientation::PITCH_COMPENSATION), Ok(-1.0));
        assert_eq!(config.dispatcher.max_batch_events, 64);
        assert_eq!(
            config.dispatcher.record_event_types,
            vec![SensorType::AutoRotation, SensorType::Proximity]
        );
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let text = r#"
            model_id = "tm1"

            [dispatcher]
            max_batch_events = 8

            [fusion]
            mode = "accel_gyro"
            stale_timeout_ms = 0

            [[sensor]]
            type = "TILT"
            model = "tm1"
            vendor = "acme"
            values = { pitch_rotation_compensation = -1.0, roll_rotation_compensation = 1.0, output_degrees = 0.0 }
        "#;
        let mut config: HubConfig = toml::from_str(text).unwrap();
        config.fill_model_defaults();

        assert_eq!(config.dispatcher.max_batch_events, 8);
        assert_eq!(config.dispatcher.default_poll_interval_ms, 100);
        assert_eq!(config.fusion.mode, FusionMode::AccelGyro);
        assert_eq!(config.fusion.stale_timeout_ms, 0);

        let tilt_entry = config.sensors.require(SensorType::Tilt, "tm1").unwrap();
        assert_eq!(tilt_entry.vendor, "acme");
        assert_eq!(tilt_entry.require_value(orientation::PITCH_COMPENSATION), Ok(-1.0));
        assert!(config.sensors.find(SensorType::Gravity, "tm1").is_some());
    }
}
