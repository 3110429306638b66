//! Per-model calibration constants, keyed by sensor type and hardware model.

use crate::error::SensorError;
use crate::ids::SensorType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

fn unit() -> f32 {
    1.0
}

/// One `[[sensor]]` entry of the hub configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(rename = "type")]
    pub sensor_type: SensorType,
    pub model: String,
    #[serde(default)]
    pub vendor: String,
    /// Multiplier applied to raw device values.
    #[serde(default = "unit")]
    pub raw_data_unit: f32,
    /// Default sampling interval in milliseconds.
    #[serde(default)]
    pub default_sampling_time: Option<u32>,
    #[serde(default)]
    pub values: BTreeMap<String, f32>,
}

impl ModelConfig {
    pub fn new(sensor_type: SensorType, model: &str, vendor: &str) -> Self {
        Self {
            sensor_type,
            model: model.to_string(),
            vendor: vendor.to_string(),
            raw_data_unit: 1.0,
            default_sampling_time: None,
            values: BTreeMap::new(),
        }
    }

    pub fn with_sampling_time(mut self, ms: u32) -> Self {
        self.default_sampling_time = Some(ms);
        self
    }

    pub fn with_value(mut self, key: &str, value: f32) -> Self {
        self.values.insert(key.to_string(), value);
        self
    }

    fn missing(&self, key: &str) -> SensorError {
        SensorError::MissingConfig {
            sensor_type: self.sensor_type,
            model: self.model.clone(),
            key: key.to_string(),
        }
    }

    pub fn require_value(&self, key: &str) -> Result<f32, SensorError> {
        self.values.get(key).copied().ok_or_else(|| self.missing(key))
    }

    pub fn require_sampling_time(&self) -> Result<u32, SensorError> {
        self.default_sampling_time
            .ok_or_else(|| self.missing("default_sampling_time"))
    }
}

/// All model entries loaded from configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceConfig {
    pub entries: Vec<ModelConfig>,
}

impl DeviceConfig {
    pub fn find(&self, sensor_type: SensorType, model: &str) -> Option<&ModelConfig> {
        self.entries
            .iter()
            .find(|e| e.sensor_type == sensor_type && e.model == model)
    }

    /// Like [`DeviceConfig::find`] but fails closed when the entry is absent.
    pub fn require(&self, sensor_type: SensorType, model: &str) -> Result<&ModelConfig, SensorError> {
        self.find(sensor_type, model)
            .ok_or_else(|| SensorError::MissingConfig {
                sensor_type,
                model: model.to_string(),
                key: "model entry".to_string(),
            })
    }

    /// Inserts or replaces the entry for the same `(type, model)` key.
    pub fn upsert(&mut self, entry: ModelConfig) {
        self.entries
            .retain(|e| !(e.sensor_type == entry.sensor_type && e.model == entry.model));
        self.entries.push(entry);
    }
}
