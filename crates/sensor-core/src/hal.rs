//! Contract implemented by device drivers below the physical sensors.

use crate::error::SensorError;
use crate::ids::SensorType;
use crate::Sample;
use serde::{Deserialize, Serialize};

/// Static description of a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorProperties {
    pub name: String,
    pub vendor: String,
    pub min_range: f32,
    pub max_range: f32,
    pub resolution: f32,
    /// Fastest supported sampling interval in milliseconds.
    pub min_interval: u32,
}

impl SensorProperties {
    /// Properties for a sensor with no backing device.
    pub fn synthetic(name: &str, vendor: &str, min_range: f32, max_range: f32) -> Self {
        Self {
            name: name.to_string(),
            vendor: vendor.to_string(),
            min_range,
            max_range,
            resolution: 0.0,
            min_interval: 1,
        }
    }
}

/// A single hardware device. Calls are serialized by the owning
/// [`PhysicalSensor`](crate::PhysicalSensor).
///
/// Boolean results mirror the driver convention: `false` means the
/// operation failed and the caller logs and retries on the next cycle.
pub trait HalDevice: Send {
    fn sensor_type(&self) -> SensorType;
    fn get_properties(&self) -> SensorProperties;
    fn enable(&mut self) -> bool;
    fn disable(&mut self) -> bool;
    fn set_interval(&mut self, interval_ms: u32) -> bool;
    fn is_data_ready(&mut self) -> bool;
    fn get_sensor_data(&mut self) -> Result<Sample, SensorError>;
}
