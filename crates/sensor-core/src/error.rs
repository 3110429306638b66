use crate::ids::{SensorId, SensorType};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SensorError {
    #[error("required upstream sensor {0:?} is not available")]
    MissingDependency(SensorType),
    #[error("missing config key `{key}` for {sensor_type:?} model `{model}`")]
    MissingConfig {
        sensor_type: SensorType,
        model: String,
        key: String,
    },
    #[error("HAL device `{device}` failed to {operation}")]
    Hal {
        device: String,
        operation: &'static str,
    },
    #[error("no data available yet")]
    NoData,
    #[error("event type {0:#x} is not produced by this sensor")]
    UnsupportedEvent(u32),
    #[error("no sensor registered with id {0}")]
    InvalidSensor(SensorId),
}
