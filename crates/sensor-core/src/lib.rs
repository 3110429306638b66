//! # Sensor Core
//!
//! This crate provides the core data structures shared by every part of the
//! sensor hub. It defines the immutable `Sample` produced by one reading, the
//! `Event` that carries a sample through the dispatcher, the id encodings, the
//! HAL device contract and the `Sensor` / `VirtualSensor` capability traits.

pub mod activation;
pub mod config;
pub mod error;
pub mod hal;
pub mod ids;
pub mod physical;
pub mod sensor;

pub use activation::{Activation, ActiveSensors, IntervalChange, IntervalOrigin};
pub use config::{DeviceConfig, ModelConfig};
pub use error::SensorError;
pub use hal::{HalDevice, SensorProperties};
pub use ids::{
    CHANGE_STATE_EVENT, ClientId, EventType, RAW_DATA_EVENT, SensorId, SensorType,
};
pub use physical::PhysicalSensor;
pub use sensor::{Sensor, SensorHandle, VirtualSensor};

use serde::{Deserialize, Serialize};

/// Maximum number of values a single sample can carry.
pub const MAX_VALUE_COUNT: usize = 16;

/// Quality of a reading as reported by the device or the synthesizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum Accuracy {
    Undefined = -1,
    Bad = 0,
    Normal = 1,
    Good = 2,
    VeryGood = 3,
}

impl Accuracy {
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            -1 => Some(Accuracy::Undefined),
            0 => Some(Accuracy::Bad),
            1 => Some(Accuracy::Normal),
            2 => Some(Accuracy::Good),
            3 => Some(Accuracy::VeryGood),
            _ => None,
        }
    }
}

/// One reading. Timestamps are monotonic microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: u64,
    pub accuracy: Accuracy,
    values: [f32; MAX_VALUE_COUNT],
    value_count: usize,
}

impl Sample {
    /// Builds a sample from `values`; anything past [`MAX_VALUE_COUNT`] is dropped.
    pub fn new(timestamp: u64, accuracy: Accuracy, values: &[f32]) -> Self {
        let value_count = values.len().min(MAX_VALUE_COUNT);
        let mut buf = [0.0; MAX_VALUE_COUNT];
        buf[..value_count].copy_from_slice(&values[..value_count]);
        Self {
            timestamp,
            accuracy,
            values: buf,
            value_count,
        }
    }

    pub fn values(&self) -> &[f32] {
        &self.values[..self.value_count]
    }

    pub fn value_count(&self) -> usize {
        self.value_count
    }

    /// First three values, zero-padded.
    pub fn xyz(&self) -> [f32; 3] {
        let mut out = [0.0; 3];
        for (dst, src) in out.iter_mut().zip(self.values()) {
            *dst = *src;
        }
        out
    }

    /// Copy of this sample with the values replaced.
    pub fn with_values(&self, values: &[f32]) -> Self {
        Self::new(self.timestamp, self.accuracy, values)
    }
}

/// A sample tagged with its producer and stream.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub sensor_id: SensorId,
    pub event_type: EventType,
    pub data: Sample,
}

impl Event {
    pub fn new(sensor_id: SensorId, event_type: EventType, data: Sample) -> Self {
        Self {
            sensor_id,
            event_type,
            data,
        }
    }

    pub fn timestamp(&self) -> u64 {
        self.data.timestamp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_keeps_value_count() {
        let s = Sample::new(12345, Accuracy::Good, &[1.0, 2.0, 3.0]);
        assert_eq!(s.timestamp, 12345);
        assert_eq!(s.accuracy, Accuracy::Good);
        assert_eq!(s.values(), &[1.0, 2.0, 3.0]);
        assert_eq!(s.value_count(), 3);
        assert_eq!(s.xyz(), [1.0, 2.0, 3.0]);
    }

    #[test]
    fn sample_truncates_oversized_input() {
        let values: Vec<f32> = (0..20).map(|v| v as f32).collect();
        let s = Sample::new(0, Accuracy::Normal, &values);
        assert_eq!(s.value_count(), MAX_VALUE_COUNT);
        assert_eq!(s.values()[15], 15.0);
    }

    #[test]
    fn short_sample_pads_xyz() {
        let s = Sample::new(0, Accuracy::Normal, &[5.0]);
        assert_eq!(s.xyz(), [5.0, 0.0, 0.0]);
    }

    #[test]
    fn accuracy_from_raw() {
        assert_eq!(Accuracy::from_raw(-1), Some(Accuracy::Undefined));
        assert_eq!(Accuracy::from_raw(3), Some(Accuracy::VeryGood));
        assert_eq!(Accuracy::from_raw(4), None);
        assert!(Accuracy::Bad < Accuracy::Good);
    }

    #[test]
    fn event_exposes_timestamp() {
        let id = SensorId::new(SensorType::Accelerometer, 0);
        let ev = Event::new(
            id,
            SensorType::Accelerometer.raw_event(),
            Sample::new(42, Accuracy::Normal, &[0.0, 0.0, 9.8]),
        );
        assert_eq!(ev.timestamp(), 42);
        assert_eq!(ev.sensor_id.sensor_type(), Some(SensorType::Accelerometer));
    }
}
