//! # Sensor Fusion
//!
//! Stateful accumulator that collects the latest accelerometer, gyroscope and
//! magnetometer samples and runs the orientation filter once the configured
//! set of inputs has been refreshed.
//!
//! ```text
//! EMPTY --push--> PARTIAL(bits) --all required bits--> READY --compute--> EMPTY
//! ```

pub mod orientation_filter;

pub use orientation_filter::{FilterOutput, FilterParams, OrientationFilter, Reading};

use sensor_core::{Accuracy, Sample, SensorType};
use sensor_math::{Quaternion, Vector3};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub const ACCEL: u8 = 0x1;
pub const GYRO: u8 = 0x2;
pub const MAG: u8 = 0x4;

/// Which inputs must all be refreshed before an orientation is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FusionMode {
    AccelGyroMag,
    AccelGyro,
    AccelMag,
}

impl FusionMode {
    pub fn required(self) -> u8 {
        match self {
            FusionMode::AccelGyroMag => ACCEL | GYRO | MAG,
            FusionMode::AccelGyro => ACCEL | GYRO,
            FusionMode::AccelMag => ACCEL | MAG,
        }
    }

    pub fn inputs(self) -> &'static [SensorType] {
        match self {
            FusionMode::AccelGyroMag => &[
                SensorType::Accelerometer,
                SensorType::Gyroscope,
                SensorType::Magnetic,
            ],
            FusionMode::AccelGyro => &[SensorType::Accelerometer, SensorType::Gyroscope],
            FusionMode::AccelMag => &[SensorType::Accelerometer, SensorType::Magnetic],
        }
    }
}

/// Per-input correction: `(raw - bias) * sign * scale`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AxisCalibration {
    pub bias: [f32; 3],
    pub sign: [f32; 3],
    pub scale: f32,
}

impl Default for AxisCalibration {
    fn default() -> Self {
        Self {
            bias: [0.0; 3],
            sign: [1.0; 3],
            scale: 1.0,
        }
    }
}

impl AxisCalibration {
    pub fn apply(&self, raw: [f32; 3]) -> Vector3 {
        (Vector3::new(raw) - Vector3::new(self.bias)).component_mul(&Vector3::new(self.sign)) * self.scale
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    pub mode: FusionMode,
    /// Buffered inputs older than this, relative to the newest input, are
    /// discarded. Zero disables the check.
    pub stale_timeout_ms: u64,
    pub gyro_noise: f32,
    pub measurement_noise: f32,
    pub accel: AxisCalibration,
    pub gyro: AxisCalibration,
    pub mag: AxisCalibration,
}

impl Default for FusionConfig {
    fn default() -> Self {
        let params = FilterParams::default();
        Self {
            mode: FusionMode::AccelGyroMag,
            stale_timeout_ms: 500,
            gyro_noise: params.gyro_noise,
            measurement_noise: params.measurement_noise,
            accel: AxisCalibration::default(),
            gyro: AxisCalibration::default(),
            mag: AxisCalibration::default(),
        }
    }
}

impl FusionConfig {
    pub fn filter_params(&self) -> FilterParams {
        FilterParams {
            gyro_noise: self.gyro_noise,
            measurement_noise: self.measurement_noise,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FusionError {
    #[error("no orientation has been computed yet")]
    NotReady,
}

/// Last computed orientation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Attitude {
    pub quaternion: Quaternion,
    pub timestamp: u64,
    pub accuracy: Accuracy,
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    reading: Reading,
    accuracy: Accuracy,
}

#[derive(Debug, Clone)]
pub struct FusionAccumulator {
    config: FusionConfig,
    filter: OrientationFilter,
    accel: Option<Slot>,
    gyro: Option<Slot>,
    mag: Option<Slot>,
    ready: u8,
    orientation: Quaternion,
    accuracy: Accuracy,
    /// Zero until the first orientation is computed.
    last_output_timestamp: u64,
}

impl FusionAccumulator {
    pub fn new(config: FusionConfig) -> Self {
        Self {
            filter: OrientationFilter::new(config.filter_params()),
            config,
            accel: None,
            gyro: None,
            mag: None,
            ready: 0,
            orientation: Quaternion::IDENTITY,
            accuracy: Accuracy::Undefined,
            last_output_timestamp: 0,
        }
    }

    pub fn mode(&self) -> FusionMode {
        self.config.mode
    }

    /// Readiness bits collected since the last compute.
    pub fn pending(&self) -> u8 {
        self.ready
    }

    /// Stores a calibrated accelerometer sample and tries to compute.
    /// Returns whether a new orientation was produced.
    pub fn push_accel(&mut self, sample: &Sample) -> bool {
        let slot = self.calibrated(&self.config.accel, sample);
        self.store(ACCEL, slot);
        self.get_orientation()
    }

    pub fn push_gyro(&mut self, sample: &Sample) -> bool {
        let slot = self.calibrated(&self.config.gyro, sample);
        self.store(GYRO, slot);
        self.get_orientation()
    }

    pub fn push_mag(&mut self, sample: &Sample) -> bool {
        let slot = self.calibrated(&self.config.mag, sample);
        self.store(MAG, slot);
        self.get_orientation()
    }

    /// Computes an orientation if every required input is present, then
    /// returns to the empty state. A degenerate filter step keeps the previous
    /// orientation.
    pub fn get_orientation(&mut self) -> bool {
        let required = self.config.mode.required();
        if self.ready & required != required {
            return false;
        }
        let Some(accel) = self.accel else {
            return false;
        };
        let gyro = self.gyro.filter(|_| required & GYRO != 0);
        let mag = self.mag.filter(|_| required & MAG != 0);

        let output = self.filter.update(
            &accel.reading,
            gyro.as_ref().map(|s| &s.reading),
            mag.as_ref().map(|s| &s.reading),
        );
        let updated = match output {
            Some(out) => {
                self.orientation = out.quaternion;
                self.last_output_timestamp = out.timestamp;
                self.accuracy = [Some(accel), gyro, mag]
                    .into_iter()
                    .flatten()
                    .map(|s| s.accuracy)
                    .min()
                    .unwrap_or(Accuracy::Undefined);
                true
            }
            None => false,
        };

        self.accel = None;
        self.gyro = None;
        self.mag = None;
        self.ready = 0;
        updated
    }

    pub fn get_rv(&self) -> Result<Attitude, FusionError> {
        if self.last_output_timestamp == 0 {
            return Err(FusionError::NotReady);
        }
        Ok(Attitude {
            quaternion: self.orientation,
            timestamp: self.last_output_timestamp,
            accuracy: self.accuracy,
        })
    }

    fn calibrated(&self, calibration: &AxisCalibration, sample: &Sample) -> Slot {
        Slot {
            reading: Reading::new(calibration.apply(sample.xyz()), sample.timestamp),
            accuracy: sample.accuracy,
        }
    }

    fn store(&mut self, bit: u8, slot: Slot) {
        self.drop_stale(slot.reading.timestamp);
        match bit {
            ACCEL => self.accel = Some(slot),
            GYRO => self.gyro = Some(slot),
            _ => self.mag = Some(slot),
        }
        self.ready |= bit;
    }

    fn drop_stale(&mut self, newest: u64) {
        if self.config.stale_timeout_ms == 0 {
            return;
        }
        let timeout_us = self.config.stale_timeout_ms * 1000;
        let slots = [
            (ACCEL, &mut self.accel),
            (GYRO, &mut self.gyro),
            (MAG, &mut self.mag),
        ];
        for (bit, slot) in slots {
            let stale = slot
                .as_ref()
                .is_some_and(|s| s.reading.timestamp + timeout_us < newest);
            if stale {
                debug!(input = bit, newest, "discarding stale fusion input");
                *slot = None;
                self.ready &= !bit;
            }
        }
    }
}
