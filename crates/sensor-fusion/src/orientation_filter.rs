//! # Orientation Filter
//!
//! Kalman-style blend of a gyro-integrated attitude with the attitude measured
//! from gravity (and magnetic north when available).
//!
//! The prediction step integrates the gyro rate onto the previous output and
//! grows the attitude variance with the elapsed time. The correction step pulls
//! the prediction towards the measured attitude with gain
//! `K = P / (P + R)` and shrinks the variance to `(1 - K) P`.

use sensor_math::{Matrix3, Quaternion, Vector3};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Upper bound for the attitude variance.
const MAX_VARIANCE: f32 = 10.0;
/// Lower bound for the attitude variance, prevents over-confidence.
const MIN_VARIANCE: f32 = 1e-6;
/// Gyro gaps longer than this are not integrated in one step.
const MAX_GYRO_DT: f32 = 1.0;
/// Minimum sine of the angle between gravity and the magnetic field.
const MIN_EAST_NORM: f32 = 0.05;

/// Filter tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilterParams {
    /// Attitude variance added per second of gyro integration.
    pub gyro_noise: f32,
    /// Variance of the gravity/magnetic attitude measurement.
    pub measurement_noise: f32,
}

impl Default for FilterParams {
    fn default() -> Self {
        Self {
            gyro_noise: 0.5,
            measurement_noise: 5.0,
        }
    }
}

/// One calibrated reading: accel in m/s², gyro in rad/s, magnetic field in µT.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub vector: Vector3,
    pub timestamp: u64,
}

impl Reading {
    pub fn new(vector: Vector3, timestamp: u64) -> Self {
        Self { vector, timestamp }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterOutput {
    pub quaternion: Quaternion,
    /// Latest timestamp among the contributing readings.
    pub timestamp: u64,
}

/// Rotation matrix whose rows are east, north and up in device coordinates.
///
/// Returns `None` when the field is (nearly) parallel to gravity and east is
/// undefined.
pub fn rotation_from_gravity_and_magnetic(accel: Vector3, mag: Vector3) -> Option<Matrix3> {
    let up = accel.normalize()?;
    let field = mag.normalize()?;
    let east = field.cross(&up);
    if east.norm() < MIN_EAST_NORM {
        return None;
    }
    let east = east.normalize()?;
    let north = up.cross(&east);
    Some(Matrix3::from_rows([east, north, up]))
}

/// Attitude with roll and pitch taken from gravity and the given azimuth.
pub fn tilt_quaternion(accel: Vector3, azimuth: f32) -> Option<Quaternion> {
    let up = accel.normalize()?;
    let roll = up.y().atan2(up.z());
    let pitch = (-up.x()).atan2((up.y() * up.y() + up.z() * up.z()).sqrt());
    Some(Quaternion::from_euler(&sensor_math::EulerAngles::new(
        roll, pitch, azimuth,
    )))
}

/// Not thread-safe; the fusion accumulator owns exactly one.
#[derive(Debug, Clone)]
pub struct OrientationFilter {
    params: FilterParams,
    quaternion: Quaternion,
    variance: f32,
    last_gyro_timestamp: Option<u64>,
    initialized: bool,
}

impl OrientationFilter {
    pub fn new(params: FilterParams) -> Self {
        Self {
            params,
            quaternion: Quaternion::IDENTITY,
            variance: MAX_VARIANCE,
            last_gyro_timestamp: None,
            initialized: false,
        }
    }

    /// Previous output, the integration base for the next gyro step.
    pub fn quaternion(&self) -> Quaternion {
        self.quaternion
    }

    pub fn variance(&self) -> f32 {
        self.variance
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Integrates `gyro` onto the previous output and propagates the variance.
    pub fn predict(&mut self, gyro: &Reading) -> Quaternion {
        let dt = self
            .last_gyro_timestamp
            .map(|last| gyro.timestamp.saturating_sub(last) as f32 * 1e-6)
            .unwrap_or(0.0)
            .min(MAX_GYRO_DT);
        self.last_gyro_timestamp = Some(gyro.timestamp);
        self.variance = (self.variance + self.params.gyro_noise * dt).min(MAX_VARIANCE);
        self.quaternion.integrate(gyro.vector, dt)
    }

    /// Blends `predicted` towards `measured` and shrinks the variance.
    pub fn correct(&mut self, predicted: Quaternion, measured: Quaternion) -> Quaternion {
        let innovation_variance = self.variance + self.params.measurement_noise;
        if innovation_variance <= 0.0 {
            return predicted;
        }
        let gain = self.variance / innovation_variance;
        self.variance = ((1.0 - gain) * self.variance).max(MIN_VARIANCE);
        predicted.nlerp(&measured, gain)
    }

    /// Runs one estimation step. `None` means the geometry was degenerate and
    /// the previous output is left untouched.
    pub fn update(
        &mut self,
        accel: &Reading,
        gyro: Option<&Reading>,
        mag: Option<&Reading>,
    ) -> Option<FilterOutput> {
        if accel.vector.normalize().is_none() {
            debug!("zero gravity vector, skipping orientation update");
            return None;
        }
        let measured_rotation = match mag {
            Some(m) => match rotation_from_gravity_and_magnetic(accel.vector, m.vector) {
                Some(r) => Some(r),
                None => {
                    debug!("magnetic field parallel to gravity, skipping orientation update");
                    return None;
                }
            },
            None => None,
        };

        let predicted = match gyro {
            Some(g) if self.initialized => Some(self.predict(g)),
            Some(g) => {
                self.last_gyro_timestamp = Some(g.timestamp);
                None
            }
            None => None,
        };

        let measured = match measured_rotation {
            Some(r) => Quaternion::from_rotation_matrix(&r),
            None => {
                let heading = predicted.unwrap_or(self.quaternion).to_euler().azimuth;
                tilt_quaternion(accel.vector, heading)?
            }
        };

        let estimate = match predicted {
            Some(p) => self.correct(p, measured),
            None => measured,
        };
        self.quaternion = estimate.normalize().unwrap_or(estimate);
        self.initialized = true;

        let timestamp = [Some(accel), gyro, mag]
            .into_iter()
            .flatten()
            .map(|r| r.timestamp)
            .max()
            .unwrap_or(accel.timestamp);
        Some(FilterOutput {
            quaternion: self.quaternion,
            timestamp,
        })
    }
}

impl Default for OrientationFilter {
    fn default() -> Self {
        Self::new(FilterParams::default())
    }
}
