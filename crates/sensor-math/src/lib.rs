//! # Sensor Math
//!
//! Deterministic single-precision numeric primitives for the sensor pipeline:
//! fixed-size vectors and matrices, rotation quaternions and Euler angles.
//! Every operation is a pure function of its inputs.

pub mod euler;
pub mod matrix;
pub mod quaternion;
pub mod vector;

pub use euler::{EulerAngles, deg2rad, rad2deg};
pub use matrix::{Matrix, Matrix3};
pub use quaternion::Quaternion;
pub use vector::{Vector, Vector3};

/// Standard gravity in m/s².
pub const GRAVITY: f32 = 9.80665;
