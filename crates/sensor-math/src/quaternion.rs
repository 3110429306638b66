//! Rotation quaternions and their conversions.
//!
//! A quaternion here always describes the rotation that takes device-frame
//! vectors into the world frame (east, north, up). Components are stored
//! scalar-first internally; the public constructor takes `(x, y, z, w)`.

use crate::euler::EulerAngles;
use crate::matrix::Matrix3;
use crate::vector::{Vector, Vector3};
use std::ops::Mul;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quaternion {
    pub w: f32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Quaternion {
    pub const IDENTITY: Quaternion = Quaternion {
        w: 1.0,
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub const fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { w, x, y, z }
    }

    /// Scalar-first component order, the layout used on the fusion stream.
    pub fn to_wxyz(&self) -> [f32; 4] {
        [self.w, self.x, self.y, self.z]
    }

    pub fn from_wxyz(m: [f32; 4]) -> Self {
        Self {
            w: m[0],
            x: m[1],
            y: m[2],
            z: m[3],
        }
    }

    pub fn as_vector(&self) -> Vector<4> {
        Vector::new(self.to_wxyz())
    }

    pub fn dot(&self, other: &Self) -> f32 {
        self.as_vector().dot(&other.as_vector())
    }

    pub fn norm(&self) -> f32 {
        self.as_vector().norm()
    }

    pub fn normalize(&self) -> Option<Self> {
        self.as_vector().normalize().map(|v| Self::from_wxyz(v.m))
    }

    pub fn conjugate(&self) -> Self {
        Self {
            w: self.w,
            x: -self.x,
            y: -self.y,
            z: -self.z,
        }
    }

    /// Rotation of `angle` radians about `axis`. A zero axis yields identity.
    pub fn from_axis_angle(axis: Vector3, angle: f32) -> Self {
        match axis.normalize() {
            Some(a) => {
                let (s, c) = (angle * 0.5).sin_cos();
                Self {
                    w: c,
                    x: a.x() * s,
                    y: a.y() * s,
                    z: a.z() * s,
                }
            }
            None => Self::IDENTITY,
        }
    }

    /// Advances the orientation by body-frame angular rate `omega` (rad/s)
    /// held for `dt` seconds.
    pub fn integrate(&self, omega: Vector3, dt: f32) -> Self {
        let angle = omega.norm() * dt;
        let step = Self::from_axis_angle(omega, angle);
        let q = *self * step;
        q.normalize().unwrap_or(*self)
    }

    /// Normalized linear interpolation taking the short arc.
    pub fn nlerp(&self, target: &Self, t: f32) -> Self {
        let mut target = *target;
        if self.dot(&target) < 0.0 {
            target = Self::from_wxyz((-target.as_vector()).m);
        }
        let blended = self.as_vector() * (1.0 - t) + target.as_vector() * t;
        blended
            .normalize()
            .map(|v| Self::from_wxyz(v.m))
            .unwrap_or(*self)
    }

    pub fn rotate(&self, v: Vector3) -> Vector3 {
        self.to_rotation_matrix() * v
    }

    pub fn to_rotation_matrix(&self) -> Matrix3 {
        let Self { w, x, y, z } = *self;
        Matrix3::new([
            [
                1.0 - 2.0 * (y * y + z * z),
                2.0 * (x * y - w * z),
                2.0 * (x * z + w * y),
            ],
            [
                2.0 * (x * y + w * z),
                1.0 - 2.0 * (x * x + z * z),
                2.0 * (y * z - w * x),
            ],
            [
                2.0 * (x * z - w * y),
                2.0 * (y * z + w * x),
                1.0 - 2.0 * (x * x + y * y),
            ],
        ])
    }

    /// Converts a proper rotation matrix, branching on the largest diagonal
    /// term to keep the divisor away from zero.
    pub fn from_rotation_matrix(r: &Matrix3) -> Self {
        let m = &r.m;
        let trace = r.trace();
        let q = if trace > 0.0 {
            let s = (trace + 1.0).sqrt() * 2.0;
            Self {
                w: 0.25 * s,
                x: (m[2][1] - m[1][2]) / s,
                y: (m[0][2] - m[2][0]) / s,
                z: (m[1][0] - m[0][1]) / s,
            }
        } else if m[0][0] > m[1][1] && m[0][0] > m[2][2] {
            let s = (1.0 + m[0][0] - m[1][1] - m[2][2]).sqrt() * 2.0;
            Self {
                w: (m[2][1] - m[1][2]) / s,
                x: 0.25 * s,
                y: (m[0][1] + m[1][0]) / s,
                z: (m[0][2] + m[2][0]) / s,
            }
        } else if m[1][1] > m[2][2] {
            let s = (1.0 + m[1][1] - m[0][0] - m[2][2]).sqrt() * 2.0;
            Self {
                w: (m[0][2] - m[2][0]) / s,
                x: (m[0][1] + m[1][0]) / s,
                y: 0.25 * s,
                z: (m[1][2] + m[2][1]) / s,
            }
        } else {
            let s = (1.0 + m[2][2] - m[0][0] - m[1][1]).sqrt() * 2.0;
            Self {
                w: (m[1][0] - m[0][1]) / s,
                x: (m[0][2] + m[2][0]) / s,
                y: (m[1][2] + m[2][1]) / s,
                z: 0.25 * s,
            }
        };
        q.normalize().unwrap_or(Self::IDENTITY)
    }

    /// Z-Y-X (azimuth, pitch, roll) aerospace sequence.
    pub fn from_euler(e: &EulerAngles) -> Self {
        let (sr, cr) = (e.roll * 0.5).sin_cos();
        let (sp, cp) = (e.pitch * 0.5).sin_cos();
        let (sy, cy) = (e.azimuth * 0.5).sin_cos();
        Self {
            w: cr * cp * cy + sr * sp * sy,
            x: sr * cp * cy - cr * sp * sy,
            y: cr * sp * cy + sr * cp * sy,
            z: cr * cp * sy - sr * sp * cy,
        }
    }

    /// Inverse of [`Quaternion::from_euler`]. Near +/-90 degrees of pitch the
    /// roll/azimuth split is ill-conditioned (gimbal lock) and not corrected.
    pub fn to_euler(&self) -> EulerAngles {
        let Self { w, x, y, z } = *self;
        let roll = (2.0 * (w * x + y * z)).atan2(1.0 - 2.0 * (x * x + y * y));
        let pitch = (2.0 * (w * y - z * x)).clamp(-1.0, 1.0).asin();
        let azimuth = (2.0 * (w * z + x * y)).atan2(1.0 - 2.0 * (y * y + z * z));
        EulerAngles::new(roll, pitch, azimuth)
    }
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Hamilton product.
impl Mul for Quaternion {
    type Output = Self;

    fn mul(self, o: Self) -> Self {
        Self {
            w: self.w * o.w - self.x * o.x - self.y * o.y - self.z * o.z,
            x: self.w * o.x + self.x * o.w + self.y * o.z - self.z * o.y,
            y: self.w * o.y - self.x * o.z + self.y * o.w + self.z * o.x,
            z: self.w * o.z + self.x * o.y - self.y * o.x + self.z * o.w,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn well_conditioned_angles() -> Vec<EulerAngles> {
        let mut out = Vec::new();
        for roll in [-2.5f32, -1.0, 0.0, 0.4, 1.7, 3.0] {
            for pitch in [-1.2f32, -0.5, 0.0, 0.3, 1.1] {
                for azimuth in [-3.0f32, -0.7, 0.0, 0.9, 2.2] {
                    out.push(EulerAngles::new(roll, pitch, azimuth));
                }
            }
        }
        out
    }

    #[test]
    fn matrix_round_trip() {
        for e in well_conditioned_angles() {
            let r = Quaternion::from_euler(&e).to_rotation_matrix();
            let back = Quaternion::from_rotation_matrix(&r).to_rotation_matrix();
            assert!(r.approx_eq(&back, 1e-4), "round trip failed for {e:?}");
        }
    }

    #[test]
    fn euler_round_trip_away_from_gimbal_lock() {
        for e in well_conditioned_angles() {
            let back = Quaternion::from_euler(&e).to_euler();
            let q1 = Quaternion::from_euler(&e);
            let q2 = Quaternion::from_euler(&back);
            // q and -q describe the same rotation.
            assert_abs_diff_eq!(q1.dot(&q2).abs(), 1.0, epsilon = 1e-4);
        }
    }

    #[test]
    fn rotation_about_z_maps_x_to_y() {
        let q = Quaternion::from_axis_angle(Vector3::xyz(0.0, 0.0, 1.0), std::f32::consts::FRAC_PI_2);
        let v = q.rotate(Vector3::xyz(1.0, 0.0, 0.0));
        assert_abs_diff_eq!(v.x(), 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(v.y(), 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(v.z(), 0.0, epsilon = 1e-6);
    }

    #[test]
    fn integrate_constant_rate() {
        let omega = Vector3::xyz(0.0, 0.0, 1.0);
        let mut q = Quaternion::IDENTITY;
        for _ in 0..100 {
            q = q.integrate(omega, 0.01);
        }
        let e = q.to_euler();
        assert_abs_diff_eq!(e.azimuth, 1.0, epsilon = 1e-3);
        assert_abs_diff_eq!(q.norm(), 1.0, epsilon = 1e-5);
    }

    #[test]
    fn nlerp_takes_short_arc() {
        let a = Quaternion::IDENTITY;
        let b = Quaternion::new(0.0, 0.0, 0.0, -1.0);
        let mid = a.nlerp(&b, 0.5);
        assert_abs_diff_eq!(mid.w.abs(), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn constructor_takes_xyzw() {
        let q = Quaternion::new(0.1, 0.2, 0.3, 0.9);
        assert_eq!(q.to_wxyz(), [0.9, 0.1, 0.2, 0.3]);
    }
}
