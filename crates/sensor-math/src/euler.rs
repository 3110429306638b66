//! Euler angles in the aerospace convention.

use std::f32::consts::PI;

/// Roll, pitch and azimuth in radians.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EulerAngles {
    pub roll: f32,
    pub pitch: f32,
    pub azimuth: f32,
}

impl EulerAngles {
    pub const fn new(roll: f32, pitch: f32, azimuth: f32) -> Self {
        Self {
            roll,
            pitch,
            azimuth,
        }
    }

    pub fn to_degrees(&self) -> Self {
        Self::new(rad2deg(self.roll), rad2deg(self.pitch), rad2deg(self.azimuth))
    }

    pub fn to_radians(&self) -> Self {
        Self::new(deg2rad(self.roll), deg2rad(self.pitch), deg2rad(self.azimuth))
    }
}

pub fn rad2deg(rad: f32) -> f32 {
    rad * 180.0 / PI
}

pub fn deg2rad(deg: f32) -> f32 {
    deg * PI / 180.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degree_conversion() {
        assert!((rad2deg(PI) - 180.0).abs() < 1e-4);
        assert!((deg2rad(90.0) - PI / 2.0).abs() < 1e-6);
        let e = EulerAngles::new(PI, -PI / 2.0, 0.0).to_degrees();
        assert!((e.roll - 180.0).abs() < 1e-4);
        assert!((e.pitch + 90.0).abs() < 1e-4);
        let back = e.to_radians();
        assert!((back.roll - PI).abs() < 1e-6);
    }
}
