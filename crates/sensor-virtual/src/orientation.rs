//! Azimuth, pitch and roll in degrees from the fusion quaternion.

use crate::factory::BuildContext;
use crate::node::{Synthesizer, VirtualBase, VirtualNode};
use sensor_core::{Event, EventType, Sample, SensorError, SensorProperties, SensorType, VirtualSensor};
use sensor_math::{Quaternion, rad2deg};
use std::sync::Arc;

pub const AZIMUTH_COMPENSATION: &str = "azimuth_rotation_compensation";
pub const PITCH_COMPENSATION: &str = "pitch_rotation_compensation";
pub const ROLL_COMPENSATION: &str = "roll_rotation_compensation";

/// Per-axis sign (or scale) applied to the published angles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Compensation {
    pub azimuth: f32,
    pub pitch: f32,
    pub roll: f32,
}

pub struct OrientationSynthesizer {
    compensation: Compensation,
}

impl OrientationSynthesizer {
    pub fn new(compensation: Compensation) -> Self {
        Self { compensation }
    }

    /// `fused` holds a `[w, x, y, z]` quaternion.
    pub fn angles(&self, fused: &Sample) -> Option<Sample> {
        let v = fused.values();
        if v.len() < 4 {
            return None;
        }
        let euler = Quaternion::from_wxyz([v[0], v[1], v[2], v[3]]).to_euler();
        let azimuth = (rad2deg(euler.azimuth) * self.compensation.azimuth).rem_euclid(360.0);
        let pitch = rad2deg(euler.pitch) * self.compensation.pitch;
        let roll = rad2deg(euler.roll) * self.compensation.roll;
        Some(fused.with_values(&[azimuth, pitch, roll]))
    }
}

impl Synthesizer for OrientationSynthesizer {
    fn synthesize(&self, base: &VirtualBase, event: &Event) -> Vec<Event> {
        if event.event_type != SensorType::Fusion.raw_event() {
            return Vec::new();
        }
        self.angles(&event.data)
            .map(|sample| base.event(base.sensor_type().raw_event(), sample))
            .into_iter()
            .collect()
    }

    fn pull(&self, base: &VirtualBase, _event_type: EventType) -> Result<Sample, SensorError> {
        let fused = base.pull_raw(SensorType::Fusion)?;
        self.angles(&fused).ok_or(SensorError::NoData)
    }
}

pub fn create(ctx: BuildContext<'_>) -> Result<Arc<dyn VirtualSensor>, SensorError> {
    let entry = ctx.model_entry(SensorType::Orientation)?;
    let compensation = Compensation {
        azimuth: entry.require_value(AZIMUTH_COMPENSATION)?,
        pitch: entry.require_value(PITCH_COMPENSATION)?,
        roll: entry.require_value(ROLL_COMPENSATION)?,
    };
    let properties = SensorProperties::synthetic(
        "Orientation Sensor",
        &ctx.vendor(SensorType::Orientation),
        -180.0,
        360.0,
    );
    let base = VirtualBase::new(ctx.id, ctx.rank, properties, ctx.upstream, ctx.active);
    Ok(Arc::new(VirtualNode::new(
        base,
        OrientationSynthesizer::new(compensation),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use sensor_core::Accuracy;
    use sensor_math::EulerAngles;

    fn fused(e: EulerAngles) -> Sample {
        Sample::new(1, Accuracy::Good, &Quaternion::from_euler(&e).to_wxyz())
    }

    #[test]
    fn level_device_reports_zero_angles() {
        let synth = OrientationSynthesizer::new(Compensation { azimuth: 1.0, pitch: -1.0, roll: 1.0 });
        let out = synth.angles(&fused(EulerAngles::new(0.0, 0.0, 0.0))).unwrap();
        for v in out.values() {
            assert_abs_diff_eq!(*v, 0.0, epsilon = 1e-3);
        }
    }

    #[test]
    fn azimuth_wraps_into_positive_range() {
        let synth = OrientationSynthesizer::new(Compensation { azimuth: 1.0, pitch: 1.0, roll: 1.0 });
        let out = synth
            .angles(&fused(EulerAngles::new(0.0, 0.0, -std::f32::consts::FRAC_PI_2)))
            .unwrap();
        assert_abs_diff_eq!(out.values()[0], 270.0, epsilon = 1e-2);
    }

    #[test]
    fn compensation_flips_sign() {
        let synth = OrientationSynthesizer::new(Compensation { azimuth: 1.0, pitch: -1.0, roll: -1.0 });
        let out = synth.angles(&fused(EulerAngles::new(0.2, 0.3, 0.0))).unwrap();
        assert_abs_diff_eq!(out.values()[1], -rad2deg(0.3), epsilon = 1e-2);
        assert_abs_diff_eq!(out.values()[2], -rad2deg(0.2), epsilon = 1e-2);
    }
}
