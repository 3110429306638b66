//! # Auto Rotation
//!
//! Classifies the accelerometer direction into one of four screen rotations.
//! Only genuine bucket changes are reported, as `CHANGE_STATE` events whose
//! single value is the rotation code.
//!
//! The classifier works on two integer angles:
//! - `theta`: direction of gravity in the screen plane, `0` upright portrait;
//! - `pitch`: how far the screen is from lying flat, `90` upright.
//!
//! The bucket half-width depends on the previous rotation, which widens the
//! bucket the device is already in.

use crate::factory::BuildContext;
use crate::node::{Synthesizer, VirtualBase, VirtualNode};
use parking_lot::Mutex;
use sensor_core::{Event, EventType, Sample, SensorError, SensorProperties, SensorType, VirtualSensor};
use std::sync::Arc;

pub const ROTATION_UNKNOWN: i32 = 0;
pub const ROTATION_DEG_0: i32 = 1;
pub const ROTATION_DEG_90: i32 = 2;
pub const ROTATION_DEG_180: i32 = 3;
pub const ROTATION_DEG_270: i32 = 4;

/// Degrees per radian as used by the classifier thresholds.
const RADIAN: f32 = 57.29747;
/// Below this pitch the device is treated as flat and never rotates.
const TILT_MIN: i32 = 30;
/// `(max pitch, bucket half-width)` pairs, tried in order.
const ROTATION_RULES: [(i32, i32); 4] = [(40, 80), (50, 70), (60, 65), (90, 60)];

/// Integer `(pitch, theta)` of an accelerometer reading, `None` in free fall.
pub fn accel_angles(accel: [f32; 3]) -> Option<(i32, i32)> {
    let [x, y, z] = accel;
    let g = (x * x + y * y + z * z).sqrt();
    if g <= f32::EPSILON {
        return None;
    }
    let theta = (y.atan2(x) * RADIAN + 270.0) as i32 % 360;
    let pitch = 90 - ((z / g).clamp(-1.0, 1.0).asin() * RADIAN).abs() as i32;
    Some((pitch, theta))
}

/// Rotation for `(pitch, theta)` given the previous rotation, or
/// [`ROTATION_UNKNOWN`] when the reading is ambiguous.
pub fn classify(previous: i32, pitch: i32, theta: i32) -> i32 {
    if pitch < TILT_MIN {
        return ROTATION_UNKNOWN;
    }
    let Some(&(_, width)) = ROTATION_RULES.iter().find(|(max_pitch, _)| pitch <= *max_pitch) else {
        return ROTATION_UNKNOWN;
    };
    let angle = if previous == ROTATION_DEG_0 || previous == ROTATION_DEG_180 {
        width
    } else {
        90 - width
    };

    if theta >= 360 - angle || theta <= angle {
        ROTATION_DEG_0
    } else if theta <= 180 - angle {
        ROTATION_DEG_90
    } else if theta <= 180 + angle {
        ROTATION_DEG_180
    } else if theta <= 360 - angle {
        ROTATION_DEG_270
    } else {
        ROTATION_UNKNOWN
    }
}

#[derive(Debug, Default)]
pub struct AutoRotationSynthesizer {
    state: Mutex<Option<Sample>>,
}

impl AutoRotationSynthesizer {
    fn current(&self) -> i32 {
        self.state
            .lock()
            .map(|s| s.values()[0] as i32)
            .unwrap_or(ROTATION_UNKNOWN)
    }

    /// Feeds one accelerometer sample; returns the new rotation sample on change.
    pub fn update(&self, accel: &Sample) -> Option<Sample> {
        let (pitch, theta) = accel_angles(accel.xyz())?;
        let previous = self.current();
        let rotation = classify(previous, pitch, theta);
        if rotation == ROTATION_UNKNOWN || rotation == previous {
            return None;
        }
        let sample = accel.with_values(&[rotation as f32]);
        *self.state.lock() = Some(sample);
        Some(sample)
    }
}

impl Synthesizer for AutoRotationSynthesizer {
    fn event_types(&self, base: &VirtualBase) -> Vec<EventType> {
        vec![base.sensor_type().change_event()]
    }

    fn synthesize(&self, base: &VirtualBase, event: &Event) -> Vec<Event> {
        if event.event_type != SensorType::Accelerometer.raw_event() {
            return Vec::new();
        }
        self.update(&event.data)
            .map(|sample| base.event(base.sensor_type().change_event(), sample))
            .into_iter()
            .collect()
    }

    fn pull(&self, _base: &VirtualBase, _event_type: EventType) -> Result<Sample, SensorError> {
        (*self.state.lock()).ok_or(SensorError::NoData)
    }

    fn reset(&self) {
        *self.state.lock() = None;
    }
}

pub fn create(ctx: BuildContext<'_>) -> Result<Arc<dyn VirtualSensor>, SensorError> {
    let properties = SensorProperties::synthetic(
        "Auto Rotation Sensor",
        &ctx.vendor(SensorType::AutoRotation),
        ROTATION_UNKNOWN as f32,
        ROTATION_DEG_270 as f32,
    );
    let base = VirtualBase::new(ctx.id, ctx.rank, properties, ctx.upstream, ctx.active);
    Ok(Arc::new(VirtualNode::new(base, AutoRotationSynthesizer::default())))
}
