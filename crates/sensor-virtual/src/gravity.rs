use crate::factory::BuildContext;
use crate::node::{Synthesizer, VirtualBase, VirtualNode};
use sensor_core::{Event, EventType, Sample, SensorError, SensorProperties, SensorType, VirtualSensor};
use sensor_math::{GRAVITY, deg2rad};
use std::sync::Arc;

/// Gravity vector from orientation `[azimuth, pitch, roll]` in degrees:
/// `[G sin(pitch), G sin(roll), G cos(pitch * roll)]`.
pub fn gravity_from_orientation(orientation: &Sample) -> Option<Sample> {
    let v = orientation.values();
    if v.len() < 3 {
        return None;
    }
    let pitch = deg2rad(v[1]);
    let roll = deg2rad(v[2]);
    let gravity = [
        GRAVITY * pitch.sin(),
        GRAVITY * roll.sin(),
        GRAVITY * (pitch * roll).cos(),
    ];
    Some(orientation.with_values(&gravity))
}

pub struct GravitySynthesizer;

impl Synthesizer for GravitySynthesizer {
    fn synthesize(&self, base: &VirtualBase, event: &Event) -> Vec<Event> {
        if event.event_type != SensorType::Orientation.raw_event() {
            return Vec::new();
        }
        gravity_from_orientation(&event.data)
            .map(|sample| base.event(base.sensor_type().raw_event(), sample))
            .into_iter()
            .collect()
    }

    fn pull(&self, base: &VirtualBase, _event_type: EventType) -> Result<Sample, SensorError> {
        let orientation = base.pull_raw(SensorType::Orientation)?;
        gravity_from_orientation(&orientation).ok_or(SensorError::NoData)
    }
}

pub fn create(ctx: BuildContext<'_>) -> Result<Arc<dyn VirtualSensor>, SensorError> {
    let interval = ctx.model_entry(SensorType::Gravity)?.require_sampling_time()?;
    let properties = SensorProperties::synthetic(
        "Gravity Sensor",
        &ctx.vendor(SensorType::Gravity),
        -GRAVITY,
        GRAVITY,
    );
    let base = VirtualBase::new(ctx.id, ctx.rank, properties, ctx.upstream, ctx.active)
        .with_default_interval(interval);
    Ok(Arc::new(VirtualNode::new(base, GravitySynthesizer)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sensor_core::Accuracy;

    #[test]
    fn level_device_sees_full_gravity_on_z() {
        let orientation = Sample::new(10, Accuracy::Good, &[123.0, 0.0, 0.0]);
        let g = gravity_from_orientation(&orientation).unwrap();
        assert_eq!(g.values(), &[0.0, 0.0, GRAVITY]);
        assert_eq!(g.timestamp, 10);
    }

    #[test]
    fn pitch_moves_gravity_onto_x() {
        let orientation = Sample::new(0, Accuracy::Good, &[0.0, 90.0, 0.0]);
        let g = gravity_from_orientation(&orientation).unwrap();
        assert!((g.values()[0] - GRAVITY).abs() < 1e-4);
        assert!(g.values()[1].abs() < 1e-6);
        // cos(pitch * roll) with roll = 0.
        assert!((g.values()[2] - GRAVITY).abs() < 1e-6);
    }

    #[test]
    fn z_follows_cosine_of_pitch_times_roll() {
        let orientation = Sample::new(0, Accuracy::Good, &[0.0, 30.0, 30.0]);
        let g = gravity_from_orientation(&orientation).unwrap();
        let angle = deg2rad(30.0);
        assert!((g.values()[0] - GRAVITY * 0.5).abs() < 1e-4);
        assert!((g.values()[1] - GRAVITY * 0.5).abs() < 1e-4);
        assert!((g.values()[2] - GRAVITY * (angle * angle).cos()).abs() < 1e-5);
        assert!((g.values()[2] - GRAVITY * angle.cos() * angle.cos()).abs() > 1.0);
    }
}
