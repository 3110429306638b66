use crate::factory::BuildContext;
use crate::node::{Synthesizer, VirtualBase, VirtualNode};
use crate::orientation::{PITCH_COMPENSATION, ROLL_COMPENSATION};
use sensor_core::{Event, EventType, Sample, SensorError, SensorProperties, SensorType, VirtualSensor};
use sensor_math::Quaternion;
use std::sync::Arc;

pub const OUTPUT_DEGREES: &str = "output_degrees";

/// Publishes `[pitch, roll]` of the fusion attitude.
pub struct TiltSynthesizer {
    pitch_sign: f32,
    roll_sign: f32,
    degrees: bool,
}

impl TiltSynthesizer {
    pub fn new(pitch_sign: f32, roll_sign: f32, degrees: bool) -> Self {
        Self {
            pitch_sign,
            roll_sign,
            degrees,
        }
    }

    pub fn tilt(&self, fused: &Sample) -> Option<Sample> {
        let v = fused.values();
        if v.len() < 4 {
            return None;
        }
        let euler = Quaternion::from_wxyz([v[0], v[1], v[2], v[3]]).to_euler();
        let euler = if self.degrees { euler.to_degrees() } else { euler };
        Some(fused.with_values(&[euler.pitch * self.pitch_sign, euler.roll * self.roll_sign]))
    }
}

impl Synthesizer for TiltSynthesizer {
    fn synthesize(&self, base: &VirtualBase, event: &Event) -> Vec<Event> {
        if event.event_type != SensorType::Fusion.raw_event() {
            return Vec::new();
        }
        self.tilt(&event.data)
            .map(|sample| base.event(base.sensor_type().raw_event(), sample))
            .into_iter()
            .collect()
    }

    fn pull(&self, base: &VirtualBase, _event_type: EventType) -> Result<Sample, SensorError> {
        let fused = base.pull_raw(SensorType::Fusion)?;
        self.tilt(&fused).ok_or(SensorError::NoData)
    }
}

pub fn create(ctx: BuildContext<'_>) -> Result<Arc<dyn VirtualSensor>, SensorError> {
    let entry = ctx.model_entry(SensorType::Tilt)?;
    let synth = TiltSynthesizer::new(
        entry.require_value(PITCH_COMPENSATION)?,
        entry.require_value(ROLL_COMPENSATION)?,
        entry.require_value(OUTPUT_DEGREES)? != 0.0,
    );
    let range = if synth.degrees { 180.0 } else { std::f32::consts::PI };
    let properties = SensorProperties::synthetic(
        "Tilt Sensor",
        &ctx.vendor(SensorType::Tilt),
        -range,
        range,
    );
    let base = VirtualBase::new(ctx.id, ctx.rank, properties, ctx.upstream, ctx.active);
    Ok(Arc::new(VirtualNode::new(base, synth)))
}
