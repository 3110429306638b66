use crate::factory::BuildContext;
use crate::node::{Synthesizer, VirtualBase, VirtualNode};
use parking_lot::Mutex;
use sensor_core::{Event, EventType, Sample, SensorError, SensorProperties, SensorType, VirtualSensor};
use sensor_math::{GRAVITY, Vector3};
use std::sync::Arc;

#[derive(Default)]
struct State {
    gravity: Option<Sample>,
    last_emitted: u64,
}

fn subtract(accel: &Sample, gravity: &Sample) -> Sample {
    let linear = Vector3::new(accel.xyz()) - Vector3::new(gravity.xyz());
    accel.with_values(&linear.m)
}

/// Raw acceleration minus the latest gravity estimate, stamped with the
/// accelerometer sample.
#[derive(Default)]
pub struct LinearAccelSynthesizer {
    state: Mutex<State>,
}

impl Synthesizer for LinearAccelSynthesizer {
    fn synthesize(&self, base: &VirtualBase, event: &Event) -> Vec<Event> {
        let mut state = self.state.lock();
        if event.event_type == SensorType::Gravity.raw_event() {
            state.gravity = Some(event.data);
            return Vec::new();
        }
        if event.event_type != SensorType::Accelerometer.raw_event() {
            return Vec::new();
        }
        let Some(gravity) = state.gravity else {
            return Vec::new();
        };
        if !base.should_emit(state.last_emitted, event.data.timestamp) {
            return Vec::new();
        }
        state.last_emitted = event.data.timestamp;
        vec![base.event(base.sensor_type().raw_event(), subtract(&event.data, &gravity))]
    }

    fn pull(&self, base: &VirtualBase, _event_type: EventType) -> Result<Sample, SensorError> {
        let accel = base.pull_raw(SensorType::Accelerometer)?;
        let gravity = base.pull_raw(SensorType::Gravity)?;
        Ok(subtract(&accel, &gravity))
    }

    fn reset(&self) {
        *self.state.lock() = State::default();
    }
}

pub fn create(ctx: BuildContext<'_>) -> Result<Arc<dyn VirtualSensor>, SensorError> {
    let interval = ctx
        .model_entry(SensorType::LinearAcceleration)?
        .require_sampling_time()?;
    let properties = SensorProperties::synthetic(
        "Linear Acceleration Sensor",
        &ctx.vendor(SensorType::LinearAcceleration),
        -2.0 * GRAVITY,
        2.0 * GRAVITY,
    );
    let base = VirtualBase::new(ctx.id, ctx.rank, properties, ctx.upstream, ctx.active)
        .with_default_interval(interval);
    Ok(Arc::new(VirtualNode::new(base, LinearAccelSynthesizer::default())))
}
