//! Attitude quaternion from the raw motion sensors.

use crate::factory::BuildContext;
use crate::node::{Synthesizer, VirtualBase, VirtualNode};
use parking_lot::Mutex;
use sensor_core::{
    Event, EventType, Sample, SensorError, SensorProperties, SensorType, VirtualSensor,
};
use sensor_fusion::{Attitude, FusionAccumulator, FusionConfig};
use std::sync::Arc;

struct State {
    accumulator: FusionAccumulator,
    last_emitted: u64,
}

pub struct FusionSynthesizer {
    config: FusionConfig,
    state: Mutex<State>,
}

impl FusionSynthesizer {
    pub fn new(config: FusionConfig) -> Self {
        Self {
            state: Mutex::new(State {
                accumulator: FusionAccumulator::new(config.clone()),
                last_emitted: 0,
            }),
            config,
        }
    }

    fn push(accumulator: &mut FusionAccumulator, sensor_type: SensorType, sample: &Sample) -> bool {
        match sensor_type {
            SensorType::Accelerometer => accumulator.push_accel(sample),
            SensorType::Gyroscope => accumulator.push_gyro(sample),
            SensorType::Magnetic => accumulator.push_mag(sample),
            _ => false,
        }
    }
}

/// Fusion events carry the quaternion as `[w, x, y, z]`.
pub fn attitude_sample(attitude: &Attitude) -> Sample {
    Sample::new(
        attitude.timestamp,
        attitude.accuracy,
        &attitude.quaternion.to_wxyz(),
    )
}

impl Synthesizer for FusionSynthesizer {
    fn synthesize(&self, base: &VirtualBase, event: &Event) -> Vec<Event> {
        let Some(sensor_type) = event.event_type.sensor_type() else {
            return Vec::new();
        };
        let mut state = self.state.lock();
        if !Self::push(&mut state.accumulator, sensor_type, &event.data) {
            return Vec::new();
        }
        let Ok(attitude) = state.accumulator.get_rv() else {
            return Vec::new();
        };
        if !base.should_emit(state.last_emitted, attitude.timestamp) {
            return Vec::new();
        }
        state.last_emitted = attitude.timestamp;
        vec![base.event(base.sensor_type().raw_event(), attitude_sample(&attitude))]
    }

    fn pull(&self, base: &VirtualBase, _event_type: EventType) -> Result<Sample, SensorError> {
        let mut accumulator = self.state.lock().accumulator.clone();
        for input in accumulator.mode().inputs() {
            let sample = base.pull_raw(*input)?;
            Self::push(&mut accumulator, *input, &sample);
        }
        accumulator
            .get_rv()
            .map(|attitude| attitude_sample(&attitude))
            .map_err(|_| SensorError::NoData)
    }

    fn reset(&self) {
        let mut state = self.state.lock();
        state.accumulator = FusionAccumulator::new(self.config.clone());
        state.last_emitted = 0;
    }
}

pub fn create(ctx: BuildContext<'_>) -> Result<Arc<dyn VirtualSensor>, SensorError> {
    let properties = SensorProperties::synthetic(
        "Fusion Sensor",
        &ctx.vendor(SensorType::Fusion),
        -1.0,
        1.0,
    );
    let base = VirtualBase::new(ctx.id, ctx.rank, properties, ctx.upstream, ctx.active);
    Ok(Arc::new(VirtualNode::new(
        base,
        FusionSynthesizer::new(ctx.fusion.clone()),
    )))
}
