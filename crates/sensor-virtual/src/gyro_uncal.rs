use crate::factory::BuildContext;
use crate::node::{Synthesizer, VirtualBase, VirtualNode};
use sensor_core::{Event, EventType, Sample, SensorError, SensorType, VirtualSensor};
use std::sync::Arc;

/// Raw gyro reading followed by the bias the fusion calibration removes.
pub struct GyroUncalSynthesizer {
    bias: [f32; 3],
}

impl GyroUncalSynthesizer {
    pub fn new(bias: [f32; 3]) -> Self {
        Self { bias }
    }

    fn uncalibrated(&self, gyro: &Sample) -> Sample {
        let [x, y, z] = gyro.xyz();
        let [bx, by, bz] = self.bias;
        gyro.with_values(&[x, y, z, bx, by, bz])
    }
}

impl Synthesizer for GyroUncalSynthesizer {
    fn synthesize(&self, base: &VirtualBase, event: &Event) -> Vec<Event> {
        if event.event_type != SensorType::Gyroscope.raw_event() {
            return Vec::new();
        }
        vec![base.event(base.sensor_type().raw_event(), self.uncalibrated(&event.data))]
    }

    fn pull(&self, base: &VirtualBase, _event_type: EventType) -> Result<Sample, SensorError> {
        Ok(self.uncalibrated(&base.pull_raw(SensorType::Gyroscope)?))
    }
}

pub fn create(ctx: BuildContext<'_>) -> Result<Arc<dyn VirtualSensor>, SensorError> {
    let mut properties = ctx.upstream_properties(SensorType::Gyroscope)?;
    properties.name = format!("{} (uncalibrated)", properties.name);
    let base = VirtualBase::new(ctx.id, ctx.rank, properties, ctx.upstream, ctx.active);
    Ok(Arc::new(VirtualNode::new(
        base,
        GyroUncalSynthesizer::new(ctx.fusion.gyro.bias),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sensor_core::Accuracy;

    #[test]
    fn appends_configured_bias() {
        let synth = GyroUncalSynthesizer::new([0.01, -0.02, 0.03]);
        let out = synth.uncalibrated(&Sample::new(9, Accuracy::Good, &[1.0, 2.0, 3.0]));
        assert_eq!(out.values(), &[1.0, 2.0, 3.0, 0.01, -0.02, 0.03]);
        assert_eq!(out.timestamp, 9);
    }
}
