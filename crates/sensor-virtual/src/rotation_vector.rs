use crate::factory::BuildContext;
use crate::node::{Synthesizer, VirtualBase, VirtualNode};
use sensor_core::{Event, EventType, Sample, SensorError, SensorProperties, SensorType, VirtualSensor};
use std::sync::Arc;

/// Fusion publishes `[w, x, y, z]`; clients receive `[x, y, z, w]`.
const FUSION_TO_PUBLIC: [usize; 4] = [1, 2, 3, 0];

fn reorder(sample: &Sample) -> Option<Sample> {
    let values = sample.values();
    if values.len() < 4 {
        return None;
    }
    let published = FUSION_TO_PUBLIC.map(|i| values[i]);
    Some(sample.with_values(&published))
}

pub struct RotationVectorSynthesizer;

impl Synthesizer for RotationVectorSynthesizer {
    fn synthesize(&self, base: &VirtualBase, event: &Event) -> Vec<Event> {
        if event.event_type != SensorType::Fusion.raw_event() {
            return Vec::new();
        }
        reorder(&event.data)
            .map(|sample| base.event(base.sensor_type().raw_event(), sample))
            .into_iter()
            .collect()
    }

    fn pull(&self, base: &VirtualBase, _event_type: EventType) -> Result<Sample, SensorError> {
        let fused = base.pull_raw(SensorType::Fusion)?;
        reorder(&fused).ok_or(SensorError::NoData)
    }
}

pub fn create(ctx: BuildContext<'_>) -> Result<Arc<dyn VirtualSensor>, SensorError> {
    let interval = ctx.model_entry(SensorType::RotationVector)?.require_sampling_time()?;
    let properties = SensorProperties::synthetic(
        "Rotation Vector Sensor",
        &ctx.vendor(SensorType::RotationVector),
        -1.0,
        1.0,
    );
    let base = VirtualBase::new(ctx.id, ctx.rank, properties, ctx.upstream, ctx.active)
        .with_default_interval(interval);
    Ok(Arc::new(VirtualNode::new(base, RotationVectorSynthesizer)))
}
