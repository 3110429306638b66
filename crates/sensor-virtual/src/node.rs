//! Activation, interval forwarding and event filtering shared by every
//! virtual sensor. The per-sensor derivation lives in a [`Synthesizer`].

use sensor_core::{
    Activation, ActiveSensors, ClientId, Event, EventType, IntervalOrigin, Sample, Sensor,
    SensorError, SensorHandle, SensorId, SensorProperties, SensorType, VirtualSensor,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Client id a virtual sensor uses for its own default-rate request upstream.
pub const INTERNAL_CLIENT: ClientId = -1;

/// Fraction of the requested interval that must elapse between two outputs
/// of a sensor fed by several upstream streams.
const GATE_RATIO: f64 = 0.75;

/// Identity, upstream handles and bookkeeping of one virtual sensor.
pub struct VirtualBase {
    id: SensorId,
    sensor_type: SensorType,
    rank: usize,
    properties: SensorProperties,
    upstream: Vec<SensorHandle>,
    default_interval: Option<u32>,
    activation: Activation,
    active: Arc<ActiveSensors>,
}

impl VirtualBase {
    pub fn new(
        id: SensorId,
        rank: usize,
        properties: SensorProperties,
        upstream: Vec<SensorHandle>,
        active: Arc<ActiveSensors>,
    ) -> Self {
        Self {
            id,
            sensor_type: id.sensor_type().unwrap_or(SensorType::All),
            rank,
            properties,
            upstream,
            default_interval: None,
            activation: Activation::new(),
            active,
        }
    }

    /// Interval requested from every upstream while this sensor is started.
    pub fn with_default_interval(mut self, interval_ms: u32) -> Self {
        self.default_interval = Some(interval_ms);
        self
    }

    pub fn id(&self) -> SensorId {
        self.id
    }

    pub fn sensor_type(&self) -> SensorType {
        self.sensor_type
    }

    pub fn upstream(&self) -> &[SensorHandle] {
        &self.upstream
    }

    /// First upstream of the given type.
    pub fn upstream_of(&self, sensor_type: SensorType) -> Result<&SensorHandle, SensorError> {
        self.upstream
            .iter()
            .find(|h| h.sensor_type() == sensor_type)
            .ok_or(SensorError::MissingDependency(sensor_type))
    }

    /// Latest raw sample of the upstream of `sensor_type`.
    pub fn pull_raw(&self, sensor_type: SensorType) -> Result<Sample, SensorError> {
        self.upstream_of(sensor_type)?
            .sensor()
            .get_sensor_data(sensor_type.raw_event())
    }

    pub fn consumes(&self, sensor_id: SensorId) -> bool {
        self.upstream.iter().any(|h| h.id() == sensor_id)
    }

    /// Effective interval: client requests first, then the configured default.
    pub fn interval(&self) -> Option<u32> {
        self.activation.interval().or(self.default_interval)
    }

    /// Rate gate for multi-input sensors. `last` is zero before the first output.
    pub fn should_emit(&self, last: u64, timestamp: u64) -> bool {
        match self.interval() {
            Some(ms) if last != 0 => {
                timestamp.saturating_sub(last) as f64 >= GATE_RATIO * ms as f64 * 1000.0
            }
            _ => true,
        }
    }

    pub fn event(&self, event_type: EventType, sample: Sample) -> Event {
        Event::new(self.id, event_type, sample)
    }

    fn start_upstream(&self) -> Result<(), SensorError> {
        for (started, handle) in self.upstream.iter().enumerate() {
            if let Err(e) = handle.sensor().start() {
                warn!(sensor = %self.properties.name, upstream = %handle.id(), error = %e, "upstream failed to start");
                self.rollback(&self.upstream[..started], 0);
                return Err(e);
            }
        }
        if let Some(ms) = self.default_interval {
            for (requested, handle) in self.upstream.iter().enumerate() {
                let via = IntervalOrigin::Via(self.id);
                if let Err(e) = handle.sensor().add_interval(INTERNAL_CLIENT, ms, via) {
                    warn!(sensor = %self.properties.name, upstream = %handle.id(), error = %e, "upstream rejected default interval");
                    self.rollback(&self.upstream, requested + 1);
                    return Err(e);
                }
            }
        }
        self.active.activate(self.rank, self.id);
        Ok(())
    }

    /// Undoes a partial start: withdraws the default-interval request from
    /// the first `requested` handles, then stops every handle in `started`.
    fn rollback(&self, started: &[SensorHandle], requested: usize) {
        let via = IntervalOrigin::Via(self.id);
        for handle in &started[..requested.min(started.len())] {
            if let Err(e) = handle.sensor().delete_interval(INTERNAL_CLIENT, via) {
                warn!(sensor = %self.properties.name, upstream = %handle.id(), error = %e, "rollback failed to withdraw interval");
            }
        }
        for handle in started {
            if let Err(e) = handle.sensor().stop() {
                warn!(sensor = %self.properties.name, upstream = %handle.id(), error = %e, "rollback failed to stop upstream");
            }
        }
    }

    fn stop_upstream(&self) -> Result<(), SensorError> {
        self.active.deactivate(self.rank, self.id);
        let mut result = Ok(());
        for handle in &self.upstream {
            let sensor = handle.sensor();
            if self.default_interval.is_some() {
                if let Err(e) = sensor.delete_interval(INTERNAL_CLIENT, IntervalOrigin::Via(self.id)) {
                    result = Err(e);
                }
            }
            if let Err(e) = sensor.stop() {
                warn!(sensor = %self.properties.name, upstream = %handle.id(), error = %e, "upstream failed to stop");
                result = Err(e);
            }
        }
        result
    }

    /// Pushes this client's minimum (over every origin) to each upstream, or
    /// withdraws it when the client has no entry left here.
    fn forward_interval(&self, client: ClientId) -> Result<(), SensorError> {
        let via = IntervalOrigin::Via(self.id);
        let own = self.activation.client_interval(client);
        for handle in &self.upstream {
            match own {
                Some(ms) => handle.sensor().add_interval(client, ms, via)?,
                None => handle.sensor().delete_interval(client, via)?,
            }
        }
        Ok(())
    }
}

/// The derivation a virtual sensor performs on upstream events.
///
/// `synthesize` only sees events produced by one of the base's upstreams.
pub trait Synthesizer: Send + Sync + 'static {
    fn event_types(&self, base: &VirtualBase) -> Vec<EventType> {
        vec![base.sensor_type().raw_event()]
    }

    fn synthesize(&self, base: &VirtualBase, event: &Event) -> Vec<Event>;

    /// On-demand recompute from upstream's latest samples.
    fn pull(&self, base: &VirtualBase, event_type: EventType) -> Result<Sample, SensorError>;

    /// Drops buffered state when the sensor is deactivated.
    fn reset(&self) {}
}

pub struct VirtualNode<S> {
    base: VirtualBase,
    logic: S,
}

impl<S: Synthesizer> VirtualNode<S> {
    pub fn new(base: VirtualBase, logic: S) -> Self {
        Self { base, logic }
    }
}

impl<S: Synthesizer> Sensor for VirtualNode<S> {
    fn id(&self) -> SensorId {
        self.base.id
    }

    fn sensor_type(&self) -> SensorType {
        self.base.sensor_type
    }

    fn name(&self) -> &str {
        &self.base.properties.name
    }

    fn properties(&self) -> SensorProperties {
        self.base.properties.clone()
    }

    fn event_types(&self) -> Vec<EventType> {
        self.logic.event_types(&self.base)
    }

    fn start(&self) -> Result<(), SensorError> {
        let activated = self.base.activation.start(|| self.base.start_upstream())?;
        if activated {
            info!(sensor = %self.base.properties.name, "virtual sensor activated");
        }
        Ok(())
    }

    fn stop(&self) -> Result<(), SensorError> {
        let deactivated = self.base.activation.stop(|| {
            self.logic.reset();
            self.base.stop_upstream()
        })?;
        if deactivated {
            info!(sensor = %self.base.properties.name, "virtual sensor deactivated");
        }
        Ok(())
    }

    fn is_started(&self) -> bool {
        self.base.activation.is_started()
    }

    fn add_interval(
        &self,
        client: ClientId,
        interval_ms: u32,
        origin: IntervalOrigin,
    ) -> Result<(), SensorError> {
        let change = self.base.activation.add_interval(client, origin, interval_ms);
        if change.changed() {
            debug!(sensor = %self.base.properties.name, interval = ?change.after, "interval changed");
        }
        self.base.forward_interval(client)
    }

    fn delete_interval(&self, client: ClientId, origin: IntervalOrigin) -> Result<(), SensorError> {
        self.base.activation.delete_interval(client, origin);
        self.base.forward_interval(client)
    }

    fn interval(&self) -> Option<u32> {
        self.base.interval()
    }

    fn get_sensor_data(&self, event_type: EventType) -> Result<Sample, SensorError> {
        if !self.logic.event_types(&self.base).contains(&event_type) {
            return Err(SensorError::UnsupportedEvent(event_type.0));
        }
        self.logic.pull(&self.base, event_type)
    }
}

impl<S: Synthesizer> VirtualSensor for VirtualNode<S> {
    fn as_sensor(&self) -> &dyn Sensor {
        self
    }

    fn dependencies(&self) -> Vec<SensorId> {
        self.base.upstream.iter().map(SensorHandle::id).collect()
    }

    fn synthesize(&self, event: &Event) -> Vec<Event> {
        if !self.base.consumes(event.sensor_id) {
            return Vec::new();
        }
        self.logic.synthesize(&self.base, event)
    }
}
