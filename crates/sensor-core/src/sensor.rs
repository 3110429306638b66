//! Capability traits shared by physical and virtual sensors.

use crate::activation::IntervalOrigin;
use crate::error::SensorError;
use crate::hal::SensorProperties;
use crate::ids::{ClientId, EventType, SensorId, SensorType};
use crate::physical::PhysicalSensor;
use crate::{Event, Sample};
use std::sync::Arc;

pub trait Sensor: Send + Sync {
    fn id(&self) -> SensorId;
    fn sensor_type(&self) -> SensorType;
    fn name(&self) -> &str;
    fn properties(&self) -> SensorProperties;

    /// Event types this sensor publishes.
    fn event_types(&self) -> Vec<EventType>;

    /// Reference-counted; the first start activates the sensor (and for
    /// virtual sensors, recursively its upstream dependencies).
    fn start(&self) -> Result<(), SensorError>;
    fn stop(&self) -> Result<(), SensorError>;
    fn is_started(&self) -> bool;

    fn add_interval(
        &self,
        client: ClientId,
        interval_ms: u32,
        origin: IntervalOrigin,
    ) -> Result<(), SensorError>;
    fn delete_interval(&self, client: ClientId, origin: IntervalOrigin) -> Result<(), SensorError>;

    /// Effective interval: the minimum over all registered requests.
    fn interval(&self) -> Option<u32>;

    /// Synchronous pull of the latest value for `event_type`.
    fn get_sensor_data(&self, event_type: EventType) -> Result<Sample, SensorError>;
}

/// A sensor whose events are derived from other sensors' events.
pub trait VirtualSensor: Sensor {
    fn as_sensor(&self) -> &dyn Sensor;

    /// Upstream sensors this one consumes.
    fn dependencies(&self) -> Vec<SensorId>;

    /// Derives zero or more events from one upstream event. Only the
    /// dispatcher thread calls this.
    fn synthesize(&self, event: &Event) -> Vec<Event>;
}

/// Registry entry: the variant is explicit instead of discovered at runtime.
#[derive(Clone)]
pub enum SensorHandle {
    Physical(Arc<PhysicalSensor>),
    Virtual(Arc<dyn VirtualSensor>),
}

impl SensorHandle {
    pub fn sensor(&self) -> &dyn Sensor {
        match self {
            SensorHandle::Physical(p) => &**p,
            SensorHandle::Virtual(v) => v.as_sensor(),
        }
    }

    pub fn id(&self) -> SensorId {
        self.sensor().id()
    }

    pub fn sensor_type(&self) -> SensorType {
        self.sensor().sensor_type()
    }

    pub fn is_virtual(&self) -> bool {
        matches!(self, SensorHandle::Virtual(_))
    }

    pub fn as_physical(&self) -> Option<&Arc<PhysicalSensor>> {
        match self {
            SensorHandle::Physical(p) => Some(p),
            SensorHandle::Virtual(_) => None,
        }
    }

    pub fn as_virtual(&self) -> Option<&Arc<dyn VirtualSensor>> {
        match self {
            SensorHandle::Physical(_) => None,
            SensorHandle::Virtual(v) => Some(v),
        }
    }
}

impl std::fmt::Debug for SensorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = if self.is_virtual() { "Virtual" } else { "Physical" };
        f.debug_struct(kind)
            .field("id", &self.id())
            .field("name", &self.sensor().name())
            .finish()
    }
}
