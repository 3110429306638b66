use crate::activation::{Activation, IntervalChange, IntervalOrigin};
use crate::config::DeviceConfig;
use crate::error::SensorError;
use crate::hal::{HalDevice, SensorProperties};
use crate::ids::{ClientId, EventType, SensorId, SensorType};
use crate::sensor::Sensor;
use crate::{Event, Sample};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

/// A sensor backed by a HAL device. Owns no other sensor.
pub struct PhysicalSensor {
    id: SensorId,
    sensor_type: SensorType,
    properties: SensorProperties,
    raw_data_unit: f32,
    on_change: bool,
    device: Mutex<Box<dyn HalDevice>>,
    activation: Activation,
    last: Mutex<Option<Sample>>,
}

impl PhysicalSensor {
    /// Wraps `device` as the `index`-th sensor of its type. An optional
    /// `(type, device name)` config entry supplies the raw-value multiplier.
    pub fn new(index: u32, device: Box<dyn HalDevice>, config: &DeviceConfig) -> Self {
        let sensor_type = device.sensor_type();
        let properties = device.get_properties();
        let raw_data_unit = config
            .find(sensor_type, &properties.name)
            .map(|entry| entry.raw_data_unit)
            .unwrap_or(1.0);
        Self {
            id: SensorId::new(sensor_type, index),
            sensor_type,
            properties,
            raw_data_unit,
            on_change: sensor_type.is_on_change(),
            device: Mutex::new(device),
            activation: Activation::new(),
            last: Mutex::new(None),
        }
    }

    pub fn event_type(&self) -> EventType {
        if self.on_change {
            self.sensor_type.change_event()
        } else {
            self.sensor_type.raw_event()
        }
    }

    /// Reads one sample if the device has one. A failed read is logged and
    /// dropped; on-change sensors report nothing when the value repeats.
    pub fn poll(&self) -> Option<Event> {
        let sample = {
            let mut device = self.device.lock();
            if !device.is_data_ready() {
                return None;
            }
            match device.get_sensor_data() {
                Ok(sample) => sample,
                Err(e) => {
                    warn!(sensor = %self.properties.name, error = %e, "HAL read failed, dropping cycle");
                    return None;
                }
            }
        };

        let scaled: Vec<f32> = sample.values().iter().map(|v| v * self.raw_data_unit).collect();
        let sample = sample.with_values(&scaled);

        let mut last = self.last.lock();
        let repeated = last
            .as_ref()
            .is_some_and(|prev| prev.values() == sample.values());
        if self.on_change && repeated {
            return None;
        }
        *last = Some(sample);
        Some(Event::new(self.id, self.event_type(), sample))
    }

    fn hal_error(&self, operation: &'static str) -> SensorError {
        SensorError::Hal {
            device: self.properties.name.clone(),
            operation,
        }
    }

    fn apply_interval(&self, change: IntervalChange) -> Result<(), SensorError> {
        let Some(requested) = change.after.filter(|_| change.changed()) else {
            return Ok(());
        };
        let interval = requested.max(self.properties.min_interval);
        if !self.device.lock().set_interval(interval) {
            warn!(sensor = %self.properties.name, interval, "HAL rejected interval");
            return Err(self.hal_error("set interval"));
        }
        debug!(sensor = %self.properties.name, interval, "poll interval changed");
        Ok(())
    }
}

impl Sensor for PhysicalSensor {
    fn id(&self) -> SensorId {
        self.id
    }

    fn sensor_type(&self) -> SensorType {
        self.sensor_type
    }

    fn name(&self) -> &str {
        &self.properties.name
    }

    fn properties(&self) -> SensorProperties {
        self.properties.clone()
    }

    fn event_types(&self) -> Vec<EventType> {
        vec![self.event_type()]
    }

    fn start(&self) -> Result<(), SensorError> {
        let activated = self.activation.start(|| {
            if self.device.lock().enable() {
                Ok(())
            } else {
                Err(self.hal_error("enable"))
            }
        })?;
        if activated {
            info!(sensor = %self.properties.name, "hardware polling enabled");
        }
        Ok(())
    }

    fn stop(&self) -> Result<(), SensorError> {
        let deactivated = self.activation.stop(|| {
            if self.device.lock().disable() {
                Ok(())
            } else {
                Err(self.hal_error("disable"))
            }
        })?;
        if deactivated {
            *self.last.lock() = None;
            info!(sensor = %self.properties.name, "hardware polling disabled");
        }
        Ok(())
    }

    fn is_started(&self) -> bool {
        self.activation.is_started()
    }

    fn add_interval(
        &self,
        client: ClientId,
        interval_ms: u32,
        origin: IntervalOrigin,
    ) -> Result<(), SensorError> {
        let change = self.activation.add_interval(client, origin, interval_ms);
        self.apply_interval(change)
    }

    fn delete_interval(&self, client: ClientId, origin: IntervalOrigin) -> Result<(), SensorError> {
        let change = self.activation.delete_interval(client, origin);
        self.apply_interval(change)
    }

    fn interval(&self) -> Option<u32> {
        self.activation.interval()
    }

    fn get_sensor_data(&self, event_type: EventType) -> Result<Sample, SensorError> {
        if event_type != self.event_type() {
            return Err(SensorError::UnsupportedEvent(event_type.0));
        }
        self.last.lock().ok_or(SensorError::NoData)
    }
}
