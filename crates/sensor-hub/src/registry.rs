//! Sensor registry: every physical and virtual sensor, wired once at startup.

use crate::config::HubConfig;
use sensor_core::{
    ActiveSensors, HalDevice, PhysicalSensor, Sensor, SensorHandle, SensorId, SensorType,
    VirtualSensor,
};
use sensor_virtual::{BuildContext, VirtualSensorFactory};
use sensor_wire::SensorListEntry;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("virtual sensor dependencies form a cycle through {0:?}")]
    DependencyCycle(Vec<SensorType>),
    #[error("more than one factory builds {0:?}")]
    DuplicateFactory(SensorType),
}

/// Orders factories so each comes after the factories it depends on
/// (Kahn's algorithm, ties kept in input order).
fn dependency_order(factories: &[Box<dyn VirtualSensorFactory>]) -> Result<Vec<usize>, RegistryError> {
    let mut by_type: HashMap<SensorType, usize> = HashMap::new();
    for (i, factory) in factories.iter().enumerate() {
        if by_type.insert(factory.sensor_type(), i).is_some() {
            return Err(RegistryError::DuplicateFactory(factory.sensor_type()));
        }
    }

    let mut in_degree = vec![0usize; factories.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); factories.len()];
    for (i, factory) in factories.iter().enumerate() {
        for dep in factory.dependencies() {
            if let Some(&producer) = by_type.get(&dep) {
                in_degree[i] += 1;
                dependents[producer].push(i);
            }
        }
    }

    let mut ready: VecDeque<usize> = (0..factories.len()).filter(|i| in_degree[*i] == 0).collect();
    let mut order = Vec::with_capacity(factories.len());
    while let Some(i) = ready.pop_front() {
        order.push(i);
        for &next in &dependents[i] {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                ready.push_back(next);
            }
        }
    }

    if order.len() < factories.len() {
        let cycle = (0..factories.len())
            .filter(|i| in_degree[*i] > 0)
            .map(|i| factories[i].sensor_type())
            .collect();
        return Err(RegistryError::DependencyCycle(cycle));
    }
    Ok(order)
}

pub struct SensorRegistry {
    sensors: BTreeMap<SensorId, SensorHandle>,
    active: Arc<ActiveSensors>,
}

impl SensorRegistry {
    /// Physical sensors first, one per device, then virtual sensors in
    /// dependency order. A virtual sensor whose dependencies are unavailable
    /// or whose construction fails is dropped with a warning.
    pub fn build(
        devices: Vec<Box<dyn HalDevice>>,
        factories: Vec<Box<dyn VirtualSensorFactory>>,
        config: &HubConfig,
    ) -> Result<Self, RegistryError> {
        let order = dependency_order(&factories)?;
        let mut registry = Self {
            sensors: BTreeMap::new(),
            active: Arc::new(ActiveSensors::new()),
        };

        for device in devices {
            let sensor_type = device.sensor_type();
            let index = registry.next_index(sensor_type);
            let sensor = PhysicalSensor::new(index, device, &config.sensors);
            info!(sensor = %sensor.name(), id = %sensor.id(), "registered physical sensor");
            registry.insert(SensorHandle::Physical(Arc::new(sensor)));
        }

        for (rank, i) in order.into_iter().enumerate() {
            let factory = &factories[i];
            let sensor_type = factory.sensor_type();
            let upstream: Result<Vec<SensorHandle>, SensorType> = factory
                .dependencies()
                .into_iter()
                .map(|dep| registry.get_sensor_by_type(dep).cloned().ok_or(dep))
                .collect();
            let upstream = match upstream {
                Ok(upstream) => upstream,
                Err(missing) => {
                    warn!(sensor_type = ?sensor_type, missing = ?missing, "dependency unavailable, dropping virtual sensor");
                    continue;
                }
            };

            let ctx = BuildContext {
                id: SensorId::new(sensor_type, registry.next_index(sensor_type)),
                rank,
                upstream,
                devices: &config.sensors,
                model_id: &config.model_id,
                fusion: &config.fusion,
                active: registry.active.clone(),
            };
            match factory.create(ctx) {
                Ok(sensor) => {
                    info!(sensor = %sensor.name(), id = %sensor.id(), "registered virtual sensor");
                    registry.insert(SensorHandle::Virtual(sensor));
                }
                Err(e) => {
                    warn!(sensor_type = ?sensor_type, error = %e, "failed to build virtual sensor, dropping it");
                }
            }
        }
        Ok(registry)
    }

    fn next_index(&self, sensor_type: SensorType) -> u32 {
        self.sensors
            .values()
            .filter(|h| h.sensor_type() == sensor_type)
            .count() as u32
    }

    fn insert(&mut self, handle: SensorHandle) {
        self.sensors.insert(handle.id(), handle);
    }

    pub fn get_sensor(&self, id: SensorId) -> Option<&SensorHandle> {
        self.sensors.get(&id)
    }

    /// First sensor of the type, the one virtual sensors bind to.
    pub fn get_sensor_by_type(&self, sensor_type: SensorType) -> Option<&SensorHandle> {
        self.sensors.values().find(|h| h.sensor_type() == sensor_type)
    }

    /// All sensors of the type; [`SensorType::All`] matches everything.
    pub fn get_sensors(&self, sensor_type: SensorType) -> Vec<&SensorHandle> {
        self.sensors
            .values()
            .filter(|h| sensor_type == SensorType::All || h.sensor_type() == sensor_type)
            .collect()
    }

    pub fn get_virtual_sensors(&self) -> Vec<Arc<dyn VirtualSensor>> {
        self.sensors
            .values()
            .filter_map(|h| h.as_virtual().cloned())
            .collect()
    }

    pub fn physical_sensors(&self) -> Vec<Arc<PhysicalSensor>> {
        self.sensors
            .values()
            .filter_map(|h| h.as_physical().cloned())
            .collect()
    }

    pub fn active(&self) -> &Arc<ActiveSensors> {
        &self.active
    }

    /// Started virtual sensors in synthesis order. The active-set lock is not
    /// held once this returns.
    pub fn active_virtual_sensors(&self) -> Vec<Arc<dyn VirtualSensor>> {
        self.active
            .snapshot()
            .into_iter()
            .filter_map(|id| self.sensors.get(&id).and_then(|h| h.as_virtual().cloned()))
            .collect()
    }

    pub fn sensor_list(&self) -> Vec<SensorListEntry> {
        self.sensors
            .values()
            .map(|h| {
                let sensor = h.sensor();
                SensorListEntry {
                    sensor_id: h.id(),
                    sensor_type: h.sensor_type(),
                    event_types: sensor.event_types(),
                    is_virtual: h.is_virtual(),
                    properties: sensor.properties(),
                }
            })
            .collect()
    }
}
