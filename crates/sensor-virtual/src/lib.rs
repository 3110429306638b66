//! # Sensor Virtual
//!
//! Sensors whose events are derived from other sensors' events. Every virtual
//! sensor is a [`VirtualNode`]: shared activation and interval forwarding
//! around a sensor-specific [`Synthesizer`].
//!
//! The stock graph:
//!
//! ```text
//! accel ─┬──────────────► fusion ─┬─► rotation vector
//! gyro  ─┤                        ├─► orientation ──► gravity ─┐
//! mag   ─┘                        └─► tilt                     ▼
//! accel ─────────────────────────────────────────► linear acceleration
//! accel ──► auto rotation
//! gyro  ──► uncalibrated gyro
//! ```

pub mod auto_rotation;
pub mod factory;
pub mod fusion;
pub mod gravity;
pub mod gyro_uncal;
pub mod linear_accel;
pub mod node;
pub mod orientation;
pub mod rotation_vector;
pub mod tilt;

pub use factory::{BuildContext, FnFactory, VirtualSensorFactory, builtin_factories};
pub use node::{INTERNAL_CLIENT, Synthesizer, VirtualBase, VirtualNode};

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use sensor_core::{
        Accuracy, ActiveSensors, DeviceConfig, Event, HalDevice, IntervalOrigin, ModelConfig,
        PhysicalSensor, Sample, SensorError, SensorHandle, SensorId, SensorProperties, SensorType,
    };
    use sensor_fusion::{FusionConfig, FusionMode};
    use sensor_math::GRAVITY;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingDevice {
        sensor_type: SensorType,
        enables: Arc<AtomicU32>,
        disables: Arc<AtomicU32>,
        accepts_interval: bool,
    }

    impl HalDevice for CountingDevice {
        fn sensor_type(&self) -> SensorType {
            self.sensor_type
        }

        fn get_properties(&self) -> SensorProperties {
            SensorProperties::synthetic(&format!("{:?}", self.sensor_type), "test", -100.0, 100.0)
        }

        fn enable(&mut self) -> bool {
            self.enables.fetch_add(1, Ordering::SeqCst);
            true
        }

        fn disable(&mut self) -> bool {
            self.disables.fetch_add(1, Ordering::SeqCst);
            true
        }

        fn set_interval(&mut self, _interval_ms: u32) -> bool {
            self.accepts_interval
        }

        fn is_data_ready(&mut self) -> bool {
            false
        }

        fn get_sensor_data(&mut self) -> Result<Sample, SensorError> {
            Err(SensorError::NoData)
        }
    }

    fn model_config() -> DeviceConfig {
        let mut config = DeviceConfig::default();
        for entry in [
            ModelConfig::new(SensorType::RotationVector, "default", "acme").with_sampling_time(10),
            ModelConfig::new(SensorType::Gravity, "default", "acme").with_sampling_time(10),
            ModelConfig::new(SensorType::LinearAcceleration, "default", "acme").with_sampling_time(10),
            ModelConfig::new(SensorType::Orientation, "default", "acme")
                .with_value(orientation::AZIMUTH_COMPENSATION, 1.0)
                .with_value(orientation::PITCH_COMPENSATION, -1.0)
                .with_value(orientation::ROLL_COMPENSATION, 1.0),
        ] {
            config.upsert(entry);
        }
        config
    }

    struct Graph {
        sensors: HashMap<SensorType, SensorHandle>,
        counters: HashMap<SensorType, (Arc<AtomicU32>, Arc<AtomicU32>)>,
        active: Arc<ActiveSensors>,
    }

    impl Graph {
        fn build(fusion: FusionConfig, config: &DeviceConfig) -> Self {
            let mut sensors = HashMap::new();
            let mut counters = HashMap::new();
            for sensor_type in [SensorType::Accelerometer, SensorType::Gyroscope, SensorType::Magnetic] {
                let enables = Arc::new(AtomicU32::new(0));
                let disables = Arc::new(AtomicU32::new(0));
                let device = CountingDevice {
                    sensor_type,
                    enables: enables.clone(),
                    disables: disables.clone(),
                    accepts_interval: true,
                };
                let physical = PhysicalSensor::new(0, Box::new(device), config);
                sensors.insert(sensor_type, SensorHandle::Physical(Arc::new(physical)));
                counters.insert(sensor_type, (enables, disables));
            }

            let active = Arc::new(ActiveSensors::new());
            for (rank, factory) in builtin_factories(&fusion).into_iter().enumerate() {
                let upstream: Option<Vec<_>> = factory
                    .dependencies()
                    .iter()
                    .map(|t| sensors.get(t).cloned())
                    .collect();
                let Some(upstream) = upstream else { continue };
                let ctx = BuildContext {
                    id: SensorId::new(factory.sensor_type(), 0),
                    rank,
                    upstream,
                    devices: config,
                    model_id: "default",
                    fusion: &fusion,
                    active: active.clone(),
                };
                if let Ok(sensor) = factory.create(ctx) {
                    sensors.insert(factory.sensor_type(), SensorHandle::Virtual(sensor));
                }
            }
            Self {
                sensors,
                counters,
                active,
            }
        }

        fn get(&self, sensor_type: SensorType) -> &SensorHandle {
            &self.sensors[&sensor_type]
        }

        /// Cascades one seed through the active sensors in rank order.
        fn dispatch(&self, seed: Event) -> Vec<Event> {
            let by_id: HashMap<SensorId, &SensorHandle> =
                self.sensors.values().map(|h| (h.id(), h)).collect();
            let mut queue = VecDeque::from([seed]);
            let mut out = Vec::new();
            while let Some(event) = queue.pop_front() {
                for id in self.active.snapshot() {
                    if let Some(v) = by_id.get(&id).and_then(|h| h.as_virtual()) {
                        queue.extend(v.synthesize(&event));
                    }
                }
                out.push(event);
            }
            out
        }

        fn raw(&self, sensor_type: SensorType, ts: u64, values: [f32; 3]) -> Event {
            Event::new(
                self.get(sensor_type).id(),
                sensor_type.raw_event(),
                Sample::new(ts, Accuracy::Good, &values),
            )
        }
    }

    fn find(events: &[Event], sensor_type: SensorType) -> Option<Event> {
        events
            .iter()
            .rev()
            .find(|e| e.sensor_id.sensor_type() == Some(sensor_type))
            .copied()
    }

    fn accel_mag() -> FusionConfig {
        FusionConfig {
            mode: FusionMode::AccelMag,
            ..FusionConfig::default()
        }
    }

    #[test]
    fn builds_every_stock_sensor_with_model_config() {
        let mut config = model_config();
        config.upsert(
            ModelConfig::new(SensorType::Tilt, "default", "acme")
                .with_value(orientation::PITCH_COMPENSATION, 1.0)
                .with_value(orientation::ROLL_COMPENSATION, 1.0)
                .with_value(tilt::OUTPUT_DEGREES, 1.0),
        );
        let graph = Graph::build(FusionConfig::default(), &config);
        assert_eq!(graph.sensors.len(), 3 + 8);
        let gravity = graph.get(SensorType::Gravity).as_virtual().unwrap();
        assert_eq!(gravity.dependencies(), vec![graph.get(SensorType::Orientation).id()]);
        assert_eq!(gravity.properties().vendor, "acme");
    }

    #[test]
    fn missing_config_key_fails_closed() {
        let graph = Graph::build(FusionConfig::default(), &model_config());
        // No TILT entry in the model config.
        assert!(!graph.sensors.contains_key(&SensorType::Tilt));

        let fusion = FusionConfig::default();
        let empty = DeviceConfig::default();
        let factory = builtin_factories(&fusion)
            .into_iter()
            .find(|f| f.sensor_type() == SensorType::Tilt)
            .unwrap();
        let ctx = BuildContext {
            id: SensorId::new(SensorType::Tilt, 0),
            rank: 0,
            upstream: vec![graph.get(SensorType::Fusion).clone()],
            devices: &empty,
            model_id: "default",
            fusion: &fusion,
            active: Arc::new(ActiveSensors::new()),
        };
        assert!(matches!(factory.create(ctx), Err(SensorError::MissingConfig { .. })));
    }

    #[test]
    fn shared_sensor_stops_hardware_once() {
        let graph = Graph::build(accel_mag(), &model_config());
        let linear = graph.get(SensorType::LinearAcceleration).sensor();
        let accel = graph.get(SensorType::Accelerometer).sensor();
        let (enables, disables) = &graph.counters[&SensorType::Accelerometer];

        linear.start().unwrap();
        linear.start().unwrap();
        assert_eq!(enables.load(Ordering::SeqCst), 1);

        linear.stop().unwrap();
        assert!(linear.is_started());
        assert!(accel.is_started());
        assert!(graph.get(SensorType::Fusion).sensor().is_started());
        assert_eq!(disables.load(Ordering::SeqCst), 0);

        linear.stop().unwrap();
        assert!(!accel.is_started());
        assert!(!graph.get(SensorType::Gravity).sensor().is_started());
        assert_eq!(disables.load(Ordering::SeqCst), 1);
        assert!(graph.active.snapshot().is_empty());
    }

    #[test]
    fn level_device_cascade() {
        let graph = Graph::build(accel_mag(), &model_config());
        graph.get(SensorType::RotationVector).sensor().start().unwrap();
        graph.get(SensorType::LinearAcceleration).sensor().start().unwrap();

        let mut events = graph.dispatch(graph.raw(SensorType::Magnetic, 1_000, [0.0, 22.0, -40.0]));
        events.extend(graph.dispatch(graph.raw(SensorType::Accelerometer, 2_000, [0.0, 0.0, GRAVITY])));

        let rv = find(&events, SensorType::RotationVector).unwrap();
        assert_eq!(rv.data.timestamp, 2_000);
        let expected = [0.0, 0.0, 0.0, 1.0];
        for (v, e) in rv.data.values().iter().zip(expected) {
            assert_abs_diff_eq!(v.abs(), e, epsilon = 1e-4);
        }

        let gravity = find(&events, SensorType::Gravity).unwrap();
        assert_abs_diff_eq!(gravity.data.values()[0], 0.0, epsilon = 1e-3);
        assert_abs_diff_eq!(gravity.data.values()[1], 0.0, epsilon = 1e-3);
        assert_abs_diff_eq!(gravity.data.values()[2], GRAVITY, epsilon = 1e-3);

        // Linear acceleration waits for a gravity estimate.
        assert!(find(&events, SensorType::LinearAcceleration).is_none());
        let events = graph.dispatch(graph.raw(SensorType::Accelerometer, 20_000, [0.0, 0.0, GRAVITY]));
        let linear = find(&events, SensorType::LinearAcceleration).unwrap();
        assert_eq!(linear.data.timestamp, 20_000);
        for v in linear.data.values() {
            assert_abs_diff_eq!(*v, 0.0, epsilon = 1e-3);
        }
    }

    #[test]
    fn inactive_sensors_do_not_synthesize() {
        let graph = Graph::build(accel_mag(), &model_config());
        let events = graph.dispatch(graph.raw(SensorType::Accelerometer, 1, [0.0, 9.8, 0.0]));
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn client_interval_reaches_hardware_and_is_withdrawn() {
        let graph = Graph::build(accel_mag(), &model_config());
        let gravity = graph.get(SensorType::Gravity).sensor();
        let accel = graph.get(SensorType::Accelerometer).sensor();

        gravity.add_interval(7, 20, IntervalOrigin::Direct).unwrap();
        assert_eq!(gravity.interval(), Some(20));
        assert_eq!(graph.get(SensorType::Fusion).sensor().interval(), Some(20));
        assert_eq!(accel.interval(), Some(20));

        // Same client on the raw stream keeps its own entry.
        accel.add_interval(7, 50, IntervalOrigin::Direct).unwrap();
        gravity.delete_interval(7, IntervalOrigin::Direct).unwrap();
        assert_eq!(accel.interval(), Some(50));
        assert_eq!(gravity.interval(), Some(10));
    }

    #[test]
    fn started_sensor_requests_default_interval_upstream() {
        let graph = Graph::build(accel_mag(), &model_config());
        let gravity = graph.get(SensorType::Gravity).sensor();
        let orientation = graph.get(SensorType::Orientation).sensor();
        gravity.start().unwrap();
        assert_eq!(orientation.interval(), Some(10));
        gravity.stop().unwrap();
        assert_eq!(orientation.interval(), None);
    }

    #[test]
    fn pull_recomputes_from_upstream() {
        let graph = Graph::build(accel_mag(), &model_config());
        let rv = graph.get(SensorType::RotationVector).sensor();
        assert_eq!(
            rv.get_sensor_data(SensorType::RotationVector.raw_event()),
            Err(SensorError::NoData)
        );
        assert!(matches!(
            rv.get_sensor_data(SensorType::Gravity.raw_event()),
            Err(SensorError::UnsupportedEvent(_))
        ));
    }

    struct Silent;

    impl Synthesizer for Silent {
        fn synthesize(&self, _base: &VirtualBase, _event: &Event) -> Vec<Event> {
            Vec::new()
        }

        fn pull(&self, _base: &VirtualBase, _event_type: sensor_core::EventType) -> Result<Sample, SensorError> {
            Err(SensorError::NoData)
        }
    }

    #[test]
    fn rejected_default_interval_rolls_back_upstream() {
        use sensor_core::Sensor;

        let counters: Vec<(Arc<AtomicU32>, Arc<AtomicU32>)> = (0..2)
            .map(|_| (Arc::new(AtomicU32::new(0)), Arc::new(AtomicU32::new(0))))
            .collect();
        let upstream: Vec<SensorHandle> = [(SensorType::Accelerometer, true), (SensorType::Gyroscope, false)]
            .into_iter()
            .zip(&counters)
            .map(|((sensor_type, accepts_interval), (enables, disables))| {
                let device = CountingDevice {
                    sensor_type,
                    enables: enables.clone(),
                    disables: disables.clone(),
                    accepts_interval,
                };
                let physical = PhysicalSensor::new(0, Box::new(device), &DeviceConfig::default());
                SensorHandle::Physical(Arc::new(physical))
            })
            .collect();

        let active = Arc::new(ActiveSensors::new());
        let properties = SensorProperties::synthetic("silent", "test", 0.0, 1.0);
        let base = VirtualBase::new(
            SensorId::new(SensorType::LinearAcceleration, 0),
            0,
            properties,
            upstream.clone(),
            active.clone(),
        )
        .with_default_interval(10);
        let node = VirtualNode::new(base, Silent);

        assert!(matches!(node.start(), Err(SensorError::Hal { .. })));
        assert!(!node.is_started());
        assert!(active.snapshot().is_empty());
        for (handle, (enables, disables)) in upstream.iter().zip(&counters) {
            assert!(!handle.sensor().is_started());
            assert_eq!(handle.sensor().interval(), None);
            assert_eq!(enables.load(Ordering::SeqCst), 1);
            assert_eq!(disables.load(Ordering::SeqCst), 1);
        }
    }
}
