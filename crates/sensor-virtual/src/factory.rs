use crate::{auto_rotation, fusion, gravity, gyro_uncal, linear_accel, orientation, rotation_vector, tilt};
use sensor_core::{
    ActiveSensors, DeviceConfig, ModelConfig, SensorError, SensorHandle, SensorId, SensorProperties,
    SensorType, VirtualSensor,
};
use sensor_fusion::FusionConfig;
use std::sync::Arc;

/// Everything a factory may consult while building one virtual sensor.
pub struct BuildContext<'a> {
    pub id: SensorId,
    /// Position in dependency order; lower ranks synthesize first.
    pub rank: usize,
    /// Resolved upstream handles, in the order of the factory's dependencies.
    pub upstream: Vec<SensorHandle>,
    pub devices: &'a DeviceConfig,
    pub model_id: &'a str,
    pub fusion: &'a FusionConfig,
    pub active: Arc<ActiveSensors>,
}

impl BuildContext<'_> {
    pub fn model_entry(&self, sensor_type: SensorType) -> Result<&ModelConfig, SensorError> {
        self.devices.require(sensor_type, self.model_id)
    }

    pub fn upstream_properties(&self, sensor_type: SensorType) -> Result<SensorProperties, SensorError> {
        self.upstream
            .iter()
            .find(|h| h.sensor_type() == sensor_type)
            .map(|h| h.sensor().properties())
            .ok_or(SensorError::MissingDependency(sensor_type))
    }

    /// Vendor string from the model entry, if there is one.
    pub fn vendor(&self, sensor_type: SensorType) -> String {
        self.devices
            .find(sensor_type, self.model_id)
            .map(|e| e.vendor.clone())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| "virtual".to_string())
    }
}

pub trait VirtualSensorFactory: Send + Sync {
    fn sensor_type(&self) -> SensorType;
    fn dependencies(&self) -> Vec<SensorType>;
    fn create(&self, ctx: BuildContext<'_>) -> Result<Arc<dyn VirtualSensor>, SensorError>;
}

type BuildFn = fn(BuildContext<'_>) -> Result<Arc<dyn VirtualSensor>, SensorError>;

/// Factory backed by a plain constructor function.
pub struct FnFactory {
    sensor_type: SensorType,
    dependencies: Vec<SensorType>,
    build: BuildFn,
}

impl FnFactory {
    pub fn new(sensor_type: SensorType, dependencies: Vec<SensorType>, build: BuildFn) -> Self {
        Self {
            sensor_type,
            dependencies,
            build,
        }
    }
}

impl VirtualSensorFactory for FnFactory {
    fn sensor_type(&self) -> SensorType {
        self.sensor_type
    }

    fn dependencies(&self) -> Vec<SensorType> {
        self.dependencies.clone()
    }

    fn create(&self, ctx: BuildContext<'_>) -> Result<Arc<dyn VirtualSensor>, SensorError> {
        (self.build)(ctx)
    }
}

/// The stock virtual sensor set. Fusion inputs follow the configured mode.
pub fn builtin_factories(fusion: &FusionConfig) -> Vec<Box<dyn VirtualSensorFactory>> {
    vec![
        Box::new(FnFactory::new(
            SensorType::Fusion,
            fusion.mode.inputs().to_vec(),
            fusion::create,
        )),
        Box::new(FnFactory::new(
            SensorType::RotationVector,
            vec![SensorType::Fusion],
            rotation_vector::create,
        )),
        Box::new(FnFactory::new(
            SensorType::Orientation,
            vec![SensorType::Fusion],
            orientation::create,
        )),
        Box::new(FnFactory::new(
            SensorType::Gravity,
            vec![SensorType::Orientation],
            gravity::create,
        )),
        Box::new(FnFactory::new(
            SensorType::LinearAcceleration,
            vec![SensorType::Accelerometer, SensorType::Gravity],
            linear_accel::create,
        )),
        Box::new(FnFactory::new(SensorType::Tilt, vec![SensorType::Fusion], tilt::create)),
        Box::new(FnFactory::new(
            SensorType::GyroscopeUncal,
            vec![SensorType::Gyroscope],
            gyro_uncal::create,
        )),
        Box::new(FnFactory::new(
            SensorType::AutoRotation,
            vec![SensorType::Accelerometer],
            auto_rotation::create,
        )),
    ]
}
