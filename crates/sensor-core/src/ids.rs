use serde::{Deserialize, Serialize};
use std::fmt;

/// Bit position of the sensor type inside a [`SensorId`].
pub const SENSOR_TYPE_SHIFT: u32 = 32;
/// Bit position of the sensor type inside an [`EventType`].
pub const EVENT_TYPE_SHIFT: u32 = 16;

/// Event subtype carried by every continuous stream.
pub const RAW_DATA_EVENT: u16 = 0x0001;
/// Event subtype for discrete state transitions (proximity, screen rotation).
pub const CHANGE_STATE_EVENT: u16 = 0x0002;

/// Client identifier handed out by the client registry.
pub type ClientId = i32;

/// Kinds of sensors known to the hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SensorType {
    /// Wildcard used only for lookups.
    All,
    Accelerometer,
    Gravity,
    LinearAcceleration,
    Magnetic,
    RotationVector,
    Orientation,
    Gyroscope,
    Light,
    Proximity,
    Pressure,
    Ultraviolet,
    Temperature,
    Humidity,
    GyroscopeUncal,
    Fusion,
    AutoRotation,
    Tilt,
}

impl SensorType {
    pub const fn code(self) -> u32 {
        match self {
            SensorType::All => 0xFFFF,
            SensorType::Accelerometer => 1,
            SensorType::Gravity => 2,
            SensorType::LinearAcceleration => 3,
            SensorType::Magnetic => 4,
            SensorType::RotationVector => 5,
            SensorType::Orientation => 6,
            SensorType::Gyroscope => 7,
            SensorType::Light => 8,
            SensorType::Proximity => 9,
            SensorType::Pressure => 10,
            SensorType::Ultraviolet => 11,
            SensorType::Temperature => 12,
            SensorType::Humidity => 13,
            SensorType::GyroscopeUncal => 17,
            SensorType::Fusion => 0x900,
            SensorType::AutoRotation => 0x901,
            SensorType::Tilt => 0x902,
        }
    }

    pub fn from_code(code: u32) -> Option<Self> {
        const ALL: [SensorType; 18] = [
            SensorType::All,
            SensorType::Accelerometer,
            SensorType::Gravity,
            SensorType::LinearAcceleration,
            SensorType::Magnetic,
            SensorType::RotationVector,
            SensorType::Orientation,
            SensorType::Gyroscope,
            SensorType::Light,
            SensorType::Proximity,
            SensorType::Pressure,
            SensorType::Ultraviolet,
            SensorType::Temperature,
            SensorType::Humidity,
            SensorType::GyroscopeUncal,
            SensorType::Fusion,
            SensorType::AutoRotation,
            SensorType::Tilt,
        ];
        ALL.into_iter().find(|t| t.code() == code)
    }

    /// Physical sensors of this type only report when the reading changes.
    pub fn is_on_change(self) -> bool {
        matches!(self, SensorType::Proximity)
    }

    pub fn raw_event(self) -> EventType {
        EventType::new(self, RAW_DATA_EVENT)
    }

    pub fn change_event(self) -> EventType {
        EventType::new(self, CHANGE_STATE_EVENT)
    }
}

/// `(type << 32) | index`, stable for the lifetime of the hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SensorId(pub i64);

impl SensorId {
    pub fn new(sensor_type: SensorType, index: u32) -> Self {
        Self(((sensor_type.code() as i64) << SENSOR_TYPE_SHIFT) | index as i64)
    }

    pub fn sensor_type(self) -> Option<SensorType> {
        SensorType::from_code((self.0 >> SENSOR_TYPE_SHIFT) as u32)
    }

    pub fn index(self) -> u32 {
        (self.0 & 0xFFFF_FFFF) as u32
    }
}

impl fmt::Display for SensorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// `(type << 16) | subtype`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventType(pub u32);

impl EventType {
    pub fn new(sensor_type: SensorType, subtype: u16) -> Self {
        Self((sensor_type.code() << EVENT_TYPE_SHIFT) | subtype as u32)
    }

    pub fn sensor_type(self) -> Option<SensorType> {
        SensorType::from_code(self.0 >> EVENT_TYPE_SHIFT)
    }

    pub fn subtype(self) -> u16 {
        (self.0 & 0xFFFF) as u16
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sensor_id_encodes_type_and_index() {
        let id = SensorId::new(SensorType::Gyroscope, 3);
        assert_eq!(id.0, (7i64 << 32) | 3);
        assert_eq!(id.sensor_type(), Some(SensorType::Gyroscope));
        assert_eq!(id.index(), 3);
    }

    #[test]
    fn event_type_encodes_type_and_subtype() {
        let ev = SensorType::AutoRotation.change_event();
        assert_eq!(ev.0, (0x901 << 16) | 0x0002);
        assert_eq!(ev.sensor_type(), Some(SensorType::AutoRotation));
        assert_eq!(ev.subtype(), CHANGE_STATE_EVENT);
    }

    #[test]
    fn codes_round_trip() {
        for code in [1, 2, 3, 4, 5, 6, 7, 9, 17, 0x900, 0x901, 0x902] {
            assert_eq!(SensorType::from_code(code).map(SensorType::code), Some(code));
        }
        assert_eq!(SensorType::from_code(0x7777), None);
    }
}
