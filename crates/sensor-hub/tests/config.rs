use sensor_core::SensorType;
use sensor_fusion::FusionMode;
use sensor_hub::{load_config, save_config, HubConfig};
use std::io::Write;

#[test]
fn absent_file_gives_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = load_config(&dir.path().join("hub.toml")).unwrap();
    assert_eq!(config, HubConfig::default());
}

#[test]
fn file_overrides_and_fills_model_entries() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
model_id = "tm2"

[dispatcher]
record_event_types = ["PROXIMITY"]

[fusion]
mode = "accel_mag"
"#
    )
    .unwrap();

    let config = load_config(file.path()).unwrap();
    assert_eq!(config.model_id, "tm2");
    assert_eq!(config.dispatcher.record_event_types, vec![SensorType::Proximity]);
    assert_eq!(config.fusion.mode, FusionMode::AccelMag);
    let tilt = config.sensors.require(SensorType::Tilt, "tm2").unwrap();
    assert_eq!(tilt.vendor, "generic");
}

#[test]
fn malformed_file_is_an_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "model_id = [").unwrap();
    let err = load_config(file.path()).unwrap_err();
    assert!(format!("{err:#}").contains("parsing"));
}

#[test]
fn saved_config_loads_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hub.toml");
    let mut config = HubConfig::default();
    config.dispatcher.max_batch_events = 16;
    config.fusion.stale_timeout_ms = 0;
    save_config(&path, &config).unwrap();
    assert_eq!(load_config(&path).unwrap(), config);
}
