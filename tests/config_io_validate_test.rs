use helios::config::Config;
use helios::error::HeliosError;
use std::fs;

#[test]
fn save_and_load_yaml_roundtrip() {
    let tmp_dir = tempfile::tempdir().unwrap();
    let path = tmp_dir.path().join("config.yaml");

    let mut cfg = Config::default();
    cfg.controls.wallbox_max_w = 7400.0;
    cfg.controls.fast_power_w = 7400.0;
    cfg.timezone = "Europe/Amsterdam".to_string();
    cfg.logging.file = path.with_extension("log").to_string_lossy().to_string();

    cfg.save_to_file(&path).unwrap();
    let loaded = Config::from_file(&path).unwrap();

    assert_eq!(loaded.controls.wallbox_max_w, 7400.0);
    assert_eq!(loaded.timezone, "Europe/Amsterdam");
    assert_eq!(loaded.logging.file, cfg.logging.file);
    assert!(loaded.validate().is_ok());
}

#[test]
fn partial_yaml_fills_defaults() {
    let tmp = tempfile::NamedTempFile::new().unwrap();
    fs::write(
        tmp.path(),
        "controls:\n  wallbox_min_w: 2000\n  ramp_step_w: 2000\ndeparture:\n  default_time: \"06:30\"\n",
    )
    .unwrap();
    let cfg = Config::from_file(tmp.path()).unwrap();
    assert_eq!(cfg.controls.wallbox_min_w, 2000.0);
    assert_eq!(cfg.controls.wallbox_max_w, 11000.0);
    assert_eq!(cfg.departure.default_time, "06:30");
    assert!(cfg.validate().is_ok());
}

fn invalid_field(cfg: &Config) -> String {
    match cfg.validate() {
        Err(HeliosError::ConfigurationInvalid { field, .. }) => field,
        other => panic!("expected ConfigurationInvalid, got {:?}", other),
    }
}

#[test]
fn config_validation_errors() {
    let mut cfg = Config::default();
    cfg.controls.wallbox_min_w = 0.0;
    assert_eq!(invalid_field(&cfg), "controls.wallbox_min_w");

    cfg = Config::default();
    cfg.controls.wallbox_min_w = f64::NAN;
    assert_eq!(invalid_field(&cfg), "controls.wallbox_min_w");

    cfg = Config::default();
    cfg.controls.wallbox_max_w = 1000.0;
    assert_eq!(invalid_field(&cfg), "controls.wallbox_max_w");

    cfg = Config::default();
    cfg.controls.control_interval_s = 0;
    assert_eq!(invalid_field(&cfg), "controls.control_interval_s");

    cfg = Config::default();
    cfg.controls.ramp_step_w = 500.0;
    assert_eq!(invalid_field(&cfg), "controls.ramp_step_w");

    cfg = Config::default();
    cfg.controls.battery_min_soc_pct = 120.0;
    assert_eq!(invalid_field(&cfg), "controls.battery_min_soc_pct");

    cfg = Config::default();
    cfg.departure.default_time = "7am".to_string();
    assert!(cfg.validate().is_err());

    cfg = Config::default();
    cfg.timezone = "Mars/Olympus".to_string();
    assert_eq!(invalid_field(&cfg), "timezone");

    cfg = Config::default();
    cfg.logging.level = "LOUD".to_string();
    assert!(cfg.validate().is_err());
}

#[test]
fn from_file_with_invalid_yaml_fails() {
    let tmp = tempfile::NamedTempFile::new().unwrap();
    fs::write(tmp.path(), "controls: [not, a, map").unwrap();
    let err = Config::from_file(tmp.path()).unwrap_err();
    assert!(matches!(err, HeliosError::Serialization { .. }));
}

#[test]
fn missing_file_is_io_error() {
    let err = Config::from_file("/nonexistent/helios.yaml").unwrap_err();
    assert!(matches!(err, HeliosError::Io { .. }));
}
