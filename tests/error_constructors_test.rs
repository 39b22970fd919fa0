use helios::error::HeliosError;

#[test]
fn error_constructors_group_1() {
    assert!(matches!(
        HeliosError::config("x"),
        HeliosError::Config { .. }
    ));
    assert!(matches!(
        HeliosError::sensor_unavailable("x"),
        HeliosError::SensorUnavailable { .. }
    ));
    assert!(matches!(
        HeliosError::actuator("x"),
        HeliosError::ActuatorFailure { .. }
    ));
    assert!(matches!(HeliosError::web("x"), HeliosError::Web { .. }));
}

#[test]
fn error_constructors_group_2() {
    assert!(matches!(
        HeliosError::serialization("s"),
        HeliosError::Serialization { .. }
    ));
    assert!(matches!(HeliosError::io("x"), HeliosError::Io { .. }));
    assert!(matches!(
        HeliosError::timeout("x"),
        HeliosError::Timeout { .. }
    ));
    assert!(matches!(
        HeliosError::generic("x"),
        HeliosError::Generic { .. }
    ));
}

#[test]
fn error_messages_name_the_problem() {
    let e = HeliosError::invalid_config("controls.wallbox_min_w", "Must be positive");
    assert_eq!(
        e.to_string(),
        "Invalid configuration: controls.wallbox_min_w - Must be positive"
    );
    assert_eq!(e.kind(), "configuration_invalid");

    let e = HeliosError::invalid_mode("turbo", "off, pv_surplus");
    assert_eq!(
        e.to_string(),
        "Invalid mode 'turbo': expected one of off, pv_surplus"
    );
    assert_eq!(e.kind(), "invalid_mode");
}

#[test]
fn conversions_map_to_variants() {
    let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
    assert!(matches!(HeliosError::from(io), HeliosError::Io { .. }));

    let json = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
    assert!(matches!(
        HeliosError::from(json),
        HeliosError::Serialization { .. }
    ));
}
