use std::fs;
use tempo_sync::config::Config;
use tempo_sync::error::TempoError;

#[test]
fn save_and_load_yaml_roundtrip() {
    let tmp_dir = tempfile::tempdir().unwrap();
    let path = tmp_dir.path().join("config.yaml");

    let mut cfg = Config::default();
    cfg.api.client_id = "abc".to_string();
    cfg.schedule.confirm_minute = 45;
    cfg.logging.file = Some(tmp_dir.path().join("logs").to_string_lossy().to_string());

    cfg.save_to_file(&path).unwrap();
    let loaded = Config::from_file(&path).unwrap();

    assert_eq!(loaded.api.client_id, "abc");
    assert_eq!(loaded.schedule.confirm_minute, 45);
    assert_eq!(loaded.logging.file, cfg.logging.file);
}

#[test]
fn partial_yaml_fills_defaults() {
    let tmp = tempfile::NamedTempFile::new().unwrap();
    fs::write(
        tmp.path(),
        b"api:\n  client_id: id\n  client_secret: secret\nschedule:\n  change_hour: 7\n",
    )
    .unwrap();

    let cfg = Config::from_file(tmp.path()).unwrap();
    assert!(cfg.has_credentials());
    assert_eq!(cfg.schedule.change_hour, 7);
    assert_eq!(cfg.schedule.confirm_hour, 10);
    assert_eq!(cfg.retry.max_attempts, 3);
    assert_eq!(cfg.circuit_breaker.recovery_timeout_secs, 300);
    assert!(cfg.validate().is_ok());
}

#[test]
fn config_validation_errors() {
    let field_of = |cfg: &Config| match cfg.validate() {
        Err(TempoError::Validation { field, .. }) => field,
        other => panic!("expected validation error, got {:?}", other),
    };

    let mut cfg = Config::default();
    cfg.api.calendar_endpoint.clear();
    assert_eq!(field_of(&cfg), "api.calendar_endpoint");

    cfg = Config::default();
    cfg.api.request_timeout_secs = 0;
    assert_eq!(field_of(&cfg), "api.request_timeout_secs");

    cfg = Config::default();
    cfg.retry.max_attempts = 0;
    assert_eq!(field_of(&cfg), "retry.max_attempts");

    cfg = Config::default();
    cfg.circuit_breaker.failure_threshold = 0;
    assert_eq!(field_of(&cfg), "circuit_breaker.failure_threshold");

    cfg = Config::default();
    cfg.schedule.timezone = "Mars/Olympus".to_string();
    assert_eq!(field_of(&cfg), "schedule.timezone");

    cfg = Config::default();
    cfg.schedule.confirm_check_hour = 24;
    assert_eq!(field_of(&cfg), "schedule.confirm_check_hour");

    cfg = Config::default();
    cfg.schedule.confirm_minute = 60;
    assert_eq!(field_of(&cfg), "schedule.confirm_minute");
}

#[test]
fn invalid_log_level_is_rejected() {
    let mut cfg = Config::default();
    cfg.logging.level = "LOUD".to_string();
    assert!(cfg.validate().is_err());

    cfg.logging.level = "warning".to_string();
    assert!(cfg.validate().is_ok());
}

#[test]
fn env_style_overrides_ignore_blank_values() {
    let mut cfg = Config::default();
    cfg.api.client_id = "from-file".to_string();
    cfg.apply_overrides_from(|key| match key {
        "TEMPO_CLIENT_ID" => Some("  ".to_string()),
        "TEMPO_CLIENT_SECRET" => Some("from-env".to_string()),
        "TEMPO_LOG_LEVEL" => Some("DEBUG".to_string()),
        _ => None,
    });
    assert_eq!(cfg.api.client_id, "from-file");
    assert_eq!(cfg.api.client_secret, "from-env");
    assert_eq!(cfg.logging.level, "DEBUG");
}

#[test]
fn from_file_with_invalid_yaml_fails() {
    let tmp = tempfile::NamedTempFile::new().unwrap();
    fs::write(tmp.path(), b"api: [unclosed").unwrap();
    let err = Config::from_file(tmp.path()).unwrap_err();
    let msg = format!("{}", err);
    assert!(msg.contains("Serialization error"));
}

#[test]
fn from_missing_file_is_io_error() {
    let tmp_dir = tempfile::tempdir().unwrap();
    let err = Config::from_file(tmp_dir.path().join("absent.yaml")).unwrap_err();
    assert!(matches!(err, TempoError::Io { .. }));
}
