//! Tests for configuration validation

use std::collections::HashMap;
use std::time::Duration;

use periodic_exporter_scheduler::config::SchedulerConfig;

#[test]
fn test_default_config_is_valid() {
    let config = SchedulerConfig::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.worker_count, 8);
    assert_eq!(config.poll_interval(), Duration::from_millis(200));
    assert_eq!(config.hard_wait_chunk(), Duration::from_secs(3_600));
}

#[test]
fn test_config_invalid_worker_count() {
    let invalid = SchedulerConfig::new().with_worker_count(0);
    assert!(invalid.validate().is_err());
}

#[test]
fn test_config_invalid_stack_size() {
    let invalid = SchedulerConfig::new().with_thread_stack_size(1_024);
    assert!(invalid.validate().is_err());
}

#[test]
fn test_config_invalid_poll_interval() {
    let invalid = SchedulerConfig::new().with_poll_interval_ms(0);
    assert!(invalid.validate().is_err());
}

#[test]
fn test_zero_grace_is_allowed() {
    let config = SchedulerConfig::new().with_shutdown_grace_ms(0);
    assert!(config.validate().is_ok());
    assert_eq!(config.shutdown_grace(), Duration::ZERO);
}

#[test]
fn test_config_from_json() {
    let json = r#"{
        "worker_count": 4,
        "shutdown_grace_ms": 250
    }"#;

    let config = SchedulerConfig::from_json_str(json).unwrap();
    assert_eq!(config.worker_count, 4);
    assert_eq!(config.shutdown_grace(), Duration::from_millis(250));
    // missing fields keep their defaults
    assert_eq!(config.poll_interval_ms, 200);
}

#[test]
fn test_config_from_json_rejects_invalid() {
    assert!(SchedulerConfig::from_json_str(r#"{"worker_count": 0}"#).is_err());
    assert!(SchedulerConfig::from_json_str("not json").is_err());
}

#[test]
fn test_config_from_lookup() {
    let vars: HashMap<&str, &str> = [("SCHEDULER_WORKERS", "3"), ("SCHEDULER_POLL_INTERVAL_MS", " 50 ")]
        .into_iter()
        .collect();

    let config = SchedulerConfig::from_lookup(|key| vars.get(key).map(|v| (*v).to_string())).unwrap();
    assert_eq!(config.worker_count, 3);
    assert_eq!(config.poll_interval_ms, 50);
    assert_eq!(config.shutdown_timeout_ms, SchedulerConfig::default().shutdown_timeout_ms);
}

#[test]
fn test_config_from_lookup_rejects_garbage() {
    let err = SchedulerConfig::from_lookup(|key| (key == "SCHEDULER_WORKERS").then(|| "many".to_string()))
        .unwrap_err();
    assert!(err.contains("SCHEDULER_WORKERS"));
}
