//! Tests for configuration validation and loading

use prometheus_tier_scheduler::config::{SchedulerConfig, ThresholdConfig, ENV_PREFIX};
use prometheus_tier_scheduler::core::tier::{Threshold, ThresholdTable};
use prometheus_tier_scheduler::SchedulerError;

#[test]
fn test_default_config_validation() {
    let cfg = SchedulerConfig::default();
    assert!(cfg.validate().is_ok());
    assert_eq!(cfg.thresholds.len(), 2);
    assert_eq!(cfg.base_decay_rate, 1.0);
    assert_eq!(cfg.decay_interval_ms, 1_000);
    assert_eq!(cfg.priority_check_interval_ms, 1_000);
    assert_eq!(cfg.cleanup_interval_ms, 60_000);
    assert_eq!(cfg.task_ttl_ms, 300_000);
}

#[test]
fn test_config_invalid_max_concurrency() {
    let invalid = SchedulerConfig {
        max_concurrency: 0,
        ..SchedulerConfig::default()
    };
    assert!(invalid.validate().is_err());
}

#[test]
fn test_config_invalid_thresholds() {
    let empty = SchedulerConfig {
        thresholds: Vec::new(),
        ..SchedulerConfig::default()
    };
    assert!(empty.validate().is_err());

    let unordered = SchedulerConfig {
        thresholds: vec![5.0.into(), 5.0.into()],
        ..SchedulerConfig::default()
    };
    let err = unordered.validate().unwrap_err();
    assert!(err.contains("strictly ascending"), "{err}");

    let infinite = SchedulerConfig {
        thresholds: vec![0.0.into(), f64::INFINITY.into()],
        ..SchedulerConfig::default()
    };
    assert!(infinite.validate().is_err());
}

#[test]
fn test_config_and_table_agree_on_threshold_errors() {
    for values in [vec![], vec![3.0, 1.0], vec![0.0, f64::NAN]] {
        let config = SchedulerConfig {
            thresholds: values.iter().copied().map(ThresholdConfig::from).collect(),
            ..SchedulerConfig::default()
        };
        let table = ThresholdTable::new(values.iter().copied().map(Threshold::new).collect());
        assert_eq!(
            table.unwrap_err(),
            SchedulerError::Configuration(config.validate().unwrap_err())
        );
    }
}

#[test]
fn test_config_invalid_intervals() {
    let invalid = SchedulerConfig {
        decay_interval_ms: 0,
        ..SchedulerConfig::default()
    };
    assert!(invalid.validate().unwrap_err().contains("decay_interval_ms"));

    let invalid = SchedulerConfig {
        task_ttl_ms: 0,
        ..SchedulerConfig::default()
    };
    assert!(invalid.validate().unwrap_err().contains("task_ttl_ms"));

    let invalid = SchedulerConfig {
        base_decay_rate: -1.0,
        ..SchedulerConfig::default()
    };
    assert!(invalid.validate().is_err());
}

#[test]
fn test_config_from_json_mixed_thresholds() {
    let json = r#"{
        "max_concurrency": 8,
        "thresholds": [0, {"value": 5, "label": "interactive"}, 50],
        "task_ttl_ms": 1000
    }"#;
    let cfg = SchedulerConfig::from_json_str(json).unwrap();
    assert_eq!(cfg.max_concurrency, 8);
    assert_eq!(
        cfg.thresholds,
        vec![
            ThresholdConfig::Value(0.0),
            ThresholdConfig::Labeled {
                value: 5.0,
                label: "interactive".to_string()
            },
            ThresholdConfig::Value(50.0),
        ]
    );
    assert_eq!(cfg.task_ttl_ms, 1_000);
    // Unspecified fields keep their defaults.
    assert_eq!(cfg.cleanup_interval_ms, 60_000);
    assert_eq!(cfg.resolved_default_priority(), 50.0);
}

#[test]
fn test_config_from_json_rejects_invalid() {
    assert!(SchedulerConfig::from_json_str("{\"max_concurrency\": 0}").is_err());
    assert!(SchedulerConfig::from_json_str("not json").unwrap_err().contains("parse error"));
}

#[test]
fn test_config_json_roundtrip() {
    let cfg = SchedulerConfig {
        max_concurrency: 3,
        default_priority: Some(2.5),
        ..SchedulerConfig::default()
    };
    let json = serde_json::to_string(&cfg).unwrap();
    assert_eq!(SchedulerConfig::from_json_str(&json).unwrap(), cfg);
}

#[test]
fn test_config_from_vars() {
    let vars = [
        (format!("{ENV_PREFIX}MAX_CONCURRENCY"), "12".to_string()),
        (format!("{ENV_PREFIX}THRESHOLDS"), "[1, 2, 3]".to_string()),
        (format!("{ENV_PREFIX}BASE_DECAY_RATE"), "0.25".to_string()),
        (format!("{ENV_PREFIX}TASK_TTL_MS"), " 5000 ".to_string()),
        (format!("{ENV_PREFIX}DEFAULT_PRIORITY"), "1.5".to_string()),
        ("UNRELATED".to_string(), "ignored".to_string()),
    ];
    let cfg = SchedulerConfig::from_vars(vars).unwrap();
    assert_eq!(cfg.max_concurrency, 12);
    assert_eq!(cfg.thresholds.len(), 3);
    assert_eq!(cfg.base_decay_rate, 0.25);
    assert_eq!(cfg.task_ttl_ms, 5_000);
    assert_eq!(cfg.default_priority, Some(1.5));
}

#[test]
fn test_config_from_vars_reports_bad_value() {
    let err = SchedulerConfig::from_vars([("TIER_SCHEDULER_MAX_CONCURRENCY", "lots")]).unwrap_err();
    assert!(err.contains("TIER_SCHEDULER_MAX_CONCURRENCY"), "{err}");

    let err = SchedulerConfig::from_vars([("TIER_SCHEDULER_MAX_CONCURRENCY", "0")]).unwrap_err();
    assert!(err.contains("max_concurrency"), "{err}");
}
