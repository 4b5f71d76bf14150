use super::*;

fn valid_config() -> Config {
    let mut config = Config::default();
    config.generator.endpoint = "http://localhost:9000/generate".to_string();
    config
}

#[test]
fn test_default_with_endpoint_is_valid() {
    let result = ConfigValidator::validate(&valid_config());
    assert!(result.is_valid());
    assert!(result.warnings.is_empty());
}

#[test]
fn test_missing_endpoint_is_a_warning() {
    let result = ConfigValidator::validate(&Config::default());
    assert!(result.is_valid());
    assert!(result.warnings.iter().any(|w| w.path == "generator.endpoint"));
}

#[test]
fn test_bad_endpoint_scheme() {
    let mut config = valid_config();
    config.generator.endpoint = "ftp://example.com".to_string();
    let result = ConfigValidator::validate(&config);
    assert!(!result.is_valid());
    assert_eq!(result.errors[0].path, "generator.endpoint");
}

#[test]
fn test_zero_concurrency() {
    let mut config = valid_config();
    config.queue.max_concurrent = 0;
    let result = ConfigValidator::validate(&config);
    assert!(!result.is_valid());
    assert!(result.errors.iter().any(|e| e.path == "queue.max_concurrent"));
}

#[test]
fn test_zero_scheduler_values() {
    let mut config = valid_config();
    config.scheduler.tick_interval_secs = 0;
    config.scheduler.max_schedule_errors = 0;
    let result = ConfigValidator::validate(&config);

    let paths: Vec<_> = result.errors.iter().map(|e| e.path.as_str()).collect();
    assert!(paths.contains(&"scheduler.tick_interval_secs"));
    assert!(paths.contains(&"scheduler.max_schedule_errors"));
}

#[test]
fn test_threshold_shorter_than_timeout_warns() {
    let mut config = valid_config();
    config.scheduler.stuck_threshold_secs = 60;
    config.scheduler.default_timeout_secs = 600;
    let result = ConfigValidator::validate(&config);
    assert!(result.is_valid());
    assert!(
        result
            .warnings
            .iter()
            .any(|w| w.path == "scheduler.stuck_threshold_secs")
    );
}

#[test]
fn test_empty_store_path() {
    let mut config = valid_config();
    config.store.path = "  ".to_string();
    assert!(!ConfigValidator::validate(&config).is_valid());
}

#[test]
fn test_scheduler_durations_are_bounded() {
    let mut config = valid_config();
    config.scheduler.error_backoff_secs = 10_000_000_000_000;
    config.scheduler.stuck_threshold_secs = u64::MAX;
    let result = ConfigValidator::validate(&config);

    let paths: Vec<_> = result.errors.iter().map(|e| e.path.as_str()).collect();
    assert!(paths.contains(&"scheduler.error_backoff_secs"));
    assert!(paths.contains(&"scheduler.stuck_threshold_secs"));

    config.scheduler.error_backoff_secs = MAX_DURATION_SECS;
    config.scheduler.stuck_threshold_secs = MAX_DURATION_SECS;
    assert!(ConfigValidator::validate(&config).is_valid());
}
