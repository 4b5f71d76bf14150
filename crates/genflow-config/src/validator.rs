//! Configuration validation.

use crate::schema::Config;

/// Upper bound for any duration setting in seconds (one year).
pub const MAX_DURATION_SECS: u64 = 365 * 24 * 60 * 60;

/// Validation result.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }
}

/// A validation error.
#[derive(Debug)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// A validation warning.
#[derive(Debug)]
pub struct ValidationWarning {
    pub path: String,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration.
    pub fn validate(config: &Config) -> ValidationResult {
        let mut result = ValidationResult::default();

        Self::validate_store(config, &mut result);
        Self::validate_queue(config, &mut result);
        Self::validate_scheduler(config, &mut result);
        Self::validate_generator(config, &mut result);

        result
    }

    fn validate_store(config: &Config, result: &mut ValidationResult) {
        if config.store.path.trim().is_empty() {
            result.add_error(ValidationError::new("store.path", "Path cannot be empty"));
        }
    }

    fn validate_queue(config: &Config, result: &mut ValidationResult) {
        if config.queue.max_concurrent == 0 {
            result.add_error(ValidationError::new(
                "queue.max_concurrent",
                "Must be at least 1",
            ));
        }
        if config.queue.poll_interval_ms == 0 {
            result.add_error(ValidationError::new(
                "queue.poll_interval_ms",
                "Must be at least 1",
            ));
        }
    }

    fn validate_scheduler(config: &Config, result: &mut ValidationResult) {
        let scheduler = &config.scheduler;
        let at_least_one = [
            ("scheduler.tick_interval_secs", scheduler.tick_interval_secs),
            ("scheduler.stuck_sweep_interval_secs", scheduler.stuck_sweep_interval_secs),
            ("scheduler.stuck_threshold_secs", scheduler.stuck_threshold_secs),
            ("scheduler.default_timeout_secs", scheduler.default_timeout_secs),
            ("scheduler.error_backoff_threshold", scheduler.error_backoff_threshold.into()),
            ("scheduler.max_schedule_errors", scheduler.max_schedule_errors.into()),
        ];
        for (path, value) in at_least_one {
            if value == 0 {
                result.add_error(ValidationError::new(path, "Must be at least 1"));
            }
        }

        let durations = [
            ("scheduler.tick_interval_secs", scheduler.tick_interval_secs),
            ("scheduler.stuck_sweep_interval_secs", scheduler.stuck_sweep_interval_secs),
            ("scheduler.stuck_threshold_secs", scheduler.stuck_threshold_secs),
            ("scheduler.default_timeout_secs", scheduler.default_timeout_secs),
            ("scheduler.error_backoff_secs", scheduler.error_backoff_secs),
        ];
        for (path, value) in durations {
            if value > MAX_DURATION_SECS {
                result.add_error(ValidationError::new(
                    path,
                    format!("Must be at most {} seconds", MAX_DURATION_SECS),
                ));
            }
        }

        // A run that may legitimately outlast the threshold would be swept.
        if scheduler.stuck_threshold_secs > 0
            && scheduler.default_timeout_secs > scheduler.stuck_threshold_secs
        {
            result.add_warning(ValidationWarning::new(
                "scheduler.stuck_threshold_secs",
                "Shorter than default_timeout_secs; long runs will be treated as stuck",
            ));
        }
    }

    fn validate_generator(config: &Config, result: &mut ValidationResult) {
        let generator = &config.generator;
        if generator.endpoint.is_empty() {
            result.add_warning(ValidationWarning::new(
                "generator.endpoint",
                "No generator endpoint configured; every job will fail",
            ));
        } else if !generator.endpoint.starts_with("http://")
            && !generator.endpoint.starts_with("https://")
        {
            result.add_error(ValidationError::new(
                "generator.endpoint",
                "Must be an http:// or https:// URL",
            ));
        }

        if generator.timeout_secs == 0 {
            result.add_error(ValidationError::new(
                "generator.timeout_secs",
                "Must be at least 1",
            ));
        }
    }
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;
