//! Configuration loader.

use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;

use crate::error::ConfigError;
use crate::schema::Config;
use crate::validator::{ConfigValidator, ValidationWarning};

/// Configuration loader with environment variable substitution.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Default config file location, `~/.genflow/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".genflow").join("config.toml"))
    }

    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let content = fs::read_to_string(path)?;
        Self::load_str(&content)
    }

    /// Load from `path` if given, else from the default location if it
    /// exists, else fall back to defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Config, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => match Self::default_path().filter(|p| p.exists()) {
                Some(path) => Self::load(&path),
                None => Ok(Config::default()),
            },
        }
    }

    /// Load configuration from a string.
    pub fn load_str(content: &str) -> Result<Config, ConfigError> {
        let expanded = Self::expand_env_vars(content)?;
        let config: Config = toml::from_str(&expanded)?;
        Ok(config)
    }

    /// Reject invalid configuration; hand back warnings for the caller to log.
    pub fn validate(config: &Config) -> Result<Vec<ValidationWarning>, ConfigError> {
        let result = ConfigValidator::validate(config);
        if let Some(error) = result.errors.into_iter().next() {
            return Err(ConfigError::InvalidValue {
                field: error.path,
                message: error.message,
            });
        }
        Ok(result.warnings)
    }

    /// Expand environment variables in the format `${VAR}`.
    fn expand_env_vars(content: &str) -> Result<String, ConfigError> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| ConfigError::InvalidFormat(e.to_string()))?;
        let mut result = content.to_string();

        for cap in re.captures_iter(content) {
            let var_name = &cap[1];
            let var_value =
                std::env::var(var_name).map_err(|_| ConfigError::EnvVarNotSet(var_name.to_string()))?;
            result = result.replace(&cap[0], &var_value);
        }

        Ok(result)
    }

    /// Expand shell-style paths (e.g., `~/.genflow`).
    pub fn expand_path(path: &str) -> String {
        shellexpand::tilde(path).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_empty_config() {
        let config = ConfigLoader::load_str("").unwrap();
        assert_eq!(config.queue.max_concurrent, 2);
        assert_eq!(config.scheduler.default_timeout_secs, 600);
    }

    #[test]
    fn test_load_full_config() {
        let content = r#"
            [store]
            path = "/tmp/genflow-test.db"

            [queue]
            max_concurrent = 4
            poll_interval_ms = 250

            [scheduler]
            tick_interval_secs = 5
            error_backoff_secs = 900

            [generator]
            endpoint = "http://127.0.0.1:9000/generate"
            timeout_secs = 120

            [generator.headers]
            X-Client = "genflow"
        "#;
        let config = ConfigLoader::load_str(content).unwrap();
        assert_eq!(config.store.path, "/tmp/genflow-test.db");
        assert_eq!(config.queue.max_concurrent, 4);
        assert_eq!(config.queue.poll_interval_ms, 250);
        assert_eq!(config.scheduler.tick_interval_secs, 5);
        assert_eq!(config.scheduler.error_backoff_secs, 900);
        assert_eq!(config.scheduler.stuck_threshold_secs, 7200);
        assert_eq!(config.generator.timeout_secs, 120);
        assert_eq!(config.generator.headers["X-Client"], "genflow");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[queue]").unwrap();
        writeln!(file, "max_concurrent = 8").unwrap();

        let config = ConfigLoader::load(file.path()).unwrap();
        assert_eq!(config.queue.max_concurrent, 8);
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = ConfigLoader::load(Path::new("/nonexistent/path/config.toml"));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_load_or_default_with_explicit_missing_path() {
        let result = ConfigLoader::load_or_default(Some(Path::new("/nonexistent/genflow.toml")));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_invalid_toml() {
        let result = ConfigLoader::load_str("invalid = [unclosed");
        assert!(matches!(result, Err(ConfigError::TomlParse(_))));
    }

    #[test]
    fn test_wrong_type_is_rejected() {
        let result = ConfigLoader::load_str("[queue]\nmax_concurrent = \"many\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_expand_env_vars() {
        // SAFETY: This test runs in isolation and sets a unique test-only env var
        unsafe {
            std::env::set_var("GENFLOW_TEST_ENDPOINT", "http://gen.internal:8000");
        }
        let content = "[generator]\nendpoint = \"${GENFLOW_TEST_ENDPOINT}/run\"";
        let config = ConfigLoader::load_str(content).unwrap();
        assert_eq!(config.generator.endpoint, "http://gen.internal:8000/run");
        unsafe {
            std::env::remove_var("GENFLOW_TEST_ENDPOINT");
        }
    }

    #[test]
    fn test_expand_env_vars_not_set() {
        let content = "value = \"${GENFLOW_NONEXISTENT_VAR_12345}\"";
        let result = ConfigLoader::expand_env_vars(content);
        assert!(matches!(result, Err(ConfigError::EnvVarNotSet(name)) if name == "GENFLOW_NONEXISTENT_VAR_12345"));
    }

    #[test]
    fn test_expand_env_vars_no_vars() {
        let content = "value = \"no variables here\"";
        assert_eq!(ConfigLoader::expand_env_vars(content).unwrap(), content);
    }

    #[test]
    fn test_expand_path() {
        let expanded = ConfigLoader::expand_path("~/test");
        assert!(!expanded.starts_with('~'));
        assert!(expanded.ends_with("/test"));
        assert_eq!(ConfigLoader::expand_path("/usr/local/bin"), "/usr/local/bin");
    }

    #[test]
    fn test_validate_rejects_first_error() {
        let config = ConfigLoader::load_str("[queue]\nmax_concurrent = 0").unwrap();
        let err = ConfigLoader::validate(&config).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "queue.max_concurrent"));
    }

    #[test]
    fn test_validate_returns_warnings() {
        let warnings = ConfigLoader::validate(&Config::default()).unwrap();
        assert!(warnings.iter().any(|w| w.path == "generator.endpoint"));
    }
}
