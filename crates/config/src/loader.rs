//! Configuration loading from multiple sources

use crate::{AppConfig, ConfigError, Result};
use config::{Config, ConfigBuilder, Environment, File, FileFormat};
use std::path::Path;

/// Prefix for environment overrides, e.g. `BATCH_INTENTS_ORCHESTRATOR__MAX_BATCH_SIZE`
pub const DEFAULT_ENV_PREFIX: &str = "BATCH_INTENTS";

/// Configuration loader with support for multiple formats and sources
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a file
    ///
    /// Supports TOML, YAML, and JSON formats based on file extension
    pub fn from_file(path: &Path) -> Result<AppConfig> {
        let parse: fn(&str) -> Result<AppConfig> =
            match path.extension().and_then(|e| e.to_str()) {
                Some("toml") => Self::from_toml,
                Some("yaml" | "yml") => Self::from_yaml,
                Some("json") => Self::from_json,
                _ => return Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
            };

        parse(&std::fs::read_to_string(path)?)
    }

    pub fn from_toml(content: &str) -> Result<AppConfig> {
        toml::from_str(content).map_err(ConfigError::from)
    }

    pub fn from_yaml(content: &str) -> Result<AppConfig> {
        serde_yaml::from_str(content).map_err(ConfigError::from)
    }

    pub fn from_json(content: &str) -> Result<AppConfig> {
        serde_json::from_str(content).map_err(ConfigError::from)
    }

    /// Load configuration from environment variables with the default prefix
    pub fn from_env() -> Result<AppConfig> {
        Self::from_env_with_prefix(DEFAULT_ENV_PREFIX)
    }

    /// Load configuration from environment variables with custom prefix
    ///
    /// Sections are separated by a double underscore:
    /// `PREFIX_SETTLEMENT__AWAIT_TIMEOUT_MS=30000`
    pub fn from_env_with_prefix(prefix: &str) -> Result<AppConfig> {
        Self::builder().add_env(prefix).build()
    }

    /// Load configuration from a file, then apply environment overrides
    ///
    /// Only keys present in the environment replace file values.
    pub fn from_file_with_env(path: &Path, env_prefix: &str) -> Result<AppConfig> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        Self::builder()
            .add_file(path, true)
            .add_env(env_prefix)
            .build()
    }

    /// Build configuration using the config crate's builder pattern
    pub fn builder() -> ConfigLoaderBuilder {
        ConfigLoaderBuilder {
            builder: Config::builder(),
        }
    }
}

/// Builder for layered configuration, later sources win
pub struct ConfigLoaderBuilder {
    builder: ConfigBuilder<config::builder::DefaultState>,
}

impl ConfigLoaderBuilder {
    /// Add a configuration file source
    pub fn add_file(mut self, path: &Path, required: bool) -> Self {
        let format = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => FileFormat::Yaml,
            Some("json") => FileFormat::Json,
            _ => FileFormat::Toml,
        };

        self.builder = self
            .builder
            .add_source(File::from(path).format(format).required(required));
        self
    }

    /// Add environment variable source with prefix
    pub fn add_env(mut self, prefix: &str) -> Self {
        self.builder = self.builder.add_source(
            Environment::with_prefix(prefix)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );
        self
    }

    /// Set a default value for a dotted key such as `metrics.port`
    pub fn set_default(mut self, key: &str, value: &str) -> Result<Self> {
        self.builder = self.builder.set_default(key, value)?;
        Ok(self)
    }

    pub fn build(self) -> Result<AppConfig> {
        let config = self.builder.build()?;
        let app: AppConfig = config.try_deserialize()?;
        tracing::debug!(
            max_batch_size = app.orchestrator.max_batch_size,
            metrics_enabled = app.metrics.enabled,
            "configuration loaded"
        );
        Ok(app)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ApprovalAmountMode, ApprovalPolicy, LogFormat};
    use std::io::Write;

    #[test]
    fn test_load_from_toml() {
        let toml = r#"
            [logging]
            level = "warn"
            format = "json"

            [resilience.retry.submission]
            max_retries = 4
            base_delay_ms = 250
            max_delay_ms = 2000

            [approvals]
            policy = "sum"
            amount = "unlimited"
            spenders = { swap = "0x5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a" }

            [orchestrator]
            max_batch_size = 8
        "#;

        let config = ConfigLoader::from_toml(toml).unwrap();
        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.resilience.retry.submission.max_retries, 4);
        assert_eq!(config.resilience.retry.submission.backoff_multiplier, 2.0);
        assert_eq!(config.approvals.policy, ApprovalPolicy::Sum);
        assert_eq!(config.approvals.amount, ApprovalAmountMode::Unlimited);
        assert_eq!(config.approvals.spenders.len(), 1);
        assert_eq!(config.orchestrator.max_batch_size, 8);
        // Untouched sections keep their defaults
        assert_eq!(config.settlement.await_timeout_ms, 60_000);
        assert_eq!(config.resilience.retry.status_poll.max_retries, 3);
    }

    #[test]
    fn test_load_from_yaml() {
        let yaml = r#"
settlement:
  await_timeout_ms: 30000
  unknown_handle_attempts: 5
metrics:
  enabled: false
  port: 9191
        "#;

        let config = ConfigLoader::from_yaml(yaml).unwrap();
        assert_eq!(config.settlement.await_timeout_ms, 30_000);
        assert_eq!(config.settlement.unknown_handle_attempts, 5);
        assert_eq!(config.settlement.unknown_handle_backoff_ms, 1000);
        assert!(!config.metrics.enabled);
        assert_eq!(config.metrics.listen_addr(), "0.0.0.0:9191");
    }

    #[test]
    fn test_load_from_json() {
        let json = r#"
{
  "resilience": {
    "rate_limit": { "max_requests": 50, "window_ms": 500 },
    "circuit_breaker": { "failure_threshold": 2, "timeout_ms": 1000 }
  },
  "approvals": { "concurrent_reads": false }
}
        "#;

        let config = ConfigLoader::from_json(json).unwrap();
        assert_eq!(config.resilience.rate_limit.max_requests, 50);
        assert_eq!(config.resilience.circuit_breaker.failure_threshold, 2);
        assert!(!config.approvals.concurrent_reads);
        assert_eq!(config.approvals.policy, ApprovalPolicy::Max);
    }

    #[test]
    fn test_empty_document_is_default() {
        assert_eq!(ConfigLoader::from_toml("").unwrap(), AppConfig::default());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        file.write_all(b"[orchestrator]\nmax_batch_size = 3\n").unwrap();

        let config = ConfigLoader::from_file(file.path()).unwrap();
        assert_eq!(config.orchestrator.max_batch_size, 3);
    }

    #[test]
    fn test_unsupported_extension() {
        let file = tempfile::Builder::new().suffix(".ini").tempfile().unwrap();
        let err = ConfigLoader::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_builder_defaults_are_overridden_by_file() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        file.write_all(b"[metrics]\nport = 9300\n").unwrap();

        let config = ConfigLoader::builder()
            .set_default("metrics.port", "9100")
            .unwrap()
            .set_default("logging.level", "debug")
            .unwrap()
            .add_file(file.path(), true)
            .build()
            .unwrap();

        assert_eq!(config.metrics.port, 9300);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_missing_file_with_env() {
        let err = ConfigLoader::from_file_with_env(
            Path::new("/nonexistent/batch-intents.toml"),
            "BATCH_INTENTS_LOADER_TEST",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }
}
