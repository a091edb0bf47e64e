//! Configuration validation

use crate::{AppConfig, ConfigError, Result, RetrySettings};

/// Intent kinds that may carry a registered spender
pub const SPENDER_KINDS: &[&str] = &["swap", "limit_order", "other"];

/// Validation error details
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate the entire application configuration
pub fn validate_config(config: &AppConfig) -> Result<()> {
    let mut errors = Vec::new();

    if let Err(e) = validate_log_level("logging.level", &config.logging.level) {
        errors.push(e);
    }
    if let Err(e) = validate_log_level("logging.crate_level", &config.logging.crate_level) {
        errors.push(e);
    }

    let resilience = &config.resilience;
    if resilience.rate_limit.max_requests == 0 {
        errors.push(ValidationError::new(
            "resilience.rate_limit.max_requests",
            "must be greater than 0",
        ));
    }
    if resilience.rate_limit.window_ms == 0 {
        errors.push(ValidationError::new(
            "resilience.rate_limit.window_ms",
            "must be greater than 0",
        ));
    }
    if resilience.circuit_breaker.failure_threshold == 0 {
        errors.push(ValidationError::new(
            "resilience.circuit_breaker.failure_threshold",
            "must be greater than 0",
        ));
    }
    if resilience.circuit_breaker.timeout_ms == 0 {
        errors.push(ValidationError::new(
            "resilience.circuit_breaker.timeout_ms",
            "must be greater than 0",
        ));
    }

    let retry = &resilience.retry;
    for (name, settings) in [
        ("allowance_read", &retry.allowance_read),
        ("submission", &retry.submission),
        ("status_poll", &retry.status_poll),
        ("quote", &retry.quote),
    ] {
        errors.extend(validate_retry(&format!("resilience.retry.{name}"), settings));
    }

    if config.settlement.await_timeout_ms == 0 {
        errors.push(ValidationError::new(
            "settlement.await_timeout_ms",
            "must be greater than 0",
        ));
    }
    if config.settlement.unknown_handle_attempts == 0 {
        errors.push(ValidationError::new(
            "settlement.unknown_handle_attempts",
            "must be greater than 0",
        ));
    }

    for (kind, address) in &config.approvals.spenders {
        if !SPENDER_KINDS.contains(&kind.as_str()) {
            errors.push(ValidationError::new(
                format!("approvals.spenders.{kind}"),
                format!("unknown intent kind, must be one of: {}", SPENDER_KINDS.join(", ")),
            ));
        }
        if let Err(e) = validate_address(address) {
            errors.push(ValidationError::new(format!("approvals.spenders.{kind}"), e));
        }
    }

    if config.orchestrator.max_batch_size == 0 {
        errors.push(ValidationError::new(
            "orchestrator.max_batch_size",
            "must be greater than 0",
        ));
    }

    if config.metrics.enabled && config.metrics.port == 0 {
        errors.push(ValidationError::new(
            "metrics.port",
            "metrics port must be greater than 0",
        ));
    }

    if !errors.is_empty() {
        let joined = errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        return Err(ConfigError::Invalid(joined));
    }

    Ok(())
}

fn validate_retry(field: &str, settings: &RetrySettings) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if settings.base_delay_ms > settings.max_delay_ms {
        errors.push(ValidationError::new(
            format!("{field}.base_delay_ms"),
            "must not exceed max_delay_ms",
        ));
    }
    if settings.backoff_multiplier < 1.0 {
        errors.push(ValidationError::new(
            format!("{field}.backoff_multiplier"),
            "must be at least 1.0",
        ));
    }

    errors
}

/// Validate a 20-byte hex address with `0x` prefix
pub fn validate_address(address: &str) -> std::result::Result<(), String> {
    let Some(hex) = address.strip_prefix("0x") else {
        return Err(format!("address '{address}' must start with 0x"));
    };

    if hex.len() != 40 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(format!("address '{address}' must be 40 hex characters"));
    }

    Ok(())
}

fn validate_log_level(field: &str, level: &str) -> std::result::Result<(), ValidationError> {
    match level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ValidationError::new(
            field,
            format!(
                "invalid log level '{level}', must be one of: trace, debug, info, warn, error"
            ),
        )),
    }
}
