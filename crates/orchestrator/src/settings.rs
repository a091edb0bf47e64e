use alloy_primitives::Address;
use batch_intents_config::{
    AppConfig, ApprovalAmountMode, ApprovalPolicy, RetrySettings,
};
use batch_intents_ratelimit::{
    CircuitBreaker, CircuitBreakerConfig, RateLimitError, RateLimiter, RateLimiterConfig,
    ResilienceGuard, RetryConfig,
};
use batch_intents_settlement::TrackerConfig;
use batch_intents_types::IntentKind;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::approvals::{AllowancePolicy, SpenderRegistry};
use crate::composer::ApprovalAmount;
use crate::validator::DEFAULT_MAX_BATCH_SIZE;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("invalid spender address for {kind}: {address}")]
    InvalidSpender { kind: String, address: String },

    #[error("unknown intent kind in spender registry: {0}")]
    UnknownKind(String),

    #[error(transparent)]
    RateLimit(#[from] RateLimitError),
}

/// Runtime settings for a [`BatchOrchestrator`](crate::BatchOrchestrator)
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub max_batch_size: usize,
    pub allowance_policy: AllowancePolicy,
    pub approval_amount: ApprovalAmount,
    pub concurrent_reads: bool,
    pub spenders: SpenderRegistry,
    pub rate_limit: RateLimiterConfig,
    pub breaker: CircuitBreakerConfig,
    pub allowance_retry: RetryConfig,
    pub submission_retry: RetryConfig,
    pub tracker: TrackerConfig,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            allowance_policy: AllowancePolicy::default(),
            approval_amount: ApprovalAmount::default(),
            concurrent_reads: true,
            spenders: SpenderRegistry::default(),
            rate_limit: RateLimiterConfig::default(),
            breaker: CircuitBreakerConfig::default(),
            allowance_retry: RetryConfig::allowance_read(),
            submission_retry: RetryConfig::submission(),
            tracker: TrackerConfig::default(),
        }
    }
}

impl OrchestratorSettings {
    /// Convert loaded configuration into runtime types
    pub fn from_app_config(config: &AppConfig) -> Result<Self, SettingsError> {
        let mut spenders = SpenderRegistry::new();
        for (kind, address) in &config.approvals.spenders {
            let kind_value = parse_kind(kind)?;
            let spender: Address =
                address
                    .parse()
                    .map_err(|_| SettingsError::InvalidSpender {
                        kind: kind.clone(),
                        address: address.clone(),
                    })?;
            spenders.register(kind_value, spender);
        }

        let resilience = &config.resilience;
        let settlement = &config.settlement;

        Ok(Self {
            max_batch_size: config.orchestrator.max_batch_size,
            allowance_policy: match config.approvals.policy {
                ApprovalPolicy::Max => AllowancePolicy::Max,
                ApprovalPolicy::Sum => AllowancePolicy::Sum,
            },
            approval_amount: match config.approvals.amount {
                ApprovalAmountMode::Exact => ApprovalAmount::Exact,
                ApprovalAmountMode::Unlimited => ApprovalAmount::Unlimited,
            },
            concurrent_reads: config.approvals.concurrent_reads,
            spenders,
            rate_limit: RateLimiterConfig {
                max_requests: resilience.rate_limit.max_requests,
                window: Duration::from_millis(resilience.rate_limit.window_ms),
            },
            breaker: CircuitBreakerConfig {
                failure_threshold: resilience.circuit_breaker.failure_threshold,
                timeout_duration: Duration::from_millis(resilience.circuit_breaker.timeout_ms),
            },
            allowance_retry: retry_config(&resilience.retry.allowance_read),
            submission_retry: retry_config(&resilience.retry.submission),
            tracker: TrackerConfig {
                await_timeout: Duration::from_millis(settlement.await_timeout_ms),
                unknown_handle_attempts: settlement.unknown_handle_attempts,
                unknown_handle_backoff: Duration::from_millis(settlement.unknown_handle_backoff_ms),
                status_retry: retry_config(&resilience.retry.status_poll),
            },
        })
    }

    /// Fresh limiter and breaker shared by every component built from these settings
    pub fn build_guard(&self) -> Result<ResilienceGuard, SettingsError> {
        let limiter = RateLimiter::new(self.rate_limit.clone())?;
        let breaker = CircuitBreaker::new(self.breaker.clone());
        Ok(ResilienceGuard::new(Arc::new(limiter), Arc::new(breaker)))
    }
}

/// Quote retry profile, kept apart since quoting sits outside `execute_batch`
pub fn quote_retry(config: &AppConfig) -> RetryConfig {
    retry_config(&config.resilience.retry.quote)
}

fn retry_config(settings: &RetrySettings) -> RetryConfig {
    RetryConfig {
        max_retries: settings.max_retries,
        base_delay: Duration::from_millis(settings.base_delay_ms),
        max_delay: Duration::from_millis(settings.max_delay_ms),
        backoff_multiplier: settings.backoff_multiplier,
        jitter: settings.jitter,
    }
}

fn parse_kind(kind: &str) -> Result<IntentKind, SettingsError> {
    match kind {
        "swap" => Ok(IntentKind::Swap),
        "limit_order" => Ok(IntentKind::LimitOrder),
        "other" => Ok(IntentKind::Other),
        _ => Err(SettingsError::UnknownKind(kind.to_string())),
    }
}
