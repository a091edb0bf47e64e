//! Configuration structures for batch intent execution
//!
//! Every section defaults to the constants the orchestrator uses when no
//! configuration is supplied, so a partial file only overrides what it names.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Main application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub resilience: ResilienceConfig,
    pub settlement: SettlementConfig,
    pub approvals: ApprovalsConfig,
    pub orchestrator: OrchestratorConfig,
    pub metrics: MetricsConfig,
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Global level (trace, debug, info, warn, error)
    pub level: String,

    /// Level for this workspace's own crates
    pub crate_level: String,

    pub format: LogFormat,
}

impl LoggingConfig {
    /// Directive used when `RUST_LOG` is not set
    pub fn filter_directive(&self) -> String {
        format!("{},batch_intents={}", self.level, self.crate_level)
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            crate_level: "debug".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResilienceConfig {
    pub rate_limit: RateLimitConfig,
    pub circuit_breaker: CircuitBreakerSettings,
    pub retry: RetryProfiles,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 10,
            window_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerSettings {
    pub failure_threshold: u32,
    pub timeout_ms: u64,
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            timeout_ms: 60_000,
        }
    }
}

/// Retry policy for one class of remote call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    #[serde(default = "default_multiplier")]
    pub backoff_multiplier: f64,
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl RetrySettings {
    fn new(max_retries: u32, base_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_retries,
            base_delay_ms,
            max_delay_ms,
            backoff_multiplier: default_multiplier(),
            jitter: true,
        }
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self::new(5, 1000, 30_000)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryProfiles {
    pub allowance_read: RetrySettings,
    pub submission: RetrySettings,
    pub status_poll: RetrySettings,
    pub quote: RetrySettings,
}

impl Default for RetryProfiles {
    fn default() -> Self {
        Self {
            allowance_read: RetrySettings::default(),
            submission: RetrySettings::new(2, 500, 5_000),
            status_poll: RetrySettings::new(3, 1000, 10_000),
            quote: RetrySettings::new(3, 500, 8_000),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettlementConfig {
    /// Bound on a single status wait
    pub await_timeout_ms: u64,

    /// Status queries before an unknown handle counts as cancelled
    pub unknown_handle_attempts: u32,

    /// Linear backoff step between unknown-handle attempts
    pub unknown_handle_backoff_ms: u64,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            await_timeout_ms: 60_000,
            unknown_handle_attempts: 3,
            unknown_handle_backoff_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalPolicy {
    #[default]
    Max,
    Sum,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalAmountMode {
    #[default]
    Exact,
    Unlimited,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApprovalsConfig {
    pub policy: ApprovalPolicy,
    pub amount: ApprovalAmountMode,
    pub concurrent_reads: bool,

    /// Executor address by intent kind (`swap`, `limit_order`, `other`)
    pub spenders: HashMap<String, String>,
}

impl Default for ApprovalsConfig {
    fn default() -> Self {
        Self {
            policy: ApprovalPolicy::Max,
            amount: ApprovalAmountMode::Exact,
            concurrent_reads: true,
            spenders: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub max_batch_size: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self { max_batch_size: 20 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub bind_address: String,
    pub port: u16,
}

impl MetricsConfig {
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: "0.0.0.0".to_string(),
            port: 9090,
        }
    }
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_true() -> bool {
    true
}
