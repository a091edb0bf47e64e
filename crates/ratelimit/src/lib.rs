//! Resilience toolkit for batch intent execution
//!
//! Every remote call made while executing a batch goes through these pieces:
//!
//! - `classify_error`: central rules deciding retryable vs fatal failures
//! - `with_retry`: exponential backoff with jitter, stopping at fatal errors
//! - `CircuitBreaker`: fail fast while a dependency keeps failing
//! - `RateLimiter`: sliding-window request limiting
//! - `ResilienceGuard`: the required composition of the three

pub mod backoff;
pub mod circuit_breaker;
pub mod classify;
pub mod guard;
pub mod limiter;

pub use backoff::{with_retry, ExponentialBackoff, RetryConfig, RetryError, MAX_JITTER};
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitState};
pub use classify::{classify_error, classify_submission_error, Classify, ErrorClass};
pub use guard::{ResilienceError, ResilienceGuard};
pub use limiter::{RateLimitError, RateLimiter, RateLimiterConfig};
