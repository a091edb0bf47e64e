use std::fmt;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tracing::Instrument;

use crate::backoff::{with_retry, RetryConfig, RetryError};
use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerError};
use crate::classify::{Classify, ErrorClass};
use crate::limiter::RateLimiter;

#[derive(Debug, Error)]
pub enum ResilienceError<E> {
    #[error("circuit breaker is open")]
    BreakerOpen,

    #[error("{error}")]
    Fatal { error: E, attempts: u32 },

    #[error("retries exhausted after {attempts} attempts: {last_error}")]
    Exhausted { last_error: E, attempts: u32 },
}

impl<E> ResilienceError<E> {
    /// The underlying operation error, if the operation ran at all
    pub fn source_error(&self) -> Option<&E> {
        match self {
            ResilienceError::BreakerOpen => None,
            ResilienceError::Fatal { error, .. } => Some(error),
            ResilienceError::Exhausted { last_error, .. } => Some(last_error),
        }
    }

    pub fn is_breaker_open(&self) -> bool {
        matches!(self, ResilienceError::BreakerOpen)
    }

    pub fn attempts(&self) -> u32 {
        match self {
            ResilienceError::BreakerOpen => 0,
            ResilienceError::Fatal { attempts, .. }
            | ResilienceError::Exhausted { attempts, .. } => *attempts,
        }
    }
}

impl<E> From<CircuitBreakerError<RetryError<E>>> for ResilienceError<E> {
    fn from(err: CircuitBreakerError<RetryError<E>>) -> Self {
        match err {
            CircuitBreakerError::Open => ResilienceError::BreakerOpen,
            CircuitBreakerError::Operation(RetryError::Fatal { error, attempts }) => {
                ResilienceError::Fatal { error, attempts }
            }
            CircuitBreakerError::Operation(RetryError::Exhausted {
                last_error,
                attempts,
            }) => ResilienceError::Exhausted {
                last_error,
                attempts,
            },
        }
    }
}

impl<E: Classify> Classify for ResilienceError<E> {
    fn classify(&self) -> ErrorClass {
        match self {
            ResilienceError::BreakerOpen => ErrorClass::Upstream,
            ResilienceError::Fatal { error, .. } => error.classify(),
            ResilienceError::Exhausted { last_error, .. } => last_error.classify(),
        }
    }
}

/// Rate limiter, circuit breaker and retry applied in that order.
///
/// Limiting comes first so throttled requests never reach the breaker or
/// count as retryable failures. The limiter and breaker are shared; clones of a
/// guard observe the same state.
#[derive(Clone)]
pub struct ResilienceGuard {
    limiter: Arc<RateLimiter>,
    breaker: Arc<CircuitBreaker>,
}

impl ResilienceGuard {
    pub fn new(limiter: Arc<RateLimiter>, breaker: Arc<CircuitBreaker>) -> Self {
        Self { limiter, breaker }
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    pub async fn call<F, Fut, T, E>(
        &self,
        operation: &'static str,
        config: &RetryConfig,
        f: F,
    ) -> Result<T, ResilienceError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify + fmt::Display,
    {
        let span = tracing::debug_span!("resilient_call", operation);
        async {
            self.limiter.wait_if_needed().await;
            let result = self
                .breaker
                .call_async(move || with_retry(f, config))
                .await
                .map_err(ResilienceError::from);

            if let Err(err) = &result {
                tracing::warn!(
                    operation,
                    error_class = %err.classify(),
                    attempts = err.attempts(),
                    breaker_open = err.is_breaker_open(),
                    error = %err,
                    "guarded call failed"
                );
            }
            result
        }
        .instrument(span)
        .await
    }
}

impl Default for ResilienceGuard {
    fn default() -> Self {
        Self::new(
            Arc::new(RateLimiter::default()),
            Arc::new(CircuitBreaker::default()),
        )
    }
}
