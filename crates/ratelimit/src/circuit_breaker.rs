use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

use crate::classify::{Classify, ErrorClass};

#[derive(Debug, Error)]
pub enum CircuitBreakerError<E> {
    #[error("circuit breaker is open")]
    Open,
    #[error("{0}")]
    Operation(E),
}

impl<E: Classify> Classify for CircuitBreakerError<E> {
    fn classify(&self) -> ErrorClass {
        match self {
            // Surfaced to callers as a transient condition
            CircuitBreakerError::Open => ErrorClass::Upstream,
            CircuitBreakerError::Operation(e) => e.classify(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,   // Normal operation
    Open,     // Failing, reject requests
    HalfOpen, // Testing if recovered
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub timeout_duration: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            timeout_duration: Duration::from_secs(60),
        }
    }
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    failure_count: u32,
    last_failure: Option<Instant>,
    probe_in_flight: bool,
}

/// Process-wide breaker shared by every call routed through it.
///
/// One instance is expected per remote dependency, held behind an `Arc`.
pub struct CircuitBreaker {
    inner: Mutex<BreakerInner>,
    config: CircuitBreakerConfig,
}

/// Admission to call through the breaker.
///
/// A half-open probe that is dropped before it settles (caller timeout,
/// `select!`, task abort) gives the probe slot back, so the next caller
/// can probe instead of the breaker staying half-open forever.
struct Permit<'a> {
    breaker: &'a CircuitBreaker,
    probe: bool,
}

impl Permit<'_> {
    fn settled(mut self) {
        self.probe = false;
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if self.probe {
            tracing::debug!("circuit breaker probe abandoned, releasing slot");
            self.breaker.release_probe();
        }
    }
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                failure_count: 0,
                last_failure: None,
                probe_in_flight: false,
            }),
            config,
        }
    }

    fn lock(&self) -> MutexGuard<'_, BreakerInner> {
        // State stays consistent even if a holder panicked; every write is a
        // single assignment.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn failure_count(&self) -> u32 {
        self.lock().failure_count
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    fn admit(&self) -> Option<Permit<'_>> {
        let mut inner = self.lock();
        let probe = match inner.state {
            CircuitState::Closed => false,
            CircuitState::Open => {
                let elapsed_past_timeout = inner
                    .last_failure
                    .map(|at| at.elapsed() > self.config.timeout_duration)
                    .unwrap_or(true);

                if !elapsed_past_timeout {
                    return None;
                }
                inner.state = CircuitState::HalfOpen;
                tracing::info!("circuit breaker transitioned to HALF_OPEN");
                true
            }
            CircuitState::HalfOpen if inner.probe_in_flight => return None,
            CircuitState::HalfOpen => true,
        };
        inner.probe_in_flight |= probe;

        Some(Permit {
            breaker: self,
            probe,
        })
    }

    pub fn record_success(&self) {
        let mut inner = self.lock();
        let was = inner.state;
        inner.failure_count = 0;
        inner.state = CircuitState::Closed;
        inner.probe_in_flight = false;
        if was != CircuitState::Closed {
            tracing::info!("circuit breaker transitioned to CLOSED");
        }
    }

    pub fn record_failure(&self) {
        let mut inner = self.lock();
        inner.failure_count = inner.failure_count.saturating_add(1);
        inner.last_failure = Some(Instant::now());

        match inner.state {
            CircuitState::Closed => {
                if inner.failure_count >= self.config.failure_threshold {
                    inner.state = CircuitState::Open;
                    tracing::warn!(
                        failures = inner.failure_count,
                        "circuit breaker transitioned to OPEN"
                    );
                }
            }
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Open;
                inner.probe_in_flight = false;
                tracing::warn!("circuit breaker transitioned back to OPEN from HALF_OPEN");
            }
            CircuitState::Open => {}
        }
    }

    /// A probe ended without telling us anything about provider health.
    fn release_probe(&self) {
        let mut inner = self.lock();
        if inner.state == CircuitState::HalfOpen {
            inner.probe_in_flight = false;
        }
    }

    fn settle<T, E: Classify>(
        &self,
        permit: Permit<'_>,
        result: Result<T, E>,
    ) -> Result<T, CircuitBreakerError<E>> {
        match result {
            Ok(value) => {
                self.record_success();
                permit.settled();
                Ok(value)
            }
            Err(e) => {
                if e.classify().trips_breaker() {
                    self.record_failure();
                    permit.settled();
                }
                // A non-tripping error drops the permit armed, releasing the probe
                Err(CircuitBreakerError::Operation(e))
            }
        }
    }

    pub fn call<F, T, E>(&self, f: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Result<T, E>,
        E: Classify,
    {
        let permit = self.admit().ok_or(CircuitBreakerError::Open)?;
        let result = f();
        self.settle(permit, result)
    }

    pub async fn call_async<F, Fut, T, E>(&self, f: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify,
    {
        let permit = self.admit().ok_or(CircuitBreakerError::Open)?;
        let result = f().await;
        self.settle(permit, result)
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}
