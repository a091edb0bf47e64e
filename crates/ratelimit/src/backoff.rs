use rand::Rng;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::classify::{Classify, ErrorClass};

/// Upper bound of the random jitter added to each retry delay
pub const MAX_JITTER: Duration = Duration::from_millis(1000);

pub struct ExponentialBackoff {
    initial: Duration,
    max: Duration,
    multiplier: f64,
    jitter: bool,
    current_attempt: u32,
}

impl ExponentialBackoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            multiplier: 2.0,
            jitter: false,
            current_attempt: 0,
        }
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Delay before the next retry: `min(initial * multiplier^attempt, max)`,
    /// plus up to one second of jitter when enabled.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.base_delay(self.current_attempt);
        self.current_attempt += 1;

        if self.jitter {
            let jitter_ms = rand::thread_rng().gen_range(0..MAX_JITTER.as_millis() as u64);
            delay + Duration::from_millis(jitter_ms)
        } else {
            delay
        }
    }

    fn base_delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return self.initial.min(self.max);
        }
        let multiplier = self.multiplier.powi(attempt as i32);
        let delay_ms = self.initial.as_millis() as f64 * multiplier;
        let delay_ms = delay_ms.min(self.max.as_millis() as f64);
        Duration::from_millis(delay_ms as u64)
    }

    pub fn reset(&mut self) {
        self.current_attempt = 0;
    }

    pub fn current_attempt(&self) -> u32 {
        self.current_attempt
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(1000), Duration::from_secs(30))
    }
}

impl From<&RetryConfig> for ExponentialBackoff {
    fn from(config: &RetryConfig) -> Self {
        ExponentialBackoff::new(config.base_delay, config.max_delay)
            .with_multiplier(config.backoff_multiplier)
            .with_jitter(config.jitter)
    }
}

/// Retry policy for one class of remote operation
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(30_000),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Allowance and balance reads
    pub fn allowance_read() -> Self {
        Self::default()
    }

    /// Batch submission, which prompts the wallet for a signature
    pub fn submission() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(5),
            ..Self::default()
        }
    }

    /// Batch status queries
    pub fn status_poll() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(10),
            ..Self::default()
        }
    }

    /// Quote requests against the aggregation service
    pub fn quote() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            ..Self::default()
        }
    }

    /// Same policy without sleeping between attempts
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            jitter: false,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// The error was not retryable; returned after the attempt that raised it
    #[error("{error}")]
    Fatal { error: E, attempts: u32 },

    #[error("retries exhausted after {attempts} attempts: {last_error}")]
    Exhausted { last_error: E, attempts: u32 },
}

impl<E> RetryError<E> {
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Fatal { attempts, .. } | RetryError::Exhausted { attempts, .. } => {
                *attempts
            }
        }
    }

    pub fn error(&self) -> &E {
        match self {
            RetryError::Fatal { error, .. } => error,
            RetryError::Exhausted { last_error, .. } => last_error,
        }
    }

    pub fn into_inner(self) -> E {
        match self {
            RetryError::Fatal { error, .. } => error,
            RetryError::Exhausted { last_error, .. } => last_error,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, RetryError::Exhausted { .. })
    }
}

impl<E: Classify> Classify for RetryError<E> {
    fn classify(&self) -> ErrorClass {
        self.error().classify()
    }
}

/// Run `operation` up to `config.max_retries + 1` times.
///
/// Stops at the first error that does not classify as retryable and hands it
/// back unchanged inside [`RetryError::Fatal`].
pub async fn with_retry<F, Fut, T, E>(
    mut operation: F,
    config: &RetryConfig,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Classify + fmt::Display,
{
    let mut backoff = ExponentialBackoff::from(config);
    let max_attempts = config.max_attempts();
    let mut attempt = 0;

    loop {
        attempt += 1;
        let error = match operation().await {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };

        let class = error.classify();
        if !class.is_retryable() {
            debug!(attempt, error_class = %class, error = %error, "non-retryable error");
            return Err(RetryError::Fatal {
                error,
                attempts: attempt,
            });
        }

        if attempt >= max_attempts {
            warn!(attempts = attempt, error_class = %class, error = %error, "retries exhausted");
            return Err(RetryError::Exhausted {
                last_error: error,
                attempts: attempt,
            });
        }

        let delay = backoff.next_delay();
        debug!(
            attempt,
            delay_ms = delay.as_millis() as u64,
            error_class = %class,
            error = %error,
            "retrying after retryable error"
        );
        tokio::time::sleep(delay).await;
    }
}
