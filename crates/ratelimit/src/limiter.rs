use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

#[derive(Debug, Error)]
pub enum RateLimitError {
    #[error("rate limit exceeded: {max_requests} requests per {window:?}")]
    LimitExceeded { max_requests: u32, window: Duration },
    #[error("invalid rate limit configuration")]
    InvalidConfig,
}

#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    pub max_requests: u32,
    pub window: Duration,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            max_requests: 10,
            window: Duration::from_millis(1000),
        }
    }
}

/// Sliding-window limiter over request timestamps.
///
/// Expired timestamps are trimmed lazily on every check.
pub struct RateLimiter {
    requests: Mutex<VecDeque<Instant>>,
    config: RateLimiterConfig,
}

impl RateLimiter {
    pub fn new(config: RateLimiterConfig) -> Result<Self, RateLimitError> {
        if config.max_requests == 0 || config.window.is_zero() {
            return Err(RateLimitError::InvalidConfig);
        }
        // The log grows with traffic; `max_requests` may be far above what is ever used
        Ok(Self {
            requests: Mutex::new(VecDeque::new()),
            config,
        })
    }

    pub fn config(&self) -> &RateLimiterConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Instant>> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn trim(&self, requests: &mut VecDeque<Instant>, now: Instant) {
        while let Some(oldest) = requests.front() {
            if now.duration_since(*oldest) >= self.config.window {
                requests.pop_front();
            } else {
                break;
            }
        }
    }

    /// Record a request slot, or return how long until one frees up.
    fn reserve(&self) -> Result<(), Duration> {
        let now = Instant::now();
        let mut requests = self.lock();
        self.trim(&mut requests, now);

        if (requests.len() as u32) < self.config.max_requests {
            requests.push_back(now);
            return Ok(());
        }

        let oldest = requests.front().copied().unwrap_or(now);
        Err((oldest + self.config.window).saturating_duration_since(now))
    }

    /// Wait until the window has room, then record this request.
    pub async fn wait_if_needed(&self) {
        loop {
            match self.reserve() {
                Ok(()) => return,
                Err(wait) => {
                    tracing::debug!(
                        wait_ms = wait.as_millis() as u64,
                        "rate limit reached, waiting"
                    );
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }

    /// Record this request if the window has room, without waiting.
    pub fn try_acquire(&self) -> bool {
        self.reserve().is_ok()
    }

    pub fn acquire(&self) -> Result<(), RateLimitError> {
        if self.try_acquire() {
            Ok(())
        } else {
            Err(RateLimitError::LimitExceeded {
                max_requests: self.config.max_requests,
                window: self.config.window,
            })
        }
    }

    pub fn remaining(&self) -> u32 {
        let now = Instant::now();
        let mut requests = self.lock();
        self.trim(&mut requests, now);
        self.config
            .max_requests
            .saturating_sub(requests.len() as u32)
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self {
            requests: Mutex::new(VecDeque::new()),
            config: RateLimiterConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max_requests: u32, window_ms: u64) -> RateLimiter {
        RateLimiter::new(RateLimiterConfig {
            max_requests,
            window: Duration::from_millis(window_ms),
        })
        .unwrap()
    }

    #[test]
    fn test_invalid_config() {
        assert!(RateLimiter::new(RateLimiterConfig {
            max_requests: 0,
            window: Duration::from_secs(1),
        })
        .is_err());
        assert!(RateLimiter::new(RateLimiterConfig {
            max_requests: 1,
            window: Duration::ZERO,
        })
        .is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fourth_request_waits_for_window() {
        let limiter = limiter(3, 1000);
        let first = Instant::now();

        limiter.wait_if_needed().await;
        tokio::time::advance(Duration::from_millis(300)).await;
        limiter.wait_if_needed().await;
        tokio::time::advance(Duration::from_millis(300)).await;
        limiter.wait_if_needed().await;
        tokio::time::advance(Duration::from_millis(300)).await;

        assert_eq!(first.elapsed(), Duration::from_millis(900));
        limiter.wait_if_needed().await;

        assert!(first.elapsed() >= Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_requests_under_limit_do_not_wait() {
        let limiter = limiter(10, 1000);
        let start = Instant::now();

        for _ in 0..10 {
            limiter.wait_if_needed().await;
        }

        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(limiter.remaining(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_slides() {
        let limiter = limiter(2, 1000);

        assert!(limiter.try_acquire());
        tokio::time::advance(Duration::from_millis(600)).await;
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());

        tokio::time::advance(Duration::from_millis(400)).await;
        // First timestamp expired, second still inside the window
        assert_eq!(limiter.remaining(), 1);
        assert!(limiter.try_acquire());
        assert!(matches!(
            limiter.acquire(),
            Err(RateLimitError::LimitExceeded { max_requests: 2, .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_limit_allocates_lazily() {
        let limiter = limiter(u32::MAX, 1000);
        assert_eq!(limiter.lock().capacity(), 0);

        assert!(limiter.try_acquire());
        assert!(limiter.lock().capacity() < 64);
        assert_eq!(limiter.remaining(), u32::MAX - 1);
    }

    #[test]
    fn test_default_limits() {
        let limiter = RateLimiter::default();
        assert_eq!(limiter.config().max_requests, 10);
        assert_eq!(limiter.config().window, Duration::from_millis(1000));
    }
}
