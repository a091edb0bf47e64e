use batch_intents_ratelimit::{Classify, ErrorClass, ResilienceError, ResilienceGuard, RetryConfig};
use batch_intents_types::{BatchHandle, CallsStatus, ExecutionProvider, Outcome};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::WalletFailure;

#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Bound on a single `await_status` wait
    pub await_timeout: Duration,

    /// Status queries made before an unknown handle resolves as cancelled
    pub unknown_handle_attempts: u32,

    /// Linear backoff step between unknown-handle attempts
    pub unknown_handle_backoff: Duration,

    pub status_retry: RetryConfig,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            await_timeout: Duration::from_secs(60),
            unknown_handle_attempts: 3,
            unknown_handle_backoff: Duration::from_millis(1000),
            status_retry: RetryConfig::status_poll(),
        }
    }
}

/// Result of one `resolve` run with the bookkeeping callers may report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub outcome: Outcome,
    /// Unknown-handle attempts made, at least one
    pub attempts: u32,
    /// Provider status calls issued, retries included
    pub status_queries: u32,
}

enum Query {
    Status(CallsStatus),
    UnknownHandle,
    Cancelled(String),
    Unavailable(String),
}

/// Resolves a submitted batch handle to a final [`Outcome`].
///
/// Resolution has no side effects beyond provider queries, so the same handle
/// may be resolved any number of times. A batch that stays pending, or whose
/// status cannot be read, comes back as `TimedOut` with the handle preserved.
/// It is never reported as a success without a receipt.
pub struct SettlementTracker {
    provider: Arc<dyn ExecutionProvider>,
    guard: ResilienceGuard,
    config: TrackerConfig,
}

impl SettlementTracker {
    pub fn new(provider: Arc<dyn ExecutionProvider>, guard: ResilienceGuard) -> Self {
        Self::with_config(provider, guard, TrackerConfig::default())
    }

    pub fn with_config(
        provider: Arc<dyn ExecutionProvider>,
        guard: ResilienceGuard,
        config: TrackerConfig,
    ) -> Self {
        Self {
            provider,
            guard,
            config,
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub async fn resolve(&self, handle: &BatchHandle) -> Outcome {
        self.resolve_detailed(handle).await.outcome
    }

    pub async fn resolve_detailed(&self, handle: &BatchHandle) -> Resolution {
        let queries = AtomicU32::new(0);
        let max_attempts = self.config.unknown_handle_attempts.max(1);
        let mut attempt = 0;

        let outcome = loop {
            attempt += 1;
            match self.query(handle, &queries).await {
                Query::Status(status) => break map_status(handle, status),
                Query::Cancelled(reason) => {
                    info!(%handle, %reason, "batch cancelled while polling");
                    break Outcome::cancelled(reason);
                }
                Query::Unavailable(reason) => {
                    warn!(%handle, error = %reason, "batch status unavailable, reporting timeout");
                    break Outcome::TimedOut {
                        handle: handle.clone(),
                    };
                }
                Query::UnknownHandle if attempt >= max_attempts => {
                    info!(
                        %handle,
                        attempts = attempt,
                        "provider never learned of batch, treating as cancelled"
                    );
                    break Outcome::cancelled(format!(
                        "batch {handle} unknown to provider after {attempt} attempts"
                    ));
                }
                Query::UnknownHandle => {
                    let delay = self.config.unknown_handle_backoff * attempt;
                    debug!(
                        %handle,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "unknown batch handle, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        };

        Resolution {
            outcome,
            attempts: attempt,
            status_queries: queries.into_inner(),
        }
    }

    /// One status read, followed by a bounded wait while the batch is pending
    async fn query(&self, handle: &BatchHandle, queries: &AtomicU32) -> Query {
        let provider = &self.provider;

        let status = self
            .guard
            .call("get_status", &self.config.status_retry, move || {
                queries.fetch_add(1, Ordering::SeqCst);
                async move { provider.get_status(handle).await.map_err(WalletFailure) }
            })
            .await;

        let status = match status {
            Ok(status) if status.is_pending() => status,
            Ok(status) => return Query::Status(status),
            Err(err) => return failure(err),
        };
        debug!(%handle, ?status, "batch pending, awaiting status");

        let timeout = self.config.await_timeout;
        let awaited = self
            .guard
            .call("await_status", &self.config.status_retry, move || {
                queries.fetch_add(1, Ordering::SeqCst);
                async move {
                    // Providers are expected to honour the timeout; this bounds one that doesn't
                    tokio::time::timeout(timeout, provider.await_status(handle, timeout))
                        .await
                        .unwrap_or(Ok(CallsStatus::Pending))
                        .map_err(WalletFailure)
                }
            })
            .await;

        match awaited {
            Ok(status) => Query::Status(status),
            Err(err) => failure(err),
        }
    }
}

fn map_status(handle: &BatchHandle, status: CallsStatus) -> Outcome {
    match status {
        CallsStatus::Confirmed { tx_ref } => {
            info!(%handle, %tx_ref, "batch confirmed");
            Outcome::Success { tx_ref }
        }
        CallsStatus::Failed { reason } => {
            warn!(%handle, %reason, "batch failed onchain");
            Outcome::failed(reason)
        }
        CallsStatus::Pending => Outcome::TimedOut {
            handle: handle.clone(),
        },
    }
}

fn failure(err: ResilienceError<WalletFailure>) -> Query {
    let class = err
        .source_error()
        .map(WalletFailure::classify)
        .unwrap_or(ErrorClass::Upstream);

    match class {
        ErrorClass::UnknownHandle => Query::UnknownHandle,
        ErrorClass::UserRejected => Query::Cancelled(err.to_string()),
        _ => Query::Unavailable(err.to_string()),
    }
}
