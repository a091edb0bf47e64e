use alloy_primitives::Address;
use batch_intents_ratelimit::{Classify, ErrorClass, ResilienceGuard, RetryConfig};
use batch_intents_types::{BatchHandle, CallSpec, ExecutionProvider};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{SubmitError, WalletFailure};

/// Sends a composed call list to the execution provider as one atomic batch
pub struct BatchSubmitter {
    provider: Arc<dyn ExecutionProvider>,
    guard: ResilienceGuard,
    retry: RetryConfig,
}

impl BatchSubmitter {
    pub fn new(provider: Arc<dyn ExecutionProvider>, guard: ResilienceGuard) -> Self {
        Self {
            provider,
            guard,
            retry: RetryConfig::submission(),
        }
    }

    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub async fn submit(
        &self,
        calls: &[CallSpec],
        account: Address,
    ) -> Result<BatchHandle, SubmitError> {
        if calls.is_empty() {
            return Err(SubmitError::EmptyBatch);
        }

        debug!(calls = calls.len(), %account, "submitting batch");

        let provider = &self.provider;
        let result = self
            .guard
            .call("submit_batch", &self.retry, move || async move {
                provider
                    .submit_batch(calls, account)
                    .await
                    .map_err(WalletFailure)
            })
            .await;

        match result {
            Ok(handle) => {
                info!(%handle, calls = calls.len(), "batch submitted");
                Ok(handle)
            }
            Err(err) if err.classify() == ErrorClass::UserRejected => {
                info!(error = %err, "user cancelled batch submission");
                Err(SubmitError::UserCancelled {
                    reason: err
                        .source_error()
                        .map(ToString::to_string)
                        .unwrap_or_else(|| err.to_string()),
                })
            }
            Err(err) => {
                warn!(error = %err, attempts = err.attempts(), "batch submission failed");
                Err(SubmitError::Transient(err))
            }
        }
    }
}
