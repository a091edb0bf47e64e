use batch_intents_ratelimit::{ResilienceError, ResilienceGuard, RetryConfig};
use batch_intents_types::{Intent, QuoteError, QuoteProvider, QuoteRequest};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
#[error("quote {request_id} failed: {source}")]
pub struct QuotePlanError {
    pub request_id: String,
    #[source]
    pub source: ResilienceError<QuoteError>,
}

/// Turns quote requests into intents by fetching calldata from a quoting service
pub struct QuotePlanner {
    provider: Arc<dyn QuoteProvider>,
    guard: ResilienceGuard,
    retry: RetryConfig,
}

impl QuotePlanner {
    pub fn new(provider: Arc<dyn QuoteProvider>, guard: ResilienceGuard) -> Self {
        Self {
            provider,
            guard,
            retry: RetryConfig::quote(),
        }
    }

    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Quote every request in order; the first failure aborts the plan
    pub async fn plan(&self, requests: &[QuoteRequest]) -> Result<Vec<Intent>, QuotePlanError> {
        let mut intents = Vec::with_capacity(requests.len());

        for request in requests {
            let provider = &self.provider;
            let quote = self
                .guard
                .call("quote", &self.retry, move || async move {
                    provider.quote(request).await
                })
                .await
                .map_err(|source| {
                    warn!(request_id = %request.id, error = %source, "quote failed");
                    QuotePlanError {
                        request_id: request.id.clone(),
                        source,
                    }
                })?;

            debug!(request_id = %request.id, buy_amount = %quote.buy_amount, "quote received");
            intents.push(quote.into_intent());
        }

        Ok(intents)
    }
}
