use alloy_primitives::Address;
use batch_intents_metrics::{BatchSpan, MetricsCollector};
use batch_intents_ratelimit::{Classify, ResilienceGuard};
use batch_intents_settlement::{
    BatchRecord, BatchStore, BatchSubmitter, InMemoryBatchStore, Resolution, SettlementTracker,
    StoreError, SubmitError,
};
use batch_intents_types::{
    Batch, BatchHandle, BatchStatus, ChainReader, ExecutionProvider, Intent, Outcome,
    TransitionError,
};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, error, info, warn, Instrument};

use crate::approvals::ApprovalAggregator;
use crate::composer::CallComposer;
use crate::settings::{OrchestratorSettings, SettingsError};
use crate::validator::IntentValidator;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Builder error
#[derive(Debug, Error)]
pub enum BuilderError {
    #[error("missing required field: {field}")]
    MissingField { field: String },

    #[error(transparent)]
    Settings(#[from] SettingsError),
}

/// Builder for [`BatchOrchestrator`]
#[derive(Default)]
pub struct BatchOrchestratorBuilder {
    reader: Option<Arc<dyn ChainReader>>,
    provider: Option<Arc<dyn ExecutionProvider>>,
    store: Option<Arc<dyn BatchStore>>,
    metrics: Option<Arc<MetricsCollector>>,
    guard: Option<ResilienceGuard>,
    settings: OrchestratorSettings,
}

impl BatchOrchestratorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_chain_reader(mut self, reader: Arc<dyn ChainReader>) -> Self {
        self.reader = Some(reader);
        self
    }

    pub fn with_execution_provider(mut self, provider: Arc<dyn ExecutionProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Defaults to an in-memory store
    pub fn with_store(mut self, store: Arc<dyn BatchStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Share a limiter and breaker with other orchestrators.
    ///
    /// Without one, a guard is built from the settings.
    pub fn with_guard(mut self, guard: ResilienceGuard) -> Self {
        self.guard = Some(guard);
        self
    }

    pub fn with_settings(mut self, settings: OrchestratorSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn build(self) -> Result<BatchOrchestrator, BuilderError> {
        let reader = self.reader.ok_or_else(|| BuilderError::MissingField {
            field: "chain_reader".to_string(),
        })?;
        let provider = self.provider.ok_or_else(|| BuilderError::MissingField {
            field: "execution_provider".to_string(),
        })?;
        let settings = self.settings;
        let guard = match self.guard {
            Some(guard) => guard,
            None => settings.build_guard()?,
        };

        let approvals = ApprovalAggregator::new(reader, guard.clone())
            .with_spenders(settings.spenders.clone())
            .with_policy(settings.allowance_policy)
            .with_retry_config(settings.allowance_retry.clone())
            .with_concurrent_reads(settings.concurrent_reads);
        let submitter = BatchSubmitter::new(provider.clone(), guard.clone())
            .with_retry_config(settings.submission_retry.clone());
        let tracker =
            SettlementTracker::with_config(provider, guard.clone(), settings.tracker.clone());

        Ok(BatchOrchestrator {
            validator: IntentValidator::new(settings.max_batch_size),
            approvals,
            composer: CallComposer::new(settings.approval_amount),
            submitter,
            tracker,
            store: self
                .store
                .unwrap_or_else(|| Arc::new(InMemoryBatchStore::new()) as Arc<dyn BatchStore>),
            metrics: self.metrics,
            guard,
            last: Mutex::new(None),
        })
    }
}

/// Runs intents through validation, approval planning, composition,
/// submission and settlement tracking.
///
/// Every `execute_batch` call works on a fresh [`Batch`], so a handle from an
/// earlier run is never polled again except through [`resolve`](Self::resolve).
/// Concurrent calls are independent; they meet only at the shared
/// [`ResilienceGuard`].
pub struct BatchOrchestrator {
    validator: IntentValidator,
    approvals: ApprovalAggregator,
    composer: CallComposer,
    submitter: BatchSubmitter,
    tracker: SettlementTracker,
    store: Arc<dyn BatchStore>,
    metrics: Option<Arc<MetricsCollector>>,
    guard: ResilienceGuard,
    last: Mutex<Option<Batch>>,
}

impl BatchOrchestrator {
    pub fn builder() -> BatchOrchestratorBuilder {
        BatchOrchestratorBuilder::new()
    }

    pub fn guard(&self) -> &ResilienceGuard {
        &self.guard
    }

    pub fn store(&self) -> &Arc<dyn BatchStore> {
        &self.store
    }

    /// Snapshot of the batch from the most recent `execute_batch`
    pub fn last_batch(&self) -> Option<Batch> {
        self.last_slot().clone()
    }

    /// Forget the retained batch and its handle
    pub fn reset(&self) {
        if let Some(batch) = self.last_slot().take() {
            debug!(batch_id = %batch.id(), status = batch.status().name(), "orchestrator reset");
        }
    }

    /// Execute `intents` for `wallet` as one atomic batch.
    ///
    /// Never fails: every problem is reported through the returned [`Outcome`].
    pub async fn execute_batch(&self, intents: Vec<Intent>, wallet: Address) -> Outcome {
        let mut batch = Batch::new();
        let span = BatchSpan::new(batch.id(), intents.len()).span();

        let outcome = async {
            let outcome = match self.run(&mut batch, &intents, wallet).await {
                Ok(outcome) => outcome,
                Err(err) => {
                    error!(error = %err, error_class = "internal", "batch execution failed");
                    let outcome = Outcome::failed(err.to_string());
                    // Best effort: the batch may already be final
                    let _ = batch.finish(&outcome);
                    outcome
                }
            };
            info!(
                outcome = outcome.label(),
                status = batch.status().name(),
                "batch finished"
            );
            outcome
        }
        .instrument(span)
        .await;

        if let Some(metrics) = &self.metrics {
            metrics.record_outcome(&outcome);
        }
        *self.last_slot() = Some(batch);
        outcome
    }

    async fn run(
        &self,
        batch: &mut Batch,
        intents: &[Intent],
        wallet: Address,
    ) -> Result<Outcome, OrchestratorError> {
        if let Err(err) = self.validator.validate_batch(intents) {
            warn!(error = %err, "batch rejected");
            let outcome = Outcome::failed(err.to_string());
            batch.finish(&outcome)?;
            return Ok(outcome);
        }

        let requirements = self.approvals.compute_requirements(intents);
        let needed = self.approvals.filter_needed(requirements, wallet).await;
        let approvals = needed.len();
        batch.set_calls(self.composer.compose(&needed, intents))?;
        debug!(approvals, calls = batch.calls().len(), "batch composed");

        batch.transition(BatchStatus::Submitting)?;
        let handle = match self.submitter.submit(batch.calls(), wallet).await {
            Ok(handle) => handle,
            Err(SubmitError::UserCancelled { reason }) => {
                info!(%reason, "batch cancelled by user");
                let outcome = Outcome::cancelled(reason);
                batch.finish(&outcome)?;
                return Ok(outcome);
            }
            Err(err) => {
                warn!(error = %err, error_class = %err.classify(), "batch submission failed");
                let outcome = if matches!(err, SubmitError::Transient(_)) {
                    Outcome::transient(err.to_string())
                } else {
                    Outcome::failed(err.to_string())
                };
                batch.finish(&outcome)?;
                return Ok(outcome);
            }
        };

        info!(%handle, calls = batch.calls().len(), "batch submitted");
        batch.mark_submitted(handle.clone())?;
        if let Some(metrics) = &self.metrics {
            metrics.record_batch_submitted();
            metrics.record_approval_calls(approvals);
        }

        let record = BatchRecord::submitted(handle.clone(), wallet, batch.calls().to_vec());
        if let Err(err) = self.store.insert(&record).await {
            // Bookkeeping only; the batch is already with the provider
            error!(%handle, error = %err, error_class = "store", "failed to record batch");
        }

        let submitted_at = Instant::now();
        let resolution = self.tracker.resolve_detailed(&handle).await;
        self.record_resolution(&resolution, submitted_at);

        if let Err(err) = self
            .store
            .update_status(&handle, resolution.outcome.to_status())
            .await
        {
            error!(%handle, error = %err, error_class = "store", "failed to record batch status");
        }

        batch.finish(&resolution.outcome)?;
        Ok(resolution.outcome)
    }

    /// Resolve a handle returned earlier as `TimedOut`.
    ///
    /// Stored batches that already reached a final status return that status
    /// without polling. Handles missing from the store are polled anyway but
    /// not recorded. Concurrent calls for one handle agree on the first
    /// outcome recorded.
    pub async fn resolve(&self, handle: &BatchHandle) -> Result<Outcome, OrchestratorError> {
        let record = self.store.get(handle).await?;

        if let Some(outcome) = record
            .as_ref()
            .and_then(|record| record.status.settled_outcome())
        {
            debug!(%handle, outcome = outcome.label(), "batch already settled");
            return Ok(outcome);
        }

        let started = Instant::now();
        let resolution = self.tracker.resolve_detailed(handle).await;
        self.record_resolution(&resolution, started);

        if record.is_none() {
            debug!(%handle, "resolved batch unknown to the store");
        } else if let Err(err) = self
            .store
            .update_status(handle, resolution.outcome.to_status())
            .await
        {
            if !matches!(err, StoreError::AlreadyResolved { .. }) {
                return Err(err.into());
            }
            // A concurrent resolve recorded first; the stored outcome stands
            let settled = self
                .store
                .get(handle)
                .await?
                .and_then(|record| record.status.settled_outcome());
            if let Some(outcome) = settled {
                debug!(%handle, outcome = outcome.label(), "batch settled concurrently");
                return Ok(outcome);
            }
        }

        if resolution.outcome.is_terminal() {
            if let Some(metrics) = &self.metrics {
                metrics.record_outcome(&resolution.outcome);
            }
        }
        info!(%handle, outcome = resolution.outcome.label(), "batch re-resolved");
        Ok(resolution.outcome)
    }

    /// Re-resolve every stored batch that is still pending or timed out, oldest first.
    ///
    /// Batches whose resolution fails are logged and left out of the result;
    /// they stay in the store for the next pass.
    pub async fn resume_timed_out(&self) -> Result<Vec<(BatchHandle, Outcome)>, OrchestratorError> {
        let records = self.store.list_unresolved().await?;
        info!(count = records.len(), "resuming unresolved batches");

        let mut results = Vec::with_capacity(records.len());
        for record in records {
            match self.resolve(&record.handle).await {
                Ok(outcome) => results.push((record.handle, outcome)),
                Err(err) => {
                    error!(
                        handle = %record.handle,
                        error = %err,
                        error_class = "store",
                        "failed to resume batch"
                    );
                }
            }
        }
        Ok(results)
    }

    fn record_resolution(&self, resolution: &Resolution, started: Instant) {
        if let Some(metrics) = &self.metrics {
            metrics.record_status_queries(resolution.status_queries);
            if resolution.outcome.is_terminal() {
                metrics.record_resolution(started.elapsed());
            }
        }
    }

    fn last_slot(&self) -> MutexGuard<'_, Option<Batch>> {
        self.last.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
