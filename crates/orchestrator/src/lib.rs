//! Batch orchestration: turns a list of intents into one atomic batch of calls
//! and follows it to a final [`Outcome`](batch_intents_types::Outcome).
//!
//! The pipeline for [`BatchOrchestrator::execute_batch`]:
//!
//! 1. [`IntentValidator`] rejects batches that can never succeed
//! 2. [`ApprovalAggregator`] works out which ERC-20 approvals are missing
//! 3. [`CallComposer`] orders approvals before actions
//! 4. `BatchSubmitter` and `SettlementTracker` submit and resolve the batch
//!
//! [`QuotePlanner`] builds intents from quote requests before execution.

pub mod approvals;
pub mod composer;
pub mod orchestrator;
pub mod quotes;
pub mod settings;
pub mod validator;

#[cfg(test)]
mod mock;

pub use approvals::{AllowancePolicy, ApprovalAggregator, SpenderRegistry};
pub use composer::{ApprovalAmount, CallComposer};
pub use orchestrator::{
    BatchOrchestrator, BatchOrchestratorBuilder, BuilderError, OrchestratorError,
};
pub use quotes::{QuotePlanError, QuotePlanner};
pub use settings::{quote_retry, OrchestratorSettings, SettingsError};
pub use validator::{IntentValidator, ValidationError, DEFAULT_MAX_BATCH_SIZE};
