use alloy_primitives::B256;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::CallSpec;

/// Hash of the transaction that included a batch
pub type TxHash = B256;

/// Provider-assigned identifier of a submitted batch
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchHandle(String);

impl BatchHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BatchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BatchHandle {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Local correlation id for one `execute_batch` invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BatchId(uuid::Uuid);

impl BatchId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for BatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a batch owned by one orchestrator invocation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BatchStatus {
    Composing,
    Submitting,
    Pending,
    Success { tx_ref: TxHash },
    Failed { reason: String },
    Cancelled { reason: String },
    TimedOut,
}

impl BatchStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BatchStatus::Success { .. }
                | BatchStatus::Failed { .. }
                | BatchStatus::Cancelled { .. }
                | BatchStatus::TimedOut
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            BatchStatus::Composing => "composing",
            BatchStatus::Submitting => "submitting",
            BatchStatus::Pending => "pending",
            BatchStatus::Success { .. } => "success",
            BatchStatus::Failed { .. } => "failed",
            BatchStatus::Cancelled { .. } => "cancelled",
            BatchStatus::TimedOut => "timed_out",
        }
    }

    /// The outcome recorded by a status that can no longer change.
    ///
    /// `TimedOut` and the in-flight states return `None`.
    pub fn settled_outcome(&self) -> Option<Outcome> {
        match self {
            BatchStatus::Success { tx_ref } => Some(Outcome::Success { tx_ref: *tx_ref }),
            BatchStatus::Failed { reason } => Some(Outcome::failed(reason.clone())),
            BatchStatus::Cancelled { reason } => Some(Outcome::cancelled(reason.clone())),
            _ => None,
        }
    }

    fn can_transition_to(&self, next: &BatchStatus) -> bool {
        use BatchStatus::*;
        match (self, next) {
            (Composing, Submitting) => true,
            (Submitting, Pending) => true,
            (Pending, Success { .. }) | (Pending, TimedOut) => true,
            (Composing | Submitting | Pending, Failed { .. } | Cancelled { .. }) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("invalid batch transition from {from} to {to}")]
    Invalid {
        from: &'static str,
        to: &'static str,
    },

    #[error("batch handle already assigned: {0}")]
    HandleAlreadyAssigned(BatchHandle),
}

/// The unit of execution: an ordered list of calls submitted atomically
#[derive(Clone, Debug)]
pub struct Batch {
    id: BatchId,
    handle: Option<BatchHandle>,
    calls: Vec<CallSpec>,
    status: BatchStatus,
}

impl Batch {
    pub fn new() -> Self {
        Self {
            id: BatchId::new(),
            handle: None,
            calls: Vec::new(),
            status: BatchStatus::Composing,
        }
    }

    pub fn id(&self) -> BatchId {
        self.id
    }

    pub fn handle(&self) -> Option<&BatchHandle> {
        self.handle.as_ref()
    }

    pub fn calls(&self) -> &[CallSpec] {
        &self.calls
    }

    pub fn status(&self) -> &BatchStatus {
        &self.status
    }

    /// Set the composed calls; only allowed while composing
    pub fn set_calls(&mut self, calls: Vec<CallSpec>) -> Result<(), TransitionError> {
        if self.status != BatchStatus::Composing {
            return Err(TransitionError::Invalid {
                from: self.status.name(),
                to: BatchStatus::Composing.name(),
            });
        }
        self.calls = calls;
        Ok(())
    }

    pub fn transition(&mut self, next: BatchStatus) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(&next) {
            return Err(TransitionError::Invalid {
                from: self.status.name(),
                to: next.name(),
            });
        }
        self.status = next;
        Ok(())
    }

    /// Record the provider handle and move to `Pending`
    pub fn mark_submitted(&mut self, handle: BatchHandle) -> Result<(), TransitionError> {
        if let Some(existing) = &self.handle {
            return Err(TransitionError::HandleAlreadyAssigned(existing.clone()));
        }
        self.transition(BatchStatus::Pending)?;
        self.handle = Some(handle);
        Ok(())
    }

    /// Apply a resolved outcome as the terminal status
    pub fn finish(&mut self, outcome: &Outcome) -> Result<(), TransitionError> {
        self.transition(outcome.to_status())
    }
}

impl Default for Batch {
    fn default() -> Self {
        Self::new()
    }
}

/// Status reported by the execution provider for a handle
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CallsStatus {
    Pending,
    Confirmed { tx_ref: TxHash },
    Failed { reason: String },
}

impl CallsStatus {
    /// Map an EIP-5792 `wallet_getCallsStatus` status code.
    ///
    /// A confirmed code without a receipt hash is still pending from our side.
    pub fn from_code(code: u16, tx_ref: Option<TxHash>) -> Self {
        match code {
            100..=199 => CallsStatus::Pending,
            200..=299 => match tx_ref {
                Some(tx_ref) => CallsStatus::Confirmed { tx_ref },
                None => CallsStatus::Pending,
            },
            400..=499 => CallsStatus::Failed {
                reason: "batch not included onchain".to_string(),
            },
            500..=599 => CallsStatus::Failed {
                reason: "batch reverted".to_string(),
            },
            600..=699 => CallsStatus::Failed {
                reason: "batch partially executed".to_string(),
            },
            _ => CallsStatus::Pending,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, CallsStatus::Pending)
    }
}

/// Final answer for one `execute_batch` call
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Success { tx_ref: TxHash },

    /// `retryable` is true when resubmitting the whole batch later may succeed
    Failed { reason: String, retryable: bool },

    Cancelled { reason: String },

    /// Not resolved in time; `handle` can be resolved again later
    TimedOut { handle: BatchHandle },
}

impl Outcome {
    pub fn failed(reason: impl Into<String>) -> Self {
        Outcome::Failed {
            reason: reason.into(),
            retryable: false,
        }
    }

    pub fn transient(reason: impl Into<String>) -> Self {
        Outcome::Failed {
            reason: reason.into(),
            retryable: true,
        }
    }

    pub fn cancelled(reason: impl Into<String>) -> Self {
        Outcome::Cancelled {
            reason: reason.into(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Outcome::TimedOut { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Success { .. } => "success",
            Outcome::Failed { .. } => "failed",
            Outcome::Cancelled { .. } => "cancelled",
            Outcome::TimedOut { .. } => "timed_out",
        }
    }

    pub fn to_status(&self) -> BatchStatus {
        match self {
            Outcome::Success { tx_ref } => BatchStatus::Success { tx_ref: *tx_ref },
            Outcome::Failed { reason, .. } => BatchStatus::Failed {
                reason: reason.clone(),
            },
            Outcome::Cancelled { reason } => BatchStatus::Cancelled {
                reason: reason.clone(),
            },
            Outcome::TimedOut { .. } => BatchStatus::TimedOut,
        }
    }
}
