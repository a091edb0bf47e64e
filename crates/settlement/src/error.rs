use batch_intents_ratelimit::{Classify, ErrorClass, ResilienceError};
use batch_intents_types::ProviderError;
use thiserror::Error;

/// A provider error raised by a wallet call the user can answer.
///
/// Classified with the broader submission-time rejection rules, so a wallet
/// prompt dismissed with "Request cancelled" is never retried, whether it
/// arrives while submitting or while polling.
#[derive(Debug, Clone, Error)]
#[error(transparent)]
pub struct WalletFailure(pub ProviderError);

impl Classify for WalletFailure {
    fn classify(&self) -> ErrorClass {
        self.0.classify_submission()
    }
}

#[derive(Debug, Error)]
pub enum SubmitError {
    /// The user rejected the batch; no handle was ever assigned
    #[error("user cancelled submission: {reason}")]
    UserCancelled { reason: String },

    /// Any other failure; the whole batch may be composed and submitted again
    #[error("submission failed: {0}")]
    Transient(ResilienceError<WalletFailure>),

    #[error("refusing to submit an empty batch")]
    EmptyBatch,
}

impl SubmitError {
    pub fn is_user_cancelled(&self) -> bool {
        matches!(self, SubmitError::UserCancelled { .. })
    }

    pub fn is_breaker_open(&self) -> bool {
        matches!(self, SubmitError::Transient(ResilienceError::BreakerOpen))
    }
}

impl Classify for SubmitError {
    fn classify(&self) -> ErrorClass {
        match self {
            SubmitError::UserCancelled { .. } => ErrorClass::UserRejected,
            SubmitError::Transient(err) => err.classify(),
            SubmitError::EmptyBatch => ErrorClass::Fatal,
        }
    }
}
