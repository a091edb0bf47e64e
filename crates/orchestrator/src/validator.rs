use alloy_primitives::Address;
use batch_intents_types::Intent;
use std::collections::HashSet;
use thiserror::Error;

pub const DEFAULT_MAX_BATCH_SIZE: usize = 20;

/// Rejects batches that could never be composed into a valid call list
pub struct IntentValidator {
    max_batch_size: usize,
}

impl IntentValidator {
    pub fn new(max_batch_size: usize) -> Self {
        Self { max_batch_size }
    }

    pub fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    pub fn validate_batch(&self, intents: &[Intent]) -> Result<(), ValidationError> {
        if intents.is_empty() {
            return Err(ValidationError::EmptyBatch);
        }

        if intents.len() > self.max_batch_size {
            return Err(ValidationError::TooManyIntents {
                count: intents.len(),
                max: self.max_batch_size,
            });
        }

        let mut seen = HashSet::with_capacity(intents.len());
        for intent in intents {
            if !seen.insert(intent.id.as_str()) {
                return Err(ValidationError::DuplicateId {
                    intent_id: intent.id.clone(),
                });
            }
            self.validate_intent(intent)?;
        }

        Ok(())
    }

    pub fn validate_intent(&self, intent: &Intent) -> Result<(), ValidationError> {
        if intent.action_call.to == Address::ZERO {
            return Err(ValidationError::ZeroTarget {
                intent_id: intent.id.clone(),
            });
        }

        // Native-asset actions may legitimately carry no value
        if intent.needs_allowance() && intent.spend_amount.is_zero() {
            return Err(ValidationError::ZeroSpend {
                intent_id: intent.id.clone(),
            });
        }

        Ok(())
    }
}

impl Default for IntentValidator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BATCH_SIZE)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("batch contains no intents")]
    EmptyBatch,

    #[error("batch has {count} intents, max {max}")]
    TooManyIntents { count: usize, max: usize },

    #[error("duplicate intent id {intent_id}")]
    DuplicateId { intent_id: String },

    #[error("intent {intent_id}: action call targets the zero address")]
    ZeroTarget { intent_id: String },

    #[error("intent {intent_id}: zero spend amount for a token spend")]
    ZeroSpend { intent_id: String },
}
