//! Interfaces of the external collaborators the orchestrator drives.

use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use batch_intents_ratelimit::{classify_error, classify_submission_error, Classify, ErrorClass};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::{BatchHandle, CallSpec, CallsStatus, Intent, IntentKind, TokenRef};

/// EIP-5792 error code for an unknown call bundle id
pub const UNKNOWN_BUNDLE_CODE: i64 = 5730;

/// EIP-1193 error code for a request rejected by the user
pub const USER_REJECTED_CODE: i64 = 4001;

/// Errors raised by an execution provider (wallet RPC)
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("unknown bundle id: {0}")]
    UnknownHandle(BatchHandle),

    #[error("user rejected the request: {0}")]
    UserRejected(String),

    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("transport error: {0}")]
    Transport(String),
}

impl ProviderError {
    pub fn rpc(code: i64, message: impl Into<String>) -> Self {
        ProviderError::Rpc {
            code,
            message: message.into(),
        }
    }

    /// Classification used at submission time, where wallets phrase rejection loosely.
    ///
    /// Rejection wording wins over the code or transport fallback, so a
    /// "Request cancelled" arriving as a 5xx or a transport error is still
    /// the user's answer.
    pub fn classify_submission(&self) -> ErrorClass {
        match self {
            ProviderError::Rpc {
                code: USER_REJECTED_CODE | UNKNOWN_BUNDLE_CODE,
                ..
            } => self.classify(),
            ProviderError::Rpc { message, .. } | ProviderError::Transport(message) => {
                match classify_submission_error(message) {
                    ErrorClass::UserRejected => ErrorClass::UserRejected,
                    _ => self.classify(),
                }
            }
            _ => self.classify(),
        }
    }
}

impl Classify for ProviderError {
    fn classify(&self) -> ErrorClass {
        match self {
            ProviderError::UnknownHandle(_) => ErrorClass::UnknownHandle,
            ProviderError::UserRejected(_) => ErrorClass::UserRejected,
            ProviderError::Rpc { code, message } => match *code {
                USER_REJECTED_CODE => ErrorClass::UserRejected,
                UNKNOWN_BUNDLE_CODE => ErrorClass::UnknownHandle,
                429 | -32005 => ErrorClass::RateLimited,
                -32603 | 500..=599 => ErrorClass::Upstream,
                _ => classify_error(message),
            },
            // A transport failure with no recognisable wording is still a network problem
            ProviderError::Transport(message) => match classify_error(message) {
                ErrorClass::Fatal => ErrorClass::Network,
                class => class,
            },
        }
    }
}

/// Errors raised while reading chain state
#[derive(Debug, Clone, Error)]
pub enum ReaderError {
    #[error("rpc error: {0}")]
    Rpc(String),

    #[error("contract call reverted: {0}")]
    Reverted(String),
}

impl Classify for ReaderError {
    fn classify(&self) -> ErrorClass {
        match self {
            ReaderError::Rpc(message) => classify_error(message),
            ReaderError::Reverted(_) => ErrorClass::Fatal,
        }
    }
}

/// Errors raised by a quote provider
#[derive(Debug, Clone, Error)]
pub enum QuoteError {
    #[error("no route found for {sell} -> {buy}")]
    NoRoute { sell: Address, buy: Address },

    #[error("quote request failed: {0}")]
    Request(String),
}

impl Classify for QuoteError {
    fn classify(&self) -> ErrorClass {
        match self {
            QuoteError::NoRoute { .. } => ErrorClass::Fatal,
            QuoteError::Request(message) => classify_error(message),
        }
    }
}

/// Read-only chain queries
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// ERC-20 `allowance(owner, spender)` on `token`
    async fn get_allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, ReaderError>;
}

/// Atomic multi-call submission and tracking (EIP-5792 `wallet_sendCalls`)
#[async_trait]
pub trait ExecutionProvider: Send + Sync {
    async fn submit_batch(
        &self,
        calls: &[CallSpec],
        account: Address,
    ) -> Result<BatchHandle, ProviderError>;

    async fn get_status(&self, handle: &BatchHandle) -> Result<CallsStatus, ProviderError>;

    /// Wait up to `timeout` for a non-pending status.
    ///
    /// Returns `CallsStatus::Pending` when the timeout elapses without a result.
    async fn await_status(
        &self,
        handle: &BatchHandle,
        timeout: Duration,
    ) -> Result<CallsStatus, ProviderError>;
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteRequest {
    pub id: String,
    pub kind: IntentKind,
    pub sell_token: Option<TokenRef>,
    pub buy_token: Address,
    pub sell_amount: U256,
    pub taker: Address,
}

/// Opaque calldata returned by a quoting service
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub request: QuoteRequest,
    pub call: CallSpec,
    pub buy_amount: U256,
}

impl Quote {
    pub fn into_intent(self) -> Intent {
        Intent {
            id: self.request.id,
            kind: self.request.kind,
            spender_token: self.request.sell_token,
            spend_amount: self.request.sell_amount,
            action_call: self.call,
        }
    }
}

#[async_trait]
pub trait QuoteProvider: Send + Sync {
    async fn quote(&self, request: &QuoteRequest) -> Result<Quote, QuoteError>;
}
