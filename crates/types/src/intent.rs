use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{CallSpec, TokenRef};

/// Kind of economic action an intent performs.
///
/// Each kind executes through its own executor contract, which is the spender
/// that needs an allowance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    Swap,
    LimitOrder,
    Other,
}

/// One requested action inside a batch
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    pub id: String,

    pub kind: IntentKind,

    /// Token the action spends; `None` for native-asset actions
    pub spender_token: Option<TokenRef>,

    pub spend_amount: U256,

    pub action_call: CallSpec,
}

impl Intent {
    pub fn builder() -> IntentBuilder {
        IntentBuilder::default()
    }

    /// Whether the action moves an ERC-20 and may need an approval
    pub fn needs_allowance(&self) -> bool {
        self.spender_token.is_some()
    }
}

/// Derived approval need for one (token, spender) pair
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRequirement {
    pub token: TokenRef,
    pub spender: Address,
    pub minimum_amount: U256,
}

impl ApprovalRequirement {
    pub fn key(&self) -> (Address, Address) {
        (self.token.address, self.spender)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IntentBuildError {
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },
}

#[derive(Default)]
pub struct IntentBuilder {
    id: Option<String>,
    kind: Option<IntentKind>,
    spender_token: Option<TokenRef>,
    spend_amount: U256,
    action_call: Option<CallSpec>,
}

impl IntentBuilder {
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn kind(mut self, kind: IntentKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Spend `amount` of `token` through the action
    pub fn spends(mut self, token: TokenRef, amount: U256) -> Self {
        self.spender_token = Some(token);
        self.spend_amount = amount;
        self
    }

    /// Spend `amount` of the native asset; no approval is ever needed
    pub fn spends_native(mut self, amount: U256) -> Self {
        self.spender_token = None;
        self.spend_amount = amount;
        self
    }

    pub fn action_call(mut self, call: CallSpec) -> Self {
        self.action_call = Some(call);
        self
    }

    pub fn build(self) -> Result<Intent, IntentBuildError> {
        let id = self.id.ok_or(IntentBuildError::MissingField { field: "id" })?;
        let action_call = self
            .action_call
            .ok_or(IntentBuildError::MissingField { field: "action_call" })?;

        Ok(Intent {
            id,
            kind: self.kind.unwrap_or(IntentKind::Swap),
            spender_token: self.spender_token,
            spend_amount: self.spend_amount,
            action_call,
        })
    }
}
