use alloy_primitives::U256;
use batch_intents_types::{ApprovalRequirement, CallSpec, Intent};
use serde::{Deserialize, Serialize};

/// Amount written into each approval call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalAmount {
    /// Approve exactly the required amount
    #[default]
    Exact,
    /// Approve `U256::MAX`
    Unlimited,
}

/// Builds the ordered call list for a batch.
///
/// Every approval precedes every action: the provider executes calls strictly
/// in order and each action must observe its approval.
#[derive(Debug, Clone, Default)]
pub struct CallComposer {
    approval_amount: ApprovalAmount,
}

impl CallComposer {
    pub fn new(approval_amount: ApprovalAmount) -> Self {
        Self { approval_amount }
    }

    pub fn approval_amount(&self) -> ApprovalAmount {
        self.approval_amount
    }

    pub fn approve_call(&self, req: &ApprovalRequirement) -> CallSpec {
        let amount = match self.approval_amount {
            ApprovalAmount::Exact => req.minimum_amount,
            ApprovalAmount::Unlimited => U256::MAX,
        };
        CallSpec::erc20_approve(req.token.address, req.spender, amount)
    }

    pub fn compose(
        &self,
        requirements: &[ApprovalRequirement],
        intents: &[Intent],
    ) -> Vec<CallSpec> {
        if let ([], [intent]) = (requirements, intents) {
            return vec![intent.action_call.clone()];
        }

        requirements
            .iter()
            .map(|req| self.approve_call(req))
            .chain(intents.iter().map(|intent| intent.action_call.clone()))
            .collect()
    }
}
