use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::{sol, SolCall};
use serde::{Deserialize, Serialize};

sol! {
    /// Subset of the ERC-20 interface used for approvals.
    interface IERC20 {
        function approve(address spender, uint256 amount) external returns (bool);
        function allowance(address owner, address spender) external view returns (uint256);
    }
}

/// A single self-contained call inside a batch
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallSpec {
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
}

impl CallSpec {
    pub fn new(to: Address, data: impl Into<Bytes>, value: U256) -> Self {
        Self {
            to,
            data: data.into(),
            value,
        }
    }

    /// `token.approve(spender, amount)`
    pub fn erc20_approve(token: Address, spender: Address, amount: U256) -> Self {
        let data = IERC20::approveCall { spender, amount }.abi_encode();
        Self::new(token, data, U256::ZERO)
    }

    /// Decode this call as an ERC-20 approval, if it is one
    pub fn as_erc20_approve(&self) -> Option<(Address, U256)> {
        IERC20::approveCall::abi_decode(&self.data, true)
            .ok()
            .map(|call| (call.spender, call.amount))
    }
}
