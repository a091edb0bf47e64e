use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

/// An ERC-20 token the user spends
///
/// Two references are the same token when their addresses match; `decimals`
/// is carried for display and never affects equality.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct TokenRef {
    pub address: Address,
    pub decimals: u8,
}

impl TokenRef {
    pub fn new(address: Address, decimals: u8) -> Self {
        Self { address, decimals }
    }
}

impl PartialEq for TokenRef {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address
    }
}

impl Eq for TokenRef {}

impl Hash for TokenRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.address.hash(state);
    }
}
