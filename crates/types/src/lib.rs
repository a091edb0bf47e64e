pub mod batch;
pub mod call;
pub mod intent;
pub mod providers;
pub mod token;

pub use batch::*;
pub use call::*;
pub use intent::*;
pub use providers::*;
pub use token::*;

pub use alloy_primitives::{Address, Bytes, U256};

/// Token amounts in base units
pub type Amount = U256;
