//! Batch submission and settlement tracking
//!
//! `BatchSubmitter` hands a composed call list to the execution provider and
//! returns its handle. `SettlementTracker` turns that handle into a final
//! `Outcome`, and `BatchStore` keeps submitted batches around so a timed-out
//! handle can be resolved again later.

pub mod error;
pub mod store;
pub mod submitter;
pub mod tracker;

#[cfg(test)]
mod mock;

pub use error::*;
pub use store::*;
pub use submitter::*;
pub use tracker::*;
