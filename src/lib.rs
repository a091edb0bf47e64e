//! Batch intent execution
//!
//! Collects independent on-chain intents (swaps, limit orders) into one atomic
//! batch, prepends the ERC-20 approvals they need, submits the batch through an
//! EIP-5792 style execution provider and tracks it to a final outcome.
//!
//! The work is split across the workspace crates, re-exported here:
//!
//! - [`types`]: intents, calls, batch lifecycle and provider traits
//! - [`ratelimit`]: error classification, retry, circuit breaker, rate limiter
//! - [`settlement`]: submission, status tracking and the batch store
//! - [`orchestrator`]: validation, approval planning, composition and the pipeline
//! - [`config`]: layered configuration loading and validation
//! - [`metrics`]: Prometheus collector, scrape endpoint and tracing setup
//!
//! ```no_run
//! use batch_intents::config::{validate_config, ConfigLoader};
//! use batch_intents::orchestrator::{BatchOrchestrator, OrchestratorSettings};
//! # use std::sync::Arc;
//! # async fn run(
//! #     reader: Arc<dyn batch_intents::types::ChainReader>,
//! #     provider: Arc<dyn batch_intents::types::ExecutionProvider>,
//! #     intents: Vec<batch_intents::types::Intent>,
//! #     wallet: batch_intents::types::Address,
//! # ) -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConfigLoader::from_env()?;
//! validate_config(&config)?;
//!
//! let orchestrator = BatchOrchestrator::builder()
//!     .with_chain_reader(reader)
//!     .with_execution_provider(provider)
//!     .with_settings(OrchestratorSettings::from_app_config(&config)?)
//!     .build()?;
//!
//! let outcome = orchestrator.execute_batch(intents, wallet).await;
//! println!("batch finished: {}", outcome.label());
//! # Ok(())
//! # }
//! ```

pub use batch_intents_config as config;
pub use batch_intents_metrics as metrics;
pub use batch_intents_orchestrator as orchestrator;
pub use batch_intents_ratelimit as ratelimit;
pub use batch_intents_settlement as settlement;
pub use batch_intents_types as types;

pub use batch_intents_orchestrator::{BatchOrchestrator, OrchestratorSettings};
pub use batch_intents_ratelimit::{classify_error, ErrorClass, ResilienceGuard};
pub use batch_intents_types::{Batch, BatchHandle, BatchStatus, CallSpec, Intent, Outcome};
