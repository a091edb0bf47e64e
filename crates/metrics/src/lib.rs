//! Metrics and logging for batch intent execution
//!
//! - Prometheus counters for submissions, outcomes, approvals, status queries
//!   and resilience failures, kept in a collector-owned registry
//! - HTTP endpoint for metrics scraping
//! - Tracing setup whose [`MetricsLayer`] turns structured failure events
//!   into counters
//!
//! # Example
//!
//! ```no_run
//! use batch_intents_config::AppConfig;
//! use batch_intents_metrics::{init_tracing, MetricsCollector, MetricsServer};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = AppConfig::default();
//!     let collector = Arc::new(MetricsCollector::new());
//!     init_tracing(&config.logging, collector.clone()).unwrap();
//!
//!     let server = MetricsServer::new(collector, config.metrics.listen_addr());
//!     server.serve().await.unwrap();
//! }
//! ```

pub mod collector;
pub mod http;
pub mod tracing;

pub use collector::{MetricsCollector, MetricsError};
pub use http::{MetricsServer, MetricsServerError};
pub use self::tracing::{init_tracing, BatchSpan, MetricsLayer, TracingError};
