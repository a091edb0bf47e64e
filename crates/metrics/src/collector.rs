use std::time::Duration;

use batch_intents_types::Outcome;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};

const NAMESPACE: &str = "batch_intents";

/// Resolution latency buckets in seconds, from instant confirmation to the
/// longest unknown-handle retry chain
const RESOLUTION_BUCKETS: &[f64] = &[0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0];

/// Prometheus metrics for batch execution.
///
/// Each collector owns its registry so independent orchestrators (and tests)
/// never share counters.
pub struct MetricsCollector {
    registry: Registry,
    batches_submitted: IntCounter,
    batch_outcomes: IntCounterVec,
    approval_calls: IntCounter,
    status_queries: IntCounter,
    resilience_failures: IntCounterVec,
    breaker_rejections: IntCounter,
    errors: IntCounterVec,
    batch_resolution: Histogram,
}

impl MetricsCollector {
    /// Create a collector with a fresh registry
    pub fn new() -> Self {
        // Names are unique constants, so a fresh registry cannot reject them
        Self::with_registry(Registry::new()).expect("metric names are unique")
    }

    /// Create a collector that registers into `registry`
    pub fn with_registry(registry: Registry) -> Result<Self, MetricsError> {
        let batches_submitted = IntCounter::with_opts(
            Opts::new("batch_submitted_total", "Batches accepted by the execution provider")
                .namespace(NAMESPACE),
        )?;
        let batch_outcomes = IntCounterVec::new(
            Opts::new("batch_outcome_total", "Final batch outcomes by kind").namespace(NAMESPACE),
            &["outcome"],
        )?;
        let approval_calls = IntCounter::with_opts(
            Opts::new("approval_calls_total", "Approval calls composed into batches")
                .namespace(NAMESPACE),
        )?;
        let status_queries = IntCounter::with_opts(
            Opts::new("status_queries_total", "Status queries issued while resolving batches")
                .namespace(NAMESPACE),
        )?;
        let resilience_failures = IntCounterVec::new(
            Opts::new(
                "resilience_failures_total",
                "Guarded remote calls that failed after retries",
            )
            .namespace(NAMESPACE),
            &["operation", "error_class"],
        )?;
        let breaker_rejections = IntCounter::with_opts(
            Opts::new(
                "breaker_rejections_total",
                "Calls rejected without running because a circuit breaker was open",
            )
            .namespace(NAMESPACE),
        )?;
        let errors = IntCounterVec::new(
            Opts::new("errors_total", "Error-level events by class").namespace(NAMESPACE),
            &["error_class"],
        )?;
        let batch_resolution = Histogram::with_opts(
            HistogramOpts::new(
                "batch_resolution_seconds",
                "Time from submission to a final outcome",
            )
            .namespace(NAMESPACE)
            .buckets(RESOLUTION_BUCKETS.to_vec()),
        )?;

        registry.register(Box::new(batches_submitted.clone()))?;
        registry.register(Box::new(batch_outcomes.clone()))?;
        registry.register(Box::new(approval_calls.clone()))?;
        registry.register(Box::new(status_queries.clone()))?;
        registry.register(Box::new(resilience_failures.clone()))?;
        registry.register(Box::new(breaker_rejections.clone()))?;
        registry.register(Box::new(errors.clone()))?;
        registry.register(Box::new(batch_resolution.clone()))?;

        Ok(Self {
            registry,
            batches_submitted,
            batch_outcomes,
            approval_calls,
            status_queries,
            resilience_failures,
            breaker_rejections,
            errors,
            batch_resolution,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // BATCH METRICS
    // ═══════════════════════════════════════════════════════════════════════════

    pub fn record_batch_submitted(&self) {
        self.batches_submitted.inc();
    }

    /// Record the final outcome of one `execute_batch` call
    pub fn record_outcome(&self, outcome: &Outcome) {
        self.batch_outcomes
            .with_label_values(&[outcome.label()])
            .inc();
    }

    pub fn record_approval_calls(&self, count: usize) {
        self.approval_calls.inc_by(count as u64);
    }

    pub fn record_status_queries(&self, count: u32) {
        self.status_queries.inc_by(u64::from(count));
    }

    pub fn record_resolution(&self, elapsed: Duration) {
        self.batch_resolution.observe(elapsed.as_secs_f64());
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // RESILIENCE METRICS
    // ═══════════════════════════════════════════════════════════════════════════

    pub fn record_resilience_failure(&self, operation: &str, error_class: &str) {
        self.resilience_failures
            .with_label_values(&[operation, error_class])
            .inc();
    }

    pub fn record_breaker_rejection(&self) {
        self.breaker_rejections.inc();
    }

    pub fn record_error(&self, error_class: &str) {
        self.errors.with_label_values(&[error_class]).inc();
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // EXPORT
    // ═══════════════════════════════════════════════════════════════════════════

    /// Export metrics in Prometheus text format
    pub fn export_metrics(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| MetricsError::EncodingError(e.to_string()))?;

        String::from_utf8(buffer).map_err(|e| MetricsError::EncodingError(e.to_string()))
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Metrics error types
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("encoding error: {0}")]
    EncodingError(String),
    #[error("registry error: {0}")]
    RegistryError(#[from] prometheus::Error),
}
