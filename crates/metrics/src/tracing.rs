use std::sync::Arc;

use batch_intents_config::{LogFormat, LoggingConfig};
use batch_intents_types::BatchId;
use tracing::{field::Visit, Event, Level, Subscriber};
use tracing_subscriber::{
    fmt,
    layer::{Context, SubscriberExt},
    registry::LookupSpan,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

use crate::collector::MetricsCollector;

/// Initialize tracing with metrics integration.
///
/// `RUST_LOG` wins over the configured levels when it is set.
pub fn init_tracing(
    logging: &LoggingConfig,
    collector: Arc<MetricsCollector>,
) -> Result<(), TracingError> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(logging.filter_directive()))
        .map_err(|e| TracingError::InitError(e.to_string()))?;

    let json = logging.format == LogFormat::Json;
    let json_layer = json.then(|| {
        fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_level(true)
            .json()
    });
    let pretty_layer = (!json).then(|| fmt::layer().with_target(true).pretty());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(pretty_layer)
        .with(MetricsLayer::new(collector))
        .try_init()
        .map_err(|e| TracingError::InitError(e.to_string()))?;

    Ok(())
}

/// Tracing layer that turns structured failure events into metrics.
///
/// Guarded calls log their terminal failure with `operation`, `error_class`
/// and `breaker_open`; every ERROR event carrying `error_class` is counted too.
pub struct MetricsLayer {
    collector: Arc<MetricsCollector>,
}

impl MetricsLayer {
    pub fn new(collector: Arc<MetricsCollector>) -> Self {
        Self { collector }
    }
}

impl<S> Layer<S> for MetricsLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MetricsVisitor::default();
        event.record(&mut visitor);

        let Some(error_class) = visitor.error_class.as_deref() else {
            return;
        };

        if let Some(operation) = visitor.operation.as_deref() {
            self.collector
                .record_resilience_failure(operation, error_class);
            if visitor.breaker_open {
                self.collector.record_breaker_rejection();
            }
        }

        if *event.metadata().level() == Level::ERROR {
            self.collector.record_error(error_class);
        }
    }
}

/// Visitor to extract metrics-relevant fields from events
#[derive(Default)]
struct MetricsVisitor {
    operation: Option<String>,
    error_class: Option<String>,
    breaker_open: bool,
}

impl Visit for MetricsVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        match field.name() {
            "operation" => self.operation = Some(format!("{value:?}")),
            "error_class" => self.error_class = Some(format!("{value:?}")),
            _ => {}
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        match field.name() {
            "operation" => self.operation = Some(value.to_string()),
            "error_class" => self.error_class = Some(value.to_string()),
            _ => {}
        }
    }

    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        if field.name() == "breaker_open" {
            self.breaker_open = value;
        }
    }
}

/// Span context for one `execute_batch` run
#[derive(Debug, Clone)]
pub struct BatchSpan {
    pub batch_id: BatchId,
    pub intents: usize,
}

impl BatchSpan {
    pub fn new(batch_id: BatchId, intents: usize) -> Self {
        Self { batch_id, intents }
    }

    /// Span to instrument the batch future with
    pub fn span(&self) -> tracing::Span {
        tracing::info_span!(
            "batch",
            batch_id = %self.batch_id,
            intents = self.intents,
        )
    }
}

/// Tracing error types
#[derive(Debug, thiserror::Error)]
pub enum TracingError {
    #[error("tracing initialization error: {0}")]
    InitError(String),
}
