use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use batch_intents_config::MetricsConfig;
use prometheus::TEXT_FORMAT;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::collector::MetricsCollector;

/// Scrape endpoint over a [`MetricsCollector`]
pub struct MetricsServer {
    collector: Arc<MetricsCollector>,
    addr: String,
}

impl MetricsServer {
    pub fn new(collector: Arc<MetricsCollector>, addr: String) -> Self {
        Self { collector, addr }
    }

    pub fn from_config(config: &MetricsConfig, collector: Arc<MetricsCollector>) -> Self {
        Self::new(collector, config.listen_addr())
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// `/metrics` in the Prometheus text format and a `/health` probe
    pub fn router(&self) -> Router {
        Router::new()
            .route("/metrics", get(scrape))
            .route("/health", get(health))
            .with_state(self.collector.clone())
    }

    /// Serve until the listener fails
    pub async fn serve(self) -> Result<(), MetricsServerError> {
        self.serve_with_shutdown(std::future::pending()).await
    }

    /// Serve until `shutdown` resolves, finishing in-flight scrapes first
    pub async fn serve_with_shutdown<F>(self, shutdown: F) -> Result<(), MetricsServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(&self.addr)
            .await
            .map_err(|e| MetricsServerError::Bind {
                addr: self.addr.clone(),
                reason: e.to_string(),
            })?;
        tracing::info!(addr = %self.addr, "metrics endpoint listening");

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| MetricsServerError::Serve(e.to_string()))?;

        tracing::info!(addr = %self.addr, "metrics endpoint stopped");
        Ok(())
    }
}

async fn scrape(State(collector): State<Arc<MetricsCollector>>) -> Response {
    match collector.export_metrics() {
        Ok(body) => (StatusCode::OK, [(header::CONTENT_TYPE, TEXT_FORMAT)], body).into_response(),
        Err(err) => {
            tracing::error!(error = %err, error_class = "fatal", "metrics export failed");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
        }
    }
}

async fn health() -> &'static str {
    "OK"
}

#[derive(Debug, thiserror::Error)]
pub enum MetricsServerError {
    #[error("cannot bind metrics endpoint to {addr}: {reason}")]
    Bind { addr: String, reason: String },

    #[error("metrics endpoint failed: {0}")]
    Serve(String),
}
