//! Load a configuration file with environment overrides, validate it and
//! report the runtime settings it resolves to.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use batch_intents::config::{validate_config, ConfigLoader, DEFAULT_ENV_PREFIX};
use batch_intents::metrics::{init_tracing, MetricsCollector};
use batch_intents::orchestrator::{quote_retry, OrchestratorSettings};
use clap::Parser;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file (toml, yaml or json)
    #[arg(long, default_value = "config/local.toml")]
    config: PathBuf,

    /// Prefix of environment overrides
    #[arg(long, default_value = DEFAULT_ENV_PREFIX)]
    env_prefix: String,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = ConfigLoader::from_file_with_env(&args.config, &args.env_prefix)
        .with_context(|| format!("loading {}", args.config.display()))?;
    validate_config(&config).context("validating configuration")?;

    init_tracing(&config.logging, Arc::new(MetricsCollector::new()))
        .context("initializing tracing")?;

    let settings =
        OrchestratorSettings::from_app_config(&config).context("resolving runtime settings")?;
    settings.build_guard().context("building resilience guard")?;

    info!(
        path = %args.config.display(),
        max_batch_size = settings.max_batch_size,
        allowance_policy = ?settings.allowance_policy,
        approval_amount = ?settings.approval_amount,
        spenders = config.approvals.spenders.len(),
        rate_limit = settings.rate_limit.max_requests,
        breaker_threshold = settings.breaker.failure_threshold,
        await_timeout_ms = settings.tracker.await_timeout.as_millis() as u64,
        quote_retries = quote_retry(&config).max_retries,
        "configuration is valid"
    );

    if config.metrics.enabled {
        info!(addr = %config.metrics.listen_addr(), "metrics endpoint configured");
    }

    Ok(())
}
