use std::process::ExitCode;

use failover_harness::config::HarnessConfig;
use failover_harness::harness::run_suite;
use failover_harness::Result;
use failover_harness::DEFAULT_LOG_FILTER;
use tokio::signal::unix::signal;
use tokio::signal::unix::SignalKind;
use tracing::error;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    init_observability();

    match run().await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("harness aborted: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Returns whether every scenario passed.
///
/// An optional first argument names a TOML file merged over the loaded
/// configuration.
async fn run() -> Result<bool> {
    let mut config = HarnessConfig::new()?;
    if let Some(path) = std::env::args().nth(1) {
        info!("applying override config {}", path);
        config = config.with_override_config(&path)?;
    }
    let config = config.validate()?;
    info!(
        scenarios = config.scenario.scenarios.len(),
        "harness configured"
    );

    // Dropping the in-flight suite drops its environment, which tears it down.
    tokio::select! {
        suite = run_suite(&config) => {
            let suite = suite?;
            suite.log_summary();
            Ok(suite.all_passed())
        }
        _ = shutdown_signal() => {
            info!("interrupted, tearing down");
            Ok(false)
        }
    }
}

async fn shutdown_signal() {
    let (mut sigint, mut sigterm) = match (
        signal(SignalKind::interrupt()),
        signal(SignalKind::terminate()),
    ) {
        (Ok(sigint), Ok(sigterm)) => (sigint, sigterm),
        (Err(e), _) | (_, Err(e)) => {
            error!("failed to install signal handlers: {}", e);
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT detected.");
        },
        _ = sigterm.recv() => {
            info!("SIGTERM detected.");
        },
    }
}

fn init_observability() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let base_subscriber = tracing_subscriber::fmt::layer().with_filter(filter);
    tracing_subscriber::registry().with(base_subscriber).init();
}
