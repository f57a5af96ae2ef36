//! easyswap-sync - order-book chain indexer and order lifecycle service.
//!
//! # Usage
//!
//! ```bash
//! # Start with ./config.toml
//! easyswap-sync
//!
//! # Explicit config, RPC key from the environment
//! ANKR_API_KEY=... easyswap-sync --config /etc/easyswap/config.toml
//!
//! # Validate the config and exit
//! easyswap-sync --config config.toml --check
//! ```

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use easyswap_sync::config::Config;
use easyswap_sync::service::Service;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// How long shutdown waits for background loops.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// EasySwap order-book sync service.
#[derive(Parser, Debug)]
#[command(name = "easyswap-sync")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, env = "EASYSWAP_SYNC_CONFIG", default_value = "config.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error). Overrides the config.
    #[arg(long)]
    log_level: Option<String>,

    /// Validate the configuration and exit.
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let mut config = Config::load(&cli.config)
        .with_context(|| format!("failed to load config from {}", cli.config.display()))?;

    if cli.check {
        println!("Configuration OK: {}", cli.config.display());
        return Ok(());
    }

    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    config.init_logging();
    info!(version = env!("CARGO_PKG_VERSION"), "easyswap-sync starting");

    let shutdown = CancellationToken::new();
    let mut service = Service::new(&shutdown, config)
        .await
        .context("failed to create service")?;
    service.start().await.context("failed to start service")?;

    let signal = tokio::select! {
        signal = shutdown_signal() => {
            if signal.is_ok() {
                info!("Shutdown signal received");
            }
            signal
        }
        () = service.cancelled() => {
            warn!("Service cancelled");
            Ok(())
        }
    };

    let stopped = service.shutdown(SHUTDOWN_TIMEOUT).await;
    if let Err(e) = &stopped {
        error!(error = %e, "Shutdown incomplete");
    }

    exit_status(signal, stopped, service.failure())?;
    info!("easyswap-sync stopped");
    Ok(())
}

/// Fold the ways a run can end into the process result. Any of a failed
/// signal handler, an incomplete shutdown, or a failed loop is an error.
fn exit_status(
    signal: Result<()>,
    stopped: easyswap_sync::error::Result<()>,
    failure: Option<String>,
) -> Result<()> {
    signal?;
    stopped.context("service did not stop cleanly")?;
    if let Some(failure) = failure {
        bail!("background loop failed: {failure}");
    }
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())
            .context("failed to install SIGTERM handler")?;
        tokio::select! {
            ctrl_c = signal::ctrl_c() => ctrl_c.context("failed to listen for Ctrl+C")?,
            _ = terminate.recv() => {}
        }
    }

    #[cfg(not(unix))]
    signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl+C")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use easyswap_sync::error::Error;

    use super::*;

    #[test]
    fn clean_stop_exits_zero() {
        assert!(exit_status(Ok(()), Ok(()), None).is_ok());
    }

    #[test]
    fn timed_out_shutdown_exits_nonzero() {
        let err = exit_status(Ok(()), Err(Error::ShutdownTimedOut { outstanding: 1 }), None)
            .unwrap_err();
        assert!(format!("{err:#}").contains("1 background loop(s) still running"));
    }

    #[test]
    fn failed_loop_exits_nonzero() {
        let err = exit_status(Ok(()), Ok(()), Some("order_manager: disk full".into()))
            .unwrap_err();
        assert!(err.to_string().contains("order_manager: disk full"));
    }

    #[test]
    fn signal_handler_error_is_reported() {
        let err = exit_status(Err(anyhow::anyhow!("no SIGTERM")), Ok(()), None).unwrap_err();
        assert_eq!(err.to_string(), "no SIGTERM");
    }
}
