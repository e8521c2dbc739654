//! Tracing setup: a daily log file plus terse stderr output.

use anyhow::{Context, Result};
use tracing_subscriber::Layer;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::dirs;

/// Install the global subscriber.
///
/// The file layer follows `RUST_LOG` (INFO by default, DEBUG with `verbose`).
/// Stderr only shows warnings unless `verbose` is set.
pub fn setup_logging(verbose: bool) -> Result<()> {
    let log_dir = dirs::log_dir();
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, "teraverse.log");
    let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

    let default_level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    let env_filter =
        tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into());

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking_file)
        .with_ansi(false);

    let stderr_level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::WARN
    };
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(stderr_level);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stderr_layer)
        .init();

    // The writer must outlive every log call, including those during shutdown.
    std::mem::forget(guard);

    tracing::info!("Log directory: {}", log_dir.display());
    Ok(())
}
