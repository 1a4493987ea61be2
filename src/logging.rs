//! Logging initialization for stepgate.
//!
//! `run` sessions own stdout, so their logs go to
//! `<paths.logs>/stepgate-{datetime}.log`. Every other command logs to stderr.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;

/// Keeps file logging alive; drop it last so buffered lines are flushed
pub struct LoggingHandle {
    pub _guard: Option<WorkerGuard>,

    /// Session log, if this run writes one
    pub log_file_path: Option<PathBuf>,
}

/// Log file name for a session started now
pub fn log_file_name() -> String {
    let timestamp = chrono::Utc::now().format("%Y%m%dT%H%M%SZ");
    format!("stepgate-{}.log", timestamp)
}

/// `RUST_LOG` wins over the configured directive when set
fn env_filter(config: &Config, debug_override: bool) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.directive(debug_override)))
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(
    config: &Config,
    is_interactive: bool,
    debug_override: bool,
) -> Result<LoggingHandle> {
    let mut handle = LoggingHandle {
        _guard: None,
        log_file_path: None,
    };

    let writer = if config.logging.file_for(is_interactive) {
        let logs_dir = config.logs_path();
        std::fs::create_dir_all(&logs_dir)
            .with_context(|| format!("Failed to create log directory {}", logs_dir.display()))?;

        let file_name = log_file_name();
        let appender = tracing_appender::rolling::never(&logs_dir, &file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);

        handle._guard = Some(guard);
        handle.log_file_path = Some(logs_dir.join(file_name));
        BoxMakeWriter::new(non_blocking)
    } else {
        BoxMakeWriter::new(std::io::stderr)
    };

    tracing_subscriber::registry()
        .with(env_filter(config, debug_override))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_ansi(handle.log_file_path.is_none())
                .with_writer(writer),
        )
        .try_init()
        .context("Failed to install log subscriber")?;

    Ok(handle)
}
