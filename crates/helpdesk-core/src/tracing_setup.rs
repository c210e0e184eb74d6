use std::fs::OpenOptions;

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Install the global subscriber, filtered by `RUST_LOG` (default `info`).
pub fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    init_tracing_with_filter(filter)
}

pub fn init_tracing_with_filter(filter: EnvFilter) -> Result<()> {
    // Check if file logging is enabled via environment variable
    let file_logging = std::env::var("HELPDESK_LOG_FILE").ok();

    // stdout belongs to command output
    let console = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(filter);

    let registry = tracing_subscriber::registry().with(console);

    if let Some(log_path) = file_logging {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .with_context(|| format!("Failed to open log file {}", log_path))?;

        let file_layer = fmt::layer()
            .with_writer(file)
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(true)
            .with_filter(tracing_subscriber::filter::LevelFilter::DEBUG);

        registry
            .with(file_layer)
            .try_init()
            .context("Tracing subscriber already installed")?;
        tracing::info!(path = %log_path, "File logging enabled");
    } else {
        registry
            .try_init()
            .context("Tracing subscriber already installed")?;
    }
    Ok(())
}
