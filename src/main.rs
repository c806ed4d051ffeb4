mod app;
mod cli;
mod db;
mod http;
mod paths;

use std::fs::OpenOptions;
use std::io;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    init_tracing(&cli)?;
    app::run(cli)
}

fn init_tracing(cli: &cli::Cli) -> Result<()> {
    // The TUI owns the terminal, so its diagnostics go to a file instead of stderr.
    let default_level = if cli.runs_tui() { "info" } else { "warn" };
    let filter = match cli.log_level.as_deref() {
        Some(level) => EnvFilter::try_new(level)
            .with_context(|| format!("invalid log level filter: {level}"))?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
    };

    if cli.runs_tui() {
        let path = paths::log_file_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create log directory {}", parent.display())
            })?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("failed to open log file {}", path.display()))?;
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(true)
                    .with_writer(Mutex::new(file))
                    .with_filter(filter),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_writer(io::stderr)
                    .with_filter(filter),
            )
            .init();
    }
    Ok(())
}
