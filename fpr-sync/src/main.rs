use anyhow::Result;
use clap::Parser;
use fpr_sync::cli::{run, Cli};
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(&cli.log_file);
    tracing::info!(log_file = %cli.log_file.display(), "CLI application startup: tracing initialised, environment loaded");

    let result = run(cli).await;
    match &result {
        Ok(_) => tracing::info!("CLI completed successfully"),
        Err(e) => tracing::error!(error = %e, "CLI exited with error"),
    }
    result
}

/// Console on stderr (stdout carries progress), plus a plain-text copy appended to `log_file`.
fn init_tracing(log_file: &Path) {
    let console = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(LevelFilter::INFO);

    let file_layer = match open_log_file(log_file) {
        Ok(file) => Some(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .with_filter(LevelFilter::INFO),
        ),
        Err(e) => {
            eprintln!("warning: cannot open log file {}: {e}", log_file.display());
            None
        }
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file_layer)
        .init();
}

fn open_log_file(path: &Path) -> std::io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}
