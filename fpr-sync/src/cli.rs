/// # fpr-sync CLI Interface (Module)
///
/// Command parsing and orchestration for the `fpr-sync` binary. All pass logic (resolution,
/// transfer, ledger handling, commit) lives in `fpr-sync-core`; this module only wires a loaded
/// configuration and an HTTP client into the core entrypoints and prints the outcome.
///
/// ## How To Use
/// - Command-line users: run `fpr-sync --help`.
/// - Programmatic/integration use: call [`run`] with a constructed [`Cli`].
///
/// Per-item failures never change the exit status; they end up in the flow's ledger and the
/// printed report. Only fatal errors (unreadable config, rejected credential, unusable ledger,
/// failed top-level listing) make [`run`] return an error.
use crate::client::SscHttpClient;
use crate::load_config::{load_config, DEFAULT_CONFIG_PATH};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use fpr_sync_core::commit::{commit_pending, retry_commits};
use fpr_sync_core::ledger::{FailureLedger, Flow};
use fpr_sync_core::synchronise::{
    download_all, retry_downloads, retry_uploads, upload_all, LedgerAction, PassReport,
};
use fpr_sync_core::toolkit::{ensure_tool_dir, DEFAULT_TOOL_PREFIX};
use std::path::PathBuf;

pub const DEFAULT_LOG_FILE: &str = "fpr-sync.log";

/// CLI for fpr-sync: bulk upload, download and commit of analysis artifacts.
#[derive(Parser)]
#[clap(
    name = "fpr-sync",
    version,
    about = "Bulk upload, download and commit of static-analysis artifacts"
)]
pub struct Cli {
    /// Append log records to this file (in addition to stderr)
    #[clap(long, global = true, default_value = DEFAULT_LOG_FILE)]
    pub log_file: PathBuf,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug, Clone)]
pub struct FlowArgs {
    /// Path to the YAML config file
    #[clap(long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Replay the failure ledger of a previous run instead of a full pass
    #[clap(long)]
    pub retry: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Upload every `{application};{version}.fpr` file of the artifact directory
    Upload(FlowArgs),
    /// Download the current artifact of every version on the service
    Download(FlowArgs),
    /// Commit every version left in the "finish later" state
    Commit(FlowArgs),
    /// Locate the analysis tool directory, extracting its archive if needed
    Toolkit {
        /// Directory holding the tool directories/archives
        #[clap(long, default_value = ".")]
        base_dir: PathBuf,
        /// Name prefix preceding the `X.Y.Z` version
        #[clap(long, default_value = DEFAULT_TOOL_PREFIX)]
        prefix: String,
    },
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Upload(args) => run_flow(Flow::Upload, args).await,
        Commands::Download(args) => run_flow(Flow::Download, args).await,
        Commands::Commit(args) => run_flow(Flow::Commit, args).await,
        Commands::Toolkit { base_dir, prefix } => {
            let dir = ensure_tool_dir(&base_dir, &prefix)?;
            tracing::info!(command = "toolkit", dir = %dir.display(), "Tool directory ready");
            println!("{}", dir.display());
            Ok(())
        }
    }
}

async fn run_flow(flow: Flow, args: FlowArgs) -> Result<()> {
    let config = load_config(&args.config)?;
    config.sync.trace_loaded();
    config.credential.trace_loaded();

    let client = SscHttpClient::connect(&config.sync.service, &config.credential)
        .await
        .context("Failed to connect to the service")?;
    let ledger = FailureLedger::for_flow(&config.sync.ledger_dir, flow);
    let sync = &config.sync;
    tracing::info!(
        command = flow.as_str(),
        retry = args.retry,
        ledger = %ledger.path().display(),
        "Starting pass"
    );

    let progress = |done: usize, total: usize| println!("{} {done}/{total}", flow.as_str());
    let result = match (flow, args.retry) {
        (Flow::Upload, false) => {
            upload_all(&client, sync.name_match, &sync.artifact_dir, &ledger, progress).await
        }
        (Flow::Upload, true) => retry_uploads(&client, sync.name_match, &ledger, progress).await,
        (Flow::Download, false) => {
            download_all(&client, &sync.artifact_dir, &ledger, progress).await
        }
        (Flow::Download, true) => {
            retry_downloads(&client, &sync.artifact_dir, &ledger, progress).await
        }
        (Flow::Commit, false) => commit_pending(&client, &ledger, progress).await,
        (Flow::Commit, true) => retry_commits(&client, &ledger, progress).await,
    };

    match result {
        Ok(report) => {
            tracing::info!(command = flow.as_str(), ?report, "Pass complete");
            print_report(&report);
            Ok(())
        }
        Err(e) => {
            tracing::error!(command = flow.as_str(), error = %e, "Pass aborted");
            Err(anyhow::Error::new(e).context(format!("{} pass aborted", flow.as_str())))
        }
    }
}

fn print_report(report: &PassReport) {
    println!(
        "{} report: total={} succeeded={} skipped={} malformed={} unlisted={} failed={}",
        report.flow.as_str(),
        report.total,
        report.succeeded,
        report.skipped,
        report.malformed,
        report.unlisted,
        report.failures.len()
    );
    match &report.ledger {
        LedgerAction::Persisted(path) => println!(
            "failures recorded in {}; rerun with --retry",
            path.display()
        ),
        LedgerAction::Cleared => println!("ledger cleared"),
        LedgerAction::Untouched => {}
    }
}
