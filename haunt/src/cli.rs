///
/// This module implements the CLI interface for haunt: command parsing, config loading,
/// file selection and the user-visible output of a run.
///
/// All pipeline logic (chunking, progress, finalize, analysis classification) lives in the
/// [`haunt-core`] crate. This module is CLI glue only.
///
/// ## Commands
/// - `scan <PATH>`: upload a file or a filtered folder, then run analysis. Prints the
///   resulting status as JSON and optionally writes it to `--summary`.
/// - `report <FILENAME> --output <FILE>`: download the rendered report of an analyzed file.
///
/// ## How To Use
/// - For command-line users: use the installed `haunt` binary with `--help`.
/// - For programmatic/integration use: call [`run`] with a constructed [`Cli`].
///
/// [`haunt-core`]: ../../haunt-core/
use crate::load_config::load_config;
use crate::select::select_files;
use crate::upload::HttpClient;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use haunt_core::config::format_size;
use haunt_core::preprocess::LineNumberAnnotator;
use haunt_core::session::SessionCoordinator;
use haunt_core::status::{EventSink, PipelineEvent, StatusModel};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc::UnboundedReceiver;

/// CLI for haunt: upload source files and scan them for sensitive data.
#[derive(Parser)]
#[clap(
    name = "haunt",
    version,
    about = "Upload source files in chunks and analyze them for leaked secrets and security issues"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Upload a file or folder and analyze the uploaded set
    Scan {
        /// File or folder to upload
        path: PathBuf,
        /// Path to the YAML config file
        #[clap(long)]
        config: Option<PathBuf>,
        /// Write the final status as JSON to this file
        #[clap(long)]
        summary: Option<PathBuf>,
    },
    /// Download the rendered analysis report for a file
    Report {
        /// Filename as reported in the scan results
        filename: String,
        /// Where to write the report
        #[clap(long)]
        output: PathBuf,
        /// Path to the YAML config file
        #[clap(long)]
        config: Option<PathBuf>,
    },
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    // Emit a top-level 'trace_initialised' event at the very start
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Scan {
            path,
            config,
            summary,
        } => scan(&path, config, summary.as_deref()).await,
        Commands::Report {
            filename,
            output,
            config,
        } => report(&filename, &output, config).await,
    }
}

async fn scan(path: &Path, config: Option<PathBuf>, summary: Option<&Path>) -> Result<()> {
    let config = load_config(config)?;
    let files = select_files(path, &config.selection.allowed_extensions)?;
    let total: u64 = files.iter().map(|f| f.size).sum();
    tracing::info!(
        command = "scan",
        files = files.len(),
        total_size = %format_size(total),
        "Starting upload and analysis"
    );

    let client = HttpClient::from_config(&config).map_err(anyhow::Error::msg)?;
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    let coordinator = SessionCoordinator::new(
        client,
        LineNumberAnnotator::new(),
        config.transfer_config()?,
    )
    .with_events(EventSink::new(tx));

    let (status, ()) = futures::future::join(coordinator.run(&files), log_events(rx)).await;

    let json = serde_json::to_string_pretty(&status)?;
    println!("{json}");
    if let Some(summary) = summary {
        std::fs::write(summary, &json)
            .with_context(|| format!("failed to write summary to {}", summary.display()))?;
        tracing::info!(path = %summary.display(), "Summary written");
    }

    finish(&status)
}

/// Logs pipeline events until the run reports its final status.
async fn log_events(mut rx: UnboundedReceiver<PipelineEvent>) {
    while let Some(event) = rx.recv().await {
        match event {
            PipelineEvent::SessionStarted { session_id, files } => {
                tracing::info!(%session_id, files, "Upload session started")
            }
            PipelineEvent::Progress { file, percent } => {
                tracing::info!(file = %file.name, percent, "Upload progress")
            }
            PipelineEvent::Finalized { saved_files, folder } => {
                tracing::info!(saved = saved_files.len(), folder = %folder, "Upload finalized")
            }
            PipelineEvent::AnalysisStarted { files } => {
                tracing::info!(files, "Analysis started")
            }
            PipelineEvent::Finished(_) => break,
        }
    }
}

fn finish(status: &StatusModel) -> Result<()> {
    if status.is_success() {
        for e in &status.errors {
            tracing::warn!(file = %e.filename, error = %e.error, "File could not be analyzed");
        }
        tracing::info!(command = "scan", message = %status.message, "Scan complete");
        Ok(())
    } else {
        tracing::error!(command = "scan", message = %status.message, "Scan failed");
        Err(anyhow::Error::msg(status.message.clone()))
    }
}

async fn report(filename: &str, output: &Path, config: Option<PathBuf>) -> Result<()> {
    let config = load_config(config)?;
    let client = HttpClient::from_config(&config).map_err(anyhow::Error::msg)?;
    let bytes = client
        .fetch_report(filename)
        .await
        .map_err(|e| anyhow::anyhow!("failed to fetch report for {filename}: {e}"))?;
    std::fs::write(output, &bytes)
        .with_context(|| format!("failed to write report to {}", output.display()))?;
    tracing::info!(command = "report", path = %output.display(), size = bytes.len(), "Report saved");
    Ok(())
}
