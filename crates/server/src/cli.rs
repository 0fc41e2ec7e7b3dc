//! CLI argument parsing and subcommand dispatch.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use intake_core::Config;
use intake_ingest::ImportLimit;

use crate::startup;

#[derive(Parser, Debug)]
#[command(name = "intake-server", version, about = "CSV intake service")]
pub struct Cli {
    /// Override DATA_DIR for this invocation.
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the HTTP server (default).
    Serve,
    /// Run one ingestion over a local CSV file.
    Ingest {
        file: PathBuf,
        /// Rows to enqueue; defaults to the configured import limit.
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Process queued items until a pass settles nothing.
    Drain {
        #[arg(long, default_value_t = 50)]
        batch_size: usize,
    },
}

/// Run a non-serve subcommand. Returns `Ok(false)` when the caller should
/// start the server.
pub async fn dispatch(config: &Config, command: Option<Command>) -> anyhow::Result<bool> {
    match command {
        None | Some(Command::Serve) => Ok(false),
        Some(Command::Ingest { file, limit }) => {
            let config = config.clone();
            tokio::task::spawn_blocking(move || ingest(&config, &file, limit)).await??;
            Ok(true)
        }
        Some(Command::Drain { batch_size }) => {
            let config = config.clone();
            tokio::task::spawn_blocking(move || drain(&config, batch_size)).await??;
            Ok(true)
        }
    }
}

fn ingest(config: &Config, file: &Path, limit: Option<u32>) -> anyhow::Result<()> {
    let state = startup::build_app_state(config)?;
    let limit = match limit {
        Some(n) => ImportLimit::new(n).context("--limit must be a positive integer")?,
        None => state
            .settings
            .import_limit()?
            .0
            .context("import limit is not configured; pass --limit or set IMPORT_LIMIT")?,
    };

    let report = state.pipeline().ingest(file, limit)?;
    info!(
        file = %file.display(),
        enqueued = report.enqueued,
        skipped = report.skipped,
        malformed = report.malformed,
        limit_reached = report.limit_reached,
        "ingest complete"
    );
    Ok(())
}

fn drain(config: &Config, batch_size: usize) -> anyhow::Result<()> {
    let state = startup::build_app_state(config)?;
    let worker = state.worker();

    let mut total = intake_ingest::DrainReport::default();
    loop {
        let pass = worker.drain(batch_size)?;
        total.merge(&pass);
        if pass.settled() == 0 {
            break;
        }
    }
    info!(
        created = total.created,
        duplicates = total.duplicates,
        rejected = total.rejected,
        failed = total.failed,
        remaining = state.queue.len()?,
        "drain complete"
    );
    Ok(())
}
