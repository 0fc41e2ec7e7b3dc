//! intake-worker: drains the record-creation queue.
//!
//! Claims visible items in batches and turns each into a record. By default
//! it keeps claiming until a pass settles nothing; `--once` runs a single
//! batch, which is what a scheduler tick wants.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use intake_core::{Config, FileRecordStore};
use intake_ingest::{DrainReport, RecordCreationWorker};
use intake_queue::{FileQueue, WorkQueue};

// ── CLI ─────────────────────────────────────────────────────────────

/// Record-creation queue worker.
#[derive(Parser, Debug)]
#[command(name = "intake-worker", version, about)]
struct Cli {
    /// Data directory holding the queue and record stores.
    #[arg(long, env = "DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Named queue to consume.
    #[arg(long, env = "INGEST_QUEUE")]
    queue: Option<String>,

    /// Items claimed per pass.
    #[arg(long, env = "WORKER_BATCH_SIZE", default_value_t = 50)]
    batch_size: usize,

    /// Run a single pass instead of draining until empty.
    #[arg(long)]
    once: bool,
}

fn main() -> anyhow::Result<()> {
    intake_core::config::load_dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env();
    if let Some(dir) = cli.data_dir {
        config.storage.data_dir = dir;
    }
    if let Some(name) = cli.queue {
        config.import.queue_name = name;
    }
    config.log_summary();

    let data_dir = &config.storage.data_dir;
    let records = Arc::new(
        FileRecordStore::open(data_dir, &config.import.record_type)
            .context("failed to open record store")?,
    );
    let queue = Arc::new(
        FileQueue::open(data_dir, &config.import.queue_name, config.import.lease_secs)
            .context("failed to open work queue")?,
    );
    let worker = RecordCreationWorker::new(records, queue.clone(), config.import.system_owner.clone());

    let mut total = DrainReport::default();
    loop {
        let pass = worker.drain(cli.batch_size)?;
        total.merge(&pass);
        // Rejected and failed items come straight back; stop once a pass
        // makes no progress.
        if cli.once || pass.settled() == 0 {
            break;
        }
    }

    info!(
        queue = queue.name(),
        created = total.created,
        duplicates = total.duplicates,
        rejected = total.rejected,
        failed = total.failed,
        remaining = queue.len()?,
        "worker finished"
    );
    Ok(())
}
