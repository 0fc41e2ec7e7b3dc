//! Server startup: open every store under the data directory and assemble
//! the shared `AppState`.

use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use intake_core::{Config, FileRecordStore, RecordStore};
use intake_queue::FileQueue;

use crate::files::FileRegistry;
use crate::settings::SettingsStore;
use crate::state::AppState;

pub fn build_app_state(config: &Config) -> anyhow::Result<Arc<AppState>> {
    let data_dir = &config.storage.data_dir;
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("failed to create data dir {}", data_dir.display()))?;

    let records = FileRecordStore::open(data_dir, &config.import.record_type)
        .context("failed to open record store")?;
    build_app_state_with(config, Arc::new(records))
}

/// Assemble `AppState` around an already-open record store.
pub fn build_app_state_with(
    config: &Config,
    records: Arc<dyn RecordStore>,
) -> anyhow::Result<Arc<AppState>> {
    let data_dir = &config.storage.data_dir;
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("failed to create data dir {}", data_dir.display()))?;

    let queue = FileQueue::open(data_dir, &config.import.queue_name, config.import.lease_secs)
        .context("failed to open work queue")?;
    let files = FileRegistry::open(
        data_dir,
        &config.storage.public_dir,
        &config.storage.private_dir,
        &config.server.public_base_url,
    )
    .context("failed to open file registry")?;
    let settings = SettingsStore::open(
        data_dir,
        config.import.limit,
        config.site.text_field_2.clone(),
    )
    .context("failed to open settings store")?;

    let (limit, source) = settings
        .import_limit()
        .context("failed to read import settings")?;
    match limit {
        Some(limit) => info!(limit = limit.get(), source = ?source, "import limit configured"),
        None => tracing::warn!("import limit not configured; POST /process will refuse to run until PUT /settings/import or IMPORT_LIMIT sets one"),
    }

    Ok(Arc::new(AppState {
        config: config.clone(),
        records,
        queue: Arc::new(queue),
        files,
        settings,
    }))
}
