use std::sync::Arc;

use intake_core::{Config, RecordStore};
use intake_ingest::{IngestionPipeline, RecordCreationWorker, RowParser};
use intake_queue::WorkQueue;

use crate::files::FileRegistry;
use crate::settings::SettingsStore;

pub struct AppState {
    pub config: Config,
    pub records: Arc<dyn RecordStore>,
    pub queue: Arc<dyn WorkQueue>,
    pub files: FileRegistry,
    pub settings: SettingsStore,
}

impl AppState {
    pub fn pipeline(&self) -> IngestionPipeline {
        IngestionPipeline::new(self.records.clone(), self.queue.clone())
            .with_parser(RowParser::new().with_delimiter(self.config.import.delimiter))
    }

    pub fn worker(&self) -> RecordCreationWorker {
        RecordCreationWorker::new(
            self.records.clone(),
            self.queue.clone(),
            self.config.import.system_owner.clone(),
        )
    }
}
