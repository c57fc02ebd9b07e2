//! Application root: owns the store, reminder service, worker and
//! medication manager. Hosts build one `App` and drop it on exit.

use std::sync::Arc;

use thiserror::Error;

use crate::alarm::AlarmPort;
use crate::clock::Clock;
use crate::config::{ConfigError, ReminderSettings};
use crate::db::DatabaseError;
use crate::medications::{MedicationManager, ReconcileTrigger};
use crate::reminders::{
    EventSender, NotificationSink, ReminderEvent, ReminderService, ReminderWorker,
    ReminderWorkerHandle, WorkerError,
};
use crate::store::SqliteStore;

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to open database: {0}")]
    Database(#[from] DatabaseError),

    #[error("Failed to start async runtime: {0}")]
    Runtime(#[source] std::io::Error),

    #[error(transparent)]
    Worker(#[from] WorkerError),
}

pub struct App {
    store: Arc<SqliteStore>,
    service: Arc<ReminderService>,
    medications: MedicationManager,
    worker: ReminderWorkerHandle,
}

impl App {
    /// Open the database named by `settings` and start the reminder worker.
    pub fn build(
        settings: &ReminderSettings,
        port: Arc<dyn AlarmPort>,
        clock: Arc<dyn Clock>,
        sink: Arc<dyn NotificationSink>,
    ) -> Result<Self, AppError> {
        let db_path = settings.database_path();
        let store = Arc::new(SqliteStore::open(&db_path)?);
        tracing::info!(path = %db_path.display(), "Database opened");
        Ok(Self::with_store(store, port, clock, sink))
    }

    pub fn with_store(
        store: Arc<SqliteStore>,
        port: Arc<dyn AlarmPort>,
        clock: Arc<dyn Clock>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        let service = Arc::new(ReminderService::with_sqlite(store.clone(), port, clock));
        let worker = ReminderWorker::start(service.clone(), sink);
        let medications = MedicationManager::new(
            store.clone(),
            ReconcileTrigger::Queued(worker.submitter()),
        );
        Self {
            store,
            service,
            medications,
            worker,
        }
    }

    pub fn medications(&self) -> &MedicationManager {
        &self.medications
    }

    pub fn service(&self) -> &Arc<ReminderService> {
        &self.service
    }

    pub fn store(&self) -> &Arc<SqliteStore> {
        &self.store
    }

    pub fn submit(&self, event: ReminderEvent) -> Result<(), AppError> {
        Ok(self.worker.submit(event)?)
    }

    pub fn events(&self) -> EventSender {
        self.worker.submitter()
    }

    /// Wait until queued events have been applied.
    pub fn flush(&self) -> Result<(), AppError> {
        Ok(self.worker.flush()?)
    }

    /// Drain the worker and stop it.
    pub fn shutdown(self) {
        tracing::info!("Shutting down");
        self.worker.shutdown();
    }
}
