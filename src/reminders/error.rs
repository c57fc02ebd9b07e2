use thiserror::Error;

use crate::db::DatabaseError;

#[derive(Error, Debug)]
pub enum ReconciliationError {
    /// Medications, ledger or preferences could not be read. The pass did
    /// not touch the alarm port; the next trigger retries.
    #[error("Reminder store unavailable: {0}")]
    StoreUnavailable(#[from] DatabaseError),
}
