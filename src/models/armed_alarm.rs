use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::alarm::AlarmId;

/// Ledger row for an alarm handed to the OS scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArmedAlarm {
    pub alarm_id: AlarmId,
    pub medication_id: i64,
    pub slot_index: usize,
    /// Minute precision; seconds are dropped on write.
    pub trigger_at: NaiveDateTime,
    pub title: String,
    pub body: String,
}
