use chrono::NaiveDateTime;
use serde::Serialize;
use uuid::Uuid;

use super::error::ReconciliationError;
use super::notification::Notification;
use crate::alarm::{AlarmId, AlarmIdError, AlarmPortError};
use crate::models::ArmedAlarm;
use crate::schedule::ScheduleError;

/// A slot the pass wants armed at a specific instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReminderSlot {
    pub medication_id: i64,
    pub slot_index: usize,
    pub alarm_id: AlarmId,
    pub trigger_at: NaiveDateTime,
    pub title: String,
    pub body: String,
}

impl ReminderSlot {
    pub fn to_armed(&self) -> ArmedAlarm {
        ArmedAlarm {
            alarm_id: self.alarm_id,
            medication_id: self.medication_id,
            slot_index: self.slot_index,
            trigger_at: self.trigger_at,
            title: self.title.clone(),
            body: self.body.clone(),
        }
    }
}

/// One alarm-port call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum AlarmOp {
    Arm(ReminderSlot),
    Disarm { alarm_id: AlarmId },
}

impl AlarmOp {
    pub fn alarm_id(&self) -> AlarmId {
        match self {
            Self::Arm(slot) => slot.alarm_id,
            Self::Disarm { alarm_id } => *alarm_id,
        }
    }
}

/// Something the planner had to skip. Never fatal to the pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanIssue {
    InvalidTime {
        medication_id: i64,
        error: ScheduleError,
    },
    Unaddressable {
        medication_id: i64,
        slot_index: usize,
        error: AlarmIdError,
    },
}

/// Port calls for one pass, in ascending alarm-id order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcilePlan {
    pub ops: Vec<AlarmOp>,
    pub issues: Vec<PlanIssue>,
}

impl ReconcilePlan {
    pub fn arms(&self) -> impl Iterator<Item = &ReminderSlot> {
        self.ops.iter().filter_map(|op| match op {
            AlarmOp::Arm(slot) => Some(slot),
            AlarmOp::Disarm { .. } => None,
        })
    }
}

/// A port call that failed during a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortFailure {
    pub op: AlarmOp,
    pub error: AlarmPortError,
}

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone)]
pub struct ReconcileReport {
    pub pass_id: Uuid,
    pub as_of: NaiveDateTime,
    pub reminders_enabled: bool,
    /// Slots successfully armed, ascending by alarm id.
    pub armed: Vec<ReminderSlot>,
    pub disarmed: usize,
    pub failures: Vec<PortFailure>,
    pub issues: Vec<PlanIssue>,
    pub ledger_errors: usize,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.issues.is_empty() && self.ledger_errors == 0
    }
}

/// Result of handling a delivered alarm.
#[derive(Debug)]
pub struct DeliveryOutcome {
    /// `Ok(None)` when nothing active is due at the fired instant; `Err`
    /// when the ledger or store could not be read.
    pub notification: Result<Option<Notification>, ReconciliationError>,
    /// The follow-up pass that arms the next occurrences.
    pub reconciled: Result<ReconcileReport, ReconciliationError>,
}
