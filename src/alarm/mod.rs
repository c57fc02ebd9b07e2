//! Alarm identity and the port to the OS one-shot notification scheduler.
//!
//! The engine never talks to an OS API directly. Each host supplies an
//! [`AlarmPort`] implementation; two ship with the crate:
//! - [`InMemoryAlarmPort`]: records pending alarms (tests, headless hosts)
//! - [`TokioAlarmPort`]: in-process timers for the desktop daemon

pub mod memory;
pub mod tokio_port;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::SLOT_ID_STRIDE;

pub use memory::{InMemoryAlarmPort, PortCall};
pub use tokio_port::TokioAlarmPort;

// ═══════════════════════════════════════════
// Trigger identity
// ═══════════════════════════════════════════

/// Stable OS alarm handle for one `(medication_id, slot_index)` pair.
///
/// `raw = medication_id * SLOT_ID_STRIDE + slot_index`. The same slot always
/// maps to the same id, so re-arming replaces rather than duplicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlarmId(i64);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AlarmIdError {
    #[error("Slot index {slot_index} exceeds stride {stride}")]
    SlotOutOfRange { slot_index: usize, stride: i64 },

    #[error("Negative medication id {0}")]
    NegativeMedicationId(i64),

    #[error("Alarm id overflows for medication {0}")]
    Overflow(i64),

    #[error("Negative alarm id {0}")]
    NegativeRaw(i64),
}

impl AlarmId {
    pub fn for_slot(medication_id: i64, slot_index: usize) -> Result<Self, AlarmIdError> {
        if medication_id < 0 {
            return Err(AlarmIdError::NegativeMedicationId(medication_id));
        }
        let slot = i64::try_from(slot_index)
            .ok()
            .filter(|s| *s < SLOT_ID_STRIDE)
            .ok_or(AlarmIdError::SlotOutOfRange {
                slot_index,
                stride: SLOT_ID_STRIDE,
            })?;
        medication_id
            .checked_mul(SLOT_ID_STRIDE)
            .and_then(|base| base.checked_add(slot))
            .map(Self)
            .ok_or(AlarmIdError::Overflow(medication_id))
    }

    /// Rebuild an id reported back by the OS layer.
    pub fn from_raw(raw: i64) -> Result<Self, AlarmIdError> {
        if raw < 0 {
            return Err(AlarmIdError::NegativeRaw(raw));
        }
        Ok(Self(raw))
    }

    pub fn get(self) -> i64 {
        self.0
    }

    pub fn medication_id(self) -> i64 {
        self.0 / SLOT_ID_STRIDE
    }

    pub fn slot_index(self) -> usize {
        (self.0 % SLOT_ID_STRIDE) as usize
    }
}

impl std::fmt::Display for AlarmId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ═══════════════════════════════════════════
// Port
// ═══════════════════════════════════════════

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AlarmPortError {
    #[error("Scheduler rejected alarm {alarm_id}: {reason}")]
    Rejected { alarm_id: AlarmId, reason: String },

    #[error("Alarm scheduler unavailable: {0}")]
    Unavailable(String),
}

/// Narrow interface to an OS one-shot notification scheduler.
///
/// Both calls are fire-and-forget: success means the request was accepted,
/// not that anything was delivered. Delivery comes back later as a
/// [`DeliveredAlarm`] through whatever channel the host wires up.
pub trait AlarmPort: Send + Sync {
    /// Request a notification at `at` (local wall-clock), replacing any
    /// pending alarm with the same id.
    fn arm(&self, id: AlarmId, title: &str, body: &str, at: NaiveDateTime)
        -> Result<(), AlarmPortError>;

    /// Cancel a pending alarm. Absent ids are a no-op.
    fn disarm(&self, id: AlarmId) -> Result<(), AlarmPortError>;
}

/// An alarm the OS reports as fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveredAlarm {
    pub alarm_id: AlarmId,
    pub fired_at: NaiveDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_composes_medication_and_slot() {
        let id = AlarmId::for_slot(42, 3).unwrap();
        assert_eq!(id.get(), 4203);
        assert_eq!(id.medication_id(), 42);
        assert_eq!(id.slot_index(), 3);
    }

    #[test]
    fn ids_never_collide_across_medications() {
        let last_slot_of_first = AlarmId::for_slot(1, (SLOT_ID_STRIDE - 1) as usize).unwrap();
        let first_slot_of_second = AlarmId::for_slot(2, 0).unwrap();
        assert!(last_slot_of_first < first_slot_of_second);
    }

    #[test]
    fn id_is_stable() {
        assert_eq!(AlarmId::for_slot(7, 1), AlarmId::for_slot(7, 1));
    }

    #[test]
    fn slot_at_stride_rejected() {
        assert_eq!(
            AlarmId::for_slot(1, SLOT_ID_STRIDE as usize),
            Err(AlarmIdError::SlotOutOfRange {
                slot_index: SLOT_ID_STRIDE as usize,
                stride: SLOT_ID_STRIDE,
            })
        );
    }

    #[test]
    fn negative_and_overflowing_ids_rejected() {
        assert_eq!(
            AlarmId::for_slot(-1, 0),
            Err(AlarmIdError::NegativeMedicationId(-1))
        );
        assert_eq!(
            AlarmId::for_slot(i64::MAX, 0),
            Err(AlarmIdError::Overflow(i64::MAX))
        );
        assert_eq!(AlarmId::from_raw(-5), Err(AlarmIdError::NegativeRaw(-5)));
    }

    #[test]
    fn raw_round_trip_decomposes() {
        let id = AlarmId::from_raw(1501).unwrap();
        assert_eq!(id.medication_id(), 15);
        assert_eq!(id.slot_index(), 1);
    }

    #[test]
    fn trait_is_object_safe() {
        fn _assert_port(_: &dyn AlarmPort) {}
    }
}
