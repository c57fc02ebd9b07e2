//! Recording alarm port for tests and headless hosts.

use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

use chrono::NaiveDateTime;

use super::{AlarmId, AlarmPort, AlarmPortError, DeliveredAlarm};

/// One call observed by [`InMemoryAlarmPort`], in issue order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortCall {
    Arm {
        id: AlarmId,
        title: String,
        body: String,
        at: NaiveDateTime,
    },
    Disarm {
        id: AlarmId,
    },
}

/// A notification waiting to be delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAlarm {
    pub title: String,
    pub body: String,
    pub at: NaiveDateTime,
}

#[derive(Default)]
struct MemoryState {
    pending: BTreeMap<AlarmId, PendingAlarm>,
    calls: Vec<PortCall>,
    failing: HashSet<AlarmId>,
}

/// Alarm port that keeps pending alarms in a map and logs every call.
#[derive(Default)]
pub struct InMemoryAlarmPort {
    state: Mutex<MemoryState>,
}

impl InMemoryAlarmPort {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of pending alarms, keyed by id.
    pub fn pending(&self) -> BTreeMap<AlarmId, PendingAlarm> {
        self.state
            .lock()
            .map(|s| s.pending.clone())
            .unwrap_or_default()
    }

    pub fn is_armed(&self, id: AlarmId) -> bool {
        self.state
            .lock()
            .map(|s| s.pending.contains_key(&id))
            .unwrap_or(false)
    }

    /// Every call since construction or the last `take_calls`.
    pub fn calls(&self) -> Vec<PortCall> {
        self.state
            .lock()
            .map(|s| s.calls.clone())
            .unwrap_or_default()
    }

    /// Drain the call log.
    pub fn take_calls(&self) -> Vec<PortCall> {
        self.state
            .lock()
            .map(|mut s| std::mem::take(&mut s.calls))
            .unwrap_or_default()
    }

    /// Make every later `arm`/`disarm` for `id` fail.
    pub fn fail_on(&self, id: AlarmId) {
        if let Ok(mut s) = self.state.lock() {
            s.failing.insert(id);
        }
    }

    pub fn clear_failures(&self) {
        if let Ok(mut s) = self.state.lock() {
            s.failing.clear();
        }
    }

    /// Deliver every pending alarm due at or before `now`, the way the OS
    /// would. Delivered alarms leave the pending set.
    pub fn fire_due(&self, now: NaiveDateTime) -> Vec<DeliveredAlarm> {
        let Ok(mut s) = self.state.lock() else {
            return Vec::new();
        };
        let due: Vec<(AlarmId, NaiveDateTime)> = s
            .pending
            .iter()
            .filter(|(_, alarm)| alarm.at <= now)
            .map(|(id, alarm)| (*id, alarm.at))
            .collect();
        for (id, _) in &due {
            s.pending.remove(id);
        }
        due.into_iter()
            .map(|(alarm_id, fired_at)| DeliveredAlarm { alarm_id, fired_at })
            .collect()
    }
}

impl AlarmPort for InMemoryAlarmPort {
    fn arm(
        &self,
        id: AlarmId,
        title: &str,
        body: &str,
        at: NaiveDateTime,
    ) -> Result<(), AlarmPortError> {
        let mut s = self
            .state
            .lock()
            .map_err(|_| AlarmPortError::Unavailable("alarm state lock poisoned".into()))?;
        s.calls.push(PortCall::Arm {
            id,
            title: title.to_string(),
            body: body.to_string(),
            at,
        });
        if s.failing.contains(&id) {
            return Err(AlarmPortError::Rejected {
                alarm_id: id,
                reason: "injected failure".into(),
            });
        }
        s.pending.insert(
            id,
            PendingAlarm {
                title: title.to_string(),
                body: body.to_string(),
                at,
            },
        );
        Ok(())
    }

    fn disarm(&self, id: AlarmId) -> Result<(), AlarmPortError> {
        let mut s = self
            .state
            .lock()
            .map_err(|_| AlarmPortError::Unavailable("alarm state lock poisoned".into()))?;
        s.calls.push(PortCall::Disarm { id });
        if s.failing.contains(&id) {
            return Err(AlarmPortError::Rejected {
                alarm_id: id,
                reason: "injected failure".into(),
            });
        }
        s.pending.remove(&id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 2)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn id(med: i64, slot: usize) -> AlarmId {
        AlarmId::for_slot(med, slot).unwrap()
    }

    #[test]
    fn arm_then_disarm_leaves_nothing() {
        let port = InMemoryAlarmPort::new();
        port.arm(id(1, 0), "t", "b", at(8, 0)).unwrap();
        assert!(port.is_armed(id(1, 0)));

        port.disarm(id(1, 0)).unwrap();
        assert!(!port.is_armed(id(1, 0)));
        assert!(port.pending().is_empty());
    }

    #[test]
    fn rearm_replaces_same_id() {
        let port = InMemoryAlarmPort::new();
        port.arm(id(1, 0), "t", "b", at(8, 0)).unwrap();
        port.arm(id(1, 0), "t2", "b2", at(9, 0)).unwrap();

        let pending = port.pending();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[&id(1, 0)].at, at(9, 0));
        assert_eq!(pending[&id(1, 0)].title, "t2");
    }

    #[test]
    fn disarm_absent_is_noop() {
        let port = InMemoryAlarmPort::new();
        assert!(port.disarm(id(9, 2)).is_ok());
        assert_eq!(port.calls(), vec![PortCall::Disarm { id: id(9, 2) }]);
    }

    #[test]
    fn injected_failure_is_reported_and_not_armed() {
        let port = InMemoryAlarmPort::new();
        port.fail_on(id(2, 0));
        assert!(port.arm(id(2, 0), "t", "b", at(8, 0)).is_err());
        assert!(!port.is_armed(id(2, 0)));

        port.clear_failures();
        assert!(port.arm(id(2, 0), "t", "b", at(8, 0)).is_ok());
    }

    #[test]
    fn fire_due_delivers_only_past_alarms() {
        let port = InMemoryAlarmPort::new();
        port.arm(id(1, 0), "t", "b", at(8, 0)).unwrap();
        port.arm(id(1, 1), "t", "b", at(20, 0)).unwrap();

        let fired = port.fire_due(at(12, 0));
        assert_eq!(
            fired,
            vec![DeliveredAlarm {
                alarm_id: id(1, 0),
                fired_at: at(8, 0)
            }]
        );
        assert!(!port.is_armed(id(1, 0)));
        assert!(port.is_armed(id(1, 1)));
    }

    #[test]
    fn take_calls_drains_log() {
        let port = InMemoryAlarmPort::new();
        port.disarm(id(1, 0)).unwrap();
        assert_eq!(port.take_calls().len(), 1);
        assert!(port.calls().is_empty());
    }
}
