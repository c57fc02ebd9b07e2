//! In-process alarm port for the desktop daemon.
//!
//! Each armed alarm is a tokio task sleeping until its instant. Fired alarms
//! are reported on an unbounded channel, which the host forwards to the
//! reminder worker. Nothing survives process exit; the cold-start
//! reconciliation re-arms everything.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::NaiveDateTime;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::{AlarmId, AlarmPort, AlarmPortError, DeliveredAlarm};
use crate::clock::Clock;

struct ArmedTask {
    generation: u64,
    at: NaiveDateTime,
    task: JoinHandle<()>,
}

#[derive(Default)]
struct TaskTable {
    next_generation: u64,
    tasks: HashMap<AlarmId, ArmedTask>,
}

pub struct TokioAlarmPort {
    runtime: Handle,
    clock: Arc<dyn Clock>,
    table: Arc<Mutex<TaskTable>>,
    delivered_tx: mpsc::UnboundedSender<DeliveredAlarm>,
}

impl TokioAlarmPort {
    /// Create a port spawning timers on `runtime`. The receiver yields every
    /// alarm that fires.
    pub fn new(
        runtime: Handle,
        clock: Arc<dyn Clock>,
    ) -> (Self, mpsc::UnboundedReceiver<DeliveredAlarm>) {
        let (delivered_tx, delivered_rx) = mpsc::unbounded_channel();
        let port = Self {
            runtime,
            clock,
            table: Arc::new(Mutex::new(TaskTable::default())),
            delivered_tx,
        };
        (port, delivered_rx)
    }

    /// Number of timers still waiting to fire.
    pub fn pending_count(&self) -> usize {
        self.table.lock().map(|t| t.tasks.len()).unwrap_or(0)
    }

    /// Instant a pending alarm is set for.
    pub fn pending_at(&self, id: AlarmId) -> Option<NaiveDateTime> {
        self.table.lock().ok()?.tasks.get(&id).map(|t| t.at)
    }

    fn lock_table(&self) -> Result<std::sync::MutexGuard<'_, TaskTable>, AlarmPortError> {
        self.table
            .lock()
            .map_err(|_| AlarmPortError::Unavailable("timer table lock poisoned".into()))
    }
}

impl AlarmPort for TokioAlarmPort {
    fn arm(
        &self,
        id: AlarmId,
        title: &str,
        _body: &str,
        at: NaiveDateTime,
    ) -> Result<(), AlarmPortError> {
        if self.delivered_tx.is_closed() {
            return Err(AlarmPortError::Unavailable("delivery channel closed".into()));
        }

        let delay = (at - self.clock.now()).to_std().unwrap_or_default();
        let mut table = self.lock_table()?;
        table.next_generation += 1;
        let generation = table.next_generation;

        let tx = self.delivered_tx.clone();
        let shared = Arc::clone(&self.table);
        let task = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if let Ok(mut table) = shared.lock() {
                if table.tasks.get(&id).map(|t| t.generation) == Some(generation) {
                    table.tasks.remove(&id);
                }
            }
            if tx.send(DeliveredAlarm { alarm_id: id, fired_at: at }).is_err() {
                tracing::warn!(alarm_id = %id, "Alarm fired but delivery channel is closed");
            }
        });

        if let Some(previous) = table.tasks.insert(id, ArmedTask { generation, at, task }) {
            previous.task.abort();
        }
        tracing::debug!(alarm_id = %id, %at, title, "Timer armed");
        Ok(())
    }

    fn disarm(&self, id: AlarmId) -> Result<(), AlarmPortError> {
        let mut table = self.lock_table()?;
        if let Some(armed) = table.tasks.remove(&id) {
            armed.task.abort();
            tracing::debug!(alarm_id = %id, "Timer disarmed");
        }
        Ok(())
    }
}

impl Drop for TokioAlarmPort {
    fn drop(&mut self) {
        if let Ok(mut table) = self.table.lock() {
            for (_, armed) in table.tasks.drain() {
                armed.task.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use std::time::Duration;

    fn port() -> (TokioAlarmPort, mpsc::UnboundedReceiver<DeliveredAlarm>) {
        TokioAlarmPort::new(Handle::current(), Arc::new(SystemClock))
    }

    fn id(med: i64, slot: usize) -> AlarmId {
        AlarmId::for_slot(med, slot).unwrap()
    }

    fn in_millis(ms: i64) -> NaiveDateTime {
        SystemClock.now() + chrono::Duration::milliseconds(ms)
    }

    #[tokio::test]
    async fn armed_alarm_is_delivered() {
        let (port, mut rx) = port();
        let at = in_millis(30);
        port.arm(id(1, 0), "Take", "now", at).unwrap();
        assert_eq!(port.pending_count(), 1);

        let delivered = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(delivered.alarm_id, id(1, 0));
        assert_eq!(delivered.fired_at, at);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(port.pending_count(), 0);
    }

    #[tokio::test]
    async fn disarmed_alarm_never_fires() {
        let (port, mut rx) = port();
        port.arm(id(1, 0), "Take", "now", in_millis(50)).unwrap();
        port.disarm(id(1, 0)).unwrap();
        assert_eq!(port.pending_count(), 0);

        let result = tokio::time::timeout(Duration::from_millis(200), rx.recv()).await;
        assert!(result.is_err(), "disarmed alarm must not deliver");
    }

    #[tokio::test]
    async fn rearm_replaces_previous_timer() {
        let (port, mut rx) = port();
        port.arm(id(2, 1), "Take", "now", in_millis(40)).unwrap();
        let later = in_millis(120);
        port.arm(id(2, 1), "Take", "later", later).unwrap();
        assert_eq!(port.pending_count(), 1);
        assert_eq!(port.pending_at(id(2, 1)), Some(later));

        let first = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.fired_at, later);

        let second = tokio::time::timeout(Duration::from_millis(200), rx.recv()).await;
        assert!(second.is_err(), "replaced timer must not deliver");
    }

    #[tokio::test]
    async fn past_instant_fires_immediately() {
        let (port, mut rx) = port();
        port.arm(id(3, 0), "Take", "now", in_millis(-5_000)).unwrap();
        let delivered = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(delivered.alarm_id, id(3, 0));
    }

    #[tokio::test]
    async fn disarm_absent_is_noop() {
        let (port, _rx) = port();
        assert!(port.disarm(id(4, 0)).is_ok());
    }

    #[tokio::test]
    async fn closed_channel_makes_port_unavailable() {
        let (port, rx) = port();
        drop(rx);
        assert!(matches!(
            port.arm(id(5, 0), "Take", "now", in_millis(10)),
            Err(AlarmPortError::Unavailable(_))
        ));
    }
}
