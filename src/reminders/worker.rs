//! Background reminder worker.
//!
//! A single thread consumes [`ReminderEvent`]s from a channel and applies
//! them to the [`ReminderService`] in issue order. Callers never block on a
//! pass. Notifications produced by delivered alarms go to a host-supplied
//! [`NotificationSink`].

use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;

use thiserror::Error;

use super::notification::Notification;
use super::service::ReminderService;
use crate::alarm::DeliveredAlarm;
use crate::config::DEFAULT_NOTIFICATION_CHANNEL;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReminderEvent {
    ColdStart,
    MedicationChanged { medication_id: i64 },
    RemindersToggled { enabled: bool },
    AlarmDelivered(DeliveredAlarm),
    Shutdown,
}

/// Where composed notifications go. Implemented for plain closures.
pub trait NotificationSink: Send + Sync {
    fn deliver(&self, notification: &Notification);
}

impl<F> NotificationSink for F
where
    F: Fn(&Notification) + Send + Sync,
{
    fn deliver(&self, notification: &Notification) {
        self(notification)
    }
}

/// Sink that only logs, tagged with the notification channel the host
/// would post to. Used by the headless daemon.
#[derive(Debug, Clone)]
pub struct LoggingSink {
    channel: String,
}

impl LoggingSink {
    pub fn new(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }
}

impl Default for LoggingSink {
    fn default() -> Self {
        Self::new(DEFAULT_NOTIFICATION_CHANNEL)
    }
}

impl NotificationSink for LoggingSink {
    fn deliver(&self, notification: &Notification) {
        tracing::info!(
            channel = %self.channel,
            title = %notification.title,
            body = %notification.body,
            medication_ids = ?notification.medication_ids,
            fired_at = %notification.fired_at,
            "Reminder notification"
        );
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkerError {
    #[error("Reminder worker has stopped")]
    Stopped,
}

enum Command {
    Event(ReminderEvent),
    Flush(mpsc::Sender<()>),
}

/// Cloneable submitter for code that should not own the worker.
#[derive(Clone)]
pub struct EventSender {
    tx: mpsc::Sender<Command>,
}

impl EventSender {
    pub fn submit(&self, event: ReminderEvent) -> Result<(), WorkerError> {
        self.tx
            .send(Command::Event(event))
            .map_err(|_| WorkerError::Stopped)
    }
}

/// Handle for the worker thread. Dropping it shuts the worker down and
/// joins the thread after queued events drain.
pub struct ReminderWorkerHandle {
    sender: EventSender,
    handle: Option<JoinHandle<()>>,
}

impl ReminderWorkerHandle {
    pub fn submit(&self, event: ReminderEvent) -> Result<(), WorkerError> {
        self.sender.submit(event)
    }

    pub fn submitter(&self) -> EventSender {
        self.sender.clone()
    }

    /// Block until every event submitted before this call has been applied.
    pub fn flush(&self) -> Result<(), WorkerError> {
        let (done_tx, done_rx) = mpsc::channel();
        self.sender
            .tx
            .send(Command::Flush(done_tx))
            .map_err(|_| WorkerError::Stopped)?;
        done_rx.recv().map_err(|_| WorkerError::Stopped)
    }

    /// Stop after draining queued events and wait for the thread.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let _ = self.sender.submit(ReminderEvent::Shutdown);
        if let Some(h) = self.handle.take() {
            if h.join().is_err() {
                tracing::error!("Reminder worker thread panicked");
            }
        }
    }
}

impl Drop for ReminderWorkerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

pub struct ReminderWorker;

impl ReminderWorker {
    /// Spawn the worker thread.
    pub fn start(
        service: Arc<ReminderService>,
        sink: Arc<dyn NotificationSink>,
    ) -> ReminderWorkerHandle {
        let (tx, rx) = mpsc::channel();
        let handle = std::thread::spawn(move || {
            tracing::info!("Reminder worker started");
            worker_loop(&service, sink.as_ref(), rx);
            tracing::info!("Reminder worker stopped");
        });
        ReminderWorkerHandle {
            sender: EventSender { tx },
            handle: Some(handle),
        }
    }
}

fn worker_loop(
    service: &ReminderService,
    sink: &dyn NotificationSink,
    rx: mpsc::Receiver<Command>,
) {
    for command in rx {
        match command {
            Command::Flush(done) => {
                let _ = done.send(());
            }
            Command::Event(ReminderEvent::Shutdown) => break,
            Command::Event(event) => handle_event(service, sink, event),
        }
    }
}

fn handle_event(service: &ReminderService, sink: &dyn NotificationSink, event: ReminderEvent) {
    let result = match event {
        ReminderEvent::ColdStart => service.on_cold_start().map(|_| ()),
        ReminderEvent::MedicationChanged { medication_id } => {
            service.on_medication_changed(medication_id).map(|_| ())
        }
        ReminderEvent::RemindersToggled { enabled } => {
            service.set_reminders_enabled(enabled).map(|_| ())
        }
        ReminderEvent::AlarmDelivered(delivered) => {
            let outcome = service.on_alarm_delivered(delivered);
            if let Ok(Some(notification)) = &outcome.notification {
                sink.deliver(notification);
            }
            outcome.notification.and(outcome.reconciled).map(|_| ())
        }
        ReminderEvent::Shutdown => Ok(()),
    };

    if let Err(e) = result {
        tracing::warn!(error = %e, "Reminder event failed; next trigger retries");
    }
}
