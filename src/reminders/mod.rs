//! The reminder engine.
//!
//! - `planner`: pure computation of a pass's port calls
//! - `service`: serialized passes, resolution, event handlers
//! - `worker`: background thread applying events in order
//! - `notification`: display text

pub mod error;
pub mod notification;
pub mod planner;
pub mod service;
pub mod types;
pub mod worker;

pub use error::ReconciliationError;
pub use notification::{compose_notification, slot_text, Notification};
pub use planner::plan_pass;
pub use service::{ActivePass, ReminderService};
pub use types::*;
pub use worker::{
    EventSender, LoggingSink, NotificationSink, ReminderEvent, ReminderWorker,
    ReminderWorkerHandle, WorkerError,
};
