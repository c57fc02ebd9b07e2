//! Medication write path: validate, persist, then reconcile.
//!
//! Every mutation goes through [`MedicationManager`] so the alarm set is
//! brought back in line after each change. Reconciliation either runs
//! inline or is queued on the reminder worker.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::NaiveDate;
use thiserror::Error;

use crate::config::MAX_TIMES_PER_MEDICATION;
use crate::db::DatabaseError;
use crate::models::{Frequency, Medication, MedicationInput};
use crate::reminders::{EventSender, ReminderEvent, ReminderService};
use crate::schedule::{format_time_of_day, parse_time_of_day, ScheduleError};
use crate::store::MedicationStore;

#[derive(Error, Debug)]
pub enum MedicationError {
    #[error("Medication name is required")]
    BlankName,

    #[error("At least one time is required for {0} medications")]
    MissingTimes(Frequency),

    #[error("{frequency} takes {expected} times per day, {actual} given")]
    TimesMismatch {
        frequency: Frequency,
        expected: usize,
        actual: usize,
    },

    #[error("{count} times given, at most {max} allowed")]
    TooManyTimes { count: usize, max: usize },

    #[error(transparent)]
    InvalidTime(#[from] ScheduleError),

    #[error("Time {0} is listed more than once")]
    DuplicateTime(String),

    #[error("End date {end} is before start date {start}")]
    EndBeforeStart { start: NaiveDate, end: NaiveDate },

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// How a persisted change reaches the reminder engine.
#[derive(Clone)]
pub enum ReconcileTrigger {
    /// Run the pass on the calling thread.
    Inline(Arc<ReminderService>),
    /// Hand the change to the background worker.
    Queued(EventSender),
}

pub struct MedicationManager {
    store: Arc<dyn MedicationStore>,
    trigger: ReconcileTrigger,
}

impl MedicationManager {
    pub fn new(store: Arc<dyn MedicationStore>, trigger: ReconcileTrigger) -> Self {
        Self { store, trigger }
    }

    pub fn create(&self, input: MedicationInput) -> Result<Medication, MedicationError> {
        let input = validate_input(input)?;
        let med = self.store.create(&input)?;
        tracing::info!(medication_id = med.id, frequency = %med.frequency, "Medication created");
        self.reconcile(med.id);
        Ok(med)
    }

    /// Replace a medication's fields. Unknown ids are `NotFound`.
    pub fn update(&self, med: Medication) -> Result<Medication, MedicationError> {
        let med = validate_input(MedicationInput::from(&med))?.into_medication(med.id);
        self.store.update(&med)?;
        tracing::info!(medication_id = med.id, frequency = %med.frequency, "Medication updated");
        self.reconcile(med.id);
        Ok(med)
    }

    pub fn delete(&self, id: i64) -> Result<(), MedicationError> {
        self.store.delete(id)?;
        tracing::info!(medication_id = id, "Medication deleted");
        self.reconcile(id);
        Ok(())
    }

    pub fn set_active(&self, id: i64, active: bool) -> Result<(), MedicationError> {
        self.store.set_active(id, active)?;
        tracing::info!(medication_id = id, active, "Medication toggled");
        self.reconcile(id);
        Ok(())
    }

    pub fn get(&self, id: i64) -> Result<Option<Medication>, MedicationError> {
        Ok(self.store.get(id)?)
    }

    pub fn list(&self) -> Result<Vec<Medication>, MedicationError> {
        Ok(self.store.list_all()?)
    }

    pub fn list_active(&self) -> Result<Vec<Medication>, MedicationError> {
        Ok(self.store.list_active()?)
    }

    /// The write already succeeded; a failed pass is retried by the next
    /// trigger, so it is logged rather than returned.
    fn reconcile(&self, medication_id: i64) {
        match &self.trigger {
            ReconcileTrigger::Inline(service) => {
                if let Err(e) = service.on_medication_changed(medication_id) {
                    tracing::warn!(medication_id, error = %e, "Reconciliation after change failed");
                }
            }
            ReconcileTrigger::Queued(sender) => {
                if let Err(e) = sender.submit(ReminderEvent::MedicationChanged { medication_id }) {
                    tracing::warn!(medication_id, error = %e, "Could not queue reconciliation");
                }
            }
        }
    }
}

/// Check an input and normalise it: trimmed name, times as `HH:MM`.
pub fn validate_input(mut input: MedicationInput) -> Result<MedicationInput, MedicationError> {
    input.name = input.name.trim().to_string();
    if input.name.is_empty() {
        return Err(MedicationError::BlankName);
    }

    if input.times.is_empty() && input.frequency.is_scheduled() {
        return Err(MedicationError::MissingTimes(input.frequency));
    }
    if input.times.len() > MAX_TIMES_PER_MEDICATION {
        return Err(MedicationError::TooManyTimes {
            count: input.times.len(),
            max: MAX_TIMES_PER_MEDICATION,
        });
    }
    if let Some(expected) = input.frequency.doses_per_day() {
        if input.times.len() != expected {
            return Err(MedicationError::TimesMismatch {
                frequency: input.frequency,
                expected,
                actual: input.times.len(),
            });
        }
    }

    let mut seen = HashSet::with_capacity(input.times.len());
    let mut times = Vec::with_capacity(input.times.len());
    for (slot_index, raw) in input.times.iter().enumerate() {
        let time = parse_time_of_day(raw).ok_or_else(|| ScheduleError::InvalidTime {
            slot_index,
            value: raw.clone(),
        })?;
        let formatted = format_time_of_day(time);
        if !seen.insert(time) {
            return Err(MedicationError::DuplicateTime(formatted));
        }
        times.push(formatted);
    }
    input.times = times;

    if let Some(end) = input.end_date {
        if end < input.start_date {
            return Err(MedicationError::EndBeforeStart {
                start: input.start_date,
                end,
            });
        }
    }

    Ok(input)
}
