//! Schedule expansion: frequency + times-of-day → concrete trigger instants.
//!
//! Pure functions only. Every instant is a local wall-clock
//! `NaiveDateTime`; the host converts to OS time when arming.

mod expander;
mod time_of_day;

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use thiserror::Error;

use crate::models::{Frequency, Medication};

pub use expander::{next_occurrences, next_per_slot};
pub use time_of_day::{format_time_of_day, parse_time_of_day};

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ScheduleError {
    #[error("Invalid time-of-day {value:?} at slot {slot_index}")]
    InvalidTime { slot_index: usize, value: String },
}

/// Borrowed view of the schedule-relevant fields of a medication.
#[derive(Debug, Clone, Copy)]
pub struct Schedule<'a> {
    pub frequency: Frequency,
    pub times: &'a [String],
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
}

impl<'a> Schedule<'a> {
    pub fn of(med: &'a Medication) -> Self {
        Self {
            frequency: med.frequency,
            times: &med.times,
            start_date: med.start_date,
            end_date: med.end_date,
        }
    }
}

/// One concrete trigger for a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Occurrence {
    pub slot_index: usize,
    pub at: NaiveDateTime,
}

/// Expansion result. Malformed times are skipped and listed in `errors`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Expansion {
    pub occurrences: Vec<Occurrence>,
    pub errors: Vec<ScheduleError>,
}

impl Expansion {
    pub fn instants(&self) -> Vec<NaiveDateTime> {
        self.occurrences.iter().map(|o| o.at).collect()
    }
}
