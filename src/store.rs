//! Store ports consumed by the reminder engine, plus the SQLite adapter.
//!
//! Three traits define the boundaries:
//! - MedicationStore: durable medication CRUD (ground truth)
//! - ArmedAlarmLedger: what has been handed to the OS scheduler
//! - PreferenceStore: the global reminders switch
//!
//! `SqliteStore` implements all three over one connection.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::NaiveDateTime;
use rusqlite::Connection;

use crate::alarm::AlarmId;
use crate::db::{self, DatabaseError};
use crate::models::{ArmedAlarm, Medication, MedicationInput};

pub trait MedicationStore: Send + Sync {
    fn list_active(&self) -> Result<Vec<Medication>, DatabaseError>;

    /// Active and inactive medications, ordered by id.
    fn list_all(&self) -> Result<Vec<Medication>, DatabaseError>;

    fn get(&self, id: i64) -> Result<Option<Medication>, DatabaseError>;

    fn by_ids(&self, ids: &[i64]) -> Result<Vec<Medication>, DatabaseError>;

    /// Persist a new medication and return it with its assigned id.
    fn create(&self, input: &MedicationInput) -> Result<Medication, DatabaseError>;

    fn update(&self, med: &Medication) -> Result<(), DatabaseError>;

    fn delete(&self, id: i64) -> Result<(), DatabaseError>;

    fn set_active(&self, id: i64, active: bool) -> Result<(), DatabaseError>;
}

pub trait ArmedAlarmLedger: Send + Sync {
    /// Every recorded alarm, ordered by id.
    fn armed(&self) -> Result<Vec<ArmedAlarm>, DatabaseError>;

    /// Recorded alarms whose trigger falls in the same minute as `at`.
    fn armed_at(&self, at: NaiveDateTime) -> Result<Vec<ArmedAlarm>, DatabaseError>;

    fn record(&self, alarm: &ArmedAlarm) -> Result<(), DatabaseError>;

    fn remove(&self, alarm_id: AlarmId) -> Result<(), DatabaseError>;
}

pub trait PreferenceStore: Send + Sync {
    /// Global reminders switch; defaults to on.
    fn reminders_enabled(&self) -> Result<bool, DatabaseError>;

    fn set_reminders_enabled(&self, enabled: bool) -> Result<(), DatabaseError>;
}

/// SQLite-backed store. One connection, serialized behind a mutex.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (and migrate) the database at `path`.
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        Ok(Self::from_connection(db::open_database(path)?))
    }

    /// Fresh in-memory database (for testing).
    pub fn in_memory() -> Result<Self, DatabaseError> {
        Ok(Self::from_connection(db::open_memory_database()?))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, DatabaseError> {
        self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)
    }
}

impl MedicationStore for SqliteStore {
    fn list_active(&self) -> Result<Vec<Medication>, DatabaseError> {
        db::get_active_medications(&*self.conn()?)
    }

    fn list_all(&self) -> Result<Vec<Medication>, DatabaseError> {
        db::get_all_medications(&*self.conn()?)
    }

    fn get(&self, id: i64) -> Result<Option<Medication>, DatabaseError> {
        db::get_medication(&*self.conn()?, id)
    }

    fn by_ids(&self, ids: &[i64]) -> Result<Vec<Medication>, DatabaseError> {
        db::get_medications_by_ids(&*self.conn()?, ids)
    }

    fn create(&self, input: &MedicationInput) -> Result<Medication, DatabaseError> {
        let id = db::insert_medication(&*self.conn()?, input)?;
        Ok(input.clone().into_medication(id))
    }

    fn update(&self, med: &Medication) -> Result<(), DatabaseError> {
        db::update_medication(&*self.conn()?, med)
    }

    fn delete(&self, id: i64) -> Result<(), DatabaseError> {
        db::delete_medication(&*self.conn()?, id)
    }

    fn set_active(&self, id: i64, active: bool) -> Result<(), DatabaseError> {
        db::set_medication_active(&*self.conn()?, id, active)
    }
}

impl ArmedAlarmLedger for SqliteStore {
    fn armed(&self) -> Result<Vec<ArmedAlarm>, DatabaseError> {
        db::get_armed_alarms(&*self.conn()?)
    }

    fn armed_at(&self, at: NaiveDateTime) -> Result<Vec<ArmedAlarm>, DatabaseError> {
        db::get_armed_alarms_at(&*self.conn()?, at)
    }

    fn record(&self, alarm: &ArmedAlarm) -> Result<(), DatabaseError> {
        db::upsert_armed_alarm(&*self.conn()?, alarm)
    }

    fn remove(&self, alarm_id: AlarmId) -> Result<(), DatabaseError> {
        db::delete_armed_alarm(&*self.conn()?, alarm_id)
    }
}

impl PreferenceStore for SqliteStore {
    fn reminders_enabled(&self) -> Result<bool, DatabaseError> {
        db::get_bool_preference(&*self.conn()?, db::PREF_REMINDERS_ENABLED, true)
    }

    fn set_reminders_enabled(&self, enabled: bool) -> Result<(), DatabaseError> {
        db::set_bool_preference(&*self.conn()?, db::PREF_REMINDERS_ENABLED, enabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Frequency;
    use chrono::NaiveDate;

    fn input(name: &str) -> MedicationInput {
        MedicationInput {
            name: name.into(),
            dosage: "5 mg".into(),
            med_type: "tablet".into(),
            notes: None,
            frequency: Frequency::OnceDaily,
            times: vec!["08:00".into()],
            start_date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            end_date: None,
            is_active: true,
        }
    }

    #[test]
    fn traits_are_object_safe() {
        fn _assert_meds(_: &dyn MedicationStore) {}
        fn _assert_ledger(_: &dyn ArmedAlarmLedger) {}
        fn _assert_prefs(_: &dyn PreferenceStore) {}
    }

    #[test]
    fn create_returns_persisted_medication() {
        let store = SqliteStore::in_memory().unwrap();
        let created = store.create(&input("Metformin")).unwrap();
        assert_eq!(store.get(created.id).unwrap(), Some(created));
    }

    #[test]
    fn toggle_moves_between_active_and_all() {
        let store = SqliteStore::in_memory().unwrap();
        let med = store.create(&input("Metformin")).unwrap();
        store.set_active(med.id, false).unwrap();
        assert!(store.list_active().unwrap().is_empty());
        assert_eq!(store.list_all().unwrap().len(), 1);
    }

    #[test]
    fn reminders_enabled_by_default() {
        let store = SqliteStore::in_memory().unwrap();
        assert!(store.reminders_enabled().unwrap());
        store.set_reminders_enabled(false).unwrap();
        assert!(!store.reminders_enabled().unwrap());
    }

    #[test]
    fn on_disk_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.db");
        let id = {
            let store = SqliteStore::open(&path).unwrap();
            store.create(&input("Atorvastatin")).unwrap().id
        };
        let reopened = SqliteStore::open(&path).unwrap();
        assert_eq!(reopened.get(id).unwrap().unwrap().name, "Atorvastatin");
    }
}
