use std::str::FromStr;

use chrono::NaiveDate;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};

use super::DATE_FORMAT;
use crate::db::DatabaseError;
use crate::models::*;

const MEDICATION_COLUMNS: &str =
    "id, name, dosage, med_type, notes, frequency, times, start_date, end_date, is_active";

/// Insert a new medication and return its assigned id.
pub fn insert_medication(conn: &Connection, input: &MedicationInput) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO medications (name, dosage, med_type, notes, frequency, times,
         start_date, end_date, is_active)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            input.name,
            input.dosage,
            input.med_type,
            input.notes,
            input.frequency.as_str(),
            encode_times(&input.times)?,
            input.start_date.to_string(),
            input.end_date.map(|d| d.to_string()),
            input.is_active as i32,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Replace every editable field of an existing medication.
pub fn update_medication(conn: &Connection, med: &Medication) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE medications SET name = ?2, dosage = ?3, med_type = ?4, notes = ?5,
         frequency = ?6, times = ?7, start_date = ?8, end_date = ?9, is_active = ?10,
         updated_at = datetime('now')
         WHERE id = ?1",
        params![
            med.id,
            med.name,
            med.dosage,
            med.med_type,
            med.notes,
            med.frequency.as_str(),
            encode_times(&med.times)?,
            med.start_date.to_string(),
            med.end_date.map(|d| d.to_string()),
            med.is_active as i32,
        ],
    )?;
    require_changed(changed, med.id)
}

pub fn set_medication_active(conn: &Connection, id: i64, active: bool) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE medications SET is_active = ?2, updated_at = datetime('now') WHERE id = ?1",
        params![id, active as i32],
    )?;
    require_changed(changed, id)
}

pub fn delete_medication(conn: &Connection, id: i64) -> Result<(), DatabaseError> {
    let changed = conn.execute("DELETE FROM medications WHERE id = ?1", params![id])?;
    require_changed(changed, id)
}

pub fn get_medication(conn: &Connection, id: i64) -> Result<Option<Medication>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {MEDICATION_COLUMNS} FROM medications WHERE id = ?1"),
            params![id],
            medication_row_from_rusqlite,
        )
        .optional()?;
    row.map(medication_from_row).transpose()
}

pub fn get_active_medications(conn: &Connection) -> Result<Vec<Medication>, DatabaseError> {
    query_medications(
        conn,
        &format!("SELECT {MEDICATION_COLUMNS} FROM medications WHERE is_active = 1 ORDER BY id"),
        params![],
    )
}

/// All medications (active + inactive), ordered by id.
pub fn get_all_medications(conn: &Connection) -> Result<Vec<Medication>, DatabaseError> {
    query_medications(
        conn,
        &format!("SELECT {MEDICATION_COLUMNS} FROM medications ORDER BY id"),
        params![],
    )
}

/// Medications whose id is in `ids`. Unknown ids are ignored.
pub fn get_medications_by_ids(conn: &Connection, ids: &[i64]) -> Result<Vec<Medication>, DatabaseError> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let placeholders = vec!["?"; ids.len()].join(", ");
    query_medications(
        conn,
        &format!(
            "SELECT {MEDICATION_COLUMNS} FROM medications WHERE id IN ({placeholders}) ORDER BY id"
        ),
        params_from_iter(ids.iter()),
    )
}

fn query_medications<P: rusqlite::Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> Result<Vec<Medication>, DatabaseError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, medication_row_from_rusqlite)?;

    let mut meds = Vec::new();
    for row in rows {
        meds.push(medication_from_row(row?)?);
    }
    Ok(meds)
}

fn require_changed(changed: usize, id: i64) -> Result<(), DatabaseError> {
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Medication".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

fn encode_times(times: &[String]) -> Result<String, DatabaseError> {
    serde_json::to_string(times).map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))
}

// Internal row type for Medication mapping
struct MedicationRow {
    id: i64,
    name: String,
    dosage: String,
    med_type: String,
    notes: Option<String>,
    frequency: String,
    times: String,
    start_date: String,
    end_date: Option<String>,
    is_active: i32,
}

fn medication_row_from_rusqlite(row: &rusqlite::Row<'_>) -> Result<MedicationRow, rusqlite::Error> {
    Ok(MedicationRow {
        id: row.get(0)?,
        name: row.get(1)?,
        dosage: row.get(2)?,
        med_type: row.get(3)?,
        notes: row.get(4)?,
        frequency: row.get(5)?,
        times: row.get(6)?,
        start_date: row.get(7)?,
        end_date: row.get(8)?,
        is_active: row.get(9)?,
    })
}

fn medication_from_row(row: MedicationRow) -> Result<Medication, DatabaseError> {
    let bad_value = |field: &str, e: &dyn std::fmt::Display| {
        DatabaseError::ConstraintViolation(format!("medication {} {field}: {e}", row.id))
    };
    let times: Vec<String> =
        serde_json::from_str(&row.times).map_err(|e| bad_value("times", &e))?;
    let start_date =
        NaiveDate::parse_from_str(&row.start_date, DATE_FORMAT).map_err(|e| bad_value("start_date", &e))?;
    let end_date = row
        .end_date
        .as_deref()
        .map(|d| NaiveDate::parse_from_str(d, DATE_FORMAT))
        .transpose()
        .map_err(|e| bad_value("end_date", &e))?;

    Ok(Medication {
        id: row.id,
        frequency: Frequency::from_str(&row.frequency)?,
        name: row.name,
        dosage: row.dosage,
        med_type: row.med_type,
        notes: row.notes,
        times,
        start_date,
        end_date,
        is_active: row.is_active != 0,
    })
}
