use chrono::NaiveDateTime;
use rusqlite::{params, Connection};

use super::TRIGGER_FORMAT;
use crate::alarm::AlarmId;
use crate::db::DatabaseError;
use crate::models::ArmedAlarm;

/// Insert or replace the ledger row for `alarm.alarm_id`.
pub fn upsert_armed_alarm(conn: &Connection, alarm: &ArmedAlarm) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO armed_alarms (alarm_id, medication_id, slot_index, trigger_at, title, body, armed_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, datetime('now'))
         ON CONFLICT(alarm_id) DO UPDATE SET
             medication_id = ?2, slot_index = ?3, trigger_at = ?4,
             title = ?5, body = ?6, armed_at = datetime('now')",
        params![
            alarm.alarm_id.get(),
            alarm.medication_id,
            alarm.slot_index as i64,
            format_trigger(alarm.trigger_at),
            alarm.title,
            alarm.body,
        ],
    )?;
    Ok(())
}

/// Remove a ledger row. Missing rows are fine.
pub fn delete_armed_alarm(conn: &Connection, alarm_id: AlarmId) -> Result<(), DatabaseError> {
    conn.execute(
        "DELETE FROM armed_alarms WHERE alarm_id = ?1",
        params![alarm_id.get()],
    )?;
    Ok(())
}

/// Every ledger row, ordered by alarm id.
pub fn get_armed_alarms(conn: &Connection) -> Result<Vec<ArmedAlarm>, DatabaseError> {
    query_armed(
        conn,
        "SELECT alarm_id, medication_id, slot_index, trigger_at, title, body
         FROM armed_alarms ORDER BY alarm_id",
        params![],
    )
}

/// Ledger rows armed for exactly `at` (minute precision).
pub fn get_armed_alarms_at(conn: &Connection, at: NaiveDateTime) -> Result<Vec<ArmedAlarm>, DatabaseError> {
    query_armed(
        conn,
        "SELECT alarm_id, medication_id, slot_index, trigger_at, title, body
         FROM armed_alarms WHERE trigger_at = ?1 ORDER BY alarm_id",
        params![format_trigger(at)],
    )
}

fn format_trigger(at: NaiveDateTime) -> String {
    at.format(TRIGGER_FORMAT).to_string()
}

fn query_armed<P: rusqlite::Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> Result<Vec<ArmedAlarm>, DatabaseError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, i64>(1)?,
            row.get::<_, i64>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, String>(5)?,
        ))
    })?;

    let mut alarms = Vec::new();
    for row in rows {
        let (alarm_id, medication_id, slot_index, trigger_at, title, body) = row?;
        alarms.push(ArmedAlarm {
            alarm_id: AlarmId::from_raw(alarm_id)
                .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
            medication_id,
            slot_index: usize::try_from(slot_index)
                .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
            trigger_at: NaiveDateTime::parse_from_str(&trigger_at, TRIGGER_FORMAT)
                .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
            title,
            body,
        });
    }
    Ok(alarms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 10)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn alarm(med: i64, slot: usize, trigger_at: NaiveDateTime) -> ArmedAlarm {
        ArmedAlarm {
            alarm_id: AlarmId::for_slot(med, slot).unwrap(),
            medication_id: med,
            slot_index: slot,
            trigger_at,
            title: format!("Time to take med {med}"),
            body: "10 mg".into(),
        }
    }

    #[test]
    fn upsert_then_list() {
        let conn = open_memory_database().unwrap();
        upsert_armed_alarm(&conn, &alarm(2, 0, at(8, 0))).unwrap();
        upsert_armed_alarm(&conn, &alarm(1, 1, at(20, 0))).unwrap();

        let all = get_armed_alarms(&conn).unwrap();
        assert_eq!(all, vec![alarm(1, 1, at(20, 0)), alarm(2, 0, at(8, 0))]);
    }

    #[test]
    fn upsert_replaces_existing_row() {
        let conn = open_memory_database().unwrap();
        upsert_armed_alarm(&conn, &alarm(1, 0, at(8, 0))).unwrap();
        upsert_armed_alarm(&conn, &alarm(1, 0, at(9, 0))).unwrap();

        let all = get_armed_alarms(&conn).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].trigger_at, at(9, 0));
    }

    #[test]
    fn lookup_by_instant_matches_minute() {
        let conn = open_memory_database().unwrap();
        upsert_armed_alarm(&conn, &alarm(1, 0, at(8, 0))).unwrap();
        upsert_armed_alarm(&conn, &alarm(2, 0, at(8, 0))).unwrap();
        upsert_armed_alarm(&conn, &alarm(3, 0, at(8, 1))).unwrap();

        let with_seconds = at(8, 0) + chrono::Duration::seconds(42);
        let ids: Vec<i64> = get_armed_alarms_at(&conn, with_seconds)
            .unwrap()
            .iter()
            .map(|a| a.medication_id)
            .collect();
        assert_eq!(ids, vec![1, 2]);
        assert!(get_armed_alarms_at(&conn, at(7, 0)).unwrap().is_empty());
    }

    #[test]
    fn delete_is_idempotent() {
        let conn = open_memory_database().unwrap();
        let a = alarm(1, 0, at(8, 0));
        upsert_armed_alarm(&conn, &a).unwrap();
        delete_armed_alarm(&conn, a.alarm_id).unwrap();
        delete_armed_alarm(&conn, a.alarm_id).unwrap();
        assert!(get_armed_alarms(&conn).unwrap().is_empty());
    }
}
