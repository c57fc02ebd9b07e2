use rusqlite::{params, Connection};

use crate::db::DatabaseError;

/// Key of the global reminders on/off switch.
pub const PREF_REMINDERS_ENABLED: &str = "reminders_enabled";

/// Get a user preference by key. Returns None if not set.
pub fn get_user_preference(
    conn: &Connection,
    key: &str,
) -> Result<Option<String>, DatabaseError> {
    let mut stmt = conn.prepare("SELECT value FROM user_preferences WHERE key = ?1")?;
    match stmt.query_row([key], |row| row.get::<_, String>(0)) {
        Ok(val) => Ok(Some(val)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(DatabaseError::from(e)),
    }
}

/// Set a user preference (upsert).
pub fn set_user_preference(
    conn: &Connection,
    key: &str,
    value: &str,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO user_preferences (key, value, updated_at)
         VALUES (?1, ?2, datetime('now'))
         ON CONFLICT(key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
        params![key, value],
    )?;
    Ok(())
}

/// Boolean preference stored as `"true"` / `"false"`. Unset or
/// unrecognised values fall back to `default`.
pub fn get_bool_preference(
    conn: &Connection,
    key: &str,
    default: bool,
) -> Result<bool, DatabaseError> {
    Ok(match get_user_preference(conn, key)?.as_deref() {
        Some("true") => true,
        Some("false") => false,
        Some(other) => {
            tracing::warn!(key, value = other, "Unrecognised boolean preference, using default");
            default
        }
        None => default,
    })
}

pub fn set_bool_preference(conn: &Connection, key: &str, value: bool) -> Result<(), DatabaseError> {
    set_user_preference(conn, key, if value { "true" } else { "false" })
}
