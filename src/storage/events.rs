use chrono::Utc;
use rusqlite::{params, Connection, Result};

/// Append one row to the bot event log. Rows are never updated or deleted
/// by the runtime; retention is someone else's problem.
pub fn insert(
    conn: &Connection,
    project_id: &str,
    event_type: &str,
    telegram_user_id: &str,
    event_data: &serde_json::Value,
) -> Result<()> {
    conn.execute(
        "INSERT INTO bot_events (project_id, event_type, telegram_user_id, event_data, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            project_id,
            event_type,
            telegram_user_id,
            event_data.to_string(),
            Utc::now().to_rfc3339()
        ],
    )?;
    Ok(())
}

/// Whether any message event was already logged for this (project, user)
/// pair. Drives the unique-user counter; see `telemetry` for the accepted
/// race.
pub fn has_message_from(conn: &Connection, project_id: &str, telegram_user_id: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM bot_events
         WHERE project_id = ?1 AND telegram_user_id = ?2 AND event_type = 'message'
         LIMIT 1",
        params![project_id, telegram_user_id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Event count for a project, by type (used by tests and the dashboard)
pub fn count_by_type(conn: &Connection, project_id: &str, event_type: &str) -> Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM bot_events WHERE project_id = ?1 AND event_type = ?2",
        params![project_id, event_type],
        |row| row.get(0),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::db::migrate_schema;

    #[test]
    fn insert_and_detect_prior_messages() {
        let conn = Connection::open_in_memory().unwrap();
        migrate_schema(&conn).unwrap();

        assert!(!has_message_from(&conn, "p1", "u1").unwrap());

        insert(&conn, "p1", "message", "u1", &serde_json::json!({"text": "hi"})).unwrap();
        assert!(has_message_from(&conn, "p1", "u1").unwrap());
        // Other event types don't count as messages
        insert(&conn, "p1", "callback", "u2", &serde_json::json!({})).unwrap();
        assert!(!has_message_from(&conn, "p1", "u2").unwrap());

        assert_eq!(count_by_type(&conn, "p1", "message").unwrap(), 1);
        assert_eq!(count_by_type(&conn, "p1", "callback").unwrap(), 1);
    }
}
