use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Result};

/// Today's metric date key (UTC)
pub fn today() -> String {
    Utc::now().format("%Y-%m-%d").to_string()
}

/// Atomically add `delta` to a daily counter, creating the row at zero
/// first when absent. The upsert runs entirely inside SQLite, so concurrent
/// increments for the same key never lose updates (no read-modify-write in
/// application code).
pub fn increment(
    conn: &Connection,
    project_id: &str,
    metric_name: &str,
    metric_date: &str,
    delta: i64,
) -> Result<()> {
    conn.execute(
        "INSERT INTO bot_analytics (project_id, metric_name, metric_date, metric_value, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT (project_id, metric_name, metric_date)
         DO UPDATE SET metric_value = metric_value + excluded.metric_value",
        params![project_id, metric_name, metric_date, delta, Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

/// Current counter value, zero when the row doesn't exist
pub fn value(conn: &Connection, project_id: &str, metric_name: &str, metric_date: &str) -> Result<i64> {
    Ok(conn
        .query_row(
            "SELECT metric_value FROM bot_analytics
             WHERE project_id = ?1 AND metric_name = ?2 AND metric_date = ?3",
            params![project_id, metric_name, metric_date],
            |row| row.get(0),
        )
        .optional()?
        .unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::db::migrate_schema;

    #[test]
    fn increment_upserts_and_accumulates() {
        let conn = Connection::open_in_memory().unwrap();
        migrate_schema(&conn).unwrap();

        assert_eq!(value(&conn, "p1", "total_messages", "2024-06-01").unwrap(), 0);

        increment(&conn, "p1", "total_messages", "2024-06-01", 1).unwrap();
        increment(&conn, "p1", "total_messages", "2024-06-01", 2).unwrap();
        assert_eq!(value(&conn, "p1", "total_messages", "2024-06-01").unwrap(), 3);

        // Separate days and names are separate counters
        increment(&conn, "p1", "total_messages", "2024-06-02", 1).unwrap();
        increment(&conn, "p1", "command_/start", "2024-06-01", 1).unwrap();
        assert_eq!(value(&conn, "p1", "total_messages", "2024-06-02").unwrap(), 1);
        assert_eq!(value(&conn, "p1", "command_/start", "2024-06-01").unwrap(), 1);
    }
}
