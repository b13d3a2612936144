//! Telemetry recorder: bot event log plus per-day counters
//!
//! Everything here is off the critical path of the reply: failures are
//! logged and swallowed, never returned, so a broken analytics table can't
//! break the bot.

use serde_json::json;

use crate::storage::{events, get_connection, metrics, DbPool};

/// Sender identity extracted from the inbound update
#[derive(Debug, Clone, Default)]
pub struct InboundUser {
    pub id: String,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Record one processed inbound message: event-log append, `total_messages`
/// increment, and a `total_users` increment for first-time senders.
///
/// The unique-user check runs before the event insert (the insert would
/// otherwise always satisfy it) and is check-then-act by design: two
/// concurrent first messages can double-count a user. Accepted skew.
pub fn record_message(
    pool: &DbPool,
    project_id: &str,
    user: &InboundUser,
    text: &str,
    response: &str,
    is_command: bool,
    response_time_ms: i64,
) {
    let conn = match get_connection(pool) {
        Ok(conn) => conn,
        Err(e) => {
            log::warn!("Telemetry skipped, no database connection: {}", e);
            return;
        }
    };

    let today = metrics::today();

    match events::has_message_from(&conn, project_id, &user.id) {
        Ok(false) => {
            if let Err(e) = metrics::increment(&conn, project_id, "total_users", &today, 1) {
                log::warn!("Failed to increment total_users: {}", e);
            }
        }
        Ok(true) => {}
        Err(e) => log::warn!("Unique-user check failed: {}", e),
    }

    let event_data = json!({
        "text": text,
        "bot_response": response,
        "message_type": if is_command { "command" } else { "text" },
        "response_time_ms": response_time_ms,
        "telegram_username": user.username,
        "telegram_first_name": user.first_name,
        "telegram_last_name": user.last_name,
    });
    if let Err(e) = events::insert(&conn, project_id, "message", &user.id, &event_data) {
        log::warn!("Failed to log message event: {}", e);
    }

    if let Err(e) = metrics::increment(&conn, project_id, "total_messages", &today, 1) {
        log::warn!("Failed to increment total_messages: {}", e);
    }
}

/// Record a command execution: `command_executed` event plus the per-command
/// usage counter
pub fn record_command_execution(pool: &DbPool, project_id: &str, user_id: &str, command: &str) {
    let conn = match get_connection(pool) {
        Ok(conn) => conn,
        Err(e) => {
            log::warn!("Telemetry skipped, no database connection: {}", e);
            return;
        }
    };

    let event_data = json!({ "command": command });
    if let Err(e) = events::insert(&conn, project_id, "command_executed", user_id, &event_data) {
        log::warn!("Failed to log command event: {}", e);
    }
    if let Err(e) = metrics::increment(&conn, project_id, &format!("command_{command}"), &metrics::today(), 1) {
        log::warn!("Failed to increment command counter: {}", e);
    }
}

/// Record a handled callback query
pub fn record_callback(pool: &DbPool, project_id: &str, user_id: &str, data: &str) {
    let conn = match get_connection(pool) {
        Ok(conn) => conn,
        Err(e) => {
            log::warn!("Telemetry skipped, no database connection: {}", e);
            return;
        }
    };

    let event_data = json!({ "callback_data": data });
    if let Err(e) = events::insert(&conn, project_id, "callback", user_id, &event_data) {
        log::warn!("Failed to log callback event: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{create_pool, events, metrics};

    fn test_pool() -> (tempfile::TempDir, DbPool) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("telemetry.sqlite");
        let pool = create_pool(path.to_str().unwrap()).unwrap();
        (dir, pool)
    }

    fn user(id: &str) -> InboundUser {
        InboundUser { id: id.into(), username: Some("tester".into()), ..Default::default() }
    }

    #[test]
    fn first_message_counts_the_user_once() {
        let (_dir, pool) = test_pool();
        let today = metrics::today();

        record_message(&pool, "p1", &user("u1"), "hi", "hello", false, 12);
        record_message(&pool, "p1", &user("u1"), "again", "hello", false, 8);

        let conn = get_connection(&pool).unwrap();
        assert_eq!(metrics::value(&conn, "p1", "total_messages", &today).unwrap(), 2);
        assert_eq!(metrics::value(&conn, "p1", "total_users", &today).unwrap(), 1);
        assert_eq!(events::count_by_type(&conn, "p1", "message").unwrap(), 2);
    }

    #[test]
    fn command_execution_tracks_per_command_counter() {
        let (_dir, pool) = test_pool();
        let today = metrics::today();

        record_command_execution(&pool, "p1", "u1", "/start");
        record_command_execution(&pool, "p1", "u1", "/start");

        let conn = get_connection(&pool).unwrap();
        assert_eq!(metrics::value(&conn, "p1", "command_/start", &today).unwrap(), 2);
        assert_eq!(events::count_by_type(&conn, "p1", "command_executed").unwrap(), 2);
    }
}
