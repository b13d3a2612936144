use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Result};

use crate::core::config;

/// Per-user, per-project flow progress: the flow's program counter.
/// At most one row exists per (user, project), enforced by the primary key.
#[derive(Debug, Clone)]
pub struct ConversationState {
    pub telegram_user_id: String,
    pub project_id: String,
    pub current_flow_id: String,
    pub current_step: String,
    /// Accumulated answers keyed by the step id that asked for them
    pub context: serde_json::Map<String, serde_json::Value>,
    pub started_at: String,
    pub updated_at: String,
    pub expires_at: String,
}

impl ConversationState {
    /// Whether the TTL set at flow start has passed. Expired rows are
    /// treated as absent by the dispatcher and deleted lazily.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match DateTime::parse_from_rfc3339(&self.expires_at) {
            Ok(expires) => now > expires.with_timezone(&Utc),
            // An unreadable timestamp counts as expired; the row gets reset
            Err(_) => true,
        }
    }
}

pub fn get(conn: &Connection, user_id: &str, project_id: &str) -> Result<Option<ConversationState>> {
    conn.query_row(
        "SELECT telegram_user_id, project_id, current_flow_id, current_step, context, started_at, updated_at, expires_at
         FROM conversation_states
         WHERE telegram_user_id = ?1 AND project_id = ?2",
        params![user_id, project_id],
        |row| {
            let context_raw: String = row.get(4)?;
            Ok(ConversationState {
                telegram_user_id: row.get(0)?,
                project_id: row.get(1)?,
                current_flow_id: row.get(2)?,
                current_step: row.get(3)?,
                context: serde_json::from_str(&context_raw).unwrap_or_default(),
                started_at: row.get(5)?,
                updated_at: row.get(6)?,
                expires_at: row.get(7)?,
            })
        },
    )
    .optional()
}

/// Create the state row for a freshly started flow.
///
/// Returns `false` when a row already exists for the (user, project) pair -
/// a concurrent message won the race to start a flow, and the caller should
/// not execute the first step again.
pub fn start(
    conn: &Connection,
    user_id: &str,
    project_id: &str,
    flow_id: &str,
    first_step: &str,
    now: DateTime<Utc>,
) -> Result<bool> {
    let expires = now + config::flow::state_ttl();
    let inserted = conn.execute(
        "INSERT INTO conversation_states
         (telegram_user_id, project_id, current_flow_id, current_step, context, started_at, updated_at, expires_at)
         VALUES (?1, ?2, ?3, ?4, '{}', ?5, ?5, ?6)
         ON CONFLICT (telegram_user_id, project_id) DO NOTHING",
        params![user_id, project_id, flow_id, first_step, now.to_rfc3339(), expires.to_rfc3339()],
    )?;
    Ok(inserted > 0)
}

/// Compare-and-swap advancement: move to `next_step` only if the row is
/// still at `expected_step`. Returns `false` on a lost race (the update is
/// dropped by the caller, never retried blindly).
pub fn advance(
    conn: &Connection,
    user_id: &str,
    project_id: &str,
    expected_step: &str,
    next_step: &str,
    context: &serde_json::Map<String, serde_json::Value>,
    now: DateTime<Utc>,
) -> Result<bool> {
    let updated = conn.execute(
        "UPDATE conversation_states
         SET current_step = ?1, context = ?2, updated_at = ?3
         WHERE telegram_user_id = ?4 AND project_id = ?5 AND current_step = ?6",
        params![
            next_step,
            serde_json::Value::Object(context.clone()).to_string(),
            now.to_rfc3339(),
            user_id,
            project_id,
            expected_step
        ],
    )?;
    Ok(updated > 0)
}

/// Conditional completion delete, same CAS rule as `advance`
pub fn delete_if_at(conn: &Connection, user_id: &str, project_id: &str, expected_step: &str) -> Result<bool> {
    let deleted = conn.execute(
        "DELETE FROM conversation_states
         WHERE telegram_user_id = ?1 AND project_id = ?2 AND current_step = ?3",
        params![user_id, project_id, expected_step],
    )?;
    Ok(deleted > 0)
}

/// Unconditional delete: corrupt-state recovery and lazy expiry
pub fn delete(conn: &Connection, user_id: &str, project_id: &str) -> Result<bool> {
    let deleted = conn.execute(
        "DELETE FROM conversation_states WHERE telegram_user_id = ?1 AND project_id = ?2",
        params![user_id, project_id],
    )?;
    Ok(deleted > 0)
}
