use std::str::FromStr;

use rusqlite::{params, Connection, Result};
use strum::{Display, EnumString};

/// Lifecycle status of a bot project, as set by the dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum BotStatus {
    Draft,
    Active,
    Paused,
}

/// A bot project row. Read-only to the runtime; the dashboard owns writes.
#[derive(Debug, Clone)]
pub struct BotProject {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    /// Free-form context handed to the AI fallback adapter
    pub context: Option<String>,
    pub telegram_bot_token: String,
    pub is_active: bool,
    pub bot_status: BotStatus,
    pub created_at: String,
}

impl BotProject {
    /// Whether the runtime should process updates for this project
    pub fn is_runnable(&self) -> bool {
        self.is_active && self.bot_status == BotStatus::Active
    }
}

/// Find the project owning a bot token.
///
/// Duplicate tokens should not occur but are defended against: the most
/// recently created active project wins. Returns `None` when no active
/// project carries the token.
pub fn find_by_token(conn: &Connection, token: &str) -> Result<Option<BotProject>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, description, context, telegram_bot_token, is_active, bot_status, created_at
         FROM bot_projects
         WHERE telegram_bot_token = ?1 AND is_active = 1
         ORDER BY created_at DESC
         LIMIT 1",
    )?;
    let mut rows = stmt.query(params![token])?;

    if let Some(row) = rows.next()? {
        let status: String = row.get(6)?;
        Ok(Some(BotProject {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            context: row.get(3)?,
            telegram_bot_token: row.get(4)?,
            is_active: row.get::<_, i64>(5)? != 0,
            // Unknown status strings are treated as draft, i.e. not runnable
            bot_status: BotStatus::from_str(&status).unwrap_or(BotStatus::Draft),
            created_at: row.get(7)?,
        }))
    } else {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::db::migrate_schema;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        migrate_schema(&conn).unwrap();
        conn
    }

    fn insert_project(conn: &Connection, id: &str, token: &str, active: bool, status: &str, created: &str) {
        conn.execute(
            "INSERT INTO bot_projects (id, name, telegram_bot_token, is_active, bot_status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![id, format!("bot-{id}"), token, active as i64, status, created],
        )
        .unwrap();
    }

    #[test]
    fn newest_active_project_wins_on_duplicate_tokens() {
        let conn = test_conn();
        insert_project(&conn, "old", "tok", true, "active", "2024-01-01T00:00:00Z");
        insert_project(&conn, "new", "tok", true, "active", "2024-06-01T00:00:00Z");

        let project = find_by_token(&conn, "tok").unwrap().unwrap();
        assert_eq!(project.id, "new");
    }

    #[test]
    fn inactive_projects_are_invisible() {
        let conn = test_conn();
        insert_project(&conn, "p1", "tok", false, "active", "2024-01-01T00:00:00Z");

        assert!(find_by_token(&conn, "tok").unwrap().is_none());
    }

    #[test]
    fn paused_project_is_found_but_not_runnable() {
        let conn = test_conn();
        insert_project(&conn, "p1", "tok", true, "paused", "2024-01-01T00:00:00Z");

        let project = find_by_token(&conn, "tok").unwrap().unwrap();
        assert_eq!(project.bot_status, BotStatus::Paused);
        assert!(!project.is_runnable());
    }

    #[test]
    fn unknown_status_maps_to_draft() {
        let conn = test_conn();
        insert_project(&conn, "p1", "tok", true, "archived", "2024-01-01T00:00:00Z");

        let project = find_by_token(&conn, "tok").unwrap().unwrap();
        assert_eq!(project.bot_status, BotStatus::Draft);
    }
}
