use rusqlite::{params, Connection, Result, Row};
use serde::{Deserialize, Serialize};

/// One inline keyboard button, as stored in command metadata and flow steps.
///
/// Carries display text plus either a callback payload or a URL; a button
/// with neither is dropped when the keyboard is built.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ButtonSpec {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// How a command replies, parsed from `response_type` + `response_metadata`
#[derive(Debug, Clone, PartialEq)]
pub enum CommandResponse {
    /// Plain text reply
    Text(String),
    /// Text reply with an inline keyboard attached
    Buttons { text: String, buttons: Vec<ButtonSpec> },
    /// The stored content is extra context for an AI-generated reply
    Ai(String),
}

/// A configured bot command. Read-only to the runtime.
#[derive(Debug, Clone)]
pub struct BotCommand {
    pub id: String,
    /// Normalized to a leading "/"
    pub command: String,
    pub description: Option<String>,
    pub response: CommandResponse,
    pub order_index: i64,
}

/// Canonical command form: trimmed, with a leading "/"
pub fn normalize(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

/// Find the active command matching the first whitespace-delimited token of
/// the inbound text. Stored commands are compared in normalized form, so a
/// stored `newcommand` matches the token `/newcommand`; a token without a
/// leading "/" never matches. Duplicates resolve to the first row in
/// `order_index, created_at` order.
pub fn find_active(conn: &Connection, project_id: &str, token: &str) -> Result<Option<BotCommand>> {
    if !token.starts_with('/') {
        return Ok(None);
    }
    Ok(list_active(conn, project_id)?
        .into_iter()
        .find(|cmd| cmd.command == token))
}

/// All active commands for a project in their tested evaluation order
pub fn list_active(conn: &Connection, project_id: &str) -> Result<Vec<BotCommand>> {
    let mut stmt = conn.prepare(
        "SELECT id, command, description, response_type, response_content, response_metadata, order_index
         FROM bot_commands
         WHERE project_id = ?1 AND is_active = 1
         ORDER BY order_index, created_at",
    )?;
    let rows = stmt.query_map(params![project_id], command_from_row)?;

    let mut commands = Vec::new();
    for row in rows {
        commands.push(row?);
    }
    Ok(commands)
}

fn command_from_row(row: &Row<'_>) -> rusqlite::Result<BotCommand> {
    let command: String = row.get(1)?;
    let response_type: String = row.get(3)?;
    let content: String = row.get(4)?;
    let metadata: Option<String> = row.get(5)?;

    Ok(BotCommand {
        id: row.get(0)?,
        command: normalize(&command),
        description: row.get(2)?,
        response: parse_response(&response_type, content, metadata.as_deref()),
        order_index: row.get(6)?,
    })
}

/// Turn the stored loosely-typed response columns into the tagged union.
///
/// Unparseable button metadata degrades to a plain text reply rather than
/// failing the lookup; the dashboard validates metadata at write time, so
/// this only fires on hand-edited rows.
fn parse_response(response_type: &str, content: String, metadata: Option<&str>) -> CommandResponse {
    match response_type {
        "buttons" => {
            let buttons = metadata
                .and_then(|raw| serde_json::from_str::<serde_json::Value>(raw).ok())
                .and_then(|value| {
                    serde_json::from_value::<Vec<ButtonSpec>>(value.get("buttons")?.clone()).ok()
                });
            match buttons {
                Some(buttons) if !buttons.is_empty() => CommandResponse::Buttons { text: content, buttons },
                _ => {
                    log::warn!("Command with response_type=buttons has no usable button metadata");
                    CommandResponse::Text(content)
                }
            }
        }
        "ai" => CommandResponse::Ai(content),
        _ => CommandResponse::Text(content),
    }
}
