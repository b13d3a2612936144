use std::str::FromStr;

use rusqlite::{params, Connection, Result};
use strum::EnumString;

/// What a matched intent does
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum IntentAction {
    Flow,
    ApiCall,
    AiResponse,
}

/// A configured intent: phrase-based match rule mapped to an action.
/// Read-only to the runtime.
#[derive(Debug, Clone)]
pub struct BotIntent {
    pub id: String,
    pub intent_name: String,
    pub training_phrases: Vec<String>,
    pub action: IntentAction,
    pub action_config: serde_json::Value,
}

impl BotIntent {
    /// Case-insensitive substring containment of any training phrase.
    /// No ranking by specificity; the caller scans intents in stored order
    /// and stops at the first match.
    pub fn matches(&self, text: &str) -> bool {
        if text.is_empty() {
            return false;
        }
        let haystack = text.to_lowercase();
        self.training_phrases
            .iter()
            .filter(|phrase| !phrase.trim().is_empty())
            .any(|phrase| haystack.contains(&phrase.to_lowercase()))
    }
}

/// All active intents for a project, ordered by creation time.
/// The order is the evaluation contract: first match wins.
pub fn list_active(conn: &Connection, project_id: &str) -> Result<Vec<BotIntent>> {
    let mut stmt = conn.prepare(
        "SELECT id, intent_name, training_phrases, action_type, action_config
         FROM bot_intents
         WHERE project_id = ?1 AND is_active = 1
         ORDER BY created_at",
    )?;
    let rows = stmt.query_map(params![project_id], |row| {
        let phrases_raw: String = row.get(2)?;
        let action_raw: String = row.get(3)?;
        let config_raw: Option<String> = row.get(4)?;
        Ok(BotIntent {
            id: row.get(0)?,
            intent_name: row.get(1)?,
            training_phrases: serde_json::from_str(&phrases_raw).unwrap_or_default(),
            // Unknown action types fall back to an AI reply
            action: IntentAction::from_str(&action_raw).unwrap_or(IntentAction::AiResponse),
            action_config: config_raw
                .and_then(|raw| serde_json::from_str(&raw).ok())
                .unwrap_or(serde_json::Value::Null),
        })
    })?;

    let mut intents = Vec::new();
    for row in rows {
        intents.push(row?);
    }
    Ok(intents)
}
