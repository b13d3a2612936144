use std::str::FromStr;

use rusqlite::{params, Connection, Result};
use serde::{Deserialize, Serialize};
use strum::EnumString;

use super::commands::{normalize, ButtonSpec};

/// How a flow is started
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum TriggerType {
    Command,
    Keyword,
    Regex,
}

/// Kind of a flow step
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum StepKind {
    Message,
    ApiCall,
    Condition,
}

/// One step of a scripted conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowStep {
    pub id: String,
    /// Raw step type string; see [`FlowStep::kind`]
    #[serde(rename = "type", default = "default_step_type")]
    pub step_type: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub buttons: Option<Vec<ButtonSpec>>,
    /// Config for `api_call` steps: integration reference plus method/path/query/body
    #[serde(default)]
    pub api_call: Option<serde_json::Value>,
}

fn default_step_type() -> String {
    "message".to_string()
}

impl FlowStep {
    /// Parsed step kind; unrecognized types behave like plain messages
    pub fn kind(&self) -> StepKind {
        StepKind::from_str(&self.step_type).unwrap_or(StepKind::Message)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct FlowDefinition {
    #[serde(default)]
    steps: Vec<FlowStep>,
}

/// A scripted multi-turn conversation. Read-only to the runtime.
#[derive(Debug, Clone)]
pub struct ConversationFlow {
    pub id: String,
    pub name: String,
    pub trigger_type: TriggerType,
    pub trigger_value: String,
    pub steps: Vec<FlowStep>,
    pub priority: i64,
}

impl ConversationFlow {
    /// Whether inbound text starts this flow.
    ///
    /// `command` triggers match a text prefix (both sides normalized to a
    /// leading "/"), `keyword` triggers match a case-insensitive substring,
    /// `regex` triggers match the stored pattern. An invalid stored pattern
    /// never matches.
    pub fn matches_trigger(&self, text: &str) -> bool {
        if text.is_empty() {
            return false;
        }
        match self.trigger_type {
            TriggerType::Command => text.starts_with(&normalize(&self.trigger_value)),
            TriggerType::Keyword => text.to_lowercase().contains(&self.trigger_value.to_lowercase()),
            TriggerType::Regex => match regex::Regex::new(&self.trigger_value) {
                Ok(re) => re.is_match(text),
                Err(e) => {
                    log::warn!("Flow {} has an invalid trigger regex: {}", self.id, e);
                    false
                }
            },
        }
    }

    pub fn first_step(&self) -> Option<&FlowStep> {
        self.steps.first()
    }

    pub fn step(&self, step_id: &str) -> Option<&FlowStep> {
        self.steps.iter().find(|s| s.id == step_id)
    }

    /// The step following `step_id`, or `None` when `step_id` is last (flow
    /// complete) or absent (corrupt state)
    pub fn step_after(&self, step_id: &str) -> Option<&FlowStep> {
        let index = self.steps.iter().position(|s| s.id == step_id)?;
        self.steps.get(index + 1)
    }
}

/// All active flows for a project in trigger evaluation order:
/// highest priority first, then oldest first.
pub fn list_active(conn: &Connection, project_id: &str) -> Result<Vec<ConversationFlow>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, trigger_type, trigger_value, flow_definition, priority
         FROM conversation_flows
         WHERE project_id = ?1 AND is_active = 1
         ORDER BY priority DESC, created_at",
    )?;
    let rows = stmt.query_map(params![project_id], flow_from_row)?;

    let mut flows = Vec::new();
    for row in rows {
        flows.push(row?);
    }
    Ok(flows)
}

/// Look up one active flow by id (used to continue a stored conversation)
pub fn get(conn: &Connection, project_id: &str, flow_id: &str) -> Result<Option<ConversationFlow>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, trigger_type, trigger_value, flow_definition, priority
         FROM conversation_flows
         WHERE project_id = ?1 AND id = ?2 AND is_active = 1",
    )?;
    let mut rows = stmt.query_map(params![project_id, flow_id], flow_from_row)?;
    rows.next().transpose()
}

fn flow_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ConversationFlow> {
    let trigger_raw: String = row.get(2)?;
    let definition_raw: String = row.get(4)?;
    let definition: FlowDefinition = serde_json::from_str(&definition_raw).unwrap_or_else(|e| {
        log::warn!("Unparseable flow_definition, treating flow as empty: {}", e);
        FlowDefinition::default()
    });
    Ok(ConversationFlow {
        id: row.get(0)?,
        name: row.get(1)?,
        // Unknown trigger types behave like keywords, the least surprising match
        trigger_type: TriggerType::from_str(&trigger_raw).unwrap_or(TriggerType::Keyword),
        trigger_value: row.get(3)?,
        steps: definition.steps,
        priority: row.get(5)?,
    })
}
