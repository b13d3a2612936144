//! Dispatch resolution for inbound text messages
//!
//! The order is a fixed contract and must not be reordered:
//! active flow state, then intents, then commands, then flow triggers, then
//! the AI fallback. Exactly one branch applies per message.

use chrono::{DateTime, Utc};
use rusqlite::Connection;

use crate::core::error::AppResult;
use crate::storage::commands::{self, BotCommand};
use crate::storage::flows::{self, ConversationFlow};
use crate::storage::intents::{self, BotIntent};
use crate::storage::states::{self, ConversationState};

/// The single handling path chosen for a message
#[derive(Debug)]
pub enum Resolution {
    /// An active flow short-circuits all other matching
    ContinueFlow(ConversationState),
    Intent(BotIntent),
    Command(BotCommand),
    StartFlow(ConversationFlow),
    AiFallback,
}

/// Decide which branch handles `text` for this (user, project).
///
/// Reads only; the returned branch is executed by the dispatcher. An
/// expired conversation state is deleted here and treated as absent.
pub fn resolve(
    conn: &Connection,
    project_id: &str,
    user_id: &str,
    text: &str,
    now: DateTime<Utc>,
) -> AppResult<Resolution> {
    if let Some(state) = states::get(conn, user_id, project_id)? {
        if state.is_expired(now) {
            log::info!("Dropping expired conversation state for user {} in {}", user_id, project_id);
            states::delete(conn, user_id, project_id)?;
        } else {
            return Ok(Resolution::ContinueFlow(state));
        }
    }

    for intent in intents::list_active(conn, project_id)? {
        if intent.matches(text) {
            return Ok(Resolution::Intent(intent));
        }
    }

    if let Some(token) = text.split_whitespace().next() {
        if let Some(command) = commands::find_active(conn, project_id, token)? {
            return Ok(Resolution::Command(command));
        }
    }

    for flow in flows::list_active(conn, project_id)? {
        if flow.matches_trigger(text) {
            return Ok(Resolution::StartFlow(flow));
        }
    }

    Ok(Resolution::AiFallback)
}
