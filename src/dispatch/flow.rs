//! Conversation state machine and step executor
//!
//! Tracks per-user progress through a multi-step flow. All state
//! transitions are conditional on the step the handler read, so two
//! concurrent messages from the same user can't double-advance a flow; the
//! loser of the race is dropped and logged.

use chrono::Utc;
use teloxide::types::ChatId;

use super::{api_call, Dispatcher};
use crate::core::error::AppResult;
use crate::storage::flows::{self, ConversationFlow, FlowStep, StepKind};
use crate::storage::projects::BotProject;
use crate::storage::states::{self, ConversationState};
use crate::storage::get_connection;

/// Sent when the last step's answer arrives
pub const COMPLETION_TEXT: &str = "✅ All done, that's everything I needed. Thanks!";

/// Placeholder reply for `condition` steps; branching is not implemented
pub const CONDITION_PLACEHOLDER_TEXT: &str = "Okay, noted.";

/// Generic reply when an `api_call` step fails
pub const API_CALL_FAILED_TEXT: &str = "API call failed.";

/// Start `flow` for a user with no active state: create the state row
/// pointing at the first step and execute that step immediately.
///
/// Returns the reply text that was sent (empty when nothing was sent).
pub async fn start(
    d: &Dispatcher,
    project: &BotProject,
    chat_id: ChatId,
    user_id: &str,
    flow: &ConversationFlow,
) -> AppResult<String> {
    let Some(first_step) = flow.first_step() else {
        log::warn!("Flow {} has no steps, nothing to start", flow.id);
        return Ok(String::new());
    };

    let created = {
        let conn = get_connection(&d.db)?;
        states::start(&conn, user_id, &project.id, &flow.id, &first_step.id, Utc::now())?
    };
    if !created {
        // A concurrent message already started a flow for this user
        log::info!("Flow start for user {} lost a race, dropping", user_id);
        return Ok(String::new());
    }

    execute_step(d, project, chat_id, first_step).await
}

/// Feed an inbound message into the user's active flow.
///
/// Stores the answer under the current step's id, then either executes the
/// next step or completes the flow. A state row pointing at a step that no
/// longer exists (edited or deleted flow) is silently reset.
pub async fn advance(
    d: &Dispatcher,
    project: &BotProject,
    chat_id: ChatId,
    user_id: &str,
    text: &str,
    state: ConversationState,
) -> AppResult<String> {
    let conn = get_connection(&d.db)?;

    let Some(flow) = flows::get(&conn, &project.id, &state.current_flow_id)? else {
        log::warn!(
            "Conversation state references missing flow {}, resetting user {}",
            state.current_flow_id,
            user_id
        );
        states::delete(&conn, user_id, &project.id)?;
        return Ok(String::new());
    };

    if flow.step(&state.current_step).is_none() {
        log::warn!(
            "Conversation state at unknown step {} of flow {}, resetting user {}",
            state.current_step,
            flow.id,
            user_id
        );
        states::delete(&conn, user_id, &project.id)?;
        return Ok(String::new());
    }

    let mut context = state.context.clone();
    context.insert(state.current_step.clone(), serde_json::Value::String(text.to_string()));

    match flow.step_after(&state.current_step) {
        None => {
            // Last step answered: the flow is complete
            let deleted = states::delete_if_at(&conn, user_id, &project.id, &state.current_step)?;
            drop(conn);
            if !deleted {
                log::info!("Flow completion for user {} lost a race, dropping", user_id);
                return Ok(String::new());
            }
            log::info!("Flow {} completed for user {} with {} answers", flow.id, user_id, context.len());
            d.send(project, chat_id, COMPLETION_TEXT, None).await;
            Ok(COMPLETION_TEXT.to_string())
        }
        Some(next_step) => {
            let advanced = states::advance(
                &conn,
                user_id,
                &project.id,
                &state.current_step,
                &next_step.id,
                &context,
                Utc::now(),
            )?;
            if !advanced {
                log::info!("Flow advance for user {} lost a race, dropping", user_id);
                return Ok(String::new());
            }
            let next_step = next_step.clone();
            drop(conn);
            execute_step(d, project, chat_id, &next_step).await
        }
    }
}

/// Execute one flow step and return the reply text that was sent
async fn execute_step(
    d: &Dispatcher,
    project: &BotProject,
    chat_id: ChatId,
    step: &FlowStep,
) -> AppResult<String> {
    match step.kind() {
        StepKind::ApiCall => {
            let config = step.api_call.clone().unwrap_or(serde_json::Value::Null);
            let result = api_call::execute(&d.http, &d.db, &project.id, &config).await;
            let reply = match result {
                Ok(text) => text,
                Err(e) => {
                    log::warn!("api_call step {} failed: {}", step.id, e);
                    API_CALL_FAILED_TEXT.to_string()
                }
            };
            d.send(project, chat_id, &reply, None).await;
            Ok(reply)
        }
        StepKind::Condition => {
            d.send(project, chat_id, CONDITION_PLACEHOLDER_TEXT, None).await;
            Ok(CONDITION_PLACEHOLDER_TEXT.to_string())
        }
        StepKind::Message => {
            let text = step.content.clone().unwrap_or_default();
            d.send(project, chat_id, &text, step.buttons.as_deref()).await;
            Ok(text)
        }
    }
}
