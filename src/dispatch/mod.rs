//! Update handling: classification, dispatch, and reply
//!
//! One inbound Telegram update comes in, zero or more outbound messages and
//! state mutations come out. Everything downstream of project resolution is
//! acknowledged to Telegram regardless of outcome; a failed send or AI call
//! is a logged, dropped reply, never a webhook error (Telegram retries
//! non-2xx responses, and the side effects here are not idempotent).

pub mod api_call;
pub mod flow;
pub mod resolver;

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use teloxide::types::{CallbackQuery, ChatId, Message, PreCheckoutQuery, Update, UpdateKind};

use crate::ai::AiGateway;
use crate::core::error::AppResult;
use crate::core::metrics::{DISPATCH_OUTCOME_TOTAL, SEND_FAILURES_TOTAL, UPDATES_RECEIVED_TOTAL};
use crate::storage::commands::{BotCommand, ButtonSpec, CommandResponse};
use crate::storage::intents::{BotIntent, IntentAction};
use crate::storage::projects::BotProject;
use crate::storage::{flows, get_connection, DbPool};
use crate::telegram::Gateway;
use crate::telemetry::{self, InboundUser};

use resolver::Resolution;

/// Sent when the AI fallback is unavailable and the text looked like a command
pub const UNKNOWN_COMMAND_TEXT: &str = "Unknown command. Type /help to see available commands.";

/// Sent when the AI fallback is unavailable for free-form text
pub const GENERIC_FALLBACK_TEXT: &str = "Sorry, I couldn't process that request.";

/// Which of the mutually exclusive handling paths ran for a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    FlowContinued,
    FlowStarted,
    Intent,
    Command,
    AiFallback,
}

impl DispatchOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FlowContinued => "flow_continued",
            Self::FlowStarted => "flow_started",
            Self::Intent => "intent",
            Self::Command => "command",
            Self::AiFallback => "ai_fallback",
        }
    }
}

/// Shared dependencies for handling one update
#[derive(Clone)]
pub struct Dispatcher {
    pub db: Arc<DbPool>,
    pub gateway: Gateway,
    pub ai: AiGateway,
    pub http: reqwest::Client,
}

impl Dispatcher {
    pub fn new(db: Arc<DbPool>, gateway: Gateway, ai: AiGateway, http: reqwest::Client) -> Self {
        Self { db, gateway, ai, http }
    }

    /// Classify one update for an already-resolved, runnable project and
    /// route it. Unknown update shapes are acknowledged as no-ops.
    pub async fn handle_update(&self, project: &BotProject, update: Update) -> AppResult<()> {
        match update.kind {
            UpdateKind::Message(msg) | UpdateKind::EditedMessage(msg) => {
                UPDATES_RECEIVED_TOTAL.with_label_values(&["message"]).inc();
                self.handle_message(project, &msg).await
            }
            UpdateKind::CallbackQuery(query) => {
                UPDATES_RECEIVED_TOTAL.with_label_values(&["callback_query"]).inc();
                self.handle_callback(project, &query).await
            }
            UpdateKind::PreCheckoutQuery(query) => {
                UPDATES_RECEIVED_TOTAL.with_label_values(&["pre_checkout_query"]).inc();
                self.handle_pre_checkout(project, &query).await
            }
            other => {
                UPDATES_RECEIVED_TOTAL.with_label_values(&["other"]).inc();
                log::debug!("Ignoring unhandled update kind: {:?}", other);
                Ok(())
            }
        }
    }

    /// Dispatch one text message through the resolver and record telemetry.
    ///
    /// Exactly one of flow-continuation, intent, command, flow-start, or
    /// AI-fallback runs; exactly one message event is recorded.
    async fn handle_message(&self, project: &BotProject, msg: &Message) -> AppResult<()> {
        let started = Instant::now();
        let chat_id = msg.chat.id;
        let text = msg.text().unwrap_or_default().to_string();
        let user = inbound_user(msg);

        let resolution = {
            let conn = get_connection(&self.db)?;
            resolver::resolve(&conn, &project.id, &user.id, &text, Utc::now())?
        };

        let (outcome, response) = match resolution {
            Resolution::ContinueFlow(state) => {
                let reply = flow::advance(self, project, chat_id, &user.id, &text, state).await?;
                (DispatchOutcome::FlowContinued, reply)
            }
            Resolution::Intent(intent) => {
                let reply = self.execute_intent(project, chat_id, &user, &text, &intent).await?;
                (DispatchOutcome::Intent, reply)
            }
            Resolution::Command(command) => {
                let reply = self.execute_command(project, chat_id, &user, &text, &command).await?;
                (DispatchOutcome::Command, reply)
            }
            Resolution::StartFlow(started_flow) => {
                let reply = flow::start(self, project, chat_id, &user.id, &started_flow).await?;
                (DispatchOutcome::FlowStarted, reply)
            }
            Resolution::AiFallback => {
                let reply = self.ai_fallback(project, chat_id, &text, None).await;
                (DispatchOutcome::AiFallback, reply)
            }
        };

        DISPATCH_OUTCOME_TOTAL.with_label_values(&[outcome.as_str()]).inc();
        log::info!(
            "Dispatched message for project {} as {} in {}ms",
            project.id,
            outcome.as_str(),
            started.elapsed().as_millis()
        );

        telemetry::record_message(
            &self.db,
            &project.id,
            &user,
            &text,
            &response,
            text.starts_with('/'),
            started.elapsed().as_millis() as i64,
        );
        Ok(())
    }

    /// Run a matched command and return the reply text
    async fn execute_command(
        &self,
        project: &BotProject,
        chat_id: ChatId,
        user: &InboundUser,
        text: &str,
        command: &BotCommand,
    ) -> AppResult<String> {
        let reply = match &command.response {
            CommandResponse::Text(content) => {
                self.send(project, chat_id, content, None).await;
                content.clone()
            }
            CommandResponse::Buttons { text: content, buttons } => {
                self.send(project, chat_id, content, Some(buttons)).await;
                content.clone()
            }
            CommandResponse::Ai(context) => {
                self.ai_fallback(project, chat_id, text, Some(context)).await
            }
        };

        telemetry::record_command_execution(&self.db, &project.id, &user.id, &command.command);
        Ok(reply)
    }

    /// Run a matched intent's action and return the reply text
    async fn execute_intent(
        &self,
        project: &BotProject,
        chat_id: ChatId,
        user: &InboundUser,
        text: &str,
        intent: &BotIntent,
    ) -> AppResult<String> {
        log::info!("Intent {} matched for project {}", intent.intent_name, project.id);
        let config = &intent.action_config;

        match intent.action {
            IntentAction::Flow => {
                let target = config
                    .get("flow_id")
                    .or_else(|| config.get("flow_name"))
                    .and_then(serde_json::Value::as_str);
                let flow = match target {
                    Some(key) => {
                        let conn = get_connection(&self.db)?;
                        flows::get(&conn, &project.id, key)?.or_else(|| {
                            flows::list_active(&conn, &project.id)
                                .ok()?
                                .into_iter()
                                .find(|f| f.name == key)
                        })
                    }
                    None => None,
                };
                match flow {
                    Some(flow) => flow::start(self, project, chat_id, &user.id, &flow).await,
                    None => {
                        log::warn!("Intent {} references an unknown flow", intent.intent_name);
                        match config.get("response").and_then(serde_json::Value::as_str) {
                            Some(fallback) => {
                                self.send(project, chat_id, fallback, None).await;
                                Ok(fallback.to_string())
                            }
                            None => Ok(self.ai_fallback(project, chat_id, text, None).await),
                        }
                    }
                }
            }
            IntentAction::ApiCall => {
                let reply = match api_call::execute(&self.http, &self.db, &project.id, config).await {
                    Ok(result) => result,
                    Err(e) => {
                        log::warn!("Intent {} api_call failed: {}", intent.intent_name, e);
                        flow::API_CALL_FAILED_TEXT.to_string()
                    }
                };
                self.send(project, chat_id, &reply, None).await;
                Ok(reply)
            }
            IntentAction::AiResponse => {
                let extra = config.get("system_prompt").and_then(serde_json::Value::as_str);
                Ok(self.ai_fallback(project, chat_id, text, extra).await)
            }
        }
    }

    /// Generate and send an AI reply, degrading to fixed fallback text when
    /// the adapter is unavailable or fails
    async fn ai_fallback(
        &self,
        project: &BotProject,
        chat_id: ChatId,
        text: &str,
        extra_context: Option<&str>,
    ) -> String {
        let reply = match self.ai.generate_reply(project, text, extra_context).await {
            Ok(reply) => reply,
            Err(e) => {
                log::warn!("AI fallback failed for project {}: {}", project.id, e);
                if text.starts_with('/') {
                    UNKNOWN_COMMAND_TEXT.to_string()
                } else {
                    GENERIC_FALLBACK_TEXT.to_string()
                }
            }
        };
        self.send(project, chat_id, &reply, None).await;
        reply
    }

    /// Acknowledge a callback query, then route payment callbacks to the
    /// payment stub. The acknowledgement goes out even when routing fails.
    async fn handle_callback(&self, project: &BotProject, query: &CallbackQuery) -> AppResult<()> {
        if let Err(e) = self.gateway.answer_callback(&project.telegram_bot_token, query).await {
            SEND_FAILURES_TOTAL.inc();
            log::warn!("Failed to answer callback query: {}", e);
        }

        let data = query.data.as_deref().unwrap_or_default();
        let user_id = query.from.id.to_string();
        telemetry::record_callback(&self.db, &project.id, &user_id, data);

        if data.starts_with("pay_") {
            // Payment stub: real processing lives in the payment service
            log::info!("Routing payment callback {} for project {} to payment stub", data, project.id);
        }
        Ok(())
    }

    /// Pre-checkout queries are always approved; validation is the payment
    /// service's concern
    async fn handle_pre_checkout(&self, project: &BotProject, query: &PreCheckoutQuery) -> AppResult<()> {
        log::info!(
            "Approving pre_checkout_query {} for project {}",
            query.id,
            project.id
        );
        if let Err(e) = self
            .gateway
            .answer_pre_checkout(&project.telegram_bot_token, query, true)
            .await
        {
            SEND_FAILURES_TOTAL.inc();
            log::warn!("Failed to answer pre_checkout_query: {}", e);
        }
        Ok(())
    }

    /// Send a reply, logging and swallowing failures: a dropped reply must
    /// not fail the webhook acknowledgement
    pub(crate) async fn send(
        &self,
        project: &BotProject,
        chat_id: ChatId,
        text: &str,
        buttons: Option<&[ButtonSpec]>,
    ) {
        if text.is_empty() {
            return;
        }
        if let Err(e) = self
            .gateway
            .send_message(&project.telegram_bot_token, chat_id, text, buttons)
            .await
        {
            SEND_FAILURES_TOTAL.inc();
            log::warn!("Failed to send message to chat {}: {}", chat_id, e);
        }
    }
}

fn inbound_user(msg: &Message) -> InboundUser {
    match &msg.from {
        Some(user) => InboundUser {
            id: user.id.to_string(),
            username: user.username.clone(),
            first_name: Some(user.first_name.clone()),
            last_name: user.last_name.clone(),
        },
        // Channel posts and service messages carry no sender; fall back to
        // the chat id so state stays keyed per conversation
        None => InboundUser { id: msg.chat.id.to_string(), ..Default::default() },
    }
}
