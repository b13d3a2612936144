//! AI fallback adapter
//!
//! Forwards free-form messages to an OpenAI-compatible chat-completions
//! gateway when no structured rule matched. The adapter is deliberately
//! thin: one bounded request, one text reply. Callers treat any failure as
//! a first-class branch and substitute fallback text.

use serde::Serialize;

use crate::core::config;
use crate::core::error::{AppError, AppResult};
use crate::storage::projects::BotProject;

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Clone)]
pub struct AiGateway {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl AiGateway {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: config::AI_API_URL.clone(),
            api_key: config::AI_API_KEY.clone(),
            model: config::AI_MODEL.clone(),
        }
    }

    /// Build an adapter against an explicit gateway (tests)
    pub fn with_endpoint(client: reqwest::Client, base_url: String, api_key: Option<String>) -> Self {
        Self {
            client,
            base_url,
            api_key,
            model: config::AI_MODEL.clone(),
        }
    }

    /// Generate a reply for `text` in the context of `project`.
    ///
    /// `extra_context` carries per-rule prompt material (an AI command's
    /// stored content, an intent's system prompt).
    pub async fn generate_reply(
        &self,
        project: &BotProject,
        text: &str,
        extra_context: Option<&str>,
    ) -> AppResult<String> {
        let Some(api_key) = &self.api_key else {
            return Err(AppError::Upstream("no AI API key configured".into()));
        };

        let mut system_prompt = format!(
            "You are a helpful Telegram bot assistant for: {}\n\nBot Description: {}\nBot Context: {}",
            project.name,
            project.description.as_deref().unwrap_or("General purpose bot"),
            project.context.as_deref().unwrap_or("No specific context"),
        );
        if let Some(extra) = extra_context {
            system_prompt.push_str("\n\n");
            system_prompt.push_str(extra);
        }
        system_prompt.push_str(
            "\n\nProvide helpful, concise, and friendly responses. Keep answers under 200 characters unless more detail is needed.",
        );

        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage { role: "system", content: system_prompt },
                ChatMessage { role: "user", content: text.to_string() },
            ],
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url.trim_end_matches('/')))
            .bearer_auth(api_key)
            .timeout(config::network::ai_timeout())
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::Upstream(format!(
                "AI gateway returned status {}",
                response.status()
            )));
        }

        let body: serde_json::Value = response.json().await?;
        body.get("choices")
            .and_then(|choices| choices.get(0))
            .and_then(|choice| choice.get("message"))
            .and_then(|message| message.get("content"))
            .and_then(|content| content.as_str())
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or_else(|| AppError::Upstream("AI gateway returned no completion".into()))
    }
}
