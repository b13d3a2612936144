//! Test fixtures for webhook integration tests
//!
//! Provides a TestEnvironment that wires the real router and dispatcher to
//! an on-disk SQLite database and a wiremock Telegram/AI/external-API
//! server, plus raw-JSON update builders (Telegram update payloads are
//! deserialized exactly as the webhook would receive them).

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::util::ServiceExt;
use wiremock::matchers::{method, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use botforge::ai::AiGateway;
use botforge::core::web_server::{create_router, AppState};
use botforge::storage::{create_pool, get_connection, DbConnection, DbPool};
use botforge::telegram::Gateway;
use botforge::Dispatcher;

pub const TEST_TOKEN: &str = "12345:TEST-TOKEN";
pub const TEST_USER_ID: i64 = 123456789;
pub const TEST_CHAT_ID: i64 = 123456789;

/// Complete environment for webhook tests
pub struct TestEnvironment {
    /// Keeps the database file alive for the test's duration
    _dir: tempfile::TempDir,
    pub db: Arc<DbPool>,
    /// Mock server standing in for Telegram, the AI gateway, and external APIs
    pub mock: MockServer,
    pub router: Router,
    pub dispatcher: Arc<Dispatcher>,
}

impl TestEnvironment {
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("botforge-test.sqlite");
        let db = Arc::new(create_pool(db_path.to_str().unwrap()).unwrap());

        let mock = MockServer::start().await;
        mount_telegram_mocks(&mock).await;

        let http = reqwest::Client::new();
        let gateway = Gateway::new(http.clone(), Some(mock.uri().parse().unwrap()));
        // Points at the mock server; tests that need a reply mount
        // /ai/v1/chat/completions, everything else gets a 404 -> fallback text
        let ai = AiGateway::with_endpoint(http.clone(), format!("{}/ai/v1", mock.uri()), Some("test-key".into()));
        let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&db), gateway, ai, http));

        let router = create_router(AppState { db: Arc::clone(&db), dispatcher: Arc::clone(&dispatcher) });

        Self { _dir: dir, db, mock, router, dispatcher }
    }

    pub fn conn(&self) -> DbConnection {
        get_connection(&self.db).unwrap()
    }

    /// Mount an AI completion reply on the shared mock server
    pub async fn mount_ai_reply(&self, content: &str) {
        Mock::given(method("POST"))
            .and(path_regex("^/ai/v1/chat/completions$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": content}}]
            })))
            .mount(&self.mock)
            .await;
    }

    /// POST one update to the webhook endpoint, returning status and body
    pub async fn post_webhook(&self, token: Option<&str>, update: &Value) -> (StatusCode, Value) {
        let uri = match token {
            Some(token) => format!("/webhook?token={token}"),
            None => "/webhook".to_string(),
        };
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(update.to_string()))
            .unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    /// Bodies of all sendMessage calls the mock Telegram server received
    pub async fn sent_messages(&self) -> Vec<Value> {
        self.mock
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|req| req.url.path().to_lowercase().ends_with("/sendmessage"))
            .map(|req| serde_json::from_slice(&req.body).unwrap_or(Value::Null))
            .collect()
    }

    /// Paths of every request the mock server received, lowercased
    pub async fn requested_paths(&self) -> Vec<String> {
        self.mock
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .map(|req| req.url.path().to_lowercase())
            .collect()
    }

    // ---- seeding helpers (dashboard-owned tables, written directly) ----

    pub fn seed_project(&self, id: &str, token: &str, status: &str) {
        self.conn()
            .execute(
                "INSERT INTO bot_projects (id, name, description, context, telegram_bot_token, is_active, bot_status, created_at)
                 VALUES (?1, ?2, 'A test bot', 'testing context', ?3, 1, ?4, ?5)",
                rusqlite::params![id, format!("bot-{id}"), token, status, chrono::Utc::now().to_rfc3339()],
            )
            .unwrap();
    }

    pub fn seed_command(&self, project_id: &str, command: &str, response_type: &str, content: &str, metadata: Option<&str>) {
        self.conn()
            .execute(
                "INSERT INTO bot_commands
                 (id, project_id, command, response_type, response_content, response_metadata, order_index, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?1)",
                rusqlite::params![uuid::Uuid::new_v4().to_string(), project_id, command, response_type, content, metadata],
            )
            .unwrap();
    }

    pub fn seed_intent(&self, project_id: &str, name: &str, phrases: &[&str], action_type: &str, action_config: &Value) {
        self.conn()
            .execute(
                "INSERT INTO bot_intents
                 (id, project_id, intent_name, training_phrases, action_type, action_config, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?1)",
                rusqlite::params![
                    uuid::Uuid::new_v4().to_string(),
                    project_id,
                    name,
                    serde_json::to_string(phrases).unwrap(),
                    action_type,
                    action_config.to_string()
                ],
            )
            .unwrap();
    }

    pub fn seed_flow(&self, project_id: &str, id: &str, trigger_type: &str, trigger_value: &str, steps: &Value, priority: i64) {
        self.conn()
            .execute(
                "INSERT INTO conversation_flows
                 (id, project_id, name, trigger_type, trigger_value, flow_definition, priority, created_at)
                 VALUES (?1, ?2, ?1, ?3, ?4, ?5, ?6, ?1)",
                rusqlite::params![id, project_id, trigger_type, trigger_value, json!({"steps": steps}).to_string(), priority],
            )
            .unwrap();
    }

    pub fn seed_integration(&self, project_id: &str, id: &str, base_url: &str, auth_type: &str, credentials: &Value, mapping: Option<&Value>) {
        self.conn()
            .execute(
                "INSERT INTO api_integrations
                 (id, project_id, name, endpoint_base_url, auth_type, credentials, mapping_config, created_at)
                 VALUES (?1, ?2, ?1, ?3, ?4, ?5, ?6, ?1)",
                rusqlite::params![
                    id,
                    project_id,
                    base_url,
                    auth_type,
                    credentials.to_string(),
                    mapping.map(|m| json!({"response_mapping": m}).to_string())
                ],
            )
            .unwrap();
    }

    // ---- assertion helpers ----

    pub fn event_count(&self, project_id: &str, event_type: &str) -> i64 {
        botforge::storage::events::count_by_type(&self.conn(), project_id, event_type).unwrap()
    }

    pub fn metric(&self, project_id: &str, name: &str) -> i64 {
        let today = botforge::storage::metrics::today();
        botforge::storage::metrics::value(&self.conn(), project_id, name, &today).unwrap()
    }

    pub fn state(&self, user_id: &str, project_id: &str) -> Option<botforge::storage::states::ConversationState> {
        botforge::storage::states::get(&self.conn(), user_id, project_id).unwrap()
    }
}

async fn mount_telegram_mocks(server: &MockServer) {
    let message_result = json!({
        "ok": true,
        "result": {
            "message_id": 1,
            "date": 1700000000,
            "chat": {"id": TEST_CHAT_ID, "type": "private", "first_name": "Test"},
            "text": "ok"
        }
    });
    Mock::given(method("POST"))
        .and(path_regex(r"(?i)^/bot[^/]+/sendmessage$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(message_result))
        .mount(server)
        .await;

    let true_result = json!({"ok": true, "result": true});
    Mock::given(method("POST"))
        .and(path_regex(r"(?i)^/bot[^/]+/answercallbackquery$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(true_result.clone()))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path_regex(r"(?i)^/bot[^/]+/answerprecheckoutquery$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(true_result))
        .mount(server)
        .await;
}

/// A private-chat text message update, exactly as Telegram would POST it
pub fn message_update(update_id: i64, text: &str) -> Value {
    json!({
        "update_id": update_id,
        "message": {
            "message_id": update_id,
            "date": 1700000000,
            "chat": {"id": TEST_CHAT_ID, "type": "private", "first_name": "Test"},
            "from": {"id": TEST_USER_ID, "is_bot": false, "first_name": "Test", "username": "tester"},
            "text": text
        }
    })
}

/// An inline-keyboard callback query update
pub fn callback_update(update_id: i64, data: &str) -> Value {
    json!({
        "update_id": update_id,
        "callback_query": {
            "id": format!("cb{update_id}"),
            "from": {"id": TEST_USER_ID, "is_bot": false, "first_name": "Test", "username": "tester"},
            "chat_instance": "test-chat-instance",
            "data": data,
            "message": {
                "message_id": 77,
                "date": 1700000000,
                "chat": {"id": TEST_CHAT_ID, "type": "private", "first_name": "Test"},
                "text": "pick one"
            }
        }
    })
}

/// A payment pre-checkout query update
pub fn pre_checkout_update(update_id: i64) -> Value {
    json!({
        "update_id": update_id,
        "pre_checkout_query": {
            "id": format!("pcq{update_id}"),
            "from": {"id": TEST_USER_ID, "is_bot": false, "first_name": "Test", "username": "tester"},
            "currency": "USD",
            "total_amount": 500,
            "invoice_payload": "plan_premium"
        }
    })
}
