//! Webhook-facing HTTP server
//!
//! One shared endpoint serves every bot project; the bot token arrives as a
//! query parameter and selects the project. Responses are `200 {ok:true}`
//! for everything past project resolution, because Telegram re-delivers an
//! update on any non-2xx and none of the side effects here are idempotent.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use teloxide::types::Update;
use tokio::net::TcpListener;

use crate::core::metrics::{self, WEBHOOK_DURATION_SECONDS};
use crate::dispatch::Dispatcher;
use crate::storage::{get_connection, projects, DbPool};

/// Shared state for the web server
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DbPool>,
    pub dispatcher: Arc<Dispatcher>,
}

#[derive(Debug, Deserialize)]
struct WebhookParams {
    token: Option<String>,
}

/// Build the router. Exposed separately so integration tests can drive it
/// without binding a socket.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/webhook", post(webhook_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

/// Start the webhook HTTP server
pub async fn start_web_server(port: u16, state: AppState) -> Result<(), Box<dyn std::error::Error>> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = create_router(state);

    log::info!("Starting webhook server on http://{}", addr);
    log::info!("  POST /webhook?token=<bot token> - Telegram updates");
    log::info!("  GET  /health                    - Health check");
    log::info!("  GET  /metrics                   - Prometheus metrics");

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// POST /webhook?token=... - receive one Telegram update
async fn webhook_handler(
    State(state): State<AppState>,
    Query(params): Query<WebhookParams>,
    body: String,
) -> Response {
    let timer = WEBHOOK_DURATION_SECONDS.start_timer();

    let Some(token) = params.token.filter(|t| !t.is_empty()) else {
        return (StatusCode::BAD_REQUEST, Json(json!({"error": "Bot token required"}))).into_response();
    };

    let update: Update = match serde_json::from_str(&body) {
        Ok(update) => update,
        Err(e) => {
            log::warn!("Unparseable update payload: {}", e);
            return (StatusCode::BAD_REQUEST, Json(json!({"error": "Invalid update payload"}))).into_response();
        }
    };

    let project = {
        let conn = match get_connection(&state.db) {
            Ok(conn) => conn,
            Err(e) => {
                log::error!("No database connection for webhook: {}", e);
                return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": "Internal error"})))
                    .into_response();
            }
        };
        match projects::find_by_token(&conn, &token) {
            Ok(project) => project,
            Err(e) => {
                log::error!("Project lookup failed: {}", e);
                return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": "Internal error"})))
                    .into_response();
            }
        }
    };

    let Some(project) = project else {
        return (StatusCode::NOT_FOUND, Json(json!({"error": "Bot not found"}))).into_response();
    };

    if !project.is_runnable() {
        // Paused or draft bot: acknowledge and drop, no side effects
        log::info!("Dropping update for non-active project {}", project.id);
        return Json(json!({"ok": true})).into_response();
    }

    if let Err(e) = state.dispatcher.handle_update(&project, update).await {
        // Still a 2xx: a non-2xx would make Telegram re-deliver the update
        log::error!("Update handling failed for project {}: {}", project.id, e);
    }

    timer.observe_duration();
    Json(json!({"ok": true})).into_response()
}

/// GET /health - simple health check
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// GET /metrics - Prometheus metrics in text exposition format
async fn metrics_handler() -> Response {
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4")],
        metrics::render(),
    )
        .into_response()
}
