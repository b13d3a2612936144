use thiserror::Error;

/// Error type shared across the webhook runtime.
///
/// Everything that can go wrong while turning one inbound update into a
/// reply funnels into this enum via `?`. Only `Malformed` ever surfaces as
/// a non-2xx HTTP response; the rest are acknowledged to Telegram and
/// handled internally (see the webhook handler in `core::web_server`),
/// because a non-2xx makes Telegram re-deliver the update.
#[derive(Error, Debug)]
pub enum AppError {
    /// SQLite query failed while reading bot configuration or mutating
    /// conversation state / event rows
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Could not check a connection out of the r2d2 pool
    #[error("Database pool error: {0}")]
    DatabasePool(#[from] r2d2::Error),

    /// Outbound Bot API call (send, answer callback, answer pre-checkout)
    /// rejected or unreachable
    #[error("Telegram error: {0}")]
    Telegram(#[from] teloxide::RequestError),

    /// Transport failure talking to the AI gateway or a configured API
    /// integration
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Stored JSON (flow definitions, button metadata, step configs) or an
    /// upstream response body failed to (de)serialize
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Filesystem errors, e.g. creating the log file at startup
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// No matching record: project for a token, flow for a state row,
    /// integration for an api_call step. Handled as a silent no-op or
    /// self-healing reset, never shown to the end user
    #[error("not found: {0}")]
    NotFound(String),

    /// An external collaborator answered with a failure status (AI gateway,
    /// API integration). The caller substitutes fallback text
    #[error("upstream call failed: {0}")]
    Upstream(String),

    /// Unusable inbound request: missing token or unparseable update body.
    /// The one case that maps to an HTTP 400
    #[error("malformed input: {0}")]
    Malformed(String),

    /// Wrapper for startup/wiring errors reported through anyhow
    #[error("Application error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Type alias for Result with AppError
pub type AppResult<T> = Result<T, AppError>;
