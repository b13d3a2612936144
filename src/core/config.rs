use once_cell::sync::Lazy;
use std::env;
use std::time::Duration;

/// Configuration constants for the runtime

/// Path to the SQLite database file
/// Read from BOTFORGE_DB environment variable, defaults to "botforge.sqlite"
pub static DATABASE_PATH: Lazy<String> =
    Lazy::new(|| env::var("BOTFORGE_DB").unwrap_or_else(|_| "botforge.sqlite".to_string()));

/// Path to the log file
pub static LOG_FILE_PATH: Lazy<String> =
    Lazy::new(|| env::var("BOTFORGE_LOG_FILE").unwrap_or_else(|_| "botforge.log".to_string()));

/// Override for the Telegram Bot API base URL
/// Read from TELEGRAM_API_URL; unset means api.telegram.org.
/// Useful for local Bot API servers and for tests.
pub static TELEGRAM_API_URL: Lazy<Option<String>> = Lazy::new(|| env::var("TELEGRAM_API_URL").ok());

/// Base URL of the OpenAI-compatible chat-completions gateway used for
/// AI fallback replies. The path `/chat/completions` is appended.
pub static AI_API_URL: Lazy<String> =
    Lazy::new(|| env::var("AI_API_URL").unwrap_or_else(|_| "https://openrouter.ai/api/v1".to_string()));

/// API key for the AI gateway. Unset disables AI fallback replies.
pub static AI_API_KEY: Lazy<Option<String>> = Lazy::new(|| env::var("AI_API_KEY").ok());

/// Model identifier sent to the AI gateway
pub static AI_MODEL: Lazy<String> =
    Lazy::new(|| env::var("AI_MODEL").unwrap_or_else(|_| "google/gemini-2.0-flash-exp:free".to_string()));

/// Network timeouts
pub mod network {
    use super::Duration;

    /// Timeout for outbound Telegram Bot API calls (in seconds)
    pub const SEND_TIMEOUT_SECS: u64 = 30;

    /// Timeout for flow-step API integration calls (in seconds)
    pub const API_CALL_TIMEOUT_SECS: u64 = 15;

    /// Timeout for AI gateway calls (in seconds)
    pub const AI_TIMEOUT_SECS: u64 = 30;

    /// Telegram send timeout duration
    pub fn send_timeout() -> Duration {
        Duration::from_secs(SEND_TIMEOUT_SECS)
    }

    /// API integration call timeout duration
    pub fn api_call_timeout() -> Duration {
        Duration::from_secs(API_CALL_TIMEOUT_SECS)
    }

    /// AI gateway call timeout duration
    pub fn ai_timeout() -> Duration {
        Duration::from_secs(AI_TIMEOUT_SECS)
    }
}

/// Conversation flow configuration
pub mod flow {
    /// Minutes a started flow stays alive without completing
    pub const STATE_TTL_MINUTES: i64 = 30;

    /// Flow state time-to-live
    pub fn state_ttl() -> chrono::Duration {
        chrono::Duration::minutes(STATE_TTL_MINUTES)
    }
}

/// Database configuration
pub mod database {
    use super::Duration;

    /// Maximum connections in the r2d2 pool
    pub const MAX_POOL_SIZE: u32 = 10;

    /// SQLite busy timeout; concurrent writers queue instead of failing
    pub const BUSY_TIMEOUT_SECS: u64 = 5;

    /// Busy timeout duration
    pub fn busy_timeout() -> Duration {
        Duration::from_secs(BUSY_TIMEOUT_SECS)
    }
}
