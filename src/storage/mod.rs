//! Database pool and per-entity storage operations
//!
//! The runtime owns writes to `conversation_states`, `bot_events`, and
//! `bot_analytics`; everything else is read-only configuration produced by
//! the dashboard.

pub mod commands;
pub mod db;
pub mod events;
pub mod flows;
pub mod integrations;
pub mod intents;
pub mod metrics;
pub mod projects;
pub mod states;

// Re-exports for convenience
pub use db::{create_pool, get_connection, DbConnection, DbPool};
