//! BotForge runtime - webhook dispatcher for dashboard-built Telegram bots
//!
//! This library contains the bot runtime: a multi-tenant webhook endpoint
//! that resolves inbound Telegram updates against a project's configured
//! commands, intents, and conversation flows, sends the reply, and records
//! analytics.
//!
//! # Module Structure
//!
//! - `core`: configuration, errors, logging, process metrics, web server
//! - `storage`: database pool and per-entity read/write operations
//! - `dispatch`: update classification, dispatch resolution, flow engine
//! - `telegram`: outbound Telegram Bot API gateway
//! - `ai`: AI fallback adapter
//! - `telemetry`: bot event log and daily metric counters

#![allow(clippy::too_many_arguments)]

pub mod ai;
pub mod cli;
pub mod core;
pub mod dispatch;
pub mod storage;
pub mod telegram;
pub mod telemetry;

// Re-export commonly used types for convenience
pub use core::{config, AppError, AppResult};
pub use dispatch::Dispatcher;
pub use storage::{create_pool, get_connection, DbConnection, DbPool};
