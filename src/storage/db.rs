use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, Result};

use crate::core::config;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConnection = PooledConnection<SqliteConnectionManager>;

/// Create a new database connection pool
///
/// Initializes a connection pool and ensures the schema exists. Every
/// connection gets a busy timeout so concurrent webhook invocations queue
/// on SQLite's write lock instead of failing.
///
/// # Arguments
///
/// * `database_path` - Path to SQLite database file
///
/// # Returns
///
/// Returns a `DbPool` on success or an `r2d2::Error` if pool creation fails.
pub fn create_pool(database_path: &str) -> Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::file(database_path).with_init(|conn| {
        conn.busy_timeout(config::database::busy_timeout())?;
        // journal_mode reports the resulting mode back, so plain
        // pragma_update would reject it
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(())
    });
    let pool = Pool::builder()
        .max_size(config::database::MAX_POOL_SIZE)
        .build(manager)?;

    // Ensure schema is up to date on first connection
    let conn = pool.get()?;
    if let Err(e) = migrate_schema(&conn) {
        log::warn!("Failed to migrate schema: {}", e);
        // Don't fail on migration errors, as they might be expected
    }

    Ok(pool)
}

/// Get a connection from the pool
///
/// The connection is automatically returned to the pool when dropped.
pub fn get_connection(pool: &DbPool) -> Result<DbConnection, r2d2::Error> {
    pool.get()
}

/// Create all runtime tables when they don't exist yet
///
/// The dashboard owns the authoritative schema for the configuration
/// tables; this keeps a standalone runtime (and the test suite) bootable
/// against an empty database file.
pub fn migrate_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS bot_projects (
            id                 TEXT PRIMARY KEY,
            name               TEXT NOT NULL,
            description        TEXT,
            context            TEXT,
            telegram_bot_token TEXT,
            bot_username       TEXT,
            is_active          INTEGER NOT NULL DEFAULT 1,
            bot_status         TEXT NOT NULL DEFAULT 'draft',
            created_at         TEXT NOT NULL,
            updated_at         TEXT
        );
        CREATE TABLE IF NOT EXISTS bot_commands (
            id                TEXT PRIMARY KEY,
            project_id        TEXT NOT NULL,
            command           TEXT NOT NULL,
            description       TEXT,
            response_type     TEXT NOT NULL DEFAULT 'text',
            response_content  TEXT NOT NULL DEFAULT '',
            response_metadata TEXT,
            order_index       INTEGER NOT NULL DEFAULT 0,
            is_active         INTEGER NOT NULL DEFAULT 1,
            created_at        TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS bot_intents (
            id               TEXT PRIMARY KEY,
            project_id       TEXT NOT NULL,
            intent_name      TEXT NOT NULL,
            training_phrases TEXT NOT NULL DEFAULT '[]',
            parameters       TEXT,
            action_type      TEXT NOT NULL DEFAULT 'ai_response',
            action_config    TEXT,
            is_active        INTEGER NOT NULL DEFAULT 1,
            created_at       TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS conversation_flows (
            id              TEXT PRIMARY KEY,
            project_id      TEXT NOT NULL,
            name            TEXT NOT NULL,
            description     TEXT,
            trigger_type    TEXT NOT NULL,
            trigger_value   TEXT NOT NULL,
            flow_definition TEXT NOT NULL,
            priority        INTEGER NOT NULL DEFAULT 0,
            is_active       INTEGER NOT NULL DEFAULT 1,
            created_at      TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS conversation_states (
            telegram_user_id TEXT NOT NULL,
            project_id       TEXT NOT NULL,
            current_flow_id  TEXT NOT NULL,
            current_step     TEXT NOT NULL,
            context          TEXT NOT NULL DEFAULT '{}',
            started_at       TEXT NOT NULL,
            updated_at       TEXT NOT NULL,
            expires_at       TEXT NOT NULL,
            PRIMARY KEY (telegram_user_id, project_id)
        );
        CREATE TABLE IF NOT EXISTS bot_events (
            id               INTEGER PRIMARY KEY AUTOINCREMENT,
            project_id       TEXT NOT NULL,
            event_type       TEXT NOT NULL,
            telegram_user_id TEXT,
            event_data       TEXT,
            created_at       TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_bot_events_project_user
            ON bot_events (project_id, telegram_user_id, event_type);
        CREATE TABLE IF NOT EXISTS bot_analytics (
            project_id   TEXT NOT NULL,
            metric_name  TEXT NOT NULL,
            metric_date  TEXT NOT NULL,
            metric_value INTEGER NOT NULL DEFAULT 0,
            created_at   TEXT,
            PRIMARY KEY (project_id, metric_name, metric_date)
        );
        CREATE TABLE IF NOT EXISTS api_integrations (
            id                TEXT PRIMARY KEY,
            project_id        TEXT NOT NULL,
            name              TEXT NOT NULL,
            endpoint_base_url TEXT NOT NULL,
            auth_type         TEXT NOT NULL DEFAULT 'none',
            credentials       TEXT,
            mapping_config    TEXT,
            is_active         INTEGER NOT NULL DEFAULT 1,
            created_at        TEXT NOT NULL
        );",
    )?;
    Ok(())
}
