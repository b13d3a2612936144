use anyhow::Result;
use dotenvy::dotenv;
use std::sync::Arc;
use url::Url;

use botforge::ai::AiGateway;
use botforge::cli::{Cli, Commands};
use botforge::core::web_server::{start_web_server, AppState};
use botforge::core::{config, init_logger};
use botforge::storage::create_pool;
use botforge::telegram::Gateway;
use botforge::Dispatcher;

/// Main entry point for the webhook runtime
///
/// # Errors
/// Returns an error if initialization fails (logging, database, HTTP client).
#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse_args();

    // Load environment variables from .env if present, before any config is read
    let _ = dotenv();

    // Set up global panic handler so a panicking handler is logged instead
    // of silently unwinding inside the server
    std::panic::set_hook(Box::new(|panic_info| {
        log::error!("Panic caught: {:?}", panic_info);
        if let Some(location) = panic_info.location() {
            log::error!("Panic at {}:{}:{}", location.file(), location.line(), location.column());
        }
    }));

    // Initialize logger (console + file)
    init_logger(&config::LOG_FILE_PATH)?;

    match cli.command {
        Some(Commands::Run { port, database }) => run_server(port, database).await,
        None => run_server(8080, None).await,
    }
}

async fn run_server(port: u16, database: Option<String>) -> Result<()> {
    let database_path = database.unwrap_or_else(|| config::DATABASE_PATH.clone());
    log::info!("Opening database at {}", database_path);
    let pool = Arc::new(create_pool(&database_path)?);

    let http = reqwest::Client::builder()
        .timeout(config::network::send_timeout())
        .build()?;

    let api_url = match config::TELEGRAM_API_URL.as_deref() {
        Some(raw) => {
            let url = Url::parse(raw).map_err(|e| anyhow::anyhow!("Invalid TELEGRAM_API_URL: {}", e))?;
            log::info!("Using custom Bot API URL: {}", url);
            Some(url)
        }
        None => None,
    };

    let gateway = Gateway::new(http.clone(), api_url);
    let ai = AiGateway::new(http.clone());
    let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&pool), gateway, ai, http));

    let state = AppState { db: pool, dispatcher };
    start_web_server(port, state)
        .await
        .map_err(|e| anyhow::anyhow!("Web server failed: {}", e))
}
