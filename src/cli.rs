use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "botforge")]
#[command(author, version, about = "Webhook runtime for dashboard-built Telegram bots", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the webhook server
    Run {
        /// Port for the webhook HTTP server
        #[arg(long, default_value_t = 8080)]
        port: u16,

        /// Path to the SQLite database file (overrides BOTFORGE_DB)
        #[arg(long)]
        database: Option<String>,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
