//! Chatter CLI
//!
//! Terminal client for a chatter gateway. Streams answers as they are
//! generated; one-shot with a query argument, interactive otherwise.

use std::time::Duration;

use clap::Parser;
use tracing::info;

use chatter_cli::client::{GatewayClient, GatewayConfig};
use chatter_cli::headless::{self, HeadlessConfig};
use chatter_cli::repl;
use chatter_cli::session::Session;

#[derive(Parser, Debug)]
#[command(name = "chatter")]
#[command(version, about = "Chat with your documents from the terminal", long_about = None)]
struct Cli {
    /// Query to send (one-shot mode; omit for interactive)
    query: Option<String>,

    /// Gateway address
    #[arg(long, default_value = "http://127.0.0.1:8080", env = "CHATTER_GATEWAY_URL")]
    gateway_url: String,

    /// Seconds without gateway data before an exchange is abandoned
    #[arg(long, default_value_t = 120, env = "CHATTER_IDLE_TIMEOUT")]
    idle_timeout_secs: u64,

    /// Print the answer's source documents when present
    #[arg(long)]
    sources: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn", env = "CHATTER_LOG_LEVEL")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long, env = "CHATTER_LOG_JSON")]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so streamed answers on stdout stay clean
    chatter_core::tracing_init::init_tracing_stderr(
        &format!("chatter={}", cli.log_level),
        cli.log_json,
    );

    info!(version = env!("CARGO_PKG_VERSION"), "Starting chatter CLI");

    let client = GatewayClient::new(&GatewayConfig {
        base_url: cli.gateway_url.clone(),
        ..Default::default()
    })?;
    let mut session = Session::new(client, Duration::from_secs(cli.idle_timeout_secs));

    if let Some(query) = cli.query {
        headless::run(
            &mut session,
            HeadlessConfig {
                query,
                show_sources: cli.sources,
            },
        )
        .await?;
    } else {
        repl::run(&mut session).await?;
    }

    Ok(())
}
