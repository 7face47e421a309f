//! Chatter gateway binary.

use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;
use tracing::info;

use chatter_core::tracing_init::init_tracing;
use chatter_gateway::backend::{Backend, BackendConfig};
use chatter_gateway::routes::{AppState, build_router};

#[derive(Parser, Debug)]
#[command(name = "chatter-gateway")]
#[command(version, about = "Streaming gateway between chat clients and the answer backend")]
struct Args {
    /// Address to listen on.
    #[arg(long, default_value = "127.0.0.1:8080", env = "CHATTER_ADDR")]
    addr: SocketAddr,

    /// Base URL of the answer backend.
    #[arg(long, default_value = "http://127.0.0.1:5000", env = "CHATTER_BACKEND_URL")]
    backend_url: String,

    /// Backend connect timeout in seconds.
    #[arg(long, default_value_t = 5, env = "CHATTER_CONNECT_TIMEOUT")]
    connect_timeout_secs: u64,

    /// Seconds without a backend chunk before an answer stream is closed.
    #[arg(long, default_value_t = 120, env = "CHATTER_IDLE_TIMEOUT")]
    idle_timeout_secs: u64,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "CHATTER_LOG_LEVEL")]
    log_level: String,

    /// Emit logs as JSON.
    #[arg(long, env = "CHATTER_LOG_JSON")]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_tracing(
        &format!("chatter_gateway={}", args.log_level),
        args.log_json,
    );

    info!(
        version = env!("CARGO_PKG_VERSION"),
        addr = %args.addr,
        backend = %args.backend_url,
        "Starting chatter-gateway"
    );

    let backend = Backend::new(&BackendConfig {
        base_url: args.backend_url,
        connect_timeout: Duration::from_secs(args.connect_timeout_secs),
    })?;

    let state = AppState {
        backend,
        idle_timeout: Duration::from_secs(args.idle_timeout_secs),
    };

    let listener = tokio::net::TcpListener::bind(args.addr).await?;
    axum::serve(listener, build_router(state)).await?;

    Ok(())
}
