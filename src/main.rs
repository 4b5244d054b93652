//! Emoji proxy
//!
//! A forward HTTP proxy built with Tokio and Axum that fetches the requested
//! page, appends a decoration after every six-letter word in its text, and
//! relays the result.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client ──GET http://origin/page──▶ ┌──────────┐   GET   ┌──────────┐
//!                                        │  http    │────────▶│  origin  │
//!                                        │ handler  │◀────────│  server  │
//!                                        └────┬─────┘         └──────────┘
//!                                             │ body
//!                                             ▼
//!                                        ┌──────────┐   ┌────────────┐
//!                                        │ rewrite  │──▶│ sequencer  │
//!                                        │ document │   │ 😀 😍 😈 … │
//!                                        └────┬─────┘   └────────────┘
//!                                             │ html
//!                                             ▼
//!     Client ◀──status + headers + body── header filter
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use emoji_proxy::config::{load_config, validate_config, ConfigError, ProxyConfig};
use emoji_proxy::http::HttpServer;
use emoji_proxy::lifecycle::{signals, Shutdown};
use emoji_proxy::observability::{logging, metrics};

#[derive(Parser, Debug)]
#[command(name = "emoji-proxy", version, about = "Decorating forward HTTP proxy")]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`.
    #[arg(short, long)]
    listen: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };
    if let Some(listen) = cli.listen {
        config.listener.bind_address = listen;
        validate_config(&config).map_err(ConfigError::Validation)?;
    }

    logging::init_logging(&config.observability);
    tracing::info!("emoji-proxy v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        config_file = ?cli.config,
        bind_address = %config.listener.bind_address,
        max_connections = config.listener.max_connections,
        request_timeout_secs = config.upstream.request_timeout_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    signals::spawn_signal_handler(shutdown);

    let server = HttpServer::new(config)?;
    server.run(listener, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
