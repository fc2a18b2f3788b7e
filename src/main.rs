//! Spam Detection Gateway
//!
//! Sits between clients and the classification backend and keeps a failing
//! backend from taking the gateway down with it.
//!
//! # Architecture Overview
//!
//! ```text
//!                          ┌──────────────────────────────────────────────────┐
//!                          │                     GATEWAY                      │
//!                          │                                                  │
//!     Client Request       │  ┌──────────┐   ┌────────────┐   ┌────────────┐  │
//!     ─────────────────────┼─▶│ http     │──▶│ security   │──▶│ detection  │  │
//!                          │  │ server   │   │ rate limit │   │orchestrator│  │
//!                          │  └──────────┘   │ credential │   └─────┬──────┘  │
//!                          │                 └────────────┘         │         │
//!                          │                                        ▼         │
//!                          │                 ┌────────────┐   ┌────────────┐  │
//!                          │                 │ resilience │◀──│ upstream   │──┼──▶ Backend
//!                          │                 │ breaker +  │   │ client     │  │
//!                          │                 │ deadline   │   └────────────┘  │
//!                          │                 └────────────┘                   │
//!     Client Response      │  ┌──────────┐   ┌────────────┐                   │
//!     ◀────────────────────┼──│ response │◀──│ classify   │                   │
//!                          │  └──────────┘   └────────────┘                   │
//!                          └──────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;
use tokio::net::TcpListener;

use spam_gateway::config::load_config;
use spam_gateway::lifecycle::{wait_for_signal, Shutdown};
use spam_gateway::observability::{logging, metrics};
use spam_gateway::HttpServer;

#[derive(Parser)]
#[command(name = "spam-gateway", version, about = "Resilient gateway for the spam classification backend")]
struct Args {
    /// Path to a TOML configuration file.
    #[arg(short, long, env = "GATEWAY_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;

    logging::init_logging(&config.observability);
    tracing::info!("spam-gateway v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.base_url,
        failure_threshold = config.circuit_breaker.failure_threshold,
        open_timeout_ms = config.circuit_breaker.open_timeout_ms,
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

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config)?;
    let server_shutdown = shutdown.subscribe();

    let signals = shutdown.clone();
    tokio::spawn(async move {
        wait_for_signal(&signals).await;
    });

    server.run(listener, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
