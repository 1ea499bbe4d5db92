//! Delegated transaction relay (v1)
//!
//! Composes, signs and broadcasts Counterparty transactions on behalf of
//! users whose keys are derived from their mnemonic passphrase.
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌──────────────────────────────────────────────────────┐
//!                         │                    TX RELAY                          │
//!                         │                                                      │
//!     POST /v1/payments   │  ┌─────────┐    ┌────────────┐    ┌──────────────┐   │
//!     ────────────────────┼─▶│  http   │───▶│ dispatcher │───▶│ coordinator  │   │
//!                         │  │ server  │    │ (bounded)  │    │    saga      │   │
//!     202 + paymentId     │  └─────────┘    └────────────┘    └──────┬───────┘   │
//!     ◀───────────────────┼──────┘                                   │           │
//!                         │          ┌──────────────┬───────────────┼──────────┐ │
//!                         │          ▼              ▼               ▼          ▼ │
//!                         │    ┌──────────┐  ┌────────────┐  ┌──────────┐ ┌──────┐│
//!                         │    │ address  │  │   ledger   │  │  signer  │ │ node ││──▶ bitcoind
//!                         │    │  locks   │  │  composer  │  │ + keys   │ │      ││
//!                         │    └──────────┘  └─────┬──────┘  └──────────┘ └──────┘│
//!                         │                        │                              │
//!                         │                        └──▶ counterparty RPC          │
//!                         │                                                      │
//!                         │  ┌────────────────────────────────────────────────┐ │
//!                         │  │ persistence (sqlite) · config · observability  │ │
//!                         │  │ resilience (retry/backoff) · lifecycle         │ │
//!                         │  └────────────────────────────────────────────────┘ │
//!                         └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;

use tx_relay::config::load_config;
use tx_relay::http::HttpServer;
use tx_relay::lifecycle::signals::spawn_signal_listener;
use tx_relay::lifecycle::{build_services, Shutdown};
use tx_relay::observability::{logging, metrics};

/// Deadline for in-flight sagas once the listener has stopped.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Parser)]
#[command(name = "tx-relay")]
#[command(about = "Delegated Counterparty transaction relay", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "relay.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Configuration errors are fatal before logging exists
    let config = load_config(&cli.config)?;
    logging::init_logging(&config.observability)?;

    tracing::info!("tx-relay v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        environment = ?config.environment,
        bind_address = %config.listener.bind_address,
        max_in_flight = config.coordinator.max_in_flight,
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

    let services = build_services(&config)?;

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    spawn_signal_listener(shutdown.clone());

    let server = HttpServer::new(services.app_state(), &config.listener);
    server.run(listener, shutdown.wait()).await?;

    tracing::info!(in_flight = services.dispatcher.in_flight(), "Draining operations");
    if tokio::time::timeout(DRAIN_TIMEOUT, services.dispatcher.drain()).await.is_err() {
        tracing::warn!(
            in_flight = services.dispatcher.in_flight(),
            "Drain deadline reached, abandoning operations"
        );
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
