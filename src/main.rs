//! ip-gate: IP allow-list front for an administrative web interface.
//!
//! # Architecture Overview
//!
//! ```text
//!                       ┌───────────────────────────────────────────────┐
//!                       │                    IP GATE                     │
//!                       │                                                │
//!   Client Request      │  ┌──────────┐   ┌────────────┐   ┌──────────┐ │
//!   ────────────────────┼─▶│  http    │──▶│  access    │──▶│ forward  │─┼──▶ Admin
//!                       │  │  server  │   │  gate      │   │ handler  │ │    Application
//!                       │  └──────────┘   └─────┬──────┘   └──────────┘ │
//!                       │                       │ denied                 │
//!   403 Forbidden       │                       ▼                        │
//!   ◀───────────────────┼────────────────────────                        │
//!                       │                                                │
//!                       │  config (watch + reload) · observability ·     │
//!                       │  lifecycle (signals, graceful shutdown)        │
//!                       └───────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use ip_gate::access::AccessGate;
use ip_gate::config::{load_config, ConfigWatcher};
use ip_gate::http::HttpServer;
use ip_gate::lifecycle::{signals, Shutdown};
use ip_gate::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "ip-gate")]
#[command(about = "IP allow-list gate in front of an administrative web interface", long_about = None)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "ip-gate.toml")]
    config: PathBuf,

    /// Do not reload the allow-list when the configuration file changes.
    #[arg(long)]
    no_watch: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = load_config(&args.config)?;
    logging::init(&config.observability.log_level);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = ?args.config,
        "ip-gate starting"
    );

    // The recorder must exist before the gate records its allow-list gauges.
    if config.observability.metrics_enabled {
        let addr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    // A missing allow-list aborts startup here.
    let gate = Arc::new(AccessGate::from_config(&config.access)?);

    let (watcher, config_updates) = ConfigWatcher::new(&args.config);
    let _watcher = if args.no_watch {
        None
    } else {
        Some(watcher.run()?)
    };

    let shutdown = Shutdown::new();
    tokio::spawn(signals::shutdown_on_signal(shutdown.clone()));

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(
        address = %listener.local_addr()?,
        upstream = %config.upstream.address,
        "Listening for connections"
    );

    let server = HttpServer::new(&config, gate)?;
    server.run(listener, config_updates, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
