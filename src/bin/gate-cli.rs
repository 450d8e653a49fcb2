//! Offline tooling for ip-gate configurations.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::json;

use ip_gate::access::{AccessGate, AllowList, GateError, RequestContext};
use ip_gate::config::load_config;
use ip_gate::http::middleware::servlet_path;
use ip_gate::observability::logging;

#[derive(Parser)]
#[command(name = "gate-cli")]
#[command(about = "Inspect and test ip-gate allow-lists", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "ip-gate.toml")]
    config: PathBuf,

    /// Log level for diagnostics on stderr.
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decide a single request against the configured gate
    Check {
        /// Remote address of the caller
        #[arg(short, long)]
        remote: String,
        /// Request path
        #[arg(short, long, default_value = "/")]
        path: String,
    },
    /// List accepted and rejected allow-list entries
    Validate,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    logging::init(&cli.log_level);

    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Check { remote, path } => {
            let gate = AccessGate::from_config(&config.access)?;
            let route = servlet_path(&path);
            let verdict = gate
                .decide(&RequestContext {
                    remote_addr: &remote,
                    path: route,
                })
                .await;
            let report = json!({
                "remote": remote,
                "path": path,
                "servlet_path": route,
                "verdict": verdict,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Validate => {
            let raw = config
                .access
                .allowed_hosts
                .as_deref()
                .ok_or(GateError::MissingAllowList)?;
            let list = AllowList::build(raw);
            let report = json!({
                "entries": list.entries().iter().map(ToString::to_string).collect::<Vec<_>>(),
                "rejected": list.rejected().iter().map(|r| json!({
                    "token": r.token,
                    "error": r.error.to_string(),
                })).collect::<Vec<_>>(),
                "exempt_paths": config.access.exempt_paths,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
            if !list.rejected().is_empty() {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
