//! Web server command.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use kgf_federation::CancellationToken;
use kgf_web::AppState;

use super::Backends;
use crate::config::AppConfig;

#[derive(Args)]
pub struct ServeArgs {
    /// Port to listen on, overrides the config file
    #[arg(long)]
    pub port: Option<u16>,

    /// Host to bind to, overrides the config file
    #[arg(long)]
    pub host: Option<String>,

    /// Also write logs to this file
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

pub async fn execute(args: ServeArgs, mut config: AppConfig) -> Result<()> {
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(host) = args.host {
        config.server.host = host;
    }

    let backends = Backends::open(&config).await?;
    let gateway = Arc::new(backends.gateway(&config)?);

    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutting down");
            trigger.cancel();
        }
    });

    let graph_status = if backends.live_graph.is_some() {
        config.graph.uri.green()
    } else {
        "unavailable (degraded mode)".yellow()
    };

    println!();
    println!("  {} {}", "KGF".cyan().bold(), "Federation Server".bold());
    println!();
    println!(
        "  {}       http://{}:{}/api",
        "API".green(),
        config.server.host,
        config.server.port
    );
    println!(
        "  {}  {}",
        "Entities".green(),
        config.entity_store.path.display()
    );
    println!("  {}     {}", "Graph".green(), graph_status);
    println!();
    println!("  {}", "Ctrl+C to stop".dimmed());
    println!();

    let state = AppState::new(gateway, &config.server, shutdown.clone());
    kgf_web::run_server(state, &config.server, shutdown).await?;

    Ok(())
}
