//! CLI command definitions and handlers.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use kgf_db::SqliteEntityStore;
use kgf_federation::{CancellationToken, FederationGateway};
use kgf_graph::Neo4jGraphStore;

use crate::config::AppConfig;

pub mod detail;
pub mod search;
pub mod serve;
pub mod status;
pub mod subgraph;

/// Knowledge Graph Federation - query two stores as one graph
#[derive(Parser)]
#[command(name = "kgf")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Config file (defaults to ./kgf.toml when present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Entity database path, overrides the config file
    #[arg(long, global = true, env = "KGF_DB_PATH")]
    pub db: Option<PathBuf>,

    /// Print JSON instead of formatted output
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Search both stores by keyword
    Search(search::SearchArgs),

    /// Show an entity and its relationships
    Detail(detail::DetailArgs),

    /// Assemble the subgraph around an entity
    Subgraph(subgraph::SubgraphArgs),

    /// Start the HTTP API server
    Serve(serve::ServeArgs),

    /// Show backend connectivity and counts
    Status,
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        let mut config = AppConfig::load(self.config.as_deref())?;
        if let Some(db) = self.db {
            config.entity_store.path = db;
        }

        match self.command {
            Commands::Search(args) => search::execute(args, &config, self.json).await,
            Commands::Detail(args) => detail::execute(args, &config, self.json).await,
            Commands::Subgraph(args) => subgraph::execute(args, &config, self.json).await,
            Commands::Serve(args) => serve::execute(args, config).await,
            Commands::Status => status::execute(&config, self.json).await,
        }
    }
}

/// Open both backends. The graph store degrades to a disconnected stand-in
/// when Neo4j cannot be reached.
pub(crate) struct Backends {
    pub entity: SqliteEntityStore,
    pub graph: Arc<dyn kgf_core::GraphStore>,
    pub live_graph: Option<Neo4jGraphStore>,
}

impl Backends {
    pub async fn open(config: &AppConfig) -> Result<Self> {
        let entity = SqliteEntityStore::open(&config.entity_store).with_context(|| {
            format!(
                "Failed to open entity database {}",
                config.entity_store.path.display()
            )
        })?;
        let (graph, live_graph) = kgf_graph::connect_graph_store(&config.graph).await;
        Ok(Self {
            entity,
            graph,
            live_graph,
        })
    }

    pub fn gateway(&self, config: &AppConfig) -> Result<FederationGateway> {
        FederationGateway::new(
            Arc::new(self.entity.clone()),
            self.graph.clone(),
            config.federation.clone(),
        )
        .context("Invalid federation settings")
    }
}

/// Build the gateway for a one-shot query.
pub(crate) async fn open_gateway(config: &AppConfig) -> Result<FederationGateway> {
    Backends::open(config).await?.gateway(config)
}

/// Token cancelled by Ctrl+C.
pub(crate) fn interrupt_token() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, cancelling in-flight requests");
            trigger.cancel();
        }
    });
    cancel
}
