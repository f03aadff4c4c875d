//! Subgraph command.

use anyhow::Result;
use clap::Args;

use crate::config::AppConfig;
use crate::output;

#[derive(Args)]
pub struct SubgraphArgs {
    /// Seed entity id or display name
    pub identity: String,

    /// Hop limit (0-5), defaults to maxDepth
    #[arg(long, allow_negative_numbers = true)]
    pub depth: Option<i64>,

    /// Node cap, overrides maxNodes
    #[arg(long)]
    pub max_nodes: Option<usize>,
}

pub async fn execute(args: SubgraphArgs, config: &AppConfig, json: bool) -> Result<()> {
    let mut config = config.clone();
    if let Some(max_nodes) = args.max_nodes {
        config.federation.max_nodes = max_nodes;
    }

    let gateway = super::open_gateway(&config).await?;
    let cancel = super::interrupt_token();

    let subgraph = gateway.get_subgraph(&args.identity, args.depth, &cancel).await?;

    if json {
        output::print_json(&subgraph)
    } else {
        output::print_subgraph(&subgraph);
        Ok(())
    }
}
