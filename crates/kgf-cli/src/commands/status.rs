//! Status command.

use anyhow::Result;
use colored::Colorize;
use serde_json::json;

use super::Backends;
use crate::config::AppConfig;
use crate::output;

pub async fn execute(config: &AppConfig, json: bool) -> Result<()> {
    let backends = Backends::open(config).await?;
    let entities = backends.entity.count().await?;

    let graph = match &backends.live_graph {
        Some(store) => Some(store.counts().await?),
        None => None,
    };

    if json {
        return output::print_json(&json!({
            "entityStore": {
                "path": config.entity_store.path,
                "entities": entities,
            },
            "graphStore": {
                "uri": config.graph.uri,
                "connected": graph.is_some(),
                "nodes": graph.as_ref().map(|g| g.nodes),
                "relationships": graph.as_ref().map(|g| g.relationships),
            },
        }));
    }

    println!("{}", "Entity Store".bold());
    println!("  Path:     {}", config.entity_store.path.display());
    println!("  Entities: {}", entities.to_string().cyan());
    println!();
    println!("{}", "Graph Store".bold());
    println!("  URI:      {}", config.graph.uri);
    match graph {
        Some(counts) => {
            println!("  Status:   {}", "connected".green());
            println!("  Nodes:         {}", counts.nodes.to_string().cyan());
            println!("  Relationships: {}", counts.relationships.to_string().cyan());
        }
        None => println!("  Status:   {}", "unavailable".red()),
    }

    Ok(())
}
