//! Terminal output formatting.

use anyhow::Result;
use colored::{ColoredString, Colorize};
use kgf_core::{Confidence, Direction, Provenance, ReconciledEntity, Sources, Subgraph, TruncationReason};
use kgf_federation::{DetailResponse, SearchResponse};
use serde::Serialize;

/// Print any response as pretty JSON on stdout.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn confidence_colored(confidence: Confidence) -> ColoredString {
    match confidence {
        Confidence::Exact => "exact".green(),
        Confidence::Normalized => "normalized".cyan(),
        Confidence::Unmatched => "unmatched".dimmed(),
    }
}

fn sides(entity: &ReconciledEntity) -> &'static str {
    match entity.sources {
        Sources::Both { .. } => "both",
        Sources::EntityOnly { .. } => "entity",
        Sources::GraphOnly { .. } => "graph",
    }
}

fn provenance_colored(provenance: Provenance) -> ColoredString {
    match provenance {
        Provenance::EntityStore => provenance.as_str().blue(),
        Provenance::GraphStore => provenance.as_str().magenta(),
    }
}

fn partial_notice(partial: bool) {
    if partial {
        println!();
        println!("{}", "One backend was unavailable; results are partial.".yellow());
    }
}

/// Print merged search results as a table.
pub fn print_search(response: &SearchResponse) {
    if response.results.is_empty() {
        println!("{}", "No matches found.".dimmed());
        partial_notice(response.partial);
        return;
    }

    println!("{:<8} {:<32} {:<12} {:<8}", "ID", "Name", "Confidence", "Sides");
    println!("{}", "─".repeat(64));

    for result in &response.results {
        let id = result
            .entity()
            .map(|e| e.id.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<8} {:<32} {:<12} {:<8}",
            id,
            truncate(&result.name, 30),
            confidence_colored(result.confidence),
            sides(result)
        );
    }
    partial_notice(response.partial);
}

/// Print one reconciled entity and its relationships.
pub fn print_detail(detail: &DetailResponse) {
    let entity = &detail.entity;
    println!("{} {}", entity.name.cyan().bold(), format!("({})", entity.key).dimmed());
    println!();
    println!("{}: {}", "Confidence".bold(), confidence_colored(entity.confidence));

    if let Some(record) = entity.entity() {
        println!("{}: {} ({})", "Entity".bold(), record.id, record.entity_type.as_str());
        for (key, value) in &record.attributes {
            println!("  {}: {}", key.dimmed(), truncate(&value.search_text(), 70));
        }
    }
    if let Some(node) = entity.node() {
        println!("{}: {} (degree {})", "Graph node".bold(), node.name, node.degree);
    }
    if !entity.collisions.is_empty() {
        let ids: Vec<String> = entity.collisions.iter().map(|id| id.to_string()).collect();
        println!("{}: {}", "Same name".bold(), ids.join(", ").yellow());
    }

    println!();
    if detail.relationships.is_empty() {
        println!("{}", "No relationships.".dimmed());
    } else {
        println!("{}", "Relationships".bold());
        for rel in &detail.relationships {
            let arrow = match rel.direction {
                Direction::Outgoing => "→",
                Direction::Incoming => "←",
            };
            println!(
                "  {} {} {}  [{}]",
                arrow,
                rel.relation_type.yellow(),
                rel.related_name,
                provenance_colored(rel.provenance)
            );
        }
    }
    partial_notice(detail.partial);
}

/// Print a subgraph grouped by depth, then its edges.
pub fn print_subgraph(subgraph: &Subgraph) {
    println!(
        "{} {}",
        "Subgraph around".bold(),
        subgraph.seed.as_str().cyan()
    );
    println!("{}", "─".repeat(50));

    let mut depth = None;
    for node in &subgraph.nodes {
        if depth != Some(node.depth) {
            depth = Some(node.depth);
            println!("{}", format!("depth {}", node.depth).dimmed());
        }
        println!(
            "  {} [{}] {}",
            node.entity.name,
            sides(&node.entity),
            confidence_colored(node.entity.confidence)
        );
    }

    if !subgraph.edges.is_empty() {
        println!();
        println!("{}", "Edges".bold());
        for edge in &subgraph.edges {
            println!(
                "  {} -[{}]-> {}  [{}]",
                edge.source,
                edge.relation_type.yellow(),
                edge.target,
                provenance_colored(edge.provenance)
            );
        }
    }

    println!();
    println!(
        "{} nodes, {} edges",
        subgraph.nodes.len(),
        subgraph.edges.len()
    );
    match subgraph.reason {
        Some(TruncationReason::Cap) => println!("{}", "Truncated: depth or node cap reached".yellow()),
        Some(TruncationReason::Degraded) => {
            println!("{}", "Truncated: a backend was unavailable".red())
        }
        None => {}
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", cut)
    }
}
