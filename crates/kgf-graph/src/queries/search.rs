//! Keyword search over labelled nodes.
//!
//! Case-insensitive substring match on `name`; each hit carries its total
//! degree so callers can tell whether a neighbourhood was cut short.

use anyhow::Result;
use kgf_core::GraphNode;
use neo4rs::{Node, Query};

use super::{sanitize_label, to_graph_node};
use crate::GraphClient;

/// Search nodes with `label` whose name contains `query_text`. A blank
/// query lists every labelled node up to `limit`.
pub async fn search_label(
    client: &GraphClient,
    label: &str,
    query_text: &str,
    limit: usize,
) -> Result<Vec<GraphNode>> {
    let label = sanitize_label(label);
    if label.is_empty() {
        return Ok(Vec::new());
    }

    let query = Query::new(format!(
        "MATCH (n:`{}`)
         WHERE n.name IS NOT NULL AND toLower(n.name) CONTAINS toLower($query)
         OPTIONAL MATCH (n)-[r]-()
         WITH n, count(r) as degree
         RETURN n as node, degree
         ORDER BY n.name
         LIMIT $limit",
        label
    ))
    .param("query", query_text.trim())
    .param("limit", limit as i64);

    let rows = client.query(query).await?;
    let mut nodes = Vec::with_capacity(rows.len());
    for row in rows {
        let Ok(node) = row.get::<Node>("node") else {
            continue;
        };
        let degree: i64 = row.get("degree").unwrap_or(0);
        if let Some(node) = to_graph_node(&node, degree) {
            nodes.push(node);
        }
    }
    Ok(nodes)
}
