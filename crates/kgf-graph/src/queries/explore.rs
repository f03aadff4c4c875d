//! Neighbourhood exploration around a named node.
//!
//! Returns the center, every node within `depth` hops and the
//! relationships among them. The center is matched by name under any
//! label, preferring the searchable label when names collide.

use anyhow::Result;
use kgf_core::config::MAX_DEPTH_LIMIT;
use kgf_core::{GraphEdge, GraphNode, NodeGraph, Provenance};
use neo4rs::{Node, Query};

use super::to_graph_node;
use crate::GraphClient;

const MAX_NEIGHBORS: i64 = 500;
const MAX_EDGES: i64 = 2000;

/// Explore the neighbourhood of the node called `name`.
///
/// `Ok(None)` means no node has that name.
pub async fn node_neighborhood(
    client: &GraphClient,
    label: &str,
    name: &str,
    depth: u32,
) -> Result<Option<NodeGraph>> {
    let depth = depth.min(MAX_DEPTH_LIMIT);

    let center_query = Query::new(
        "MATCH (n {name: $name})
         OPTIONAL MATCH (n)-[r]-()
         WITH n, count(r) as degree
         RETURN n as node, degree
         ORDER BY CASE WHEN $label IN labels(n) THEN 0 ELSE 1 END
         LIMIT 1"
            .to_string(),
    )
    .param("name", name)
    .param("label", label);

    let Some(row) = client.query(center_query).await?.into_iter().next() else {
        return Ok(None);
    };
    let center = row
        .get::<Node>("node")
        .ok()
        .and_then(|node| to_graph_node(&node, row.get("degree").unwrap_or(0)));
    let Some(center) = center else {
        return Ok(None);
    };

    if depth == 0 {
        return Ok(Some(NodeGraph {
            center,
            neighbors: Vec::new(),
            edges: Vec::new(),
        }));
    }

    let nodes_query = Query::new(format!(
        "MATCH (start {{name: $name}})
         MATCH (start)-[*1..{}]-(connected)
         WHERE start <> connected AND connected.name IS NOT NULL
         WITH DISTINCT connected
         OPTIONAL MATCH (connected)-[r]-()
         WITH connected, count(r) as degree
         RETURN connected as node, degree
         ORDER BY connected.name
         LIMIT $limit",
        depth
    ))
    .param("name", name)
    .param("limit", MAX_NEIGHBORS);

    let mut neighbors: Vec<GraphNode> = Vec::new();
    for row in client.query(nodes_query).await? {
        let Ok(node) = row.get::<Node>("node") else {
            continue;
        };
        let degree: i64 = row.get("degree").unwrap_or(0);
        if let Some(node) = to_graph_node(&node, degree) {
            if node.name != center.name && !neighbors.iter().any(|n| n.name == node.name) {
                neighbors.push(node);
            }
        }
    }

    let edges_query = Query::new(format!(
        "MATCH (start {{name: $name}})
         MATCH (start)-[*0..{}]-(member)
         WITH collect(DISTINCT member) as members
         UNWIND members as a
         MATCH (a)-[r]->(b)
         WHERE b IN members AND a.name IS NOT NULL AND b.name IS NOT NULL
         RETURN DISTINCT a.name as source, b.name as target,
                COALESCE(r.type, type(r)) as rel_type, r.weight as weight
         ORDER BY source, target, rel_type
         LIMIT $limit",
        depth
    ))
    .param("name", name)
    .param("limit", MAX_EDGES);

    let mut edges = Vec::new();
    for row in client.query(edges_query).await? {
        let source: String = row.get("source").unwrap_or_default();
        let target: String = row.get("target").unwrap_or_default();
        let rel_type: String = row.get("rel_type").unwrap_or_default();
        if source.is_empty() || target.is_empty() {
            continue;
        }
        let weight: Option<f64> = row.get::<Option<f64>>("weight").ok().flatten();
        let mut edge = GraphEdge::new(source, target, rel_type, Provenance::GraphStore);
        if let Some(w) = weight {
            edge = edge.with_weight(w);
        }
        edges.push(edge);
    }

    Ok(Some(NodeGraph {
        center,
        neighbors,
        edges,
    }))
}
