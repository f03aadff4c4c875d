//! [`GraphStore`] implementations.
//!
//! Driver failures of any kind surface as `StoreUnavailable` so the
//! federation layer can fall back to entity-only results.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kgf_core::{GraphStore, GraphNode, KgfError, KgfResult, NodeGraph, Provenance};
use tracing::{debug, info, warn};

use crate::client::{GraphClient, GraphConfig, GraphCounts};
use crate::queries::{explore, search};

fn unavailable(err: anyhow::Error) -> KgfError {
    KgfError::unavailable(Provenance::GraphStore, format!("{:#}", err))
}

/// Graph store backed by a live Neo4j connection.
#[derive(Clone)]
pub struct Neo4jGraphStore {
    client: GraphClient,
    label: String,
    search_limit: usize,
}

impl Neo4jGraphStore {
    pub fn new(client: GraphClient, config: &GraphConfig) -> Self {
        Self {
            client,
            label: config.label.clone(),
            search_limit: config.search_limit.max(1),
        }
    }

    /// Node and relationship totals.
    pub async fn counts(&self) -> KgfResult<GraphCounts> {
        self.client.get_counts().await.map_err(unavailable)
    }
}

#[async_trait]
impl GraphStore for Neo4jGraphStore {
    async fn search_nodes(&self, query: &str) -> KgfResult<Vec<GraphNode>> {
        let nodes = search::search_label(&self.client, &self.label, query, self.search_limit)
            .await
            .map_err(unavailable)?;
        debug!(query, hits = nodes.len(), "Graph search");
        Ok(nodes)
    }

    async fn get_node_graph(&self, name: &str, depth: u32) -> KgfResult<NodeGraph> {
        explore::node_neighborhood(&self.client, &self.label, name, depth)
            .await
            .map_err(unavailable)?
            .ok_or_else(|| KgfError::not_found(format!("Graph node: {}", name)))
    }
}

/// Stand-in used when Neo4j could not be reached at startup. Every call
/// reports the graph store as unavailable.
#[derive(Debug, Clone)]
pub struct DisconnectedGraphStore {
    reason: String,
}

impl DisconnectedGraphStore {
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }

    fn error(&self) -> KgfError {
        KgfError::unavailable(Provenance::GraphStore, self.reason.clone())
    }
}

#[async_trait]
impl GraphStore for DisconnectedGraphStore {
    async fn search_nodes(&self, _query: &str) -> KgfResult<Vec<GraphNode>> {
        Err(self.error())
    }

    async fn get_node_graph(&self, _name: &str, _depth: u32) -> KgfResult<NodeGraph> {
        Err(self.error())
    }
}

/// Connect to Neo4j within the configured timeout.
///
/// Never fails: an unreachable server yields a [`DisconnectedGraphStore`]
/// and the federation layer serves entity-only results.
pub async fn connect_graph_store(config: &GraphConfig) -> (Arc<dyn GraphStore>, Option<Neo4jGraphStore>) {
    let limit = Duration::from_millis(config.connect_timeout_ms.max(1));
    let reason = match tokio::time::timeout(limit, GraphClient::connect(config)).await {
        Ok(Ok(client)) => {
            info!(uri = %config.uri, label = %config.label, "Connected to Neo4j");
            let store = Neo4jGraphStore::new(client, config);
            return (Arc::new(store.clone()), Some(store));
        }
        Ok(Err(e)) => format!("{:#}", e),
        Err(_) => format!("connection to {} timed out after {:?}", config.uri, limit),
    };
    warn!(uri = %config.uri, %reason, "Neo4j unavailable, graph results disabled");
    (Arc::new(DisconnectedGraphStore::new(reason)), None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disconnected_store_reports_unavailable() {
        let store = DisconnectedGraphStore::new("connection refused");
        let err = store.search_nodes("zhang").await.unwrap_err();
        assert!(err.is_unavailable());
        assert_eq!(
            err,
            KgfError::unavailable(Provenance::GraphStore, "connection refused")
        );
        assert!(store.get_node_graph("Zhang Wei", 1).await.unwrap_err().is_unavailable());
    }

    #[tokio::test]
    async fn test_unreachable_server_yields_disconnected_store() {
        let config = GraphConfig {
            uri: "127.0.0.1:1".to_string(),
            connect_timeout_ms: 500,
            ..GraphConfig::default()
        };
        let (store, live) = connect_graph_store(&config).await;
        assert!(live.is_none());
        assert!(store.search_nodes("zhang").await.unwrap_err().is_unavailable());
    }

    #[test]
    fn test_config_deserializes_camel_case() {
        let config: GraphConfig = serde_json::from_str(r#"{"uri":"bolt://kg:7687","searchLimit":5}"#).unwrap();
        assert_eq!(config.uri, "bolt://kg:7687");
        assert_eq!(config.search_limit, 5);
        assert_eq!(config.label, "Teacher");
    }
}
