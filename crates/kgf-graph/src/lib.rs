//! # KGF Graph
//!
//! Neo4j access for the knowledge graph federation layer.
//!
//! Provides keyword search over the configured node label and neighbourhood
//! traversal around a named node, exposed through the
//! [`GraphStore`](kgf_core::GraphStore) contract.

pub mod client;
pub mod queries;
pub mod store;

pub use client::{GraphClient, GraphConfig, GraphCounts};
pub use store::{connect_graph_store, DisconnectedGraphStore, Neo4jGraphStore};
