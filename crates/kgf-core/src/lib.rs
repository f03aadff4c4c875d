//! KGF Core Library
//!
//! Data model, error taxonomy and identity reconciliation for the
//! knowledge graph federation layer. Backend crates implement the
//! [`store::EntityStore`] and [`store::GraphStore`] contracts defined here.

pub mod config;
pub mod error;
pub mod model;
pub mod normalize;
pub mod reconcile;
pub mod store;

pub use config::FederationConfig;
pub use error::{KgfError, KgfResult};
pub use model::{
    AttributeValue, Attributes, Confidence, Direction, Entity, EntityId, EntityRelationship,
    EntityType, GraphEdge, GraphNode, IdentityKey, NodeGraph, Provenance, ReconciledEntity,
    Sources, Subgraph, SubgraphNode, TruncationReason,
};
pub use normalize::normalize_name;
pub use reconcile::Reconciler;
pub use store::{EntityStore, GraphStore};
