//! Backend contracts consumed by the federation layer.
//!
//! Both stores are read-only from here. Implementations report an
//! unreachable or failing backend as [`KgfError::StoreUnavailable`] and an
//! unknown identity as [`KgfError::NotFound`]; callers rely on the
//! distinction to pick degraded mode over failure.
//!
//! [`KgfError::StoreUnavailable`]: crate::KgfError::StoreUnavailable
//! [`KgfError::NotFound`]: crate::KgfError::NotFound

pub mod memory;

use async_trait::async_trait;

use crate::error::KgfResult;
use crate::model::{Entity, EntityId, EntityRelationship, EntityType, GraphNode, NodeGraph};

/// Default cap on search and list results.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Rank entities for a keyword search: exact name, name prefix, name
/// substring, attribute match; then name, then id. Shared by every
/// entity store so ordering is identical across backends.
pub fn rank_search(entities: impl IntoIterator<Item = Entity>, keyword: &str, limit: usize) -> Vec<Entity> {
    let needle = keyword.trim().to_lowercase();
    let mut ranked: Vec<(u8, Entity)> = entities
        .into_iter()
        .filter_map(|entity| {
            if needle.is_empty() {
                return Some((0, entity));
            }
            let name = entity.name.to_lowercase();
            let relevance = if name == needle {
                0
            } else if name.starts_with(&needle) {
                1
            } else if name.contains(&needle) {
                2
            } else if entity.matches_keyword(&needle) {
                3
            } else {
                return None;
            };
            Some((relevance, entity))
        })
        .collect();

    ranked.sort_by(|(ra, a), (rb, b)| {
        ra.cmp(rb)
            .then_with(|| a.name.cmp(&b.name))
            .then_with(|| a.id.cmp(&b.id))
    });
    ranked.truncate(limit);
    ranked.into_iter().map(|(_, e)| e).collect()
}

/// Typed access to the relational store of curated entities.
#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn get_by_id(&self, id: EntityId) -> KgfResult<Entity>;

    /// Case-insensitive substring match over name and attribute values,
    /// ordered by relevance then name. An empty keyword lists everything.
    /// Bounded by the store's page size.
    async fn search(&self, keyword: &str) -> KgfResult<Vec<Entity>>;

    async fn list_by_type(&self, entity_type: EntityType) -> KgfResult<Vec<Entity>>;

    async fn list_all(&self) -> KgfResult<Vec<Entity>>;

    /// Entities whose normalized name equals `key`, ordered by id.
    async fn find_by_name_key(&self, key: &str) -> KgfResult<Vec<Entity>>;

    /// Outgoing and incoming relationships of an entity.
    async fn get_relationships(&self, id: EntityId) -> KgfResult<Vec<EntityRelationship>>;

    /// Relationships from `source` to `target`.
    async fn relationships_between(
        &self,
        source: EntityId,
        target: EntityId,
    ) -> KgfResult<Vec<EntityRelationship>>;
}

/// Typed access to the graph-native store.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Substring match on node names within the configured label.
    async fn search_nodes(&self, query: &str) -> KgfResult<Vec<GraphNode>>;

    /// The named node and its neighbours up to `depth` hops, as the store
    /// traverses them.
    async fn get_node_graph(&self, name: &str, depth: u32) -> KgfResult<NodeGraph>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AttributeValue;

    #[test]
    fn test_rank_search_orders_by_relevance_and_limits() {
        let entities = vec![
            Entity::new(1, "Optics Lab", EntityType::Organization)
                .with_attribute("director", AttributeValue::String("Li Ming".into())),
            Entity::new(2, "Wang Li", EntityType::Person),
            Entity::new(3, "Li Ming", EntityType::Person),
            Entity::new(4, "Li", EntityType::Subject),
            Entity::new(5, "Beijing", EntityType::Place),
        ];

        let ids: Vec<EntityId> = rank_search(entities.clone(), " LI ", DEFAULT_PAGE_SIZE)
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ids, vec![4, 3, 2, 1]);
        assert_eq!(rank_search(entities, "", 2).len(), 2);
    }
}
