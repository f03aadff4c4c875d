//! In-memory backends.
//!
//! Used by tests and demos in place of SQLite and Neo4j. Both stores can be
//! told to fail every call or to answer slowly, which is how degraded mode
//! and per-backend timeouts are exercised.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::{rank_search, EntityStore, GraphStore, DEFAULT_PAGE_SIZE};
use crate::error::{KgfError, KgfResult};
use crate::model::{
    Direction, Entity, EntityId, EntityRelationship, EntityType, GraphEdge, GraphNode, NodeGraph,
    Provenance,
};
use crate::normalize::normalize_name;

#[derive(Debug, Clone, Default)]
struct Behavior {
    fail: bool,
    latency: Option<Duration>,
    calls: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

/// Counts a call as in flight until dropped, including when the caller
/// abandons it mid-latency.
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Behavior {
    async fn enter(&self, store: Provenance) -> KgfResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlight(&self.in_flight);
        self.peak.fetch_max(current, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if self.fail {
            return Err(KgfError::unavailable(store, "backend offline"));
        }
        Ok(())
    }
}

/// Entity store backed by ordered maps.
#[derive(Debug, Clone)]
pub struct MemoryEntityStore {
    entities: BTreeMap<EntityId, Entity>,
    relationships: Vec<(EntityId, String, EntityId)>,
    page_size: usize,
    behavior: Behavior,
}

impl Default for MemoryEntityStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryEntityStore {
    pub fn new() -> Self {
        Self {
            entities: BTreeMap::new(),
            relationships: Vec::new(),
            page_size: DEFAULT_PAGE_SIZE,
            behavior: Behavior::default(),
        }
    }

    pub fn with_entity(mut self, entity: Entity) -> Self {
        self.entities.insert(entity.id, entity);
        self
    }

    pub fn with_relationship(mut self, source: EntityId, relation_type: &str, target: EntityId) -> Self {
        self.relationships.push((source, relation_type.to_string(), target));
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Every call fails with `StoreUnavailable`.
    pub fn failing(mut self) -> Self {
        self.behavior.fail = true;
        self
    }

    /// Every call sleeps before answering.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.behavior.latency = Some(latency);
        self
    }

    /// Number of calls served so far.
    pub fn calls(&self) -> usize {
        self.behavior.calls.load(Ordering::SeqCst)
    }

    /// Most calls ever in flight at once.
    pub fn peak_concurrency(&self) -> usize {
        self.behavior.peak.load(Ordering::SeqCst)
    }

    fn relationship(&self, source: EntityId, relation_type: &str, target: EntityId, from: EntityId) -> Option<EntityRelationship> {
        let (direction, related) = if source == from {
            (Direction::Outgoing, target)
        } else {
            (Direction::Incoming, source)
        };
        self.entities.get(&related).map(|entity| EntityRelationship {
            relation_type: relation_type.to_string(),
            direction,
            related: entity.clone(),
        })
    }
}

#[async_trait]
impl EntityStore for MemoryEntityStore {
    async fn get_by_id(&self, id: EntityId) -> KgfResult<Entity> {
        self.behavior.enter(Provenance::EntityStore).await?;
        self.entities
            .get(&id)
            .cloned()
            .ok_or_else(|| KgfError::not_found(format!("Entity: {}", id)))
    }

    async fn search(&self, keyword: &str) -> KgfResult<Vec<Entity>> {
        self.behavior.enter(Provenance::EntityStore).await?;
        Ok(rank_search(self.entities.values().cloned(), keyword, self.page_size))
    }

    async fn list_by_type(&self, entity_type: EntityType) -> KgfResult<Vec<Entity>> {
        self.behavior.enter(Provenance::EntityStore).await?;
        let mut entities: Vec<Entity> = self
            .entities
            .values()
            .filter(|e| e.entity_type == entity_type)
            .cloned()
            .collect();
        entities.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        entities.truncate(self.page_size);
        Ok(entities)
    }

    async fn list_all(&self) -> KgfResult<Vec<Entity>> {
        self.behavior.enter(Provenance::EntityStore).await?;
        Ok(rank_search(self.entities.values().cloned(), "", self.page_size))
    }

    async fn find_by_name_key(&self, key: &str) -> KgfResult<Vec<Entity>> {
        self.behavior.enter(Provenance::EntityStore).await?;
        Ok(self
            .entities
            .values()
            .filter(|e| normalize_name(&e.name) == key)
            .cloned()
            .collect())
    }

    async fn get_relationships(&self, id: EntityId) -> KgfResult<Vec<EntityRelationship>> {
        self.behavior.enter(Provenance::EntityStore).await?;
        if !self.entities.contains_key(&id) {
            return Err(KgfError::not_found(format!("Entity: {}", id)));
        }
        Ok(self
            .relationships
            .iter()
            .filter(|(s, _, t)| *s == id || *t == id)
            .filter_map(|(s, rel, t)| self.relationship(*s, rel, *t, id))
            .collect())
    }

    async fn relationships_between(
        &self,
        source: EntityId,
        target: EntityId,
    ) -> KgfResult<Vec<EntityRelationship>> {
        self.behavior.enter(Provenance::EntityStore).await?;
        Ok(self
            .relationships
            .iter()
            .filter(|(s, _, t)| *s == source && *t == target)
            .filter_map(|(s, rel, t)| self.relationship(*s, rel, *t, source))
            .collect())
    }
}

/// Graph store backed by an adjacency list.
///
/// Nodes added with [`with_node`](Self::with_node) belong to the searchable
/// label; [`with_neighbor`](Self::with_neighbor) adds nodes outside it.
#[derive(Debug, Clone, Default)]
pub struct MemoryGraphStore {
    nodes: BTreeMap<String, GraphNode>,
    labelled: BTreeSet<String>,
    edges: Vec<GraphEdge>,
    behavior: Behavior,
}

impl MemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_node(mut self, node: GraphNode) -> Self {
        self.labelled.insert(node.name.clone());
        self.nodes.insert(node.name.clone(), node);
        self
    }

    pub fn with_neighbor(mut self, node: GraphNode) -> Self {
        self.nodes.insert(node.name.clone(), node);
        self
    }

    /// Add an edge; missing endpoints are created outside the label.
    pub fn with_edge(mut self, source: &str, relation_type: &str, target: &str) -> Self {
        for name in [source, target] {
            self.nodes
                .entry(name.to_string())
                .or_insert_with(|| GraphNode::new(name));
        }
        self.edges
            .push(GraphEdge::new(source, target, relation_type, Provenance::GraphStore));
        self
    }

    pub fn failing(mut self) -> Self {
        self.behavior.fail = true;
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.behavior.latency = Some(latency);
        self
    }

    pub fn calls(&self) -> usize {
        self.behavior.calls.load(Ordering::SeqCst)
    }

    pub fn peak_concurrency(&self) -> usize {
        self.behavior.peak.load(Ordering::SeqCst)
    }

    fn snapshot(&self, name: &str) -> Option<GraphNode> {
        self.nodes.get(name).map(|node| {
            let degree = self.edges.iter().filter(|e| e.touches(name)).count();
            node.clone().with_degree(degree)
        })
    }
}

#[async_trait]
impl GraphStore for MemoryGraphStore {
    async fn search_nodes(&self, query: &str) -> KgfResult<Vec<GraphNode>> {
        self.behavior.enter(Provenance::GraphStore).await?;
        let needle = query.trim().to_lowercase();
        Ok(self
            .labelled
            .iter()
            .filter(|name| name.to_lowercase().contains(&needle))
            .filter_map(|name| self.snapshot(name))
            .collect())
    }

    async fn get_node_graph(&self, name: &str, depth: u32) -> KgfResult<NodeGraph> {
        self.behavior.enter(Provenance::GraphStore).await?;
        let center = self
            .snapshot(name)
            .ok_or_else(|| KgfError::not_found(format!("Graph node: {}", name)))?;

        let mut seen: BTreeSet<String> = BTreeSet::from([name.to_string()]);
        let mut queue: VecDeque<(String, u32)> = VecDeque::from([(name.to_string(), 0)]);
        while let Some((current, hops)) = queue.pop_front() {
            if hops >= depth {
                continue;
            }
            for edge in self.edges.iter().filter(|e| e.touches(&current)) {
                let other = if edge.source == current { &edge.target } else { &edge.source };
                if seen.insert(other.clone()) {
                    queue.push_back((other.clone(), hops + 1));
                }
            }
        }

        let neighbors = seen
            .iter()
            .filter(|n| n.as_str() != name)
            .filter_map(|n| self.snapshot(n))
            .collect();
        let edges = self
            .edges
            .iter()
            .filter(|e| seen.contains(&e.source) && seen.contains(&e.target))
            .cloned()
            .collect();

        Ok(NodeGraph {
            center,
            neighbors,
            edges,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AttributeValue;

    fn entities() -> MemoryEntityStore {
        MemoryEntityStore::new()
            .with_entity(Entity::new(1, "Zhang Wei", EntityType::Person))
            .with_entity(Entity::new(2, "Zhangjiajie", EntityType::Place))
            .with_entity(
                Entity::new(3, "Optics Lab", EntityType::Organization)
                    .with_attribute("director", AttributeValue::String("Zhang Wei".into())),
            )
            .with_entity(Entity::new(4, "zhang", EntityType::Subject))
            .with_relationship(1, "works_at", 3)
    }

    #[tokio::test]
    async fn test_search_orders_by_relevance_then_name() {
        let store = entities();
        let hits = store.search("Zhang").await.unwrap();
        let ids: Vec<EntityId> = hits.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![4, 1, 2, 3]);
    }

    #[tokio::test]
    async fn test_empty_keyword_is_bounded_list() {
        let store = entities().with_page_size(2);
        assert_eq!(store.search("").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_relationships_have_direction() {
        let store = entities();
        let from_person = store.get_relationships(1).await.unwrap();
        assert_eq!(from_person[0].direction, Direction::Outgoing);
        assert_eq!(from_person[0].related.id, 3);

        let from_lab = store.get_relationships(3).await.unwrap();
        assert_eq!(from_lab[0].direction, Direction::Incoming);
        assert_eq!(from_lab[0].related.id, 1);

        assert!(matches!(store.get_relationships(99).await, Err(KgfError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_failing_store_reports_unavailable() {
        let store = entities().failing();
        let err = store.search("zhang").await.unwrap_err();
        assert!(err.is_unavailable());
    }

    #[tokio::test]
    async fn test_node_graph_respects_depth_and_cycles() {
        let graph = MemoryGraphStore::new()
            .with_node(GraphNode::new("A"))
            .with_node(GraphNode::new("B"))
            .with_edge("A", "knows", "B")
            .with_edge("B", "knows", "A")
            .with_edge("B", "member_of", "Dept");

        let one = graph.get_node_graph("A", 1).await.unwrap();
        assert_eq!(one.center.degree, 2);
        assert_eq!(one.neighbors.len(), 1);
        assert_eq!(one.edges.len(), 2);

        let two = graph.get_node_graph("A", 2).await.unwrap();
        assert_eq!(two.neighbors.len(), 2);

        let hits = graph.search_nodes("a").await.unwrap();
        assert_eq!(hits.len(), 1, "Dept is outside the label");
    }
}
