//! Subgraph assembly.
//!
//! Level-synchronous breadth-first expansion around a reconciled seed.
//! Frontier nodes of one level are expanded concurrently, bounded by
//! `maxConcurrentExpansions`, and the whole level is joined before the next
//! one starts. Membership is keyed by identity key and doubles as the
//! visited set, so cyclic graphs terminate. A member is also found by its
//! graph node name and its entity id, so a linked node whose name differs
//! from its entity's is never admitted twice.
//!
//! Candidates of a level are admitted in key order until `maxNodes` is
//! reached. Entity-only nodes are leaves, except for the seed.

use std::collections::{BTreeMap, BTreeSet};

use futures::stream::{self, StreamExt};
use kgf_core::{
    Direction, Entity, EntityId, EntityRelationship, GraphEdge, GraphNode, IdentityKey, KgfError,
    KgfResult, NodeGraph, Provenance, ReconciledEntity, Reconciler, Subgraph, SubgraphNode,
    TruncationReason,
};
use tracing::{debug, warn};

use crate::call::Calls;

type EdgeKey = (String, String, String, Provenance);

/// Raw neighbourhood of one frontier node.
struct Expansion {
    key: IdentityKey,
    graph: KgfResult<Option<NodeGraph>>,
    relations: KgfResult<Vec<EntityRelationship>>,
}

/// Records discovered for a not-yet-visited identity.
#[derive(Debug, Default)]
struct Candidate {
    entities: Vec<Entity>,
    nodes: Vec<GraphNode>,
}

impl Candidate {
    fn add_entity(&mut self, entity: Entity) {
        if !self.entities.iter().any(|e| e.id == entity.id) {
            self.entities.push(entity);
        }
    }

    fn add_node(&mut self, node: GraphNode) {
        if !self.nodes.iter().any(|n| n.name == node.name) {
            self.nodes.push(node);
        }
    }

    fn holds_node(&self, node: &GraphNode) -> bool {
        self.nodes.iter().any(|n| n.name == node.name)
            || node
                .entity_id()
                .is_some_and(|id| self.entities.iter().any(|e| e.id == id))
    }

    fn holds_entity(&self, entity: &Entity) -> bool {
        self.entities.iter().any(|e| e.id == entity.id)
            || self.nodes.iter().any(|n| n.entity_id() == Some(entity.id))
    }
}

fn candidate_for(
    candidates: &BTreeMap<IdentityKey, Candidate>,
    held: impl Fn(&Candidate) -> bool,
) -> Option<IdentityKey> {
    candidates
        .iter()
        .find(|(_, candidate)| held(candidate))
        .map(|(key, _)| key.clone())
}

/// Missing-side lookups for an admitted candidate.
struct Lookup {
    key: IdentityKey,
    candidate: Candidate,
    entities: KgfResult<Vec<Entity>>,
    nodes: KgfResult<Vec<GraphNode>>,
}

/// Mutable state of one traversal.
#[derive(Default)]
struct Traversal {
    members: BTreeMap<IdentityKey, SubgraphNode>,
    /// Graph node name to member key.
    names: BTreeMap<String, IdentityKey>,
    /// Entity id to member key.
    ids: BTreeMap<EntityId, IdentityKey>,
    edges: BTreeMap<EdgeKey, GraphEdge>,
    entity_down: bool,
    graph_down: bool,
    capped: bool,
}

impl Traversal {
    fn degraded(&self) -> bool {
        self.entity_down || self.graph_down
    }

    /// Absorb store failures into degraded mode. A record that vanished
    /// between calls counts as empty; cancellation propagates.
    fn absorb<T: Default>(&mut self, result: KgfResult<T>) -> KgfResult<T> {
        match result {
            Ok(value) => Ok(value),
            Err(KgfError::StoreUnavailable { store, reason }) => {
                if !self.degraded() {
                    warn!(%store, %reason, "Backend unavailable, continuing with partial subgraph");
                }
                match store {
                    Provenance::EntityStore => self.entity_down = true,
                    Provenance::GraphStore => self.graph_down = true,
                }
                Ok(T::default())
            }
            Err(KgfError::NotFound(_)) => Ok(T::default()),
            Err(e) => Err(e),
        }
    }

    fn admit(&mut self, entity: ReconciledEntity, depth: u32) {
        if let Some(node) = entity.node() {
            self.names.insert(node.name.clone(), entity.key.clone());
        }
        if let Some(record) = entity.entity() {
            self.ids.insert(record.id, entity.key.clone());
        }
        self.members
            .insert(entity.key.clone(), SubgraphNode { entity, depth });
    }

    /// Member key of a graph node, by node name or linked entity id.
    fn node_member(&self, node: &GraphNode) -> Option<IdentityKey> {
        self.names
            .get(&node.name)
            .or_else(|| node.entity_id().and_then(|id| self.ids.get(&id)))
            .cloned()
    }

    /// Member key of an entity record, by id or normalized name.
    fn entity_member(&self, entity: &Entity) -> Option<IdentityKey> {
        self.ids.get(&entity.id).cloned().or_else(|| {
            let key = entity.name_key();
            self.members.contains_key(&key).then_some(key)
        })
    }

    fn add_edge(&mut self, edge: GraphEdge) {
        if edge.source == edge.target {
            return;
        }
        let key = (
            edge.source.clone(),
            edge.target.clone(),
            edge.relation_type.clone(),
            edge.provenance,
        );
        self.edges.entry(key).or_insert(edge);
    }

    /// Fold one expansion into the edge set and the candidate map.
    fn collect(
        &mut self,
        parent: &IdentityKey,
        graph: Option<NodeGraph>,
        relations: Vec<EntityRelationship>,
        candidates: &mut BTreeMap<IdentityKey, Candidate>,
    ) {
        if let Some(graph) = graph {
            let mut local: BTreeMap<String, IdentityKey> = BTreeMap::new();
            local.insert(graph.center.name, parent.clone());

            for neighbor in graph.neighbors {
                if let Some(key) = self.node_member(&neighbor) {
                    local.insert(neighbor.name, key);
                    continue;
                }
                let key = candidate_for(candidates, |c| c.holds_node(&neighbor))
                    .unwrap_or_else(|| neighbor.name_key());
                local.insert(neighbor.name.clone(), key.clone());
                if !self.members.contains_key(&key) {
                    candidates.entry(key).or_default().add_node(neighbor);
                }
            }
            for edge in graph.edges {
                let source = endpoint(&local, &self.names, &edge.source).into_string();
                let target = endpoint(&local, &self.names, &edge.target).into_string();
                self.add_edge(GraphEdge {
                    source,
                    target,
                    ..edge
                });
            }
        }

        for relation in relations {
            let member = self.entity_member(&relation.related);
            let key = member
                .clone()
                .or_else(|| candidate_for(candidates, |c| c.holds_entity(&relation.related)))
                .unwrap_or_else(|| relation.related.name_key());
            let (source, target) = match relation.direction {
                Direction::Outgoing => (parent.clone(), key.clone()),
                Direction::Incoming => (key.clone(), parent.clone()),
            };
            self.add_edge(GraphEdge::new(
                source.into_string(),
                target.into_string(),
                relation.relation_type,
                Provenance::EntityStore,
            ));
            if member.is_none() {
                candidates.entry(key).or_default().add_entity(relation.related);
            }
        }
    }

    /// A graph node whose degree exceeds the graph edges seen so far still
    /// has neighbours nobody asked about.
    fn has_unexplored(&self, key: &IdentityKey) -> bool {
        let Some(degree) = self
            .members
            .get(key)
            .and_then(|m| m.entity.node())
            .map(|n| n.degree)
        else {
            return false;
        };
        let known = self
            .edges
            .values()
            .filter(|e| e.provenance == Provenance::GraphStore && e.touches(key.as_str()))
            .count();
        degree > known
    }

    /// Whether an admitted record already belongs to another member.
    fn claimed_elsewhere(&self, entity: &ReconciledEntity, key: &IdentityKey) -> bool {
        let by_node = entity.node().and_then(|n| self.names.get(&n.name));
        let by_id = entity.entity().and_then(|e| self.ids.get(&e.id));
        by_node.or(by_id).is_some_and(|owner| owner != key)
    }

    fn into_subgraph(self, seed: IdentityKey, truncated_by_cap: bool) -> Subgraph {
        let reason = if self.degraded() {
            Some(TruncationReason::Degraded)
        } else if truncated_by_cap {
            Some(TruncationReason::Cap)
        } else {
            None
        };

        let keys: BTreeSet<&str> = self.members.keys().map(IdentityKey::as_str).collect();
        let edges: Vec<GraphEdge> = self
            .edges
            .values()
            .filter(|e| keys.contains(e.source.as_str()) && keys.contains(e.target.as_str()))
            .cloned()
            .collect();

        let mut nodes: Vec<SubgraphNode> = self.members.into_values().collect();
        nodes.sort_by(|a, b| a.depth.cmp(&b.depth).then_with(|| a.entity.key.cmp(&b.entity.key)));

        Subgraph {
            seed,
            nodes,
            edges,
            truncated: reason.is_some(),
            reason,
        }
    }
}

/// Member or candidate key for an edge endpoint named by the graph store.
fn endpoint(
    local: &BTreeMap<String, IdentityKey>,
    names: &BTreeMap<String, IdentityKey>,
    name: &str,
) -> IdentityKey {
    local
        .get(name)
        .or_else(|| names.get(name))
        .cloned()
        .unwrap_or_else(|| IdentityKey::from_name(name))
}

/// Bounded breadth-first traversal over both stores.
pub(crate) struct Assembler<'a> {
    calls: Calls<'a>,
    max_concurrent: usize,
    include_entity_edges: bool,
}

impl<'a> Assembler<'a> {
    pub fn new(calls: Calls<'a>, max_concurrent: usize, include_entity_edges: bool) -> Self {
        Self {
            calls,
            max_concurrent: max_concurrent.max(1),
            include_entity_edges,
        }
    }

    pub async fn assemble(
        &self,
        seed: ReconciledEntity,
        max_depth: u32,
        max_nodes: usize,
    ) -> KgfResult<Subgraph> {
        let max_nodes = max_nodes.max(1);
        let seed_key = seed.key.clone();

        let mut state = Traversal::default();
        state.admit(seed, 0);

        let mut frontier = vec![seed_key.clone()];
        let mut depth = 0;

        while !frontier.is_empty() && depth < max_depth && state.members.len() < max_nodes {
            let expanding: Vec<ReconciledEntity> = frontier
                .iter()
                .filter_map(|key| state.members.get(key))
                .map(|m| m.entity.clone())
                .collect();
            let (skip_entity, skip_graph) = (state.entity_down, state.graph_down);

            let mut expansions: Vec<Expansion> = stream::iter(expanding)
                .map(|member| self.expand(member, skip_entity, skip_graph))
                .buffer_unordered(self.max_concurrent)
                .collect()
                .await;
            expansions.sort_by(|a, b| a.key.cmp(&b.key));

            let mut candidates: BTreeMap<IdentityKey, Candidate> = BTreeMap::new();
            for expansion in expansions {
                let graph = state.absorb(expansion.graph)?;
                let relations = state.absorb(expansion.relations)?;
                state.collect(&expansion.key, graph, relations, &mut candidates);
            }

            let room = max_nodes - state.members.len();
            if candidates.len() > room {
                debug!(depth = depth + 1, candidates = candidates.len(), room, "Node cap reached");
                state.capped = true;
            }
            let admitted: Vec<(IdentityKey, Candidate)> = candidates.into_iter().take(room).collect();

            depth += 1;
            frontier = Vec::new();
            for entity in self.fill(admitted, &mut state).await? {
                if entity.has_graph_presence() {
                    frontier.push(entity.key.clone());
                }
                state.admit(entity, depth);
            }
        }

        let mut truncated_by_cap =
            state.capped || frontier.iter().any(|key| state.has_unexplored(key));
        if !truncated_by_cap && !frontier.is_empty() {
            truncated_by_cap = self.relations_unexplored(&frontier, &mut state).await?;
        }
        debug!(
            seed = %seed_key,
            nodes = state.members.len(),
            edges = state.edges.len(),
            depth,
            truncated_by_cap,
            degraded = state.degraded(),
            "Subgraph assembled"
        );
        Ok(state.into_subgraph(seed_key, truncated_by_cap))
    }

    async fn expand(&self, member: ReconciledEntity, skip_entity: bool, skip_graph: bool) -> Expansion {
        let graph = async {
            match member.node() {
                Some(node) if !skip_graph => self
                    .calls
                    .on_graph("get_node_graph", self.calls.graph.get_node_graph(&node.name, 1))
                    .await
                    .map(Some),
                _ => Ok(None),
            }
        };
        let relations = async {
            match member.entity() {
                Some(entity) if self.include_entity_edges && !skip_entity => {
                    self.calls
                        .on_entity("get_relationships", self.calls.entity.get_relationships(entity.id))
                        .await
                }
                _ => Ok(Vec::new()),
            }
        };

        let (graph, relations) = tokio::join!(graph, relations);
        Expansion {
            key: member.key.clone(),
            graph,
            relations,
        }
    }

    /// Whether a final-frontier member has relational relationships leading
    /// outside the subgraph. Graph degree cannot tell.
    async fn relations_unexplored(&self, frontier: &[IdentityKey], state: &mut Traversal) -> KgfResult<bool> {
        if !self.include_entity_edges || state.entity_down {
            return Ok(false);
        }
        let ids: Vec<EntityId> = frontier
            .iter()
            .filter_map(|key| state.members.get(key))
            .filter_map(|member| member.entity.entity())
            .map(|entity| entity.id)
            .collect();
        if ids.is_empty() {
            return Ok(false);
        }

        let results: Vec<KgfResult<Vec<EntityRelationship>>> = stream::iter(ids)
            .map(|id| {
                self.calls
                    .on_entity("get_relationships", self.calls.entity.get_relationships(id))
            })
            .buffer_unordered(self.max_concurrent)
            .collect()
            .await;

        let mut unexplored = false;
        for result in results {
            let relations = state.absorb(result)?;
            unexplored |= relations
                .iter()
                .any(|relation| state.entity_member(&relation.related).is_none());
        }
        Ok(unexplored)
    }

    /// Look up the side each admitted candidate is missing, then reconcile.
    async fn fill(
        &self,
        admitted: Vec<(IdentityKey, Candidate)>,
        state: &mut Traversal,
    ) -> KgfResult<Vec<ReconciledEntity>> {
        let (skip_entity, skip_graph) = (state.entity_down, state.graph_down);

        let mut lookups: Vec<Lookup> = stream::iter(admitted)
            .map(|(key, candidate)| self.lookup(key, candidate, skip_entity, skip_graph))
            .buffer_unordered(self.max_concurrent)
            .collect()
            .await;
        lookups.sort_by(|a, b| a.key.cmp(&b.key));

        let mut resolved: Vec<ReconciledEntity> = Vec::with_capacity(lookups.len());
        for lookup in lookups {
            let Lookup {
                key,
                candidate,
                entities,
                nodes,
            } = lookup;
            let mut entities = state.absorb(entities)?;
            let mut nodes = state.absorb(nodes)?;
            entities.extend(candidate.entities);
            nodes.extend(candidate.nodes);

            let reconciler = Reconciler::new(entities, nodes);
            let entity = reconciler
                .resolve(&key)
                .or_else(|| reconciler.reconcile_all().into_iter().next());
            let Some(mut entity) = entity else {
                continue;
            };
            let taken = state.claimed_elsewhere(&entity, &key)
                || resolved.iter().any(|other| same_record(other, &entity));
            if taken {
                debug!(%key, "Candidate resolves to an existing member, skipped");
                continue;
            }
            entity.key = key;
            resolved.push(entity);
        }
        Ok(resolved)
    }

    async fn lookup(&self, key: IdentityKey, candidate: Candidate, skip_entity: bool, skip_graph: bool) -> Lookup {
        let linked = candidate.nodes.iter().find_map(GraphNode::entity_id);
        let entities = async {
            if !candidate.entities.is_empty() || skip_entity {
                return Ok(Vec::new());
            }
            match linked {
                Some(id) => self
                    .calls
                    .on_entity("get_by_id", self.calls.entity.get_by_id(id))
                    .await
                    .map(|entity| vec![entity]),
                None => {
                    self.calls
                        .on_entity("find_by_name_key", self.calls.entity.find_by_name_key(key.as_str()))
                        .await
                }
            }
        };
        let nodes = async {
            if candidate.nodes.is_empty() && !skip_graph {
                self.calls
                    .on_graph("search_nodes", self.calls.graph.search_nodes(key.as_str()))
                    .await
                    .map(|found| found.into_iter().filter(|n| n.name_key() == key).collect::<Vec<_>>())
            } else {
                Ok(Vec::new())
            }
        };

        let (entities, nodes) = tokio::join!(entities, nodes);
        Lookup {
            key,
            candidate,
            entities,
            nodes,
        }
    }
}

fn same_record(a: &ReconciledEntity, b: &ReconciledEntity) -> bool {
    let same_node = matches!((a.node(), b.node()), (Some(x), Some(y)) if x.name == y.name);
    let same_entity = matches!((a.entity(), b.entity()), (Some(x), Some(y)) if x.id == y.id);
    same_node || same_entity
}

#[cfg(test)]
mod tests {
    use super::*;
    use kgf_core::store::memory::{MemoryEntityStore, MemoryGraphStore};
    use kgf_core::model::ENTITY_ID_PROPERTY;
    use kgf_core::{AttributeValue, Confidence, EntityStore, EntityType, FederationConfig, GraphStore};
    use tokio_util::sync::CancellationToken;

    async fn run(
        entity: &dyn EntityStore,
        graph: &dyn GraphStore,
        seed: ReconciledEntity,
        max_depth: u32,
        max_nodes: usize,
    ) -> KgfResult<Subgraph> {
        let config = FederationConfig::default().with_timeout_ms(200);
        let cancel = CancellationToken::new();
        let calls = Calls::new(entity, graph, &config, &cancel);
        Assembler::new(calls, 4, true).assemble(seed, max_depth, max_nodes).await
    }

    fn star(leaves: &[&str]) -> MemoryGraphStore {
        leaves
            .iter()
            .fold(MemoryGraphStore::new().with_node(GraphNode::new("Hub")), |g, leaf| {
                g.with_node(GraphNode::new(*leaf)).with_edge("Hub", "colleague", leaf)
            })
    }

    fn keys(subgraph: &Subgraph) -> Vec<&str> {
        subgraph.nodes.iter().map(|n| n.entity.key.as_str()).collect()
    }

    #[tokio::test]
    async fn test_cap_admits_candidates_in_name_order() {
        let graph = star(&["Eve", "Carol", "Alice", "Dave", "Bob"]);
        let entity = MemoryEntityStore::new();
        let seed = ReconciledEntity::graph_only(GraphNode::new("Hub").with_degree(5));

        let subgraph = run(&entity, &graph, seed, 2, 3).await.unwrap();
        assert_eq!(keys(&subgraph), vec!["hub", "alice", "bob"]);
        assert!(subgraph.truncated);
        assert_eq!(subgraph.reason, Some(TruncationReason::Cap));
        assert!(subgraph.is_closed());
        assert_eq!(subgraph.edges.len(), 2);
    }

    #[tokio::test]
    async fn test_cycle_terminates_without_revisits() {
        let graph = MemoryGraphStore::new()
            .with_node(GraphNode::new("A"))
            .with_node(GraphNode::new("B"))
            .with_node(GraphNode::new("C"))
            .with_edge("A", "cites", "B")
            .with_edge("B", "cites", "C")
            .with_edge("C", "cites", "A");
        let entity = MemoryEntityStore::new();
        let seed = ReconciledEntity::graph_only(GraphNode::new("A").with_degree(2));

        let subgraph = run(&entity, &graph, seed, 5, 50).await.unwrap();
        assert_eq!(keys(&subgraph), vec!["a", "b", "c"]);
        assert_eq!(subgraph.edges.len(), 3);
        assert!(!subgraph.truncated);
        assert_eq!(subgraph.node("c").map(|n| n.depth), Some(1));
    }

    #[tokio::test]
    async fn test_depth_cap_reports_only_real_truncation() {
        let chain = MemoryGraphStore::new()
            .with_node(GraphNode::new("A"))
            .with_node(GraphNode::new("B"))
            .with_node(GraphNode::new("C"))
            .with_edge("A", "advised", "B")
            .with_edge("B", "advised", "C");
        let entity = MemoryEntityStore::new();

        let seed = ReconciledEntity::graph_only(GraphNode::new("A").with_degree(1));
        let cut = run(&entity, &chain, seed.clone(), 1, 50).await.unwrap();
        assert_eq!(keys(&cut), vec!["a", "b"]);
        assert_eq!(cut.reason, Some(TruncationReason::Cap));

        let whole = run(&entity, &chain, seed, 2, 50).await.unwrap();
        assert_eq!(keys(&whole), vec!["a", "b", "c"]);
        assert!(!whole.truncated);
    }

    #[tokio::test]
    async fn test_depth_cap_sees_unexpanded_relational_edges() {
        let entity = MemoryEntityStore::new()
            .with_entity(Entity::new(1, "Zhang Wei", EntityType::Person))
            .with_entity(Entity::new(2, "Li Ming", EntityType::Person))
            .with_entity(Entity::new(3, "Optics", EntityType::Subject))
            .with_relationship(2, "researches", 3);
        let graph = MemoryGraphStore::new()
            .with_node(GraphNode::new("Zhang Wei"))
            .with_node(GraphNode::new("Li Ming"))
            .with_edge("Zhang Wei", "colleague", "Li Ming");
        let seed = ReconciledEntity::paired(
            Entity::new(1, "Zhang Wei", EntityType::Person),
            GraphNode::new("Zhang Wei").with_degree(1),
            Confidence::Normalized,
        );

        let cut = run(&entity, &graph, seed.clone(), 1, 50).await.unwrap();
        assert_eq!(keys(&cut), vec!["zhang wei", "li ming"]);
        assert!(cut.truncated);
        assert_eq!(cut.reason, Some(TruncationReason::Cap));

        let whole = run(&entity, &graph, seed, 2, 50).await.unwrap();
        assert_eq!(keys(&whole), vec!["zhang wei", "li ming", "optics"]);
        assert!(!whole.truncated);
    }

    fn linked(name: &str, id: i64) -> GraphNode {
        GraphNode::new(name).with_property(ENTITY_ID_PROPERTY, AttributeValue::Number(id as f64))
    }

    #[tokio::test]
    async fn test_linked_node_under_another_name_is_visited_once() {
        let entity = MemoryEntityStore::new().with_entity(Entity::new(5, "Li Ming", EntityType::Person));
        let graph = MemoryGraphStore::new()
            .with_node(linked("Ming Li", 5))
            .with_node(GraphNode::new("Bob"))
            .with_edge("Ming Li", "coauthor", "Bob");
        let seed = ReconciledEntity::paired(
            Entity::new(5, "Li Ming", EntityType::Person),
            linked("Ming Li", 5).with_degree(1),
            Confidence::Exact,
        );

        let subgraph = run(&entity, &graph, seed, 3, 50).await.unwrap();
        assert_eq!(keys(&subgraph), vec!["li ming", "bob"]);
        assert_eq!(subgraph.edges.len(), 1);
        assert_eq!(subgraph.edges[0].source, "li ming");
        assert!(!subgraph.truncated);
        assert!(subgraph.is_closed());
    }

    #[tokio::test]
    async fn test_both_sides_of_a_linked_neighbor_merge() {
        let entity = MemoryEntityStore::new()
            .with_entity(Entity::new(1, "Zhang Wei", EntityType::Person))
            .with_entity(Entity::new(5, "Li Ming", EntityType::Person))
            .with_relationship(1, "colleague", 5);
        let graph = MemoryGraphStore::new()
            .with_node(GraphNode::new("Zhang Wei"))
            .with_node(linked("Ming Li", 5))
            .with_edge("Zhang Wei", "coauthor", "Ming Li");
        let seed = ReconciledEntity::paired(
            Entity::new(1, "Zhang Wei", EntityType::Person),
            GraphNode::new("Zhang Wei").with_degree(1),
            Confidence::Normalized,
        );

        let subgraph = run(&entity, &graph, seed, 2, 50).await.unwrap();
        assert_eq!(subgraph.nodes.len(), 2);
        let neighbor = &subgraph.nodes[1].entity;
        assert_eq!(neighbor.confidence, Confidence::Exact);
        assert_eq!(neighbor.entity().map(|e| e.id), Some(5));
        assert_eq!(subgraph.edges.len(), 2);
        assert!(subgraph.is_closed());
    }

    #[tokio::test]
    async fn test_expansions_respect_concurrency_bound() {
        let leaves = ["A1", "A2", "A3", "A4", "A5", "A6", "A7", "A8", "A9"];
        let graph = star(&leaves).with_latency(std::time::Duration::from_millis(20));
        let entity = MemoryEntityStore::new().with_latency(std::time::Duration::from_millis(20));
        let config = FederationConfig::default();
        let cancel = CancellationToken::new();
        let calls = Calls::new(&entity, &graph, &config, &cancel);
        let seed = ReconciledEntity::graph_only(GraphNode::new("Hub").with_degree(leaves.len()));

        let subgraph = Assembler::new(calls, 2, true).assemble(seed, 2, 50).await.unwrap();
        assert_eq!(subgraph.nodes.len(), leaves.len() + 1);
        // One hub expansion, then nine leaf expansions two at a time.
        assert_eq!(graph.calls(), 1 + leaves.len());
        assert_eq!(graph.peak_concurrency(), 2);
        assert!(entity.peak_concurrency() <= 2);
    }

    #[tokio::test]
    async fn test_entity_only_nodes_are_leaves_joined_by_relational_edges() {
        let entity = MemoryEntityStore::new()
            .with_entity(Entity::new(1, "Zhang Wei", EntityType::Person))
            .with_entity(Entity::new(2, "Tsinghua University", EntityType::Organization))
            .with_entity(Entity::new(3, "Beijing", EntityType::Place))
            .with_relationship(1, "graduated_from", 2)
            .with_relationship(2, "located_in", 3);
        let graph = MemoryGraphStore::new()
            .with_node(GraphNode::new("Zhang Wei"))
            .with_node(GraphNode::new("Li Ming"))
            .with_edge("Zhang Wei", "colleague", "Li Ming");

        let seed = ReconciledEntity::paired(
            Entity::new(1, "Zhang Wei", EntityType::Person),
            GraphNode::new("Zhang Wei").with_degree(1),
            Confidence::Normalized,
        );
        let subgraph = run(&entity, &graph, seed, 3, 50).await.unwrap();

        assert_eq!(keys(&subgraph), vec!["zhang wei", "li ming", "tsinghua university"]);
        assert!(!subgraph.contains("beijing"));
        let relational = subgraph
            .edges
            .iter()
            .find(|e| e.provenance == Provenance::EntityStore)
            .unwrap();
        assert_eq!(relational.source, "zhang wei");
        assert_eq!(relational.target, "tsinghua university");
        assert_eq!(relational.relation_type, "graduated_from");
        assert!(subgraph.is_closed());
    }

    #[tokio::test]
    async fn test_graph_outage_falls_back_to_relational_edges() {
        let entity = MemoryEntityStore::new()
            .with_entity(Entity::new(1, "Zhang Wei", EntityType::Person))
            .with_entity(Entity::new(2, "Optics", EntityType::Subject))
            .with_relationship(1, "researches", 2);
        let graph = MemoryGraphStore::new().failing();
        let seed = ReconciledEntity::paired(
            Entity::new(1, "Zhang Wei", EntityType::Person),
            GraphNode::new("Zhang Wei"),
            Confidence::Normalized,
        );

        let subgraph = run(&entity, &graph, seed, 2, 50).await.unwrap();
        assert_eq!(keys(&subgraph), vec!["zhang wei", "optics"]);
        assert!(subgraph.truncated);
        assert_eq!(subgraph.reason, Some(TruncationReason::Degraded));
        // The first failure stops further graph calls.
        assert_eq!(graph.calls(), 1);
    }

    #[tokio::test]
    async fn test_repeat_assembly_is_identical() {
        let graph = star(&["Eve", "Carol", "Alice", "Dave", "Bob"])
            .with_edge("Alice", "coauthor", "Bob")
            .with_edge("Bob", "coauthor", "Zed");
        let entity = MemoryEntityStore::new();
        let seed = ReconciledEntity::graph_only(GraphNode::new("Hub").with_degree(5));

        let first = run(&entity, &graph, seed.clone(), 2, 5).await.unwrap();
        let second = run(&entity, &graph, seed, 2, 5).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_cancellation_discards_partial_levels() {
        let graph = star(&["Alice", "Bob"]).with_latency(std::time::Duration::from_millis(200));
        let entity = MemoryEntityStore::new();
        let config = FederationConfig::default();
        let cancel = CancellationToken::new();
        let calls = Calls::new(&entity, &graph, &config, &cancel);
        cancel.cancel();

        let seed = ReconciledEntity::graph_only(GraphNode::new("Hub"));
        let result = Assembler::new(calls, 4, true).assemble(seed, 2, 50).await;
        assert_eq!(result.unwrap_err(), KgfError::Cancelled);
    }
}
