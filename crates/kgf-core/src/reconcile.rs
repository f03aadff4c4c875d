//! Identity reconciliation between the entity store and the graph store.
//!
//! The stores share no key. Records are grouped by normalized name; a graph
//! node that carries the relational id of an entity (see
//! [`ENTITY_ID_PROPERTY`](crate::model::ENTITY_ID_PROPERTY)) is filed under
//! that entity's key and paired with `exact` confidence.
//!
//! When several entities share a key the pick is deterministic:
//! `type == person` first, then the smallest edit distance between the raw
//! entity name and the raw graph name (or the requested name), then the
//! smallest id. The others are kept as `collisions`.

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use crate::model::{Confidence, Entity, EntityId, EntityType, GraphNode, IdentityKey, ReconciledEntity};

/// Request-scoped index of both stores' records keyed by normalized name.
#[derive(Debug, Default, Clone)]
pub struct Reconciler {
    entities: BTreeMap<IdentityKey, Vec<Entity>>,
    nodes: BTreeMap<IdentityKey, Vec<GraphNode>>,
}

impl Reconciler {
    pub fn new(
        entities: impl IntoIterator<Item = Entity>,
        nodes: impl IntoIterator<Item = GraphNode>,
    ) -> Self {
        let mut by_key: BTreeMap<IdentityKey, Vec<Entity>> = BTreeMap::new();
        let mut id_to_key: HashMap<EntityId, IdentityKey> = HashMap::new();

        for entity in entities {
            if id_to_key.contains_key(&entity.id) {
                continue;
            }
            let key = entity.name_key();
            id_to_key.insert(entity.id, key.clone());
            by_key.entry(key).or_default().push(entity);
        }
        for group in by_key.values_mut() {
            group.sort_by_key(|e| e.id);
        }

        let mut node_groups: BTreeMap<IdentityKey, Vec<GraphNode>> = BTreeMap::new();
        for node in nodes {
            let key = node
                .entity_id()
                .and_then(|id| id_to_key.get(&id).cloned())
                .unwrap_or_else(|| node.name_key());
            let group = node_groups.entry(key).or_default();
            if !group.iter().any(|n| n.name == node.name) {
                group.push(node);
            }
        }
        for group in node_groups.values_mut() {
            group.sort_by(|a, b| a.name.cmp(&b.name));
        }

        Self {
            entities: by_key,
            nodes: node_groups,
        }
    }

    /// All known identity keys, ascending.
    pub fn keys(&self) -> Vec<&IdentityKey> {
        let mut keys: Vec<&IdentityKey> = self.entities.keys().chain(self.nodes.keys()).collect();
        keys.sort();
        keys.dedup();
        keys
    }

    pub fn entities_for(&self, key: &IdentityKey) -> &[Entity] {
        self.entities.get(key).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn nodes_for(&self, key: &IdentityKey) -> &[GraphNode] {
        self.nodes.get(key).map(Vec::as_slice).unwrap_or_default()
    }

    /// Pair the records filed under `key`.
    pub fn resolve(&self, key: &IdentityKey) -> Option<ReconciledEntity> {
        self.resolve_with_reference(key, None)
    }

    /// Pair the records matching a raw name. The raw name breaks ties when
    /// several entities share its key and no graph node exists.
    pub fn pair(&self, raw_name: &str) -> Option<ReconciledEntity> {
        let key = IdentityKey::from_name(raw_name);
        self.resolve_with_reference(&key, Some(raw_name))
    }

    /// One reconciled entity per key, ordered by key.
    pub fn reconcile_all(&self) -> Vec<ReconciledEntity> {
        self.keys()
            .into_iter()
            .filter_map(|key| self.resolve(key))
            .collect()
    }

    fn resolve_with_reference(
        &self,
        key: &IdentityKey,
        reference: Option<&str>,
    ) -> Option<ReconciledEntity> {
        let entities = self.entities_for(key);
        let nodes = self.nodes_for(key);

        // Store-native identity wins over name matching.
        let linked = nodes.iter().find_map(|node| {
            let id = node.entity_id()?;
            entities.iter().find(|e| e.id == id).map(|e| (e, node))
        });

        let (entity, node, confidence) = match linked {
            Some((entity, node)) => (Some(entity), Some(node), Confidence::Exact),
            None => {
                let node = nodes.first();
                let reference = node.map(|n| n.name.as_str()).or(reference);
                let entity = pick_entity(entities, reference);
                let confidence = match (entity, node) {
                    (Some(_), Some(_)) => Confidence::Normalized,
                    _ => Confidence::Unmatched,
                };
                (entity, node, confidence)
            }
        };

        if nodes.len() > 1 {
            debug!(key = %key, count = nodes.len(), "Graph nodes share a normalized name");
        }

        let reconciled = match (entity, node) {
            (Some(entity), Some(node)) => {
                let mut rec = ReconciledEntity::paired(entity.clone(), node.clone(), confidence);
                rec.key = key.clone();
                rec
            }
            (Some(entity), None) => ReconciledEntity::entity_only(entity.clone()),
            (None, Some(node)) => {
                let mut rec = ReconciledEntity::graph_only(node.clone());
                rec.key = key.clone();
                rec
            }
            (None, None) => return None,
        };

        let chosen = reconciled.entity().map(|e| e.id);
        let collisions = entities
            .iter()
            .map(|e| e.id)
            .filter(|id| Some(*id) != chosen)
            .collect();

        Some(reconciled.with_collisions(collisions))
    }
}

/// Deterministic pick among entities sharing a normalized name.
fn pick_entity<'a>(entities: &'a [Entity], reference: Option<&str>) -> Option<&'a Entity> {
    let reference = reference.map(|r| r.trim().to_lowercase());
    entities.iter().min_by_key(|e| {
        let distance = reference
            .as_deref()
            .map(|r| edit_distance(&e.name.trim().to_lowercase(), r))
            .unwrap_or(0);
        (e.entity_type != EntityType::Person, distance, e.id)
    })
}

/// Levenshtein distance over chars.
fn edit_distance(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Order results by descending confidence, then display name, then key.
pub fn rank(results: &mut [ReconciledEntity]) {
    results.sort_by(|a, b| {
        b.confidence
            .cmp(&a.confidence)
            .then_with(|| a.name.cmp(&b.name))
            .then_with(|| a.key.cmp(&b.key))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AttributeValue, Sources, ENTITY_ID_PROPERTY};

    fn person(id: EntityId, name: &str) -> Entity {
        Entity::new(id, name, EntityType::Person)
    }

    #[test]
    fn test_title_qualified_entity_pairs_with_plain_node() {
        let reconciler = Reconciler::new(
            vec![person(1, "Li Ming (Associate Professor)")],
            vec![GraphNode::new("Li Ming")],
        );

        let all = reconciler.reconcile_all();
        assert_eq!(all.len(), 1);
        let rec = &all[0];
        assert_eq!(rec.key.as_str(), "li ming");
        assert_eq!(rec.confidence, Confidence::Normalized);
        assert!(matches!(rec.sources, Sources::Both { .. }));
        assert_eq!(rec.entity().map(|e| e.id), Some(1));
        assert_eq!(rec.node().map(|n| n.name.as_str()), Some("Li Ming"));
    }

    #[test]
    fn test_missing_sides_are_unmatched() {
        let reconciler = Reconciler::new(vec![person(1, "Zhang Wei")], vec![GraphNode::new("Wang Fang")]);
        let all = reconciler.reconcile_all();
        assert_eq!(all.len(), 2);
        assert!(all.iter().all(|r| r.confidence == Confidence::Unmatched));
        assert!(matches!(all[0].sources, Sources::GraphOnly { .. }));
        assert!(matches!(all[1].sources, Sources::EntityOnly { .. }));
    }

    #[test]
    fn test_collision_prefers_person_then_closest_name_then_id() {
        let entities = vec![
            Entity::new(1, "Li Ming", EntityType::Subject),
            person(3, "Li Ming (Lecturer)"),
            person(2, "LI MING"),
        ];
        let reconciler = Reconciler::new(entities, vec![GraphNode::new("Li Ming")]);

        let rec = reconciler.pair("Li Ming").unwrap();
        // Both persons are at distance 0 after case folding except the qualified one.
        assert_eq!(rec.entity().map(|e| e.id), Some(2));
        assert_eq!(rec.collisions, vec![1, 3]);
        assert_eq!(rec.confidence, Confidence::Normalized);

        // Same answer on every call.
        assert_eq!(reconciler.pair("Li Ming"), Some(rec));
    }

    #[test]
    fn test_collision_tie_breaks_on_smallest_id() {
        let reconciler = Reconciler::new(vec![person(9, "Chen Jie"), person(4, "chen jie")], Vec::new());
        let rec = reconciler.pair("Chen Jie").unwrap();
        assert_eq!(rec.entity().map(|e| e.id), Some(4));
        assert_eq!(rec.collisions, vec![9]);
    }

    #[test]
    fn test_entity_id_property_gives_exact_match() {
        let node = GraphNode::new("Ming Li")
            .with_property(ENTITY_ID_PROPERTY, AttributeValue::Number(5.0));
        let reconciler = Reconciler::new(vec![person(5, "Li Ming")], vec![node]);

        let all = reconciler.reconcile_all();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].confidence, Confidence::Exact);
        assert_eq!(all[0].key.as_str(), "li ming");
    }

    #[test]
    fn test_rank_orders_by_confidence_then_name() {
        let reconciler = Reconciler::new(
            vec![person(1, "Zhang San"), person(2, "An Qi")],
            vec![GraphNode::new("Zhang San"), GraphNode::new("Bo Yu")],
        );
        let mut all = reconciler.reconcile_all();
        rank(&mut all);
        let names: Vec<&str> = all.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Zhang San", "An Qi", "Bo Yu"]);
    }

    #[test]
    fn test_edit_distance() {
        assert_eq!(edit_distance("kitten", "sitting"), 3);
        assert_eq!(edit_distance("", "abc"), 3);
        assert_eq!(edit_distance("李明", "李明"), 0);
    }
}
