//! Federation data model.
//!
//! Entities come from the relational store, graph nodes and edges from the
//! graph-native store. [`ReconciledEntity`] pairs the two sides and
//! [`Subgraph`] is the bounded node/edge set handed to renderers.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::normalize::normalize_name;

/// Store-assigned entity id.
pub type EntityId = i64;

/// Property carrying the relational id on graph nodes mirrored from the entity store.
pub const ENTITY_ID_PROPERTY: &str = "entity_id";

/// Kind of entity held by the relational store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Person,
    Place,
    Subject,
    Organization,
    Event,
}

impl EntityType {
    pub const ALL: [EntityType; 5] = [
        Self::Person,
        Self::Place,
        Self::Subject,
        Self::Organization,
        Self::Event,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Person => "person",
            Self::Place => "place",
            Self::Subject => "subject",
            Self::Organization => "organization",
            Self::Event => "event",
        }
    }

    /// Parse from string. `location` is accepted for places.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "person" => Some(Self::Person),
            "place" | "location" => Some(Self::Place),
            "subject" => Some(Self::Subject),
            "organization" | "organisation" => Some(Self::Organization),
            "event" => Some(Self::Event),
            _ => None,
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A scalar attribute value. Attribute maps never carry nested shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum AttributeValue {
    String(String),
    Number(f64),
    /// Long-form text such as a biography.
    Text(String),
}

impl AttributeValue {
    /// Text representation used for keyword matching.
    pub fn search_text(&self) -> String {
        match self {
            Self::String(s) | Self::Text(s) => s.clone(),
            Self::Number(n) => n.to_string(),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::String(s) => s.trim().parse().ok(),
            Self::Text(_) => None,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.search_text())
    }
}

/// Open attribute mapping, ordered for stable output.
pub type Attributes = BTreeMap<String, AttributeValue>;

/// A record from the relational store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    #[serde(default)]
    pub attributes: Attributes,
}

impl Entity {
    pub fn new(id: EntityId, name: impl Into<String>, entity_type: EntityType) -> Self {
        Self {
            id,
            name: name.into(),
            entity_type,
            attributes: Attributes::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: AttributeValue) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn name_key(&self) -> IdentityKey {
        IdentityKey::from_name(&self.name)
    }

    /// Case-insensitive substring match over name and attribute values.
    pub fn matches_keyword(&self, needle_lower: &str) -> bool {
        self.name.to_lowercase().contains(needle_lower)
            || self
                .attributes
                .values()
                .any(|v| v.search_text().to_lowercase().contains(needle_lower))
    }
}

/// A node from the graph-native store. `name` is the natural key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub name: String,
    #[serde(default)]
    pub properties: Attributes,
    #[serde(default)]
    pub degree: usize,
}

impl GraphNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: Attributes::new(),
            degree: 0,
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: AttributeValue) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    pub fn with_degree(mut self, degree: usize) -> Self {
        self.degree = degree;
        self
    }

    pub fn name_key(&self) -> IdentityKey {
        IdentityKey::from_name(&self.name)
    }

    /// Relational id recorded on the node when it was mirrored from the entity store.
    pub fn entity_id(&self) -> Option<EntityId> {
        self.properties
            .get(ENTITY_ID_PROPERTY)
            .and_then(AttributeValue::as_number)
            .filter(|n| n.fract() == 0.0)
            .map(|n| n as EntityId)
    }
}

/// Which backend supplied a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Provenance {
    EntityStore,
    GraphStore,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EntityStore => "entity-store",
            Self::GraphStore => "graph-store",
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A relation between two nodes.
///
/// Endpoints are raw graph names in a [`NodeGraph`] and identity keys in a
/// [`Subgraph`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    pub relation_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    pub provenance: Provenance,
}

impl GraphEdge {
    pub fn new(
        source: impl Into<String>,
        target: impl Into<String>,
        relation_type: impl Into<String>,
        provenance: Provenance,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            relation_type: relation_type.into(),
            weight: None,
            provenance,
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = Some(weight);
        self
    }

    /// Identity of the edge within a subgraph.
    pub fn sort_key(&self) -> (&str, &str, &str, Provenance) {
        (
            self.source.as_str(),
            self.target.as_str(),
            self.relation_type.as_str(),
            self.provenance,
        )
    }

    pub fn touches(&self, key: &str) -> bool {
        self.source == key || self.target == key
    }
}

/// Orientation of a relational relationship relative to the queried entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Outgoing,
    Incoming,
}

/// A relationship intrinsic to the relational store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityRelationship {
    pub relation_type: String,
    pub direction: Direction,
    pub related: Entity,
}

/// Raw neighbourhood of a graph node as the graph store produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeGraph {
    pub center: GraphNode,
    pub neighbors: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

/// Normalized identity shared by both stores.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityKey(String);

impl IdentityKey {
    pub fn from_name(raw: &str) -> Self {
        Self(normalize_name(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How the two sides of a [`ReconciledEntity`] were matched.
///
/// Variant order is significant: `Exact` ranks highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Unmatched,
    Normalized,
    Exact,
}

/// The records behind a reconciled identity. Never empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "sides", rename_all = "snake_case")]
pub enum Sources {
    Both { entity: Entity, node: GraphNode },
    EntityOnly { entity: Entity },
    GraphOnly { node: GraphNode },
}

/// A cross-store identity pairing with a confidence tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciledEntity {
    pub key: IdentityKey,
    pub name: String,
    #[serde(flatten)]
    pub sources: Sources,
    pub confidence: Confidence,
    /// Other entity ids sharing this normalized name.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub collisions: Vec<EntityId>,
}

impl ReconciledEntity {
    pub fn paired(entity: Entity, node: GraphNode, confidence: Confidence) -> Self {
        Self {
            key: entity.name_key(),
            name: entity.name.clone(),
            sources: Sources::Both { entity, node },
            confidence,
            collisions: Vec::new(),
        }
    }

    pub fn entity_only(entity: Entity) -> Self {
        Self {
            key: entity.name_key(),
            name: entity.name.clone(),
            sources: Sources::EntityOnly { entity },
            confidence: Confidence::Unmatched,
            collisions: Vec::new(),
        }
    }

    pub fn graph_only(node: GraphNode) -> Self {
        Self {
            key: node.name_key(),
            name: node.name.clone(),
            sources: Sources::GraphOnly { node },
            confidence: Confidence::Unmatched,
            collisions: Vec::new(),
        }
    }

    pub fn with_collisions(mut self, collisions: Vec<EntityId>) -> Self {
        self.collisions = collisions;
        self
    }

    pub fn entity(&self) -> Option<&Entity> {
        match &self.sources {
            Sources::Both { entity, .. } | Sources::EntityOnly { entity } => Some(entity),
            Sources::GraphOnly { .. } => None,
        }
    }

    pub fn node(&self) -> Option<&GraphNode> {
        match &self.sources {
            Sources::Both { node, .. } | Sources::GraphOnly { node } => Some(node),
            Sources::EntityOnly { .. } => None,
        }
    }

    pub fn has_graph_presence(&self) -> bool {
        self.node().is_some()
    }
}

/// Why a subgraph is incomplete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TruncationReason {
    /// `maxDepth` or `maxNodes` stopped the traversal.
    Cap,
    /// A backend failed and its relationships are missing.
    Degraded,
}

/// A subgraph member and the hop distance at which it was reached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubgraphNode {
    #[serde(flatten)]
    pub entity: ReconciledEntity,
    pub depth: u32,
}

/// Bounded node/edge set around a seed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subgraph {
    pub seed: IdentityKey,
    pub nodes: Vec<SubgraphNode>,
    pub edges: Vec<GraphEdge>,
    pub truncated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<TruncationReason>,
}

impl Subgraph {
    pub fn node(&self, key: &str) -> Option<&SubgraphNode> {
        self.nodes.iter().find(|n| n.entity.key.as_str() == key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.node(key).is_some()
    }

    /// Every edge references nodes present in the node set.
    pub fn is_closed(&self) -> bool {
        let keys: BTreeSet<&str> = self.nodes.iter().map(|n| n.entity.key.as_str()).collect();
        self.edges
            .iter()
            .all(|e| keys.contains(e.source.as_str()) && keys.contains(e.target.as_str()))
    }
}
