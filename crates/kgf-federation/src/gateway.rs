//! Federation Gateway.
//!
//! Entry point for the presentation layer. Both adapters are queried
//! concurrently, each under its own timeout; a single failing backend turns
//! into `partial = true` (search, detail) or a degraded subgraph, and only
//! the failure of both is an error. Results are sorted after the join, so
//! arrival order never leaks into responses.

use std::sync::Arc;

use kgf_core::reconcile::rank;
use kgf_core::{
    Direction, EntityId, EntityStore, FederationConfig, GraphStore, IdentityKey, KgfError,
    KgfResult, Provenance, ReconciledEntity, Reconciler, Subgraph, TruncationReason,
};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::assembler::Assembler;
use crate::call::Calls;
use crate::resolve::{resolve, Identity};

/// Merged search results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResponse {
    pub results: Vec<ReconciledEntity>,
    pub partial: bool,
}

/// One relationship of a detailed entity, tagged with the store it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailRelationship {
    pub relation_type: String,
    pub direction: Direction,
    pub related_key: IdentityKey,
    pub related_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_id: Option<EntityId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    pub provenance: Provenance,
}

/// A reconciled entity with the union of both stores' relationships.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailResponse {
    pub entity: ReconciledEntity,
    pub relationships: Vec<DetailRelationship>,
    pub partial: bool,
}

/// Orchestrates both adapters for search, detail and subgraph requests.
#[derive(Clone)]
pub struct FederationGateway {
    entity: Arc<dyn EntityStore>,
    graph: Arc<dyn GraphStore>,
    config: FederationConfig,
}

impl FederationGateway {
    pub fn new(
        entity: Arc<dyn EntityStore>,
        graph: Arc<dyn GraphStore>,
        config: FederationConfig,
    ) -> KgfResult<Self> {
        config.validate()?;
        Ok(Self {
            entity,
            graph,
            config,
        })
    }

    pub fn config(&self) -> &FederationConfig {
        &self.config
    }

    fn calls<'a>(&'a self, cancel: &'a CancellationToken) -> Calls<'a> {
        Calls::new(&*self.entity, &*self.graph, &self.config, cancel)
    }

    /// Keyword search over both stores, reconciled, deduplicated by
    /// identity and ranked by confidence then name.
    pub async fn search(&self, keyword: &str, cancel: &CancellationToken) -> KgfResult<SearchResponse> {
        let calls = self.calls(cancel);
        let (entities, nodes) = tokio::join!(
            calls.on_entity("search", calls.entity.search(keyword)),
            calls.on_graph("search_nodes", calls.graph.search_nodes(keyword)),
        );
        let (entities, nodes, partial) = settle(entities, nodes)?;

        let mut results = Reconciler::new(entities, nodes).reconcile_all();
        rank(&mut results);
        info!(keyword, results = results.len(), partial, "Search");
        Ok(SearchResponse { results, partial })
    }

    /// Resolve an id or name and list its relationships from both stores.
    pub async fn get_detail(&self, identity: &str, cancel: &CancellationToken) -> KgfResult<DetailResponse> {
        let identity = Identity::parse(identity)?;
        let calls = self.calls(cancel);
        let resolved = resolve(calls, &identity).await?;
        let entity = resolved.entity;

        let relational = async {
            match entity.entity() {
                Some(e) => calls
                    .on_entity("get_relationships", calls.entity.get_relationships(e.id))
                    .await
                    .map(Some),
                None => Ok(None),
            }
        };
        let native = async {
            match entity.node() {
                Some(n) => calls
                    .on_graph("get_node_graph", calls.graph.get_node_graph(&n.name, 1))
                    .await
                    .map(Some),
                None => Ok(None),
            }
        };
        let (relational, native) = tokio::join!(relational, native);

        let mut partial = resolved.degraded;
        let mut relationships = Vec::new();

        if let Some(relations) = absorb(relational, &mut partial)? {
            relationships.extend(relations.into_iter().map(|r| DetailRelationship {
                relation_type: r.relation_type,
                direction: r.direction,
                related_key: r.related.name_key(),
                related_name: r.related.name,
                related_id: Some(r.related.id),
                weight: None,
                provenance: Provenance::EntityStore,
            }));
        }

        if let Some(graph) = absorb(native, &mut partial)? {
            let center = graph.center.name.as_str();
            for edge in graph.edges.iter().filter(|e| e.touches(center)) {
                let (direction, other) = if edge.source == center {
                    (Direction::Outgoing, edge.target.as_str())
                } else {
                    (Direction::Incoming, edge.source.as_str())
                };
                if other == center {
                    continue;
                }
                let related_id = graph
                    .neighbors
                    .iter()
                    .find(|n| n.name == other)
                    .and_then(|n| n.entity_id());
                relationships.push(DetailRelationship {
                    relation_type: edge.relation_type.clone(),
                    direction,
                    related_key: IdentityKey::from_name(other),
                    related_name: other.to_string(),
                    related_id,
                    weight: edge.weight,
                    provenance: Provenance::GraphStore,
                });
            }
        }

        relationships.sort_by(|a, b| {
            a.provenance
                .cmp(&b.provenance)
                .then_with(|| a.direction.cmp(&b.direction))
                .then_with(|| a.relation_type.cmp(&b.relation_type))
                .then_with(|| a.related_key.cmp(&b.related_key))
                .then_with(|| a.related_name.cmp(&b.related_name))
        });
        relationships.dedup();

        info!(key = %entity.key, relationships = relationships.len(), partial, "Detail");
        Ok(DetailResponse {
            entity,
            relationships,
            partial,
        })
    }

    /// Resolve the seed and assemble its bounded neighbourhood.
    ///
    /// `depth` defaults to `maxDepth`; values outside `0..=5` are rejected.
    pub async fn get_subgraph(
        &self,
        identity: &str,
        depth: Option<i64>,
        cancel: &CancellationToken,
    ) -> KgfResult<Subgraph> {
        let depth = match depth {
            Some(depth) => FederationConfig::check_depth(depth)?,
            None => self.config.max_depth,
        };
        let identity = Identity::parse(identity)?;
        let calls = self.calls(cancel);
        let resolved = resolve(calls, &identity).await?;

        let assembler = Assembler::new(
            calls,
            self.config.max_concurrent_expansions,
            self.config.include_entity_only_edges,
        );
        let mut subgraph = assembler
            .assemble(resolved.entity, depth, self.config.max_nodes)
            .await?;

        if resolved.degraded {
            subgraph.truncated = true;
            subgraph.reason = Some(TruncationReason::Degraded);
        }
        info!(
            seed = %subgraph.seed,
            depth,
            nodes = subgraph.nodes.len(),
            edges = subgraph.edges.len(),
            reason = ?subgraph.reason,
            "Subgraph"
        );
        Ok(subgraph)
    }
}

/// Join two backend results under the degraded-mode policy.
fn settle<A, B>(a: KgfResult<Vec<A>>, b: KgfResult<Vec<B>>) -> KgfResult<(Vec<A>, Vec<B>, bool)> {
    match (a, b) {
        (Err(KgfError::Cancelled), _) | (_, Err(KgfError::Cancelled)) => Err(KgfError::Cancelled),
        (Ok(a), Ok(b)) => Ok((a, b, false)),
        (Err(ea), Err(eb)) if ea.is_unavailable() && eb.is_unavailable() => {
            Err(KgfError::BackendsUnavailable(format!("{}; {}", ea, eb)))
        }
        (Err(e), Ok(b)) if e.is_unavailable() => {
            warn!(error = %e, "Serving graph store results only");
            Ok((Vec::new(), b, true))
        }
        (Ok(a), Err(e)) if e.is_unavailable() => {
            warn!(error = %e, "Serving entity store results only");
            Ok((a, Vec::new(), true))
        }
        (Err(e), _) | (_, Err(e)) => Err(e),
    }
}

/// Turn an unavailable backend into `None` and mark the response partial.
/// A record that vanished between calls is `None` as well.
fn absorb<T>(result: KgfResult<Option<T>>, partial: &mut bool) -> KgfResult<Option<T>> {
    match result {
        Ok(value) => Ok(value),
        Err(e) if e.is_unavailable() => {
            warn!(error = %e, "Relationships missing from one store");
            *partial = true;
            Ok(None)
        }
        Err(KgfError::NotFound(_)) => Ok(None),
        Err(e) => Err(e),
    }
}
