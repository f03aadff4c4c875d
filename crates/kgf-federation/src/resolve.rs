//! Seed resolution: turn an id-or-name request into a reconciled identity.

use kgf_core::{
    normalize_name, EntityId, IdentityKey, KgfError, KgfResult, ReconciledEntity, Reconciler,
};
use tracing::debug;

use crate::call::Calls;

/// A caller-supplied identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    /// Entity store id.
    Id(EntityId),
    /// Display name in either store.
    Name(String),
}

impl Identity {
    /// All-digit input is an entity id; anything else is a name.
    pub fn parse(raw: &str) -> KgfResult<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(KgfError::invalid("identity must not be empty"));
        }
        if raw.chars().all(|c| c.is_ascii_digit()) {
            return raw
                .parse()
                .map(Identity::Id)
                .map_err(|_| KgfError::invalid(format!("entity id out of range: {}", raw)));
        }
        Ok(Identity::Name(raw.to_string()))
    }
}

/// A resolved seed. `degraded` is set when one store could not be asked.
#[derive(Debug, Clone)]
pub(crate) struct Resolved {
    pub entity: ReconciledEntity,
    pub degraded: bool,
}

pub(crate) async fn resolve(calls: Calls<'_>, identity: &Identity) -> KgfResult<Resolved> {
    match identity {
        Identity::Id(id) => resolve_id(calls, *id).await,
        Identity::Name(name) => resolve_name(calls, name).await,
    }
}

async fn resolve_id(calls: Calls<'_>, id: EntityId) -> KgfResult<Resolved> {
    let entity = match calls.on_entity("get_by_id", calls.entity.get_by_id(id)).await {
        Ok(entity) => entity,
        Err(KgfError::StoreUnavailable { reason, .. }) => {
            return Err(KgfError::BackendsUnavailable(format!(
                "entity id {} needs the entity store: {}",
                id, reason
            )))
        }
        Err(e) => return Err(e),
    };

    let key = entity.name_key();
    let (nodes, degraded) = match calls
        .on_graph("search_nodes", calls.graph.search_nodes(key.as_str()))
        .await
    {
        Ok(nodes) => (nodes, false),
        Err(e) if e.is_unavailable() => (Vec::new(), true),
        Err(e) => return Err(e),
    };
    let nodes = nodes
        .into_iter()
        .filter(|n| n.entity_id() == Some(id) || n.name_key() == key);

    let reconciler = Reconciler::new([entity], nodes);
    let entity = reconciler
        .resolve(&key)
        .ok_or_else(|| KgfError::not_found(format!("Entity: {}", id)))?;
    Ok(Resolved { entity, degraded })
}

async fn resolve_name(calls: Calls<'_>, raw: &str) -> KgfResult<Resolved> {
    let key = normalize_name(raw);
    if key.is_empty() {
        return Err(KgfError::invalid("identity must not be empty"));
    }

    let (entities, nodes) = tokio::join!(
        calls.on_entity("find_by_name_key", calls.entity.find_by_name_key(&key)),
        calls.on_graph("search_nodes", calls.graph.search_nodes(&key)),
    );

    let (entities, nodes) = match (entities, nodes) {
        (Err(KgfError::Cancelled), _) | (_, Err(KgfError::Cancelled)) => {
            return Err(KgfError::Cancelled)
        }
        (Err(a), Err(b)) if a.is_unavailable() && b.is_unavailable() => {
            return Err(KgfError::BackendsUnavailable(format!("{}; {}", a, b)))
        }
        (entities, nodes) => (entities, nodes),
    };

    let mut degraded = false;
    let entities = match entities {
        Ok(found) => found,
        Err(e) if e.is_unavailable() => {
            degraded = true;
            Vec::new()
        }
        Err(e) => return Err(e),
    };
    let nodes = match nodes {
        Ok(found) => found,
        Err(e) if e.is_unavailable() => {
            degraded = true;
            Vec::new()
        }
        Err(e) => return Err(e),
    };

    let wanted = IdentityKey::from_name(raw);
    let ids: Vec<EntityId> = entities.iter().map(|e| e.id).collect();
    let nodes = nodes.into_iter().filter(|n| {
        n.name_key() == wanted || n.entity_id().is_some_and(|id| ids.contains(&id))
    });

    let entity = Reconciler::new(entities, nodes)
        .pair(raw)
        .ok_or_else(|| KgfError::not_found(format!("Identity: {}", raw)))?;
    debug!(key = %entity.key, confidence = ?entity.confidence, degraded, "Resolved seed");
    Ok(Resolved { entity, degraded })
}

#[cfg(test)]
mod tests {
    use super::*;
    use kgf_core::store::memory::{MemoryEntityStore, MemoryGraphStore};
    use kgf_core::{Confidence, Entity, EntityType, FederationConfig, GraphNode};
    use tokio_util::sync::CancellationToken;

    #[test]
    fn test_identity_parse() {
        assert_eq!(Identity::parse(" 42 ").unwrap(), Identity::Id(42));
        assert_eq!(Identity::parse("Zhang Wei").unwrap(), Identity::Name("Zhang Wei".into()));
        assert!(Identity::parse("   ").is_err());
        assert!(Identity::parse("99999999999999999999999").is_err());
    }

    #[tokio::test]
    async fn test_name_resolution_pairs_both_sides() {
        let entity = MemoryEntityStore::new()
            .with_entity(Entity::new(1, "Li Ming (Associate Professor)", EntityType::Person));
        let graph = MemoryGraphStore::new().with_node(GraphNode::new("Li Ming"));
        let config = FederationConfig::default();
        let cancel = CancellationToken::new();
        let calls = Calls::new(&entity, &graph, &config, &cancel);

        let resolved = resolve(calls, &Identity::Name("li ming".into())).await.unwrap();
        assert!(!resolved.degraded);
        assert_eq!(resolved.entity.key.as_str(), "li ming");
        assert_eq!(resolved.entity.confidence, Confidence::Normalized);
    }

    #[tokio::test]
    async fn test_id_resolution_needs_entity_store() {
        let entity = MemoryEntityStore::new().failing();
        let graph = MemoryGraphStore::new().with_node(GraphNode::new("Li Ming"));
        let config = FederationConfig::default();
        let cancel = CancellationToken::new();
        let calls = Calls::new(&entity, &graph, &config, &cancel);

        let err = resolve(calls, &Identity::Id(1)).await.unwrap_err();
        assert!(matches!(err, KgfError::BackendsUnavailable(_)));
    }

    #[tokio::test]
    async fn test_name_resolution_survives_one_store() {
        let entity = MemoryEntityStore::new().failing();
        let graph = MemoryGraphStore::new().with_node(GraphNode::new("Zhang Wei"));
        let config = FederationConfig::default();
        let cancel = CancellationToken::new();
        let calls = Calls::new(&entity, &graph, &config, &cancel);

        let resolved = resolve(calls, &Identity::Name("Zhang Wei".into())).await.unwrap();
        assert!(resolved.degraded);
        assert!(resolved.entity.entity().is_none());

        let missing = resolve(calls, &Identity::Name("Nobody".into())).await.unwrap_err();
        assert!(matches!(missing, KgfError::NotFound(_)));
    }
}
