//! [`EntityStore`] implementation over SQLite.
//!
//! rusqlite is blocking, so every call runs on the blocking pool. Failures
//! other than a missing row surface as `StoreUnavailable`.

use std::path::PathBuf;

use async_trait::async_trait;
use kgf_core::store::{rank_search, DEFAULT_PAGE_SIZE};
use kgf_core::{
    Entity, EntityId, EntityRelationship, EntityStore, EntityType, KgfError, KgfResult,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::pool::{DbError, DbPool, DbResult};
use crate::queries::{entities, relationships};

/// Configuration for the SQLite entity store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EntityStoreConfig {
    /// Database file, or `:memory:`.
    pub path: PathBuf,
    /// Upper bound on search and list results.
    pub max_page_size: usize,
}

impl Default for EntityStoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("kgf.db"),
            max_page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Entity store backed by a SQLite database.
#[derive(Debug, Clone)]
pub struct SqliteEntityStore {
    pool: DbPool,
    page_size: usize,
}

impl SqliteEntityStore {
    pub fn new(pool: DbPool, page_size: usize) -> Self {
        Self {
            pool,
            page_size: page_size.max(1),
        }
    }

    /// Open the configured database and run migrations.
    pub fn open(config: &EntityStoreConfig) -> DbResult<Self> {
        let pool = crate::init_pool(&config.path)?;
        Ok(Self::new(pool, config.max_page_size))
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    async fn blocking<T, F>(&self, op: &'static str, f: F) -> KgfResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&DbPool) -> DbResult<T> + Send + 'static,
    {
        let pool = self.pool.clone();
        let result = tokio::task::spawn_blocking(move || f(&pool))
            .await
            .map_err(|e| DbError::Task(e.to_string()))
            .and_then(|r| r);
        debug!(op, ok = result.is_ok(), "Entity store call");
        result.map_err(KgfError::from)
    }
}

fn to_entities(rows: Vec<entities::EntityRow>) -> DbResult<Vec<Entity>> {
    rows.into_iter().map(entities::EntityRow::into_entity).collect()
}

fn to_relationships(rows: Vec<relationships::RelationshipRow>) -> DbResult<Vec<EntityRelationship>> {
    rows.into_iter()
        .map(|row| {
            Ok(EntityRelationship {
                relation_type: row.relationship_type,
                direction: row.direction,
                related: row.related.into_entity()?,
            })
        })
        .collect()
}

#[async_trait]
impl EntityStore for SqliteEntityStore {
    async fn get_by_id(&self, id: EntityId) -> KgfResult<Entity> {
        self.blocking("get_by_id", move |pool| entities::get_entity(pool, id)?.into_entity())
            .await
    }

    async fn search(&self, keyword: &str) -> KgfResult<Vec<Entity>> {
        let needle = keyword.trim().to_lowercase();
        let limit = self.page_size;
        self.blocking("search", move |pool| {
            let rows = to_entities(entities::search_candidates(pool, &needle)?)?;
            Ok(rank_search(rows, &needle, limit))
        })
        .await
    }

    async fn list_by_type(&self, entity_type: EntityType) -> KgfResult<Vec<Entity>> {
        let limit = self.page_size;
        self.blocking("list_by_type", move |pool| {
            to_entities(entities::list_entities_by_type(pool, entity_type, limit)?)
        })
        .await
    }

    async fn list_all(&self) -> KgfResult<Vec<Entity>> {
        let limit = self.page_size;
        self.blocking("list_all", move |pool| {
            let mut all = to_entities(entities::list_entities(pool)?)?;
            all.truncate(limit);
            Ok(all)
        })
        .await
    }

    async fn find_by_name_key(&self, key: &str) -> KgfResult<Vec<Entity>> {
        let key = key.to_string();
        self.blocking("find_by_name_key", move |pool| {
            to_entities(entities::find_by_name_key(pool, &key)?)
        })
        .await
    }

    async fn get_relationships(&self, id: EntityId) -> KgfResult<Vec<EntityRelationship>> {
        self.blocking("get_relationships", move |pool| {
            // Distinguish an unknown id from an entity without relationships.
            entities::get_entity(pool, id)?;
            to_relationships(relationships::list_for_entity(pool, id)?)
        })
        .await
    }

    async fn relationships_between(
        &self,
        source: EntityId,
        target: EntityId,
    ) -> KgfResult<Vec<EntityRelationship>> {
        self.blocking("relationships_between", move |pool| {
            to_relationships(relationships::list_between(pool, source, target)?)
        })
        .await
    }
}

impl SqliteEntityStore {
    /// Number of stored entities.
    pub async fn count(&self) -> KgfResult<usize> {
        self.blocking("count", entities::count_entities).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::relationships::insert_relationship;
    use kgf_core::{AttributeValue, Attributes};

    fn seeded() -> SqliteEntityStore {
        let pool = DbPool::in_memory().unwrap();
        crate::migrations::run_migrations(&pool).unwrap();

        let mut bio = Attributes::new();
        bio.insert("description".into(), AttributeValue::Text("Studies Zhang-style optics".into()));

        let zhang = entities::insert_entity(&pool, "Zhang Wei", EntityType::Person, &Attributes::new()).unwrap();
        entities::insert_entity(&pool, "Li Ming", EntityType::Person, &bio).unwrap();
        let dept = entities::insert_entity(&pool, "Physics Department", EntityType::Organization, &Attributes::new()).unwrap();
        insert_relationship(&pool, zhang, "belongs_to", dept).unwrap();

        SqliteEntityStore::new(pool, 10)
    }

    #[tokio::test]
    async fn test_search_matches_names_and_attributes() {
        let store = seeded();
        let hits = store.search("zhang").await.unwrap();
        let names: Vec<&str> = hits.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Zhang Wei", "Li Ming"]);
    }

    #[tokio::test]
    async fn test_search_skips_attribute_key_matches() {
        let store = seeded();
        // "description" only appears as an attribute key.
        assert!(store.search("description").await.unwrap().is_empty());

        entities::insert_entity(store.pool(), "Élodie Martin", EntityType::Person, &Attributes::new()).unwrap();
        let hits = store.search("élodie").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "Élodie Martin");
    }

    #[tokio::test]
    async fn test_unknown_id_is_not_found() {
        let store = seeded();
        assert!(matches!(store.get_by_id(999).await, Err(KgfError::NotFound(_))));
        assert!(matches!(store.get_relationships(999).await, Err(KgfError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_relationships_join_related_entity() {
        let store = seeded();
        let rels = store.get_relationships(1).await.unwrap();
        assert_eq!(rels.len(), 1);
        assert_eq!(rels[0].relation_type, "belongs_to");
        assert_eq!(rels[0].related.name, "Physics Department");
    }

    #[tokio::test]
    async fn test_on_disk_database_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let config = EntityStoreConfig {
            path: dir.path().join("kg.db"),
            max_page_size: 5,
        };
        {
            let store = SqliteEntityStore::open(&config).unwrap();
            entities::insert_entity(store.pool(), "Wang Fang", EntityType::Person, &Attributes::new()).unwrap();
        }
        let store = SqliteEntityStore::open(&config).unwrap();
        assert_eq!(store.count().await.unwrap(), 1);
        assert_eq!(store.find_by_name_key("wang fang").await.unwrap().len(), 1);
    }
}
