//! Entity database queries.

use kgf_core::{normalize_name, Attributes, Entity, EntityId, EntityType};
use rusqlite::{params, Row};

use crate::pool::{DbError, DbPool, DbResult};

const ENTITY_COLUMNS: &str = "id, name, entity_type, attributes, created_at";

/// Entity row from database.
#[derive(Debug, Clone)]
pub struct EntityRow {
    pub id: EntityId,
    pub name: String,
    pub entity_type: String,
    pub attributes: String,
    pub created_at: String,
}

impl EntityRow {
    /// Map a row selected with `ENTITY_COLUMNS` starting at `offset`.
    pub(crate) fn from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(offset)?,
            name: row.get(offset + 1)?,
            entity_type: row.get(offset + 2)?,
            attributes: row.get(offset + 3)?,
            created_at: row.get(offset + 4)?,
        })
    }

    /// Convert into the domain record.
    pub fn into_entity(self) -> DbResult<Entity> {
        let entity_type = EntityType::parse(&self.entity_type).ok_or_else(|| {
            DbError::InvalidData(format!("entity {} has unknown type '{}'", self.id, self.entity_type))
        })?;
        let attributes: Attributes = if self.attributes.trim().is_empty() {
            Attributes::new()
        } else {
            serde_json::from_str(&self.attributes)?
        };

        Ok(Entity {
            id: self.id,
            name: self.name,
            entity_type,
            attributes,
        })
    }
}

/// Insert an entity and return its id.
pub fn insert_entity(
    pool: &DbPool,
    name: &str,
    entity_type: EntityType,
    attributes: &Attributes,
) -> DbResult<EntityId> {
    let attributes = serde_json::to_string(attributes)?;
    pool.with_conn(|conn| {
        conn.execute(
            "INSERT INTO entities (name, name_key, entity_type, attributes)
             VALUES (?1, ?2, ?3, ?4)",
            params![name, normalize_name(name), entity_type.as_str(), attributes],
        )?;
        Ok(conn.last_insert_rowid())
    })
}

/// Get an entity by ID.
pub fn get_entity(pool: &DbPool, id: EntityId) -> DbResult<EntityRow> {
    pool.with_conn(|conn| {
        conn.query_row(
            &format!("SELECT {} FROM entities WHERE id = ?1", ENTITY_COLUMNS),
            params![id],
            |row| EntityRow::from_row(row, 0),
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => DbError::NotFound(format!("Entity: {}", id)),
            e => DbError::Connection(e),
        })
    })
}

/// List every entity, ordered by name then id.
pub fn list_entities(pool: &DbPool) -> DbResult<Vec<EntityRow>> {
    query_rows(
        pool,
        &format!("SELECT {} FROM entities ORDER BY name, id", ENTITY_COLUMNS),
        [],
    )
}

/// Rows that may match a keyword search for `needle` (already trimmed and
/// lower-cased). The result is a superset: attribute keys can match too, so
/// callers still rank and filter. SQLite folds ASCII case only and stores
/// numbers in JSON notation, so needles needing Unicode folding or holding
/// digits scan every row instead.
pub fn search_candidates(pool: &DbPool, needle: &str) -> DbResult<Vec<EntityRow>> {
    if !prefilter_applies(needle) {
        return list_entities(pool);
    }
    query_rows(
        pool,
        &format!(
            "SELECT {} FROM entities
             WHERE instr(lower(name), ?1) > 0 OR instr(lower(attributes), ?1) > 0
             ORDER BY name, id",
            ENTITY_COLUMNS
        ),
        params![needle],
    )
}

fn prefilter_applies(needle: &str) -> bool {
    !needle.is_empty()
        && needle.chars().all(|c| {
            if c.is_ascii() {
                !c.is_ascii_control() && !c.is_ascii_digit() && c != '"' && c != '\\'
            } else {
                !c.is_lowercase() && !c.is_uppercase()
            }
        })
}

/// List entities of one type, ordered by name then id.
pub fn list_entities_by_type(pool: &DbPool, entity_type: EntityType, limit: usize) -> DbResult<Vec<EntityRow>> {
    query_rows(
        pool,
        &format!(
            "SELECT {} FROM entities WHERE entity_type = ?1 ORDER BY name, id LIMIT ?2",
            ENTITY_COLUMNS
        ),
        params![entity_type.as_str(), limit as i64],
    )
}

/// Entities whose normalized name equals `key`, ordered by id.
pub fn find_by_name_key(pool: &DbPool, key: &str) -> DbResult<Vec<EntityRow>> {
    query_rows(
        pool,
        &format!("SELECT {} FROM entities WHERE name_key = ?1 ORDER BY id", ENTITY_COLUMNS),
        params![key],
    )
}

/// Count all entities.
pub fn count_entities(pool: &DbPool) -> DbResult<usize> {
    pool.with_conn(|conn| {
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM entities", [], |row| row.get(0))?;
        Ok(count as usize)
    })
}

fn query_rows<P: rusqlite::Params>(pool: &DbPool, sql: &str, params: P) -> DbResult<Vec<EntityRow>> {
    pool.with_conn(|conn| {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params, |row| EntityRow::from_row(row, 0))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    })
}
