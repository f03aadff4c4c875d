//! Relationship database queries.

use kgf_core::{Direction, EntityId};
use rusqlite::params;

use crate::pool::{DbError, DbPool, DbResult};
use crate::queries::entities::EntityRow;

/// A relationship row joined with the entity on the other end.
#[derive(Debug, Clone)]
pub struct RelationshipRow {
    pub id: i64,
    pub relationship_type: String,
    pub direction: Direction,
    pub related: EntityRow,
}

/// Insert a relationship and return its id.
pub fn insert_relationship(
    pool: &DbPool,
    source_id: EntityId,
    relationship_type: &str,
    target_id: EntityId,
) -> DbResult<i64> {
    pool.with_conn(|conn| {
        conn.execute(
            "INSERT INTO relationships (source_entity_id, target_entity_id, relationship_type)
             VALUES (?1, ?2, ?3)",
            params![source_id, target_id, relationship_type],
        )?;
        Ok(conn.last_insert_rowid())
    })
}

/// Outgoing then incoming relationships of an entity, each ordered by type
/// and related name.
pub fn list_for_entity(pool: &DbPool, entity_id: EntityId) -> DbResult<Vec<RelationshipRow>> {
    let mut rows = query_joined(
        pool,
        "SELECT r.id, r.relationship_type,
                e.id, e.name, e.entity_type, e.attributes, e.created_at
         FROM relationships r
         JOIN entities e ON e.id = r.target_entity_id
         WHERE r.source_entity_id = ?1
         ORDER BY r.relationship_type, e.name, r.id",
        entity_id,
        None,
        Direction::Outgoing,
    )?;
    rows.extend(query_joined(
        pool,
        "SELECT r.id, r.relationship_type,
                e.id, e.name, e.entity_type, e.attributes, e.created_at
         FROM relationships r
         JOIN entities e ON e.id = r.source_entity_id
         WHERE r.target_entity_id = ?1
         ORDER BY r.relationship_type, e.name, r.id",
        entity_id,
        None,
        Direction::Incoming,
    )?);
    Ok(rows)
}

/// Relationships from `source_id` to `target_id`.
pub fn list_between(pool: &DbPool, source_id: EntityId, target_id: EntityId) -> DbResult<Vec<RelationshipRow>> {
    query_joined(
        pool,
        "SELECT r.id, r.relationship_type,
                e.id, e.name, e.entity_type, e.attributes, e.created_at
         FROM relationships r
         JOIN entities e ON e.id = r.target_entity_id
         WHERE r.source_entity_id = ?1 AND r.target_entity_id = ?2
         ORDER BY r.relationship_type, r.id",
        source_id,
        Some(target_id),
        Direction::Outgoing,
    )
}

fn query_joined(
    pool: &DbPool,
    sql: &str,
    entity_id: EntityId,
    other_id: Option<EntityId>,
    direction: Direction,
) -> DbResult<Vec<RelationshipRow>> {
    pool.with_conn(|conn| {
        let mut stmt = conn.prepare(sql)?;
        let map = |row: &rusqlite::Row<'_>| -> rusqlite::Result<RelationshipRow> {
            Ok(RelationshipRow {
                id: row.get(0)?,
                relationship_type: row.get(1)?,
                direction,
                related: EntityRow::from_row(row, 2)?,
            })
        };
        let rows = match other_id {
            Some(other) => stmt.query_map(params![entity_id, other], map)?,
            None => stmt.query_map(params![entity_id], map)?,
        };
        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations::run_migrations;
    use crate::queries::entities::insert_entity;
    use kgf_core::{Attributes, EntityType};

    #[test]
    fn test_relationships_in_both_directions() {
        let pool = DbPool::in_memory().unwrap();
        run_migrations(&pool).unwrap();
        let teacher = insert_entity(&pool, "Zhang Wei", EntityType::Person, &Attributes::new()).unwrap();
        let school = insert_entity(&pool, "Tsinghua University", EntityType::Organization, &Attributes::new()).unwrap();
        let topic = insert_entity(&pool, "Optics", EntityType::Subject, &Attributes::new()).unwrap();

        insert_relationship(&pool, teacher, "graduated_from", school).unwrap();
        insert_relationship(&pool, teacher, "researches", topic).unwrap();

        let rows = list_for_entity(&pool, teacher).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].relationship_type, "graduated_from");
        assert!(rows.iter().all(|r| r.direction == Direction::Outgoing));

        let incoming = list_for_entity(&pool, school).unwrap();
        assert_eq!(incoming.len(), 1);
        assert_eq!(incoming[0].direction, Direction::Incoming);
        assert_eq!(incoming[0].related.id, teacher);

        let between = list_between(&pool, teacher, topic).unwrap();
        assert_eq!(between.len(), 1);
        assert!(list_between(&pool, topic, teacher).unwrap().is_empty());
    }

    #[test]
    fn test_relationship_requires_existing_entities() {
        let pool = DbPool::in_memory().unwrap();
        run_migrations(&pool).unwrap();
        assert!(insert_relationship(&pool, 1, "researches", 2).is_err());
    }
}
