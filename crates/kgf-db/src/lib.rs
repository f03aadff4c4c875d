//! KGF Database Layer
//!
//! SQLite-backed entity store: curated entity records, their attributes and
//! the relationships intrinsic to the relational store.

pub mod migrations;
pub mod pool;
pub mod queries;
pub mod store;

pub use pool::{DbError, DbPool, DbResult};
pub use store::{EntityStoreConfig, SqliteEntityStore};

/// Open a database file (or `:memory:`) and bring its schema up to date.
pub fn init_pool(path: &std::path::Path) -> DbResult<DbPool> {
    let pool = if path.as_os_str() == ":memory:" {
        DbPool::in_memory()?
    } else {
        DbPool::open(path)?
    };
    migrations::run_migrations(&pool)?;
    Ok(pool)
}
