//! SQLite connection handling.
//!
//! A single `Mutex<Connection>` serializes access; WAL mode and a busy
//! timeout keep readers from blocking each other on file databases.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use kgf_core::{KgfError, Provenance};
use rusqlite::Connection;
use thiserror::Error;
use tracing::warn;

/// Database error types.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Connection(#[from] rusqlite::Error),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Blocking task failed: {0}")]
    Task(String),
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

impl From<DbError> for KgfError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound(what) => KgfError::NotFound(what),
            other => KgfError::unavailable(Provenance::EntityStore, other.to_string()),
        }
    }
}

/// Shared handle to the entity database.
#[derive(Clone, Debug)]
pub struct DbPool {
    conn: Arc<Mutex<Connection>>,
}

impl DbPool {
    /// Open (or create) a database file.
    pub fn open(path: &Path) -> DbResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| DbError::InvalidData(format!("{}: {}", parent.display(), e)))?;
            }
        }
        let conn = Connection::open(path)?;
        let _ = conn.pragma_update(None, "journal_mode", "WAL");
        conn.pragma_update(None, "busy_timeout", 5000)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self::from_connection(conn))
    }

    /// Private in-memory database, mostly for tests.
    pub fn in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Run `f` with shared access to the connection.
    pub fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> DbResult<T>) -> DbResult<T> {
        let guard = self.lock();
        f(&guard)
    }

    /// Run `f` with exclusive access to the connection.
    pub fn with_conn_mut<T>(&self, f: impl FnOnce(&mut Connection) -> DbResult<T>) -> DbResult<T> {
        let mut guard = self.lock();
        f(&mut guard)
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        match self.conn.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("SQLite mutex was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}
