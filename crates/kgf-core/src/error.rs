//! Centralized error types for KGF.

use thiserror::Error;

use crate::model::Provenance;

/// Main error type for federation operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum KgfError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("{store} unavailable: {reason}")]
    StoreUnavailable { store: Provenance, reason: String },

    #[error("All backends unavailable: {0}")]
    BackendsUnavailable(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Request cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for KGF operations.
pub type KgfResult<T> = Result<T, KgfError>;

impl KgfError {
    /// Create a not found error.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Create an invalid argument error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create a store unavailable error for the given backend.
    pub fn unavailable(store: Provenance, reason: impl Into<String>) -> Self {
        Self::StoreUnavailable {
            store,
            reason: reason.into(),
        }
    }

    /// True for failures that degraded mode can absorb.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::StoreUnavailable { .. })
    }
}
