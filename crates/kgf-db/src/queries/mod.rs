//! Database query implementations.

pub mod entities;
pub mod relationships;
