//! # KGF Federation
//!
//! Query federation over the entity store and the graph store: guarded
//! backend calls, seed resolution, bounded subgraph assembly and the
//! [`FederationGateway`] consumed by the web and CLI surfaces.

mod assembler;
pub mod call;
mod resolve;
pub mod gateway;

pub use gateway::{DetailRelationship, DetailResponse, FederationGateway, SearchResponse};
pub use resolve::Identity;
pub use tokio_util::sync::CancellationToken;
