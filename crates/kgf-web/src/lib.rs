//! KGF Web Server
//!
//! Axum-based JSON API over the federation gateway.

pub mod routes;
pub mod state;

use axum::{routing::get, Router};
use kgf_federation::CancellationToken;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub use state::{AppState, WebConfig};

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/health", get(routes::health))
        .route("/search", get(routes::search::search))
        .route("/entities/{identity}", get(routes::entities::get_entity))
        .route("/subgraph/{identity}", get(routes::subgraph::get_subgraph))
        .with_state(state.clone());

    Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Run the web server until `shutdown` fires.
pub async fn run_server(state: AppState, config: &WebConfig, shutdown: CancellationToken) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Web server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use kgf_core::store::memory::{MemoryEntityStore, MemoryGraphStore};
    use kgf_core::{Entity, EntityType, FederationConfig, GraphNode};
    use kgf_federation::FederationGateway;
    use serde_json::Value;
    use tower::ServiceExt;

    fn app_with(graph: MemoryGraphStore, config: WebConfig) -> Router {
        let entity = MemoryEntityStore::new()
            .with_entity(Entity::new(1, "Zhang Wei", EntityType::Person))
            .with_entity(Entity::new(2, "Tsinghua University", EntityType::Organization))
            .with_relationship(1, "graduated_from", 2);
        let gateway =
            FederationGateway::new(Arc::new(entity), Arc::new(graph), FederationConfig::default()).unwrap();
        create_router(AppState::new(Arc::new(gateway), &config, CancellationToken::new()))
    }

    fn app() -> Router {
        let graph = MemoryGraphStore::new()
            .with_node(GraphNode::new("Zhang Wei"))
            .with_node(GraphNode::new("Li Ming"))
            .with_edge("Zhang Wei", "colleague", "Li Ming");
        app_with(graph, WebConfig::default())
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    #[tokio::test]
    async fn test_search_endpoint() {
        let (status, body) = get(app(), "/api/search?q=zhang").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["partial"], false);
        assert_eq!(body["results"][0]["name"], "Zhang Wei");
        assert_eq!(body["results"][0]["confidence"], "normalized");
        assert_eq!(body["results"][0]["sides"], "both");
    }

    #[tokio::test]
    async fn test_detail_endpoint_by_id_and_name() {
        let (status, body) = get(app(), "/api/entities/1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["relationships"].as_array().map(Vec::len), Some(2));
        assert_eq!(body["relationships"][0]["provenance"], "entity-store");
        assert_eq!(body["relationships"][1]["provenance"], "graph-store");

        let (status, body) = get(app(), "/api/entities/Li%20Ming").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["entity"]["confidence"], "unmatched");

        let (status, _) = get(app(), "/api/entities/Nobody").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_subgraph_endpoint() {
        let (status, body) = get(app(), "/api/subgraph/Zhang%20Wei?depth=1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["seed"], "zhang wei");
        assert_eq!(body["nodes"].as_array().map(Vec::len), Some(3));
        assert_eq!(body["truncated"], false);
        assert!(body.get("reason").is_none());

        let (status, _) = get(app(), "/api/subgraph/Zhang%20Wei?depth=9").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_degraded_subgraph_discloses_reason() {
        let (status, body) = get(app_with(MemoryGraphStore::new().failing(), WebConfig::default()), "/api/subgraph/1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["truncated"], true);
        assert_eq!(body["reason"], "degraded");
    }

    #[tokio::test]
    async fn test_request_timeout_cancels() {
        let config = WebConfig {
            request_timeout_ms: 20,
            ..WebConfig::default()
        };
        let graph = MemoryGraphStore::new()
            .with_node(GraphNode::new("Zhang Wei"))
            .with_latency(Duration::from_secs(5));
        let (status, _) = get(app_with(graph, config), "/api/subgraph/Zhang%20Wei").await;
        assert_eq!(status, StatusCode::REQUEST_TIMEOUT);
    }
}
