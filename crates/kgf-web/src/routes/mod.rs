//! Route handlers.

pub mod entities;
pub mod search;
pub mod subgraph;

use axum::{http::StatusCode, Json};
use kgf_core::KgfError;
use serde_json::{json, Value};

/// Handler result: JSON body or a status with a message.
pub type ApiResult<T> = Result<Json<T>, (StatusCode, String)>;

/// HTTP status for a federation error.
pub fn status_for(err: &KgfError) -> StatusCode {
    match err {
        KgfError::NotFound(_) => StatusCode::NOT_FOUND,
        KgfError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
        KgfError::BackendsUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        KgfError::Cancelled => StatusCode::REQUEST_TIMEOUT,
        KgfError::StoreUnavailable { .. } | KgfError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub(crate) fn api_error(err: KgfError) -> (StatusCode, String) {
    let status = status_for(&err);
    if status.is_server_error() {
        tracing::warn!(error = %err, "Request failed");
    }
    (status, err.to_string())
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use kgf_core::Provenance;

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for(&KgfError::not_found("x")), StatusCode::NOT_FOUND);
        assert_eq!(status_for(&KgfError::invalid("depth")), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_for(&KgfError::BackendsUnavailable("both".into())),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(status_for(&KgfError::Cancelled), StatusCode::REQUEST_TIMEOUT);
        assert_eq!(
            status_for(&KgfError::unavailable(Provenance::GraphStore, "down")),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
