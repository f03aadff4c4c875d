//! Subgraph route handler.

use axum::extract::{Path, Query, State};
use axum::Json;
use kgf_core::Subgraph;
use serde::Deserialize;

use super::{api_error, ApiResult};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct SubgraphParams {
    pub depth: Option<i64>,
}

pub async fn get_subgraph(
    State(state): State<AppState>,
    Path(identity): Path<String>,
    Query(params): Query<SubgraphParams>,
) -> ApiResult<Subgraph> {
    let cancel = state.request_token();
    let _guard = cancel.clone().drop_guard();

    let subgraph = state
        .bounded(state.gateway.get_subgraph(&identity, params.depth, &cancel))
        .await
        .map_err(api_error)?;

    Ok(Json(subgraph))
}
