//! Search route handler.

use axum::extract::{Query, State};
use axum::Json;
use kgf_federation::SearchResponse;
use serde::Deserialize;

use super::{api_error, ApiResult};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
}

pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> ApiResult<SearchResponse> {
    let cancel = state.request_token();
    let _guard = cancel.clone().drop_guard();

    let response = state
        .bounded(state.gateway.search(&params.q, &cancel))
        .await
        .map_err(api_error)?;

    Ok(Json(response))
}
