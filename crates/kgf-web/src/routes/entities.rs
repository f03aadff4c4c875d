//! Entity detail route handler.

use axum::extract::{Path, State};
use axum::Json;
use kgf_federation::DetailResponse;

use super::{api_error, ApiResult};
use crate::state::AppState;

/// `identity` is an entity id or a display name.
pub async fn get_entity(
    State(state): State<AppState>,
    Path(identity): Path<String>,
) -> ApiResult<DetailResponse> {
    let cancel = state.request_token();
    let _guard = cancel.clone().drop_guard();

    let detail = state
        .bounded(state.gateway.get_detail(&identity, &cancel))
        .await
        .map_err(api_error)?;

    Ok(Json(detail))
}
