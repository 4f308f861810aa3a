//! Cache diagnostics and manual invalidation.

use axum::extract::{Path, State};
use axum::response::Json;
use serde::Serialize;
use tracing::info;
use ts_rs::TS;

use crate::openclaw::{CacheKey, DatasetDiagnostics};
use crate::state::AppState;
use crate::web::error::{ApiError, ApiErrorCode};

#[derive(Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CacheStateResponse {
    pub datasets: Vec<DatasetDiagnostics>,
}

#[derive(Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct InvalidateResponse {
    pub invalidated: CacheKey,
}

pub(super) async fn cache_state(State(state): State<AppState>) -> Json<CacheStateResponse> {
    Json(CacheStateResponse {
        datasets: state.openclaw.diagnostics(),
    })
}

pub(super) async fn invalidate(
    State(state): State<AppState>,
    Path(dataset): Path<String>,
) -> Result<Json<InvalidateResponse>, ApiError> {
    let key: CacheKey = dataset
        .parse()
        .map_err(|msg: String| ApiError::new(ApiErrorCode::UnknownDataset, msg))?;
    state.openclaw.invalidate(key);
    info!(dataset = %key, "cache invalidated on request");
    Ok(Json(InvalidateResponse { invalidated: key }))
}
