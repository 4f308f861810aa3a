//! Health and runtime status handlers.

use axum::extract::{Query, State};
use axum::response::Json;
use serde::{Deserialize, Serialize};
use tracing::trace;
use ts_rs::TS;

use crate::openclaw::Snapshot;
use crate::openclaw::models::RuntimeStatus;
use crate::state::AppState;

/// `?stale=true` serves whatever is cached immediately and refreshes in the
/// background.
#[derive(Debug, Default, Deserialize)]
pub struct DatasetQuery {
    #[serde(default)]
    pub stale: bool,
}

#[derive(Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct HealthResponse {
    status: String,
    version: String,
    commit: String,
    #[ts(type = "number")]
    uptime_secs: u64,
    timestamp: String,
}

/// Liveness only; never touches the OpenClaw CLI.
pub(super) async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    trace!("health check requested");
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        commit: env!("GIT_COMMIT_SHORT").to_string(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

pub(super) async fn status(
    State(state): State<AppState>,
    Query(query): Query<DatasetQuery>,
) -> Json<Snapshot<RuntimeStatus>> {
    let dataset = &state.openclaw.status;
    Json(if query.stale {
        dataset.stale_snapshot()
    } else {
        dataset.snapshot().await
    })
}
