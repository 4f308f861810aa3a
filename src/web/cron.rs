//! Cron job listing and manual triggering.

use axum::extract::{Path, State};
use axum::response::Json;
use tracing::{info, warn};

use crate::openclaw::models::{CommandReport, CronJobs};
use crate::openclaw::{JobId, Snapshot};
use crate::state::AppState;
use crate::web::error::{ApiError, ApiErrorCode};

pub(super) async fn list_cron(State(state): State<AppState>) -> Json<Snapshot<CronJobs>> {
    Json(state.openclaw.cron.snapshot().await)
}

/// `POST /api/cron/{id}/run`
pub(super) async fn run_cron(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CommandReport>, ApiError> {
    let job = JobId::parse(&id).ok_or_else(|| {
        ApiError::new(
            ApiErrorCode::InvalidJobId,
            "job ids are 1-128 characters of letters, digits, '-', '_', ':' or '.'",
        )
    })?;

    match state.openclaw.run_cron_job(&job).await {
        Ok(report) => {
            info!(job = job.as_str(), "cron job run requested");
            Ok(Json(report))
        }
        Err(e) => {
            warn!(job = job.as_str(), kind = e.kind(), error = %e, "cron job run failed");
            Err(e.into())
        }
    }
}
