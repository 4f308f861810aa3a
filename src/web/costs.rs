//! Combined cost endpoint. The text summary and the JSON detail are separate
//! datasets; a failure in one leaves the other intact.

use axum::extract::{Query, State};
use axum::response::Json;
use serde::Serialize;
use ts_rs::TS;

use crate::openclaw::Snapshot;
use crate::openclaw::cost_text::CostSummary;
use crate::openclaw::models::CostDetail;
use crate::state::AppState;
use crate::web::status::DatasetQuery;

#[derive(Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CostsResponse {
    pub summary: Snapshot<CostSummary>,
    pub detail: Snapshot<CostDetail>,
}

pub(super) async fn costs(
    State(state): State<AppState>,
    Query(query): Query<DatasetQuery>,
) -> Json<CostsResponse> {
    let openclaw = &state.openclaw;
    let (summary, detail) = if query.stale {
        (
            openclaw.cost_text.stale_snapshot(),
            openclaw.cost_json.stale_snapshot(),
        )
    } else {
        tokio::join!(
            openclaw.cost_text.snapshot(),
            openclaw.cost_json.snapshot()
        )
    };
    Json(CostsResponse { summary, detail })
}
