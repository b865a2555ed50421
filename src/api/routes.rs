//! Sky map API routes
//!
//! | Endpoint | Method | Description |
//! |----------|--------|-------------|
//! | `/api/submit` | POST | Submit a typed target, a target list and/or a cycle |
//! | `/api/click` | POST | Place an unnamed target at a clicked position |
//! | `/api/cycle/:cycle` | POST | Draw the CCD footprints of a cycle |
//! | `/api/scene` | GET | Current layers, center and batch progress |
//! | `/api/export` | POST | Selected rows of a table as CSV |
//! | `/api/health` | GET | Liveness |

use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::{ApiResponse, AppState};
use crate::export::{export_selected, ColumnTable};
use crate::footprint::FootprintSelection;
use crate::overlay::SceneSnapshot;
use crate::registry::BatchId;
use crate::resolver::ResolutionOutcome;
use crate::session::{Alert, BatchStatus, Submission};

/// How often a waiting submit applies delivered outcomes
const PUMP_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Default, Deserialize)]
pub struct SubmitRequest {
    pub target_text: Option<String>,
    /// Contents of an uploaded target list
    pub batch_csv: Option<String>,
    pub cycle: Option<u32>,
    /// Wait for the batch to complete before responding (default true)
    pub wait: Option<bool>,
}

impl From<SubmitRequest> for Submission {
    fn from(request: SubmitRequest) -> Self {
        Submission {
            target_text: request.target_text,
            batch_file: request.batch_csv.map(String::into_bytes),
            cycle: request.cycle,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub batch: Option<BatchId>,
    pub status: BatchStatus,
    pub alerts: Vec<Alert>,
    /// True when the wait for completion ran out
    pub timed_out: bool,
}

#[derive(Debug, Deserialize)]
pub struct ClickRequest {
    pub ra: f64,
    pub dec: f64,
}

#[derive(Debug, Serialize)]
pub struct ClickResponse {
    pub outcome: ResolutionOutcome,
    pub alerts: Vec<Alert>,
}

#[derive(Debug, Serialize)]
pub struct SceneResponse {
    pub scene: SceneSnapshot,
    pub status: BatchStatus,
    pub alerts: Vec<Alert>,
}

#[derive(Debug, Deserialize)]
pub struct ExportRequest {
    pub table: ColumnTable,
    pub selected: Vec<usize>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/submit", post(submit))
        .route("/api/click", post(click))
        .route("/api/cycle/:cycle", post(select_cycle))
        .route("/api/scene", get(scene))
        .route("/api/export", post(export))
        .with_state(state)
}

async fn health_check() -> Json<ApiResponse<String>> {
    Json(ApiResponse::ok("OK".to_string()))
}

async fn submit(
    State(state): State<AppState>,
    Json(request): Json<SubmitRequest>,
) -> Json<ApiResponse<SubmitResponse>> {
    let wait = request.wait.unwrap_or(true);
    let batch = state.session.lock().await.submit(request.into()).await;

    let mut timed_out = false;
    if let (true, Some(batch)) = (wait, batch) {
        timed_out = tokio::time::timeout(state.submit_timeout, settle_batch(&state, batch))
            .await
            .is_err();
        if timed_out {
            tracing::warn!(timeout = ?state.submit_timeout, "Submit returned before batch completed");
        }
    }

    let mut session = state.session.lock().await;
    session.pump();
    Json(ApiResponse::ok(SubmitResponse {
        batch,
        status: session.status(),
        alerts: session.take_alerts(),
        timed_out,
    }))
}

/// Apply outcomes until `batch` completes or is superseded, holding the
/// session lock only while pumping
async fn settle_batch(state: &AppState, batch: BatchId) {
    loop {
        {
            let mut session = state.session.lock().await;
            session.pump();
            let status = session.status();
            if status.complete || status.batch != Some(batch) {
                return;
            }
        }
        tokio::time::sleep(PUMP_INTERVAL).await;
    }
}

async fn click(
    State(state): State<AppState>,
    Json(request): Json<ClickRequest>,
) -> Json<ApiResponse<ClickResponse>> {
    let mut session = state.session.lock().await;
    let outcome = session.click(request.ra, request.dec);
    Json(ApiResponse::ok(ClickResponse {
        outcome,
        alerts: session.take_alerts(),
    }))
}

async fn select_cycle(
    State(state): State<AppState>,
    Path(cycle): Path<u32>,
) -> Result<Json<ApiResponse<FootprintSelection>>, (StatusCode, Json<ApiResponse<FootprintSelection>>)>
{
    let mut session = state.session.lock().await;
    match session.select_cycle(cycle).await {
        Ok(selection) => Ok(Json(ApiResponse::ok(selection))),
        Err(err) => {
            // the alert is reported through the error body instead
            session.take_alerts();
            Err((StatusCode::BAD_GATEWAY, Json(ApiResponse::failed(err.to_string()))))
        }
    }
}

async fn scene(State(state): State<AppState>) -> Json<ApiResponse<SceneResponse>> {
    let mut session = state.session.lock().await;
    session.pump();
    Json(ApiResponse::ok(SceneResponse {
        scene: session.overlays().surface().snapshot(),
        status: session.status(),
        alerts: session.take_alerts(),
    }))
}

async fn export(Json(request): Json<ExportRequest>) -> Response {
    match export_selected(&request.table, &request.selected) {
        Ok(csv) => ([(header::CONTENT_TYPE, "text/csv")], csv).into_response(),
        Err(err) => (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::<()>::failed(err.to_string())),
        )
            .into_response(),
    }
}
