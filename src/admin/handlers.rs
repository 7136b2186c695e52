use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::admin::AdminState;
use crate::forwarding::ArmState;
use crate::status::PipelineStatus;

#[derive(Serialize)]
pub struct StatusResponse {
    pub version: &'static str,
    pub pipeline: PipelineStatus,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct RetryResponse {
    pub accepted: bool,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION"),
        pipeline: state.board.snapshot(),
    })
}

pub async fn post_retry(
    State(state): State<AdminState>,
) -> Result<Json<RetryResponse>, (StatusCode, String)> {
    let engine = state.engine.as_ref().ok_or((
        StatusCode::SERVICE_UNAVAILABLE,
        "forwarding is disabled".to_string(),
    ))?;

    if state.board.snapshot().arm_state == ArmState::Submitting {
        return Err((StatusCode::CONFLICT, "a forward is in flight".to_string()));
    }

    engine
        .retry()
        .await
        .map_err(|e| (StatusCode::SERVICE_UNAVAILABLE, e.to_string()))?;

    tracing::info!("Operator requested forwarding retry");
    Ok(Json(RetryResponse { accepted: true }))
}
