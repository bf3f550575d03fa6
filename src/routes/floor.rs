use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dto::{
        alert::{AlertView, DismissAlertResponse},
        audio::AudioUnlockResponse,
    },
    error::AppError,
    services::floor_service,
    state::SharedState,
};

/// Acknowledgement and audio endpoints local to this node.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/alerts", get(list_alerts))
        .route("/alerts/{id}/dismiss", post(dismiss_alert))
        .route("/audio/unlock", post(unlock_audio))
}

/// Expiry alerts waiting for an operator, oldest first.
#[utoipa::path(
    get,
    path = "/alerts",
    tag = "floor",
    responses((status = 200, description = "Pending alerts", body = [AlertView]))
)]
pub async fn list_alerts(State(state): State<SharedState>) -> Json<Vec<AlertView>> {
    Json(floor_service::pending_alerts(&state))
}

/// Acknowledge an expiry alert; the response names the station to check out.
#[utoipa::path(
    post,
    path = "/alerts/{id}/dismiss",
    tag = "floor",
    params(("id" = Uuid, Path, description = "Alert identifier")),
    responses((status = 200, description = "Alert dismissed", body = DismissAlertResponse))
)]
pub async fn dismiss_alert(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DismissAlertResponse>, AppError> {
    Ok(Json(floor_service::dismiss_alert(&state, id)?))
}

/// Unlock audio output after a user gesture on the floor UI.
#[utoipa::path(
    post,
    path = "/audio/unlock",
    tag = "floor",
    responses((status = 200, description = "Audio unlocked", body = AudioUnlockResponse))
)]
pub async fn unlock_audio(State(state): State<SharedState>) -> Json<AudioUnlockResponse> {
    let newly_unlocked = floor_service::unlock_audio(&state).await;
    Json(AudioUnlockResponse {
        unlocked: true,
        newly_unlocked,
    })
}
