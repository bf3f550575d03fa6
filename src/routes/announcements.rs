use axum::{Json, Router, extract::State, http::StatusCode, routing::post};
use axum_valid::Valid;

use crate::{
    dto::announcement::{AnnouncementRequest, AnnouncementResponse},
    error::AppError,
    services::announcement_service,
    state::SharedState,
};

pub fn router() -> Router<SharedState> {
    Router::new().route("/announcements", post(publish_announcement))
}

/// Publish an operator message to every floor node.
#[utoipa::path(
    post,
    path = "/announcements",
    tag = "announcements",
    request_body = AnnouncementRequest,
    responses((status = 202, description = "Announcement shared", body = AnnouncementResponse))
)]
pub async fn publish_announcement(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<AnnouncementRequest>>,
) -> Result<(StatusCode, Json<AnnouncementResponse>), AppError> {
    let response = announcement_service::publish_operator_message(&state, payload).await?;
    Ok((StatusCode::ACCEPTED, Json(response)))
}
