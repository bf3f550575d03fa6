use std::convert::Infallible;

use axum::{Router, extract::State, response::sse::Sse, routing::get};
use futures::Stream;
use tracing::info;

use crate::{services::sse_service, state::SharedState};

#[utoipa::path(
    get,
    path = "/sse/floor",
    tag = "sse",
    responses((status = 200, description = "Floor SSE stream", content_type = "text/event-stream", body = String))
)]
/// Stream station snapshots, floor notices and alerts to the local UI.
pub async fn floor_stream(
    State(state): State<SharedState>,
) -> Sse<impl Stream<Item = Result<axum::response::sse::Event, Infallible>>> {
    let receiver = sse_service::subscribe_floor(&state);
    info!("New floor SSE connection");
    let handshake = sse_service::floor_handshake(&state).await;
    sse_service::to_sse_stream(receiver, handshake)
}

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/sse/floor", get(floor_stream))
}
