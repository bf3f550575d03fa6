use tracing::warn;

use crate::{
    dto::health::{HealthResponse, NodeActivity},
    state::SharedState,
};

/// Report degraded mode and playback backlog, logging connectivity issues.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    match state.require_store().await {
        Ok(store) => {
            if let Err(err) = store.health_check().await {
                warn!(error = %err, "storage health check failed");
            }
        }
        Err(_) => warn!("storage unavailable (degraded mode)"),
    }

    let activity = NodeActivity {
        pending_announcements: state.playback().pending(),
        audio_unlocked: state.playback().is_unlocked(),
        floor_clients: state.floor_sse().clients(),
    };
    if state.is_degraded().await {
        HealthResponse::degraded(activity)
    } else {
        HealthResponse::ok(activity)
    }
}
