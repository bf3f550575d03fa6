use tracing::info;
use uuid::Uuid;

use crate::{
    dto::alert::{AlertView, DismissAlertResponse},
    error::ServiceError,
    services::sse_events,
    state::SharedState,
};

/// Expiry acknowledgements still waiting on this node, oldest first.
pub fn pending_alerts(state: &SharedState) -> Vec<AlertView> {
    state
        .alerts()
        .pending()
        .into_iter()
        .map(Into::into)
        .collect()
}

/// Acknowledge an expiry and hand the station back for checkout.
pub fn dismiss_alert(state: &SharedState, id: Uuid) -> Result<DismissAlertResponse, ServiceError> {
    let alert = state
        .alerts()
        .dismiss(id)
        .ok_or_else(|| ServiceError::NotFound(format!("alert `{id}` is not pending")))?;

    info!(alert_id = %id, station_id = %alert.station_id, "expiry alert dismissed");
    sse_events::broadcast_alert_dismissed(state, &alert);
    Ok(DismissAlertResponse {
        station_id: alert.station_id,
    })
}

/// Open the local audio gate after a user gesture. Returns whether this call opened it.
pub async fn unlock_audio(state: &SharedState) -> bool {
    state.playback().unlock().await
}
