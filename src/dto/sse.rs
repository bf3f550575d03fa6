use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::dto::{alert::AlertView, station::StationView};

#[derive(Clone, Debug)]
/// Dispatched payload carried across SSE channels.
pub struct ServerEvent {
    pub event: Option<String>,
    pub data: String,
}

impl ServerEvent {
    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Initial metadata sent to an SSE client when it connects.
pub struct Handshake {
    /// Identifier of the SSE stream.
    pub stream: String,
    /// Human-readable message confirming the subscription.
    pub message: String,
    /// Whether the node is running without a storage backend connection.
    pub degraded: bool,
    /// Stations known to the node at connection time.
    pub stations: Vec<StationView>,
    /// Expiry alerts still waiting for an operator.
    pub pending_alerts: Vec<AlertView>,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when the node enters or leaves degraded mode.
pub struct SystemStatus {
    pub degraded: bool,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast every time the store pushes a new station list.
pub struct StationsSnapshotEvent {
    pub stations: Vec<StationView>,
}

#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
/// Which detector condition produced a floor notice.
pub enum FloorNoticeKind {
    Warning,
    Expiry,
}

#[derive(Debug, Serialize, ToSchema)]
/// Detector output for one station and one condition.
pub struct FloorNoticeEvent {
    pub kind: FloorNoticeKind,
    pub station_id: Uuid,
    pub station_name: String,
    /// Member name, or `everyone` for a grouped notice.
    pub audience: String,
    pub everyone: bool,
    /// Text handed to the playback queue.
    pub text: String,
    /// Acknowledgement raised alongside an expiry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert: Option<AlertView>,
}

#[derive(Debug, Serialize, ToSchema)]
/// Emitted once an operator acknowledged an expiry.
pub struct AlertDismissedEvent {
    pub alert_id: Uuid,
    pub station_id: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
/// Operator message received from the shared channel and queued for playback.
pub struct OperatorAnnouncementEvent {
    pub id: Uuid,
    pub text: String,
    pub timestamp: String,
}
