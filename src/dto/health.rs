use serde::Serialize;
use utoipa::ToSchema;

/// Health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: String,
    /// Items waiting in this node's playback queue, including the one being voiced.
    pub pending_announcements: usize,
    /// Whether a user gesture has unlocked audio output on this node.
    pub audio_unlocked: bool,
    /// Floor UIs currently attached to `/sse/floor`.
    pub floor_clients: usize,
}

/// Local activity of the node reported alongside its storage status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeActivity {
    pub pending_announcements: usize,
    pub audio_unlocked: bool,
    pub floor_clients: usize,
}

impl HealthResponse {
    /// Create a health response indicating the node is operational.
    pub fn ok(activity: NodeActivity) -> Self {
        Self::with_status("ok", activity)
    }

    /// Create a health response indicating the node runs without storage.
    pub fn degraded(activity: NodeActivity) -> Self {
        Self::with_status("degraded", activity)
    }

    fn with_status(status: &str, activity: NodeActivity) -> Self {
        Self {
            status: status.to_string(),
            pending_announcements: activity.pending_announcements,
            audio_unlocked: activity.audio_unlocked,
            floor_clients: activity.floor_clients,
        }
    }
}
