use serde::Serialize;
use tracing::{debug, warn};

use crate::{
    dao::models::AnnouncementEntity,
    dto::{
        format_system_time,
        sse::{
            AlertDismissedEvent, FloorNoticeEvent, OperatorAnnouncementEvent, ServerEvent,
            StationsSnapshotEvent, SystemStatus,
        },
    },
    state::{AppState, ExpiryAlert, station::Station},
};

const EVENT_SYSTEM_STATUS: &str = "system.status";
const EVENT_STATIONS_SNAPSHOT: &str = "stations.snapshot";
const EVENT_FLOOR_WARNING: &str = "floor.warning";
const EVENT_FLOOR_EXPIRY: &str = "floor.expiry";
const EVENT_ALERT_DISMISSED: &str = "alert.dismissed";
const EVENT_ANNOUNCEMENT: &str = "announcement.received";

/// Broadcast a degraded mode change.
pub fn broadcast_system_status(state: &AppState, degraded: bool) {
    send_floor_event(state, EVENT_SYSTEM_STATUS, &SystemStatus { degraded });
}

/// Broadcast the station list pushed by the store.
pub fn broadcast_stations_snapshot(state: &AppState, stations: &[Station]) {
    let payload = StationsSnapshotEvent {
        stations: stations.iter().cloned().map(Into::into).collect(),
    };
    send_floor_event(state, EVENT_STATIONS_SNAPSHOT, &payload);
}

/// Broadcast a detector warning.
pub fn broadcast_floor_warning(state: &AppState, notice: &FloorNoticeEvent) {
    send_floor_event(state, EVENT_FLOOR_WARNING, notice);
}

/// Broadcast a detector expiry together with its acknowledgement alert.
pub fn broadcast_floor_expiry(state: &AppState, notice: &FloorNoticeEvent) {
    send_floor_event(state, EVENT_FLOOR_EXPIRY, notice);
}

pub fn broadcast_alert_dismissed(state: &AppState, alert: &ExpiryAlert) {
    let payload = AlertDismissedEvent {
        alert_id: alert.id,
        station_id: alert.station_id,
    };
    send_floor_event(state, EVENT_ALERT_DISMISSED, &payload);
}

/// Broadcast an operator message picked up from the shared channel.
pub fn broadcast_operator_announcement(state: &AppState, record: &AnnouncementEntity) {
    let payload = OperatorAnnouncementEvent {
        id: record.id,
        text: record.text.clone(),
        timestamp: format_system_time(record.timestamp),
    };
    send_floor_event(state, EVENT_ANNOUNCEMENT, &payload);
}

fn send_floor_event(state: &AppState, event: &str, payload: &impl Serialize) {
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(message) => {
            let clients = state.floor_sse().broadcast(message);
            debug!(event, clients, "floor event sent");
        }
        Err(err) => warn!(event, error = %err, "failed to serialize floor SSE payload"),
    }
}
