mod common;

use arcade_floor_back::{
    dao::{models::StationStatus, venue_store::MemoryVenueStore},
    dto::station::{
        CreateStationRequest, MoveSessionRequest, StartSessionRequest, UpdateStationRequest,
    },
    error::ServiceError,
    services::station_service,
    state::SharedState,
};
use common::{node, node_on};
use serde_json::json;

async fn online_node() -> SharedState {
    node_on(MemoryVenueStore::new()).await
}

async fn create(state: &SharedState, name: &str) -> uuid::Uuid {
    let request: CreateStationRequest =
        serde_json::from_value(json!({ "name": name, "kind": "console" })).unwrap();
    station_service::create_station(state, request).await.unwrap().id
}

#[tokio::test]
async fn node_without_store_reports_degraded() {
    let state = node();

    assert!(state.is_degraded().await);
    let err = station_service::list_stations(&state).await.unwrap_err();
    assert!(matches!(err, ServiceError::Degraded));
}

#[tokio::test]
async fn session_moves_between_stations() {
    let state = online_node().await;
    let first = create(&state, "PS-1").await;
    let second = create(&state, "PS-2").await;

    let start: StartSessionRequest = serde_json::from_value(json!({
        "members": [{ "id": "m1", "name": "Alice", "minutes": 30 }],
        "bill": [{ "item_id": "hour", "name": "One hour", "unit_price": 800, "quantity": 1 }],
        "package_name": "evening"
    }))
    .unwrap();
    let started = station_service::start_session(&state, first, start).await.unwrap();
    assert!(started.success);

    let moved = station_service::move_session(&state, first, MoveSessionRequest { target_id: second })
        .await
        .unwrap();
    assert!(moved.success);

    let source = station_service::get_station(&state, first).await.unwrap();
    assert_eq!(source.status, StationStatus::Available);
    assert!(source.members.is_empty());
    assert!(source.current_bill.is_empty());
    assert_eq!(source.end_time, None);

    let target = station_service::get_station(&state, second).await.unwrap();
    assert_eq!(target.status, StationStatus::InUse);
    assert_eq!(target.members[0].name, "Alice");
    assert_eq!(target.current_bill.len(), 1);
    assert_eq!(target.package_name.as_deref(), Some("evening"));
    assert!(target.end_time.is_some());

    let back = station_service::move_session(&state, first, MoveSessionRequest { target_id: second })
        .await
        .unwrap();
    assert!(!back.success);
    assert!(back.message.is_some());
}

#[tokio::test]
async fn station_patch_keeps_untouched_fields() {
    let state = online_node().await;
    let id = create(&state, "Pool 1").await;

    let rename: UpdateStationRequest =
        serde_json::from_value(json!({ "name": "Pool A", "package_name": "league" })).unwrap();
    station_service::update_station(&state, id, rename).await.unwrap();

    let clear: UpdateStationRequest =
        serde_json::from_value(json!({ "package_name": null })).unwrap();
    let station = station_service::update_station(&state, id, clear).await.unwrap();
    assert_eq!(station.name, "Pool A");
    assert_eq!(station.package_name, None);

    let empty: UpdateStationRequest = serde_json::from_value(json!({})).unwrap();
    let err = station_service::update_station(&state, id, empty)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidInput(_)));
}

#[tokio::test]
async fn removed_station_is_gone() {
    let state = online_node().await;
    let id = create(&state, "PS-9").await;

    station_service::remove_station(&state, id).await.unwrap();

    let err = station_service::get_station(&state, id).await.unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
    let err = station_service::remove_station(&state, id).await.unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}
