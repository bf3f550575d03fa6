mod common;

use std::time::{Duration, SystemTime};

use arcade_floor_back::{
    dao::{
        models::AnnouncementEntity,
        venue_store::{MemoryVenueStore, VenueStore},
    },
    dto::{announcement::AnnouncementRequest, sse::ServerEvent},
    services::{announcement_service, expiry_detector},
    state::{
        SharedState,
        station::{AssignedMember, MemberStatus, Station, StationKind},
    },
};
use common::{node, node_on};
use time::OffsetDateTime;
use tokio::sync::broadcast;
use uuid::Uuid;

fn running_station(name: &str, member: &str, remaining: time::Duration) -> Station {
    let now = OffsetDateTime::now_utc();
    let mut station = Station::new(name.into(), StationKind::Console, now);
    let seat = AssignedMember {
        id: format!("{member}-id"),
        name: member.into(),
        avatar_url: None,
        start_time: Some(now - time::Duration::hours(1)),
        end_time: Some(now + remaining),
        remaining_on_pause_secs: None,
        status: MemberStatus::Active,
        recharge_id: None,
        package_id: None,
    };
    station
        .start_session(vec![seat], Vec::new(), None, now)
        .unwrap();
    station
}

fn drain(receiver: &mut broadcast::Receiver<ServerEvent>) -> Vec<ServerEvent> {
    let mut events = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        events.push(event);
    }
    events
}

fn named<'a>(events: &'a [ServerEvent], name: &str) -> Vec<&'a ServerEvent> {
    events
        .iter()
        .filter(|event| event.event.as_deref() == Some(name))
        .collect()
}

async fn scan_for_a_while(state: &SharedState) {
    let detector = expiry_detector::spawn(state.clone());
    // Several detector ticks.
    tokio::time::sleep(Duration::from_secs(7)).await;
    detector.stop().await;
}

#[tokio::test(start_paused = true)]
async fn expiry_raises_one_alert_voices_and_broadcasts() {
    let state = node_on(MemoryVenueStore::new()).await;
    let station = running_station("PS5", "Sam", time::Duration::seconds(-5));
    let station_id = station.id;
    state.publish_stations(vec![station]);
    let mut events = state.floor_sse().subscribe();

    scan_for_a_while(&state).await;

    let alerts = state.alerts().pending();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].station_id, station_id);
    assert_eq!(alerts[0].station_name, "PS5");

    assert_eq!(state.playback().pending(), 1);

    let events = drain(&mut events);
    let expiries = named(&events, "floor.expiry");
    assert_eq!(expiries.len(), 1);
    assert!(expiries[0].data.contains("Time is up for Sam at PS5"));
    assert!(named(&events, "floor.warning").is_empty());
}

#[tokio::test(start_paused = true)]
async fn warning_is_voiced_without_an_alert() {
    let state = node_on(MemoryVenueStore::new()).await;
    state.publish_stations(vec![running_station(
        "Table 3",
        "Ana",
        time::Duration::minutes(3),
    )]);
    let mut events = state.floor_sse().subscribe();

    scan_for_a_while(&state).await;

    assert!(state.alerts().pending().is_empty());
    assert_eq!(state.playback().pending(), 1);

    let events = drain(&mut events);
    assert_eq!(named(&events, "floor.warning").len(), 1);
    assert!(named(&events, "floor.expiry").is_empty());
}

#[tokio::test(start_paused = true)]
async fn degraded_node_does_not_scan_its_stale_snapshot() {
    let state = node();
    state.publish_stations(vec![running_station(
        "PS5",
        "Sam",
        time::Duration::seconds(-5),
    )]);

    scan_for_a_while(&state).await;

    assert!(state.is_degraded().await);
    assert!(state.alerts().pending().is_empty());
    assert_eq!(state.playback().pending(), 0);
}

#[tokio::test]
async fn operator_message_reaches_other_nodes_but_history_is_not_replayed() {
    let store = MemoryVenueStore::new();
    store
        .append_announcement(AnnouncementEntity {
            id: Uuid::new_v4(),
            text: "Sent before the node started".into(),
            timestamp: SystemTime::now() - Duration::from_secs(3600),
        })
        .await
        .unwrap();

    let desk = node_on(store.clone()).await;
    let floor = node_on(store).await;
    let mut events = floor.floor_sse().subscribe();
    let feed = announcement_service::spawn_feed(floor.clone());

    let request = AnnouncementRequest {
        text: "Kitchen closes in 10 minutes".into(),
    };
    let published = announcement_service::publish_operator_message(&desk, request)
        .await
        .unwrap();

    let received = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let event = events.recv().await.unwrap();
            if event.event.as_deref() == Some("announcement.received") {
                break event;
            }
        }
    })
    .await
    .unwrap();

    assert!(received.data.contains(&published.id.to_string()));
    assert!(received.data.contains("Kitchen closes in 10 minutes"));
    assert_eq!(floor.playback().pending(), 1);

    feed.stop().await;
    let later = drain(&mut events);
    assert!(named(&later, "announcement.received").is_empty());
    assert_eq!(floor.playback().pending(), 1);
    assert_eq!(desk.playback().pending(), 0);
}
