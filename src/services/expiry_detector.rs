//! Periodic scan of running stations that voices "time almost up" and "time is up" notices.
//!
//! Every (station, member, condition) fires at most once for the lifetime of the detector, and
//! several seats of one station hitting the same condition in one tick share a single
//! station-wide notice.

use std::collections::HashSet;

use time::{Duration, OffsetDateTime};
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    dto::sse::{FloorNoticeEvent, FloorNoticeKind},
    services::{background::BackgroundTask, sse_events},
    state::{
        Audience, SharedState,
        station::{AssignedMember, Station},
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoticeKind {
    /// Less than the warning window left.
    Warning,
    /// Timer ran out.
    Expiry,
}

/// One notice produced by a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FloorEvent {
    pub kind: NoticeKind,
    pub station_id: Uuid,
    pub station_name: String,
    pub audience: Audience,
    /// Text handed to the playback queue.
    pub text: String,
}

/// Dedup state plus the classification rules. Owned by the task that drives it.
#[derive(Debug)]
pub struct ExpiryDetector {
    warning_window: Duration,
    announced: HashSet<(Uuid, String, NoticeKind)>,
}

impl ExpiryDetector {
    pub fn new(warning_window: std::time::Duration) -> Self {
        Self {
            warning_window: Duration::try_from(warning_window).unwrap_or(Duration::MAX),
            announced: HashSet::new(),
        }
    }

    /// Classify every live timed seat of every running station at `now`.
    pub fn scan(&mut self, stations: &[Station], now: OffsetDateTime) -> Vec<FloorEvent> {
        let mut events = Vec::new();

        for station in stations.iter().filter(|station| station.is_running()) {
            let mut expired: Vec<&AssignedMember> = Vec::new();
            let mut warned: Vec<&AssignedMember> = Vec::new();

            for member in station.live_members() {
                let Some(remaining) = member.remaining(now) else {
                    continue;
                };

                if remaining <= Duration::ZERO {
                    if self.mark(station.id, &member.id, NoticeKind::Expiry) {
                        expired.push(member);
                    }
                } else if remaining <= self.warning_window
                    && !expired.iter().any(|gone| gone.id == member.id)
                    && self.mark(station.id, &member.id, NoticeKind::Warning)
                {
                    warned.push(member);
                }
            }

            events.extend(self.notice(station, NoticeKind::Expiry, &expired));
            events.extend(self.notice(station, NoticeKind::Warning, &warned));
        }

        events
    }

    /// Record a key; `false` when it was already announced.
    fn mark(&mut self, station_id: Uuid, member_id: &str, kind: NoticeKind) -> bool {
        self.announced
            .insert((station_id, member_id.to_string(), kind))
    }

    fn notice(
        &self,
        station: &Station,
        kind: NoticeKind,
        members: &[&AssignedMember],
    ) -> Option<FloorEvent> {
        let audience = match members {
            [] => return None,
            [member] => Audience::Member(member.name.clone()),
            _ => Audience::Everyone,
        };

        let text = match kind {
            NoticeKind::Expiry => {
                format!("Time is up for {} at {}", audience.label(), station.name)
            }
            NoticeKind::Warning => format!(
                "{} remaining for {} at {}",
                window_phrase(self.warning_window),
                audience.label(),
                station.name
            ),
        };

        Some(FloorEvent {
            kind,
            station_id: station.id,
            station_name: station.name.clone(),
            audience,
            text,
        })
    }
}

fn window_phrase(window: Duration) -> String {
    match window.whole_minutes() {
        0 => format!("{} seconds", window.whole_seconds()),
        1 => "1 minute".to_string(),
        minutes => format!("{minutes} minutes"),
    }
}

/// Run the detector every `detector.tick` against the node's station snapshot.
pub fn spawn(state: SharedState) -> BackgroundTask {
    BackgroundTask::spawn("expiry-detector", move |shutdown| run(state, shutdown))
}

async fn run(state: SharedState, shutdown: CancellationToken) {
    let config = state.config().detector.clone();
    let mut detector = ExpiryDetector::new(config.warning_window);
    let mut ticker = interval(config.tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    info!(
        tick_ms = config.tick.as_millis() as u64,
        "expiry detector started"
    );

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                // The snapshot goes stale once the store is gone; other nodes may have checked
                // those sessions out in the meantime.
                if state.is_degraded().await {
                    debug!("storage unavailable; skipping expiry scan");
                    continue;
                }
                let stations = state.station_snapshot();
                let now = OffsetDateTime::now_utc();
                for event in detector.scan(&stations, now) {
                    dispatch(&state, event, now);
                }
            }
        }
    }

    info!("expiry detector stopped");
}

/// Voice a notice locally, raise the acknowledgement for expiries and tell the UI.
fn dispatch(state: &SharedState, event: FloorEvent, now: OffsetDateTime) {
    debug!(
        station_id = %event.station_id,
        kind = ?event.kind,
        audience = event.audience.label(),
        "floor notice"
    );
    state.playback().enqueue(event.text.clone());

    let mut notice = FloorNoticeEvent {
        kind: FloorNoticeKind::Warning,
        station_id: event.station_id,
        station_name: event.station_name.clone(),
        audience: event.audience.label().to_string(),
        everyone: event.audience == Audience::Everyone,
        text: event.text,
        alert: None,
    };

    match event.kind {
        NoticeKind::Warning => sse_events::broadcast_floor_warning(state, &notice),
        NoticeKind::Expiry => {
            let alert = state.alerts().raise(
                event.station_id,
                &event.station_name,
                event.audience,
                now,
            );
            notice.kind = FloorNoticeKind::Expiry;
            notice.alert = Some(alert.into());
            sse_events::broadcast_floor_expiry(state, &notice);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::station::{MemberStatus, StationKind};

    fn now() -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(1_750_000_000).unwrap()
    }

    fn member(id: &str, name: &str, end: Option<OffsetDateTime>) -> AssignedMember {
        AssignedMember {
            id: id.into(),
            name: name.into(),
            avatar_url: None,
            start_time: Some(now() - Duration::hours(1)),
            end_time: end,
            remaining_on_pause_secs: None,
            status: MemberStatus::Active,
            recharge_id: None,
            package_id: None,
        }
    }

    fn station(name: &str, members: Vec<AssignedMember>) -> Station {
        let mut station = Station::new(name.into(), StationKind::Console, now());
        station
            .start_session(members, Vec::new(), None, now() - Duration::hours(1))
            .unwrap();
        station
    }

    fn detector() -> ExpiryDetector {
        ExpiryDetector::new(std::time::Duration::from_secs(300))
    }

    #[test]
    fn stuck_expiry_fires_once_over_many_ticks() {
        let stations = vec![station(
            "PS5 #1",
            vec![member("a", "Sam", Some(now() - Duration::seconds(5)))],
        )];
        let mut detector = detector();

        let fired: usize = (0..100)
            .map(|tick| {
                detector
                    .scan(&stations, now() + Duration::seconds(2 * tick))
                    .len()
            })
            .sum();

        assert_eq!(fired, 1);
    }

    #[test]
    fn simultaneous_expiries_are_grouped() {
        let gone = Some(now() - Duration::seconds(1));
        let stations = vec![station(
            "Table 2",
            vec![
                member("a", "Sam", gone),
                member("b", "Kim", gone),
                member("c", "Lee", gone),
            ],
        )];

        let events = detector().scan(&stations, now());

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].audience, Audience::Everyone);
        assert_eq!(events[0].kind, NoticeKind::Expiry);
        assert_eq!(events[0].text, "Time is up for everyone at Table 2");
    }

    #[test]
    fn single_expiry_names_the_member_and_leaves_others() {
        let start = now();
        let stations = vec![station(
            "PS5 #1",
            vec![
                member("a", "Sam", Some(start + Duration::seconds(2))),
                member("b", "Kim", Some(start + Duration::minutes(10))),
            ],
        )];
        let mut detector = detector();

        let events = detector.scan(&stations, start + Duration::seconds(3));

        assert_eq!(
            events,
            vec![FloorEvent {
                kind: NoticeKind::Expiry,
                station_id: stations[0].id,
                station_name: "PS5 #1".into(),
                audience: Audience::Member("Sam".into()),
                text: "Time is up for Sam at PS5 #1".into(),
            }]
        );
        assert!(stations[0].is_running());
    }

    #[test]
    fn warning_then_expiry_each_fire_once() {
        let stations = vec![station(
            "PS5 #1",
            vec![member("a", "Sam", Some(now() + Duration::minutes(4)))],
        )];
        let mut detector = detector();

        let first = detector.scan(&stations, now());
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].kind, NoticeKind::Warning);
        assert_eq!(first[0].text, "5 minutes remaining for Sam at PS5 #1");

        assert!(detector.scan(&stations, now() + Duration::minutes(1)).is_empty());

        let later = detector.scan(&stations, now() + Duration::minutes(5));
        assert_eq!(later.len(), 1);
        assert_eq!(later[0].kind, NoticeKind::Expiry);
    }

    #[test]
    fn expired_member_gets_no_warning_in_the_same_tick() {
        let stations = vec![station(
            "Xbox",
            vec![
                member("a", "Sam", Some(now() - Duration::seconds(1))),
                member("b", "Kim", Some(now() + Duration::minutes(3))),
            ],
        )];

        let events = detector().scan(&stations, now());

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, NoticeKind::Expiry);
        assert_eq!(events[0].audience, Audience::Member("Sam".into()));
        assert_eq!(events[1].kind, NoticeKind::Warning);
        assert_eq!(events[1].audience, Audience::Member("Kim".into()));
    }

    #[test]
    fn finished_paused_and_untimed_seats_are_ignored() {
        let mut finished = member("a", "Sam", Some(now() - Duration::seconds(1)));
        finished.status = MemberStatus::Finished;
        let mut paused = member("b", "Kim", None);
        paused.status = MemberStatus::Paused;
        paused.remaining_on_pause_secs = Some(30);
        let untimed = member("c", "Lee", None);
        let stations = vec![station("Table 1", vec![finished, paused, untimed])];

        assert!(detector().scan(&stations, now()).is_empty());
    }

    #[test]
    fn available_stations_are_not_scanned() {
        let mut idle = Station::new("PS5 #3".into(), StationKind::Console, now());
        idle.members
            .push(member("a", "Sam", Some(now() - Duration::seconds(1))));

        assert!(detector().scan(&[idle], now()).is_empty());
    }
}
