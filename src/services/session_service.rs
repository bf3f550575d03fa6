//! Atomic session protocols. Each one runs entirely inside a single store transaction, so
//! other nodes either see the whole change or none of it.

use time::OffsetDateTime;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    dao::{
        storage::StorageResult,
        venue_store::{TxOutcome, VenueStore, with_station_tx},
    },
    state::station::{AssignedMember, BillItem, SessionOutcome, SessionRejection, Station},
};

/// Move the whole session of `source_id` onto the available station `target_id`.
///
/// The target's availability is checked against the transaction's own read, so of two
/// concurrent moves onto the same station only one commits.
pub async fn move_station_session(
    store: &dyn VenueStore,
    source_id: Uuid,
    target_id: Uuid,
    now: OffsetDateTime,
) -> StorageResult<SessionOutcome> {
    if source_id == target_id {
        return Ok(SessionOutcome::Rejected(SessionRejection::SameStation));
    }

    let outcome = with_station_tx(store, vec![source_id, target_id], |tx| {
        let (source, target) = match (tx.get(source_id), tx.get(target_id)) {
            (Some(source), Some(target)) => (source.clone(), target.clone()),
            (None, _) => return rejected(SessionRejection::StationNotFound { id: source_id }),
            (_, None) => return rejected(SessionRejection::StationNotFound { id: target_id }),
        };

        let mut source = Station::from(source);
        let mut target = Station::from(target);
        if let Err(reason) = source.transfer_session_to(&mut target, now) {
            return rejected(reason);
        }

        tx.put(source.into());
        tx.put(target.clone().into());
        TxOutcome::Commit(SessionOutcome::Applied(target))
    })
    .await?;

    match &outcome {
        SessionOutcome::Applied(_) => {
            info!(source_id = %source_id, target_id = %target_id, "station session moved")
        }
        SessionOutcome::Rejected(reason) => {
            debug!(source_id = %source_id, target_id = %target_id, %reason, "session move rejected")
        }
    }
    Ok(outcome)
}

/// Seat `member` at `station_id`, appending `bill_item` and recomputing the station end time.
pub async fn add_player_to_session(
    store: &dyn VenueStore,
    station_id: Uuid,
    member: AssignedMember,
    bill_item: Option<BillItem>,
    now: OffsetDateTime,
) -> StorageResult<SessionOutcome> {
    let member_id = member.id.clone();
    let outcome = update_station_with(store, station_id, |station| {
        station.add_player(member.clone(), bill_item.clone(), now)
    })
    .await?;

    if outcome.is_applied() {
        info!(station_id = %station_id, member_id = %member_id, "player joined station");
    }
    Ok(outcome)
}

/// Read one station, run `op` on it and commit the result unless `op` rejects.
///
/// `op` may run more than once when the store retries the transaction.
pub async fn update_station_with<F>(
    store: &dyn VenueStore,
    station_id: Uuid,
    mut op: F,
) -> StorageResult<SessionOutcome>
where
    F: FnMut(&mut Station) -> Result<(), SessionRejection> + Send,
{
    with_station_tx(store, vec![station_id], move |tx| {
        let Some(entity) = tx.get(station_id).cloned() else {
            return rejected(SessionRejection::StationNotFound { id: station_id });
        };

        let mut station = Station::from(entity);
        match op(&mut station) {
            Ok(()) => {
                tx.put(station.clone().into());
                TxOutcome::Commit(SessionOutcome::Applied(station))
            }
            Err(reason) => rejected(reason),
        }
    })
    .await
}

fn rejected(reason: SessionRejection) -> TxOutcome<SessionOutcome> {
    TxOutcome::Abort(SessionOutcome::Rejected(reason))
}

#[cfg(test)]
mod tests {
    use time::Duration;

    use super::*;
    use crate::{
        dao::venue_store::MemoryVenueStore,
        state::station::{MemberStatus, StationKind, StationStatus},
    };

    fn member(id: &str, end_time: Option<OffsetDateTime>, now: OffsetDateTime) -> AssignedMember {
        AssignedMember {
            id: id.to_string(),
            name: id.to_uppercase(),
            avatar_url: None,
            start_time: Some(now),
            end_time,
            remaining_on_pause_secs: None,
            status: MemberStatus::Active,
            recharge_id: None,
            package_id: None,
        }
    }

    async fn seed(store: &MemoryVenueStore, station: Station) -> Uuid {
        let id = station.id;
        store.save_station(station.into()).await.unwrap();
        id
    }

    async fn load(store: &MemoryVenueStore, id: Uuid) -> Station {
        Station::from(store.find_station(id).await.unwrap().unwrap())
    }

    async fn running_station(store: &MemoryVenueStore, name: &str, now: OffsetDateTime) -> Uuid {
        let mut station = Station::new(name.into(), StationKind::Console, now);
        station
            .start_session(
                vec![member("m1", Some(now + Duration::minutes(30)), now)],
                Vec::new(),
                Some("happy hour".into()),
                now,
            )
            .unwrap();
        station.discount = 10;
        seed(store, station).await
    }

    #[tokio::test]
    async fn move_carries_the_session_and_clears_the_source() {
        let store = MemoryVenueStore::new();
        let now = OffsetDateTime::now_utc();
        let source = running_station(&store, "PS-1", now).await;
        let target = seed(&store, Station::new("PS-2".into(), StationKind::Console, now)).await;

        let outcome = move_station_session(&store, source, target, now).await.unwrap();
        let SessionOutcome::Applied(moved) = outcome else {
            panic!("move should apply, got {outcome:?}");
        };
        assert_eq!(moved.id, target);

        let source = load(&store, source).await;
        assert_eq!(source.status, StationStatus::Available);
        assert!(source.members.is_empty());
        assert_eq!(source.end_time, None);
        assert_eq!(source.package_name, None);
        assert_eq!(source.discount, 0);

        let target = load(&store, target).await;
        assert_eq!(target.status, StationStatus::InUse);
        assert_eq!(target.members.len(), 1);
        assert_eq!(target.members[0].id, "m1");
        assert_eq!(target.end_time, Some(now + Duration::minutes(30)));
        assert_eq!(target.package_name.as_deref(), Some("happy hour"));
        assert_eq!(target.discount, 10);
    }

    #[tokio::test]
    async fn move_onto_a_busy_station_writes_nothing() {
        let store = MemoryVenueStore::new();
        let now = OffsetDateTime::now_utc();
        let source = running_station(&store, "PS-1", now).await;
        let target = running_station(&store, "PS-2", now).await;
        let before = load(&store, source).await;

        let outcome = move_station_session(&store, source, target, now).await.unwrap();
        assert_eq!(
            outcome,
            SessionOutcome::Rejected(SessionRejection::TargetUnavailable {
                name: "PS-2".into()
            })
        );
        assert_eq!(load(&store, source).await, before);
    }

    #[tokio::test]
    async fn concurrent_moves_onto_one_station_commit_once() {
        let store = MemoryVenueStore::new();
        let now = OffsetDateTime::now_utc();
        let first = running_station(&store, "PS-1", now).await;
        let second = running_station(&store, "PS-2", now).await;
        let target = seed(&store, Station::new("PS-3".into(), StationKind::Console, now)).await;

        let (a, b) = tokio::join!(
            move_station_session(&store, first, target, now),
            move_station_session(&store, second, target, now),
        );
        let outcomes = [a.unwrap(), b.unwrap()];

        assert_eq!(outcomes.iter().filter(|o| o.is_applied()).count(), 1);
        assert!(outcomes.iter().any(|o| matches!(
            o,
            SessionOutcome::Rejected(SessionRejection::TargetUnavailable { .. })
        )));

        let target = load(&store, target).await;
        assert_eq!(target.members.len(), 1);
        let still_running = [load(&store, first).await, load(&store, second).await]
            .into_iter()
            .filter(|station| station.status == StationStatus::InUse)
            .count();
        assert_eq!(still_running, 1);
    }

    #[tokio::test]
    async fn move_to_the_same_station_is_rejected() {
        let store = MemoryVenueStore::new();
        let now = OffsetDateTime::now_utc();
        let source = running_station(&store, "PS-1", now).await;

        let outcome = move_station_session(&store, source, source, now).await.unwrap();
        assert_eq!(outcome, SessionOutcome::Rejected(SessionRejection::SameStation));
    }

    #[tokio::test]
    async fn move_from_a_missing_station_is_rejected() {
        let store = MemoryVenueStore::new();
        let now = OffsetDateTime::now_utc();
        let target = seed(&store, Station::new("PS-2".into(), StationKind::Console, now)).await;
        let missing = Uuid::new_v4();

        let outcome = move_station_session(&store, missing, target, now).await.unwrap();
        assert_eq!(
            outcome,
            SessionOutcome::Rejected(SessionRejection::StationNotFound { id: missing })
        );
    }

    #[tokio::test]
    async fn joining_player_extends_the_station_end_time() {
        let store = MemoryVenueStore::new();
        let now = OffsetDateTime::now_utc();
        let station = running_station(&store, "PS-1", now).await;
        let bill = BillItem {
            item_id: "cola".into(),
            name: "Cola".into(),
            unit_price: 250,
            quantity: 1,
            added_at: now,
        };

        let late_end = now + Duration::minutes(90);
        let outcome = add_player_to_session(
            &store,
            station,
            member("m2", Some(late_end), now),
            Some(bill.clone()),
            now,
        )
        .await
        .unwrap();
        assert!(outcome.is_applied());

        let station = load(&store, station).await;
        assert_eq!(station.members.len(), 2);
        assert_eq!(station.end_time, Some(late_end));
        assert_eq!(station.current_bill, vec![bill]);
    }

    #[tokio::test]
    async fn untimed_joiner_keeps_the_previous_end_time() {
        let store = MemoryVenueStore::new();
        let now = OffsetDateTime::now_utc();
        let station = running_station(&store, "PS-1", now).await;

        add_player_to_session(&store, station, member("m2", None, now), None, now)
            .await
            .unwrap();

        let station = load(&store, station).await;
        assert_eq!(station.end_time, Some(now + Duration::minutes(30)));
    }

    #[tokio::test]
    async fn joining_twice_is_rejected() {
        let store = MemoryVenueStore::new();
        let now = OffsetDateTime::now_utc();
        let station = running_station(&store, "PS-1", now).await;

        let outcome = add_player_to_session(&store, station, member("m1", None, now), None, now)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            SessionOutcome::Rejected(SessionRejection::DuplicateMember {
                member_id: "m1".into()
            })
        );
    }

    #[tokio::test]
    async fn joining_a_missing_station_is_rejected() {
        let store = MemoryVenueStore::new();
        let now = OffsetDateTime::now_utc();
        let missing = Uuid::new_v4();

        let outcome = add_player_to_session(&store, missing, member("m1", None, now), None, now)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            SessionOutcome::Rejected(SessionRejection::StationNotFound { id: missing })
        );
    }
}
