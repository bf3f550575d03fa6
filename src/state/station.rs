//! Station and seat model with the pure session operations the services run inside store
//! transactions.

use std::time::SystemTime;

use thiserror::Error;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

pub use crate::dao::models::{MemberStatus, StationKind, StationStatus};
use crate::dao::models::{AssignedMemberEntity, BillItemEntity, StationEntity};

/// Line item appended to a station bill.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillItem {
    pub item_id: String,
    pub name: String,
    /// Unit price in minor currency units.
    pub unit_price: u32,
    pub quantity: u32,
    pub added_at: OffsetDateTime,
}

/// One seat's timer inside a station.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignedMember {
    pub id: String,
    pub name: String,
    pub avatar_url: Option<String>,
    pub start_time: Option<OffsetDateTime>,
    /// `None` means the seat has no timer.
    pub end_time: Option<OffsetDateTime>,
    pub remaining_on_pause_secs: Option<u64>,
    pub status: MemberStatus,
    pub recharge_id: Option<String>,
    pub package_id: Option<String>,
}

impl AssignedMember {
    /// Whether the seat still takes part in scheduling.
    pub fn is_live(&self) -> bool {
        self.status != MemberStatus::Finished
    }

    /// Time left before `end_time`, negative once expired; `None` for untimed or paused seats.
    pub fn remaining(&self, now: OffsetDateTime) -> Option<Duration> {
        if !self.is_live() {
            return None;
        }
        self.end_time.map(|end| end - now)
    }
}

/// A console or table hosting member sessions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Station {
    pub id: Uuid,
    pub name: String,
    pub kind: StationKind,
    pub status: StationStatus,
    pub start_time: Option<OffsetDateTime>,
    pub end_time: Option<OffsetDateTime>,
    pub pause_start_time: Option<OffsetDateTime>,
    pub remaining_on_pause_secs: Option<u64>,
    pub package_name: Option<String>,
    pub members: Vec<AssignedMember>,
    pub current_bill: Vec<BillItem>,
    pub discount: u32,
    pub updated_at: OffsetDateTime,
}

/// Precondition that stopped a session operation. Reported to the caller, never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionRejection {
    #[error("station `{id}` not found")]
    StationNotFound { id: Uuid },
    #[error("a session cannot be moved onto its own station")]
    SameStation,
    #[error("target station `{name}` is not available")]
    TargetUnavailable { name: String },
    #[error("station `{name}` already hosts a session")]
    StationBusy { name: String },
    #[error("member `{member_id}` is not seated at this station")]
    MemberNotFound { member_id: String },
    #[error("member `{member_id}` is already seated at this station")]
    DuplicateMember { member_id: String },
    #[error("member `{member_id}` has already finished")]
    MemberFinished { member_id: String },
    #[error("member `{member_id}` is not running")]
    MemberNotActive { member_id: String },
    #[error("member `{member_id}` is not paused")]
    MemberNotPaused { member_id: String },
    #[error("member `{member_id}` has no timer")]
    Untimed { member_id: String },
}

/// Result of an atomic session protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The transaction committed; carries the station that now hosts the session.
    Applied(Station),
    /// A precondition failed and nothing was written.
    Rejected(SessionRejection),
}

impl SessionOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, SessionOutcome::Applied(_))
    }
}

/// Operator edit of station metadata. Absent fields are left untouched.
///
/// Session fields and `end_time` are not reachable through a patch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StationPatch {
    pub name: Option<String>,
    pub kind: Option<StationKind>,
    /// `Some(None)` clears the package name.
    pub package_name: Option<Option<String>>,
    pub discount: Option<u32>,
}

impl StationPatch {
    /// Whether applying the patch would change nothing.
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.kind.is_none()
            && self.package_name.is_none()
            && self.discount.is_none()
    }

    pub fn apply(self, station: &mut Station, now: OffsetDateTime) {
        if let Some(name) = self.name {
            station.name = name;
        }
        if let Some(kind) = self.kind {
            station.kind = kind;
        }
        if let Some(package_name) = self.package_name {
            station.package_name = package_name;
        }
        if let Some(discount) = self.discount {
            station.discount = discount;
        }
        station.updated_at = now;
    }
}

impl Station {
    /// Fresh, empty station as created at venue setup.
    pub fn new(name: String, kind: StationKind, now: OffsetDateTime) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            kind,
            status: StationStatus::Available,
            start_time: None,
            end_time: None,
            pause_start_time: None,
            remaining_on_pause_secs: None,
            package_name: None,
            members: Vec::new(),
            current_bill: Vec::new(),
            discount: 0,
            updated_at: now,
        }
    }

    /// Members that are not finished.
    pub fn live_members(&self) -> impl Iterator<Item = &AssignedMember> {
        self.members.iter().filter(|member| member.is_live())
    }

    /// Latest `end_time` among live timed members.
    pub fn derived_end_time(&self) -> Option<OffsetDateTime> {
        self.live_members()
            .filter_map(|member| member.end_time)
            .max()
    }

    /// Whether the detector should look at this station.
    pub fn is_running(&self) -> bool {
        matches!(self.status, StationStatus::InUse | StationStatus::Paused)
    }

    /// Start a session on an available station.
    pub fn start_session(
        &mut self,
        members: Vec<AssignedMember>,
        bill: Vec<BillItem>,
        package_name: Option<String>,
        now: OffsetDateTime,
    ) -> Result<(), SessionRejection> {
        if self.status != StationStatus::Available || !self.members.is_empty() {
            return Err(SessionRejection::StationBusy {
                name: self.name.clone(),
            });
        }

        self.members = members;
        self.current_bill = bill;
        self.package_name = package_name;
        self.start_time = Some(now);
        self.status = StationStatus::InUse;
        self.end_time = self.derived_end_time();
        self.updated_at = now;
        Ok(())
    }

    /// Seat one more member and recompute the station end time.
    ///
    /// When no live member carries a timer the previous station end time is kept.
    pub fn add_player(
        &mut self,
        member: AssignedMember,
        bill_item: Option<BillItem>,
        now: OffsetDateTime,
    ) -> Result<(), SessionRejection> {
        if self.live_members().any(|seated| seated.id == member.id) {
            return Err(SessionRejection::DuplicateMember {
                member_id: member.id,
            });
        }

        if self.status == StationStatus::Available {
            self.status = StationStatus::InUse;
            self.start_time = self.start_time.or(member.start_time).or(Some(now));
        }

        let previous_end = self.end_time;
        self.members.push(member);
        self.end_time = self.derived_end_time().or(previous_end);
        self.current_bill.extend(bill_item);
        self.updated_at = now;
        Ok(())
    }

    /// Move this station's whole session onto `target`, leaving this station clean.
    pub fn transfer_session_to(
        &mut self,
        target: &mut Station,
        now: OffsetDateTime,
    ) -> Result<(), SessionRejection> {
        if self.id == target.id {
            return Err(SessionRejection::SameStation);
        }
        if target.status != StationStatus::Available {
            return Err(SessionRejection::TargetUnavailable {
                name: target.name.clone(),
            });
        }

        target.status = self.status;
        target.start_time = self.start_time.take();
        target.end_time = self.end_time.take();
        target.pause_start_time = self.pause_start_time.take();
        target.remaining_on_pause_secs = self.remaining_on_pause_secs.take();
        target.package_name = self.package_name.take();
        target.members = std::mem::take(&mut self.members);
        target.current_bill = std::mem::take(&mut self.current_bill);
        target.discount = std::mem::take(&mut self.discount);
        target.updated_at = now;

        self.reset(now);
        Ok(())
    }

    /// Clear every session field and mark the station available.
    pub fn reset(&mut self, now: OffsetDateTime) {
        self.status = StationStatus::Available;
        self.start_time = None;
        self.end_time = None;
        self.pause_start_time = None;
        self.remaining_on_pause_secs = None;
        self.package_name = None;
        self.members.clear();
        self.current_bill.clear();
        self.discount = 0;
        self.updated_at = now;
    }

    /// Give a member more time, counting from now when the timer has already run out.
    pub fn add_member_time(
        &mut self,
        member_id: &str,
        extra: Duration,
        bill_item: Option<BillItem>,
        now: OffsetDateTime,
    ) -> Result<(), SessionRejection> {
        let member = self.live_member_mut(member_id)?;
        match member.status {
            MemberStatus::Paused => {
                let remaining = member.remaining_on_pause_secs.unwrap_or(0);
                member.remaining_on_pause_secs =
                    Some(remaining.saturating_add(whole_seconds(extra)));
            }
            _ => {
                let base = member.end_time.map_or(now, |end| end.max(now));
                member.end_time = Some(base + extra);
            }
        }

        self.current_bill.extend(bill_item);
        self.refresh_end_time(now);
        Ok(())
    }

    /// Take time away from a member; the seat may expire on the next detector tick.
    pub fn reduce_member_time(
        &mut self,
        member_id: &str,
        less: Duration,
        now: OffsetDateTime,
    ) -> Result<(), SessionRejection> {
        let member = self.live_member_mut(member_id)?;
        match member.status {
            MemberStatus::Paused => {
                let remaining = member.remaining_on_pause_secs.unwrap_or(0);
                member.remaining_on_pause_secs =
                    Some(remaining.saturating_sub(whole_seconds(less)));
            }
            _ => {
                let Some(end) = member.end_time else {
                    return Err(SessionRejection::Untimed {
                        member_id: member_id.to_string(),
                    });
                };
                member.end_time = Some(end - less);
            }
        }

        self.refresh_end_time(now);
        Ok(())
    }

    /// Freeze a running seat, keeping its remaining time aside.
    pub fn pause_member(
        &mut self,
        member_id: &str,
        now: OffsetDateTime,
    ) -> Result<(), SessionRejection> {
        let member = self.live_member_mut(member_id)?;
        if member.status != MemberStatus::Active {
            return Err(SessionRejection::MemberNotActive {
                member_id: member_id.to_string(),
            });
        }

        member.remaining_on_pause_secs = member
            .end_time
            .take()
            .map(|end| whole_seconds(end - now));
        member.status = MemberStatus::Paused;
        self.refresh_end_time(now);
        Ok(())
    }

    /// Restart a paused seat from its remaining time.
    pub fn resume_member(
        &mut self,
        member_id: &str,
        now: OffsetDateTime,
    ) -> Result<(), SessionRejection> {
        let member = self.live_member_mut(member_id)?;
        if member.status != MemberStatus::Paused {
            return Err(SessionRejection::MemberNotPaused {
                member_id: member_id.to_string(),
            });
        }

        member.end_time = member
            .remaining_on_pause_secs
            .take()
            .map(|secs| now + Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX)));
        member.status = MemberStatus::Active;
        self.refresh_end_time(now);
        Ok(())
    }

    fn refresh_end_time(&mut self, now: OffsetDateTime) {
        self.end_time = self.derived_end_time();
        self.updated_at = now;
    }

    fn live_member_mut(&mut self, member_id: &str) -> Result<&mut AssignedMember, SessionRejection> {
        let member = self
            .members
            .iter_mut()
            .find(|member| member.id == member_id)
            .ok_or_else(|| SessionRejection::MemberNotFound {
                member_id: member_id.to_string(),
            })?;
        if !member.is_live() {
            return Err(SessionRejection::MemberFinished {
                member_id: member_id.to_string(),
            });
        }
        Ok(member)
    }
}

/// Clamp a duration to whole non-negative seconds.
fn whole_seconds(duration: Duration) -> u64 {
    u64::try_from(duration.whole_seconds()).unwrap_or(0)
}

fn to_offset(time: SystemTime) -> OffsetDateTime {
    OffsetDateTime::from(time)
}

impl From<StationEntity> for Station {
    fn from(entity: StationEntity) -> Self {
        Self {
            id: entity.id,
            name: entity.name,
            kind: entity.kind,
            status: entity.status,
            start_time: entity.start_time.map(to_offset),
            end_time: entity.end_time.map(to_offset),
            pause_start_time: entity.pause_start_time.map(to_offset),
            remaining_on_pause_secs: entity.remaining_on_pause_secs,
            package_name: entity.package_name,
            members: entity.members.into_iter().map(Into::into).collect(),
            current_bill: entity.current_bill.into_iter().map(Into::into).collect(),
            discount: entity.discount,
            updated_at: to_offset(entity.updated_at),
        }
    }
}

impl From<Station> for StationEntity {
    fn from(station: Station) -> Self {
        Self {
            id: station.id,
            name: station.name,
            kind: station.kind,
            status: station.status,
            start_time: station.start_time.map(SystemTime::from),
            end_time: station.end_time.map(SystemTime::from),
            pause_start_time: station.pause_start_time.map(SystemTime::from),
            remaining_on_pause_secs: station.remaining_on_pause_secs,
            package_name: station.package_name,
            members: station.members.into_iter().map(Into::into).collect(),
            current_bill: station.current_bill.into_iter().map(Into::into).collect(),
            discount: station.discount,
            updated_at: SystemTime::from(station.updated_at),
        }
    }
}

impl From<AssignedMemberEntity> for AssignedMember {
    fn from(entity: AssignedMemberEntity) -> Self {
        Self {
            id: entity.id,
            name: entity.name,
            avatar_url: entity.avatar_url,
            start_time: entity.start_time.map(to_offset),
            end_time: entity.end_time.map(to_offset),
            remaining_on_pause_secs: entity.remaining_on_pause_secs,
            status: entity.status,
            recharge_id: entity.recharge_id,
            package_id: entity.package_id,
        }
    }
}

impl From<AssignedMember> for AssignedMemberEntity {
    fn from(member: AssignedMember) -> Self {
        Self {
            id: member.id,
            name: member.name,
            avatar_url: member.avatar_url,
            start_time: member.start_time.map(SystemTime::from),
            end_time: member.end_time.map(SystemTime::from),
            remaining_on_pause_secs: member.remaining_on_pause_secs,
            status: member.status,
            recharge_id: member.recharge_id,
            package_id: member.package_id,
        }
    }
}

impl From<BillItemEntity> for BillItem {
    fn from(entity: BillItemEntity) -> Self {
        Self {
            item_id: entity.item_id,
            name: entity.name,
            unit_price: entity.unit_price,
            quantity: entity.quantity,
            added_at: to_offset(entity.added_at),
        }
    }
}

impl From<BillItem> for BillItemEntity {
    fn from(item: BillItem) -> Self {
        Self {
            item_id: item.item_id,
            name: item.name,
            unit_price: item.unit_price,
            quantity: item.quantity,
            added_at: SystemTime::from(item.added_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(1_750_000_000).unwrap()
    }

    fn member(id: &str, end: Option<OffsetDateTime>) -> AssignedMember {
        AssignedMember {
            id: id.into(),
            name: format!("player {id}"),
            avatar_url: None,
            start_time: Some(now()),
            end_time: end,
            remaining_on_pause_secs: None,
            status: MemberStatus::Active,
            recharge_id: None,
            package_id: None,
        }
    }

    fn running_station(name: &str, members: Vec<AssignedMember>) -> Station {
        let mut station = Station::new(name.into(), StationKind::Console, now());
        station
            .start_session(members, Vec::new(), None, now())
            .unwrap();
        station
    }

    fn fee() -> BillItem {
        BillItem {
            item_id: "entry".into(),
            name: "Entry fee".into(),
            unit_price: 500,
            quantity: 1,
            added_at: now(),
        }
    }

    #[test]
    fn derived_end_time_ignores_finished_and_untimed_members() {
        let mut finished = member("c", Some(now() + Duration::hours(3)));
        finished.status = MemberStatus::Finished;
        let station = running_station(
            "PS5",
            vec![
                member("a", Some(now() + Duration::minutes(30))),
                member("b", None),
                finished,
            ],
        );

        assert_eq!(station.end_time, Some(now() + Duration::minutes(30)));
        assert_eq!(station.status, StationStatus::InUse);
    }

    #[test]
    fn derived_end_time_is_none_without_timed_members() {
        let station = running_station("Table 2", vec![member("a", None)]);
        assert_eq!(station.derived_end_time(), None);
    }

    #[test]
    fn joining_recomputes_end_time_and_appends_fee() {
        let mut station =
            running_station("PS5", vec![member("a", Some(now() + Duration::minutes(20)))]);

        station
            .add_player(
                member("b", Some(now() + Duration::minutes(60))),
                Some(fee()),
                now(),
            )
            .unwrap();

        assert_eq!(station.members.len(), 2);
        assert_eq!(station.end_time, Some(now() + Duration::minutes(60)));
        assert_eq!(station.current_bill, vec![fee()]);
        assert_eq!(
            station.members[0].end_time,
            Some(now() + Duration::minutes(20))
        );
    }

    #[test]
    fn joining_untimed_member_keeps_previous_end_time() {
        let mut station = running_station("Table 1", vec![member("a", None)]);
        let previous = Some(now() + Duration::minutes(45));
        station.end_time = previous;

        station.add_player(member("b", None), None, now()).unwrap();

        assert_eq!(station.end_time, previous);
    }

    #[test]
    fn joining_available_station_starts_it() {
        let mut station = Station::new("Xbox".into(), StationKind::Console, now());

        station
            .add_player(member("a", Some(now() + Duration::minutes(10))), None, now())
            .unwrap();

        assert_eq!(station.status, StationStatus::InUse);
        assert_eq!(station.start_time, Some(now()));
    }

    #[test]
    fn joining_twice_is_rejected() {
        let mut station = running_station("PS5", vec![member("a", None)]);
        let err = station.add_player(member("a", None), None, now()).unwrap_err();
        assert_eq!(
            err,
            SessionRejection::DuplicateMember {
                member_id: "a".into()
            }
        );
    }

    #[test]
    fn transfer_moves_everything_and_resets_source() {
        let mut source = running_station(
            "PS5 #1",
            vec![
                member("a", Some(now() + Duration::minutes(15))),
                member("b", Some(now() + Duration::minutes(40))),
            ],
        );
        source.current_bill.push(fee());
        source.discount = 200;
        source.package_name = Some("Weekend pass".into());
        let before = source.clone();
        let mut target = Station::new("PS5 #2".into(), StationKind::Console, now());

        source.transfer_session_to(&mut target, now()).unwrap();

        assert_eq!(target.members, before.members);
        assert_eq!(target.current_bill, before.current_bill);
        assert_eq!(target.discount, 200);
        assert_eq!(target.status, StationStatus::InUse);
        assert_eq!(target.end_time, before.end_time);
        assert_eq!(target.package_name.as_deref(), Some("Weekend pass"));

        assert_eq!(source.status, StationStatus::Available);
        assert!(source.members.is_empty());
        assert!(source.current_bill.is_empty());
        assert_eq!(source.start_time, None);
        assert_eq!(source.end_time, None);
        assert_eq!(source.discount, 0);
    }

    #[test]
    fn transfer_requires_available_target() {
        let mut source = running_station("PS5 #1", vec![member("a", None)]);
        let mut target = running_station("PS5 #2", vec![member("b", None)]);
        let untouched = target.clone();

        let err = source.transfer_session_to(&mut target, now()).unwrap_err();

        assert_eq!(
            err,
            SessionRejection::TargetUnavailable {
                name: "PS5 #2".into()
            }
        );
        assert_eq!(target, untouched);
        assert_eq!(source.members.len(), 1);
    }

    #[test]
    fn add_time_counts_from_now_once_expired() {
        let mut station =
            running_station("PS5", vec![member("a", Some(now() - Duration::minutes(5)))]);

        station
            .add_member_time("a", Duration::minutes(30), Some(fee()), now())
            .unwrap();

        assert_eq!(
            station.members[0].end_time,
            Some(now() + Duration::minutes(30))
        );
        assert_eq!(station.end_time, Some(now() + Duration::minutes(30)));
        assert_eq!(station.current_bill.len(), 1);
    }

    #[test]
    fn reduce_time_rejects_untimed_seat() {
        let mut station = running_station("Table", vec![member("a", None)]);
        let err = station
            .reduce_member_time("a", Duration::minutes(5), now())
            .unwrap_err();
        assert_eq!(
            err,
            SessionRejection::Untimed {
                member_id: "a".into()
            }
        );
    }

    #[test]
    fn pause_and_resume_preserve_remaining_time() {
        let mut station = running_station(
            "PS5",
            vec![
                member("a", Some(now() + Duration::minutes(10))),
                member("b", Some(now() + Duration::minutes(5))),
            ],
        );

        station.pause_member("a", now()).unwrap();
        assert_eq!(station.members[0].end_time, None);
        assert_eq!(station.members[0].remaining_on_pause_secs, Some(600));
        assert_eq!(station.end_time, Some(now() + Duration::minutes(5)));
        assert_eq!(station.status, StationStatus::InUse);

        let later = now() + Duration::minutes(20);
        station.resume_member("a", later).unwrap();
        assert_eq!(
            station.members[0].end_time,
            Some(later + Duration::minutes(10))
        );
        assert_eq!(station.members[0].status, MemberStatus::Active);
        assert_eq!(station.members[0].remaining_on_pause_secs, None);
    }

    #[test]
    fn patch_only_touches_named_fields() {
        let mut station =
            running_station("PS5", vec![member("a", Some(now() + Duration::minutes(10)))]);
        station.package_name = Some("Happy hour".into());
        station.discount = 150;
        let before = station.clone();
        let later = now() + Duration::minutes(1);

        StationPatch {
            name: Some("PS5 Pro".into()),
            ..StationPatch::default()
        }
        .apply(&mut station, later);

        assert_eq!(station.name, "PS5 Pro");
        assert_eq!(station.package_name, before.package_name);
        assert_eq!(station.discount, 150);
        assert_eq!(station.members, before.members);
        assert_eq!(station.end_time, before.end_time);
        assert_eq!(station.updated_at, later);
    }

    #[test]
    fn patch_can_clear_package_name() {
        let mut station = Station::new("Table 4".into(), StationKind::Table, now());
        station.package_name = Some("Birthday".into());

        StationPatch {
            package_name: Some(None),
            ..StationPatch::default()
        }
        .apply(&mut station, now());

        assert_eq!(station.package_name, None);
        assert_eq!(station.kind, StationKind::Table);
    }

    #[test]
    fn entity_conversion_keeps_fields() {
        let mut station =
            running_station("PS5", vec![member("a", Some(now() + Duration::minutes(10)))]);
        station.current_bill.push(fee());

        let entity: StationEntity = station.clone().into();
        let back: Station = entity.into();

        assert_eq!(back, station);
    }
}
