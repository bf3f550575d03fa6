//! DTO definitions for station management and the session protocols.

use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::{format_time, validation::validate_not_blank},
    state::station::{
        AssignedMember, BillItem, MemberStatus, SessionOutcome, Station, StationKind,
        StationPatch, StationStatus,
    },
};

/// Longest timed package an operator can sell in one go.
const MAX_SESSION_MINUTES: u32 = 24 * 60;

/// Station projection returned to floor clients.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StationView {
    pub id: Uuid,
    pub name: String,
    pub kind: StationKind,
    pub status: StationStatus,
    pub start_time: Option<String>,
    /// Latest end time over the live timed members.
    pub end_time: Option<String>,
    pub pause_start_time: Option<String>,
    pub remaining_on_pause_secs: Option<u64>,
    pub package_name: Option<String>,
    pub members: Vec<MemberView>,
    pub current_bill: Vec<BillItemView>,
    pub discount: u32,
    pub updated_at: String,
}

/// One seat of a station as exposed to clients.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MemberView {
    pub id: String,
    pub name: String,
    pub avatar_url: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub remaining_on_pause_secs: Option<u64>,
    pub status: MemberStatus,
    pub recharge_id: Option<String>,
    pub package_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BillItemView {
    pub item_id: String,
    pub name: String,
    pub unit_price: u32,
    pub quantity: u32,
    pub added_at: String,
}

impl From<Station> for StationView {
    fn from(station: Station) -> Self {
        Self {
            id: station.id,
            name: station.name,
            kind: station.kind,
            status: station.status,
            start_time: station.start_time.map(format_time),
            end_time: station.end_time.map(format_time),
            pause_start_time: station.pause_start_time.map(format_time),
            remaining_on_pause_secs: station.remaining_on_pause_secs,
            package_name: station.package_name,
            members: station.members.into_iter().map(Into::into).collect(),
            current_bill: station.current_bill.into_iter().map(Into::into).collect(),
            discount: station.discount,
            updated_at: format_time(station.updated_at),
        }
    }
}

impl From<AssignedMember> for MemberView {
    fn from(member: AssignedMember) -> Self {
        Self {
            id: member.id,
            name: member.name,
            avatar_url: member.avatar_url,
            start_time: member.start_time.map(format_time),
            end_time: member.end_time.map(format_time),
            remaining_on_pause_secs: member.remaining_on_pause_secs,
            status: member.status,
            recharge_id: member.recharge_id,
            package_id: member.package_id,
        }
    }
}

impl From<BillItem> for BillItemView {
    fn from(item: BillItem) -> Self {
        Self {
            item_id: item.item_id,
            name: item.name,
            unit_price: item.unit_price,
            quantity: item.quantity,
            added_at: format_time(item.added_at),
        }
    }
}

/// Payload registering a new station at venue setup.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateStationRequest {
    #[validate(length(min = 1, max = 64), custom(function = "validate_not_blank"))]
    pub name: String,
    pub kind: StationKind,
}

/// Partial update of station metadata.
#[derive(Debug, Default, Deserialize, ToSchema, Validate)]
pub struct UpdateStationRequest {
    #[serde(default)]
    #[validate(length(min = 1, max = 64), custom(function = "validate_not_blank"))]
    pub name: Option<String>,
    #[serde(default)]
    pub kind: Option<StationKind>,
    /// If not specified, keeps the current package.
    /// If null is specified, clears it.
    /// If a string is specified, sets it.
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<String>)]
    pub package_name: Option<Option<String>>,
    #[serde(default)]
    pub discount: Option<u32>,
}

impl From<UpdateStationRequest> for StationPatch {
    fn from(value: UpdateStationRequest) -> Self {
        Self {
            name: value.name.map(|name| name.trim().to_string()),
            kind: value.kind,
            package_name: value.package_name,
            discount: value.discount,
        }
    }
}

/// Member seated by a session start or a join.
///
/// `Serialize` lets validation errors on the member list echo the rejected value.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct MemberInput {
    #[validate(length(min = 1))]
    pub id: String,
    #[validate(custom(function = "validate_not_blank"))]
    pub name: String,
    #[serde(default)]
    #[validate(url)]
    pub avatar_url: Option<String>,
    /// Timed package length; omit for an untimed pass.
    #[serde(default)]
    #[validate(range(min = 1, max = MAX_SESSION_MINUTES))]
    pub minutes: Option<u32>,
    #[serde(default)]
    pub recharge_id: Option<String>,
    #[serde(default)]
    pub package_id: Option<String>,
}

impl MemberInput {
    /// Build an active seat whose timer starts at `now`.
    pub fn into_member(self, now: OffsetDateTime) -> AssignedMember {
        AssignedMember {
            id: self.id,
            name: self.name.trim().to_string(),
            avatar_url: self.avatar_url,
            start_time: Some(now),
            end_time: self
                .minutes
                .map(|minutes| now + Duration::minutes(i64::from(minutes))),
            remaining_on_pause_secs: None,
            status: MemberStatus::Active,
            recharge_id: self.recharge_id,
            package_id: self.package_id,
        }
    }
}

/// Bill line supplied alongside a session operation.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct BillItemInput {
    #[validate(length(min = 1))]
    pub item_id: String,
    #[validate(custom(function = "validate_not_blank"))]
    pub name: String,
    pub unit_price: u32,
    #[validate(range(min = 1))]
    pub quantity: u32,
}

impl BillItemInput {
    pub fn into_bill_item(self, now: OffsetDateTime) -> BillItem {
        BillItem {
            item_id: self.item_id,
            name: self.name,
            unit_price: self.unit_price,
            quantity: self.quantity,
            added_at: now,
        }
    }
}

/// Start a session on an available station.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct StartSessionRequest {
    #[validate(length(min = 1), nested)]
    pub members: Vec<MemberInput>,
    #[serde(default)]
    #[validate(nested)]
    pub bill: Vec<BillItemInput>,
    #[serde(default)]
    pub package_name: Option<String>,
}

/// Seat one more member at a station.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct AddPlayerRequest {
    #[validate(nested)]
    pub member: MemberInput,
    #[serde(default)]
    #[validate(nested)]
    pub bill_item: Option<BillItemInput>,
}

/// Extend or shorten a seat's timer.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct AdjustTimeRequest {
    #[validate(range(min = 1, max = MAX_SESSION_MINUTES))]
    pub minutes: u32,
    /// Charged when time is added; ignored on reduction.
    #[serde(default)]
    #[validate(nested)]
    pub bill_item: Option<BillItemInput>,
}

impl AdjustTimeRequest {
    pub fn duration(&self) -> Duration {
        Duration::minutes(i64::from(self.minutes))
    }
}

/// Move the whole session of the path station onto `target_id`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct MoveSessionRequest {
    pub target_id: Uuid,
}

/// Result of a session protocol.
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionActionResponse {
    pub success: bool,
    /// Failed precondition when `success` is false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Station hosting the session after a successful operation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub station: Option<StationView>,
}

impl From<SessionOutcome> for SessionActionResponse {
    fn from(outcome: SessionOutcome) -> Self {
        match outcome {
            SessionOutcome::Applied(station) => Self {
                success: true,
                message: None,
                station: Some(station.into()),
            },
            SessionOutcome::Rejected(reason) => Self {
                success: false,
                message: Some(reason.to_string()),
                station: None,
            },
        }
    }
}
