use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use utoipa::ToSchema;
use uuid::Uuid;

/// Physical kind of a station.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum StationKind {
    /// Gaming console seat.
    Console,
    /// Board game or pool table.
    Table,
}

/// Aggregate status persisted on a station document.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum StationStatus {
    /// No session is running on the station.
    Available,
    /// At least one member is active or paused.
    InUse,
    /// The whole station is paused as a unit.
    Paused,
}

/// Status of one seat inside a station.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MemberStatus {
    /// Timer is running.
    Active,
    /// Timer is frozen; the remaining time lives in `remaining_on_pause_secs`.
    Paused,
    /// Checked out; ignored by scheduling.
    Finished,
}

/// Bill line appended to a station during a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BillItemEntity {
    /// Catalogue identifier of the item.
    pub item_id: String,
    /// Display name at the time of sale.
    pub name: String,
    /// Unit price in minor currency units.
    pub unit_price: u32,
    /// Number of units sold.
    pub quantity: u32,
    /// When the line was added.
    pub added_at: SystemTime,
}

/// Per-seat session stored inside its station document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AssignedMemberEntity {
    /// Member identifier from the loyalty system.
    pub id: String,
    /// Display name announced by the detector.
    pub name: String,
    pub avatar_url: Option<String>,
    pub start_time: Option<SystemTime>,
    /// `None` for untimed passes.
    pub end_time: Option<SystemTime>,
    pub remaining_on_pause_secs: Option<u64>,
    pub status: MemberStatus,
    /// Recharge that paid for this seat, used by billing only.
    pub recharge_id: Option<String>,
    /// Walk-in package that paid for this seat, used by billing only.
    pub package_id: Option<String>,
}

/// Station document persisted by the storage layer.
///
/// Optional fields are always serialized, so an unset value reaches the store as an explicit
/// `null` and never as a missing key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StationEntity {
    /// Primary key of the station.
    pub id: Uuid,
    /// Display name, also used in announcements.
    pub name: String,
    pub kind: StationKind,
    pub status: StationStatus,
    pub start_time: Option<SystemTime>,
    /// Derived from the members; see `Station::derived_end_time`.
    pub end_time: Option<SystemTime>,
    pub pause_start_time: Option<SystemTime>,
    pub remaining_on_pause_secs: Option<u64>,
    pub package_name: Option<String>,
    pub members: Vec<AssignedMemberEntity>,
    pub current_bill: Vec<BillItemEntity>,
    /// Discount in minor currency units applied at checkout.
    #[serde(default)]
    pub discount: u32,
    /// Last time the document was written.
    pub updated_at: SystemTime,
}

/// Operator message shared with every floor node through the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnnouncementEntity {
    /// Unique record identifier used for per-node deduplication.
    pub id: Uuid,
    /// Text to be spoken.
    pub text: String,
    /// Publication time; nodes only replay records newer than their own start.
    pub timestamp: SystemTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bare_station() -> StationEntity {
        StationEntity {
            id: Uuid::new_v4(),
            name: "PS5 #1".into(),
            kind: StationKind::Console,
            status: StationStatus::Available,
            start_time: None,
            end_time: None,
            pause_start_time: None,
            remaining_on_pause_secs: None,
            package_name: None,
            members: Vec::new(),
            current_bill: Vec::new(),
            discount: 0,
            updated_at: SystemTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn unset_fields_serialize_as_explicit_null() {
        let mut station = bare_station();
        station.members.push(AssignedMemberEntity {
            id: "m-1".into(),
            name: "Alex".into(),
            avatar_url: None,
            start_time: None,
            end_time: None,
            remaining_on_pause_secs: None,
            status: MemberStatus::Active,
            recharge_id: None,
            package_id: None,
        });

        let value = serde_json::to_value(&station).unwrap();
        let object = value.as_object().unwrap();
        for key in [
            "start_time",
            "end_time",
            "pause_start_time",
            "remaining_on_pause_secs",
            "package_name",
        ] {
            assert!(object.get(key).is_some_and(|v| v.is_null()), "{key}");
        }

        let member = object["members"][0].as_object().unwrap();
        for key in ["avatar_url", "end_time", "recharge_id", "package_id"] {
            assert!(member.get(key).is_some_and(|v| v.is_null()), "{key}");
        }
    }

    #[test]
    fn missing_discount_defaults_to_zero() {
        let mut value = serde_json::to_value(bare_station()).unwrap();
        value.as_object_mut().unwrap().remove("discount");
        let station: StationEntity = serde_json::from_value(value).unwrap();
        assert_eq!(station.discount, 0);
    }
}
