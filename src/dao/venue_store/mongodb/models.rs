use mongodb::bson::{DateTime, Document, doc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::MongoDaoError;
use crate::dao::models::{
    AnnouncementEntity, AssignedMemberEntity, BillItemEntity, MemberStatus, StationEntity,
    StationKind, StationStatus,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoStationDocument {
    #[serde(rename = "_id")]
    id: String,
    name: String,
    kind: StationKind,
    status: StationStatus,
    start_time: Option<DateTime>,
    end_time: Option<DateTime>,
    pause_start_time: Option<DateTime>,
    remaining_on_pause_secs: Option<i64>,
    package_name: Option<String>,
    members: Vec<MongoMemberDocument>,
    current_bill: Vec<MongoBillItemDocument>,
    #[serde(default)]
    discount: i64,
    updated_at: DateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct MongoMemberDocument {
    id: String,
    name: String,
    avatar_url: Option<String>,
    start_time: Option<DateTime>,
    end_time: Option<DateTime>,
    remaining_on_pause_secs: Option<i64>,
    status: MemberStatus,
    recharge_id: Option<String>,
    package_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct MongoBillItemDocument {
    item_id: String,
    name: String,
    unit_price: i64,
    quantity: i64,
    added_at: DateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoAnnouncementDocument {
    #[serde(rename = "_id")]
    id: String,
    text: String,
    timestamp: DateTime,
}

impl From<StationEntity> for MongoStationDocument {
    fn from(value: StationEntity) -> Self {
        Self {
            id: value.id.to_string(),
            name: value.name,
            kind: value.kind,
            status: value.status,
            start_time: value.start_time.map(DateTime::from_system_time),
            end_time: value.end_time.map(DateTime::from_system_time),
            pause_start_time: value.pause_start_time.map(DateTime::from_system_time),
            remaining_on_pause_secs: value.remaining_on_pause_secs.map(clamp_i64),
            package_name: value.package_name,
            members: value.members.into_iter().map(Into::into).collect(),
            current_bill: value.current_bill.into_iter().map(Into::into).collect(),
            discount: i64::from(value.discount),
            updated_at: DateTime::from_system_time(value.updated_at),
        }
    }
}

impl TryFrom<MongoStationDocument> for StationEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoStationDocument) -> Result<Self, Self::Error> {
        let id = Uuid::parse_str(&value.id).map_err(|err| MongoDaoError::InvalidDocument {
            id: value.id.clone(),
            reason: err.to_string(),
        })?;

        Ok(Self {
            id,
            name: value.name,
            kind: value.kind,
            status: value.status,
            start_time: value.start_time.map(DateTime::to_system_time),
            end_time: value.end_time.map(DateTime::to_system_time),
            pause_start_time: value.pause_start_time.map(DateTime::to_system_time),
            remaining_on_pause_secs: value.remaining_on_pause_secs.map(unsigned),
            package_name: value.package_name,
            members: value.members.into_iter().map(Into::into).collect(),
            current_bill: value.current_bill.into_iter().map(Into::into).collect(),
            discount: u32::try_from(value.discount).unwrap_or(0),
            updated_at: value.updated_at.to_system_time(),
        })
    }
}

impl From<AssignedMemberEntity> for MongoMemberDocument {
    fn from(value: AssignedMemberEntity) -> Self {
        Self {
            id: value.id,
            name: value.name,
            avatar_url: value.avatar_url,
            start_time: value.start_time.map(DateTime::from_system_time),
            end_time: value.end_time.map(DateTime::from_system_time),
            remaining_on_pause_secs: value.remaining_on_pause_secs.map(clamp_i64),
            status: value.status,
            recharge_id: value.recharge_id,
            package_id: value.package_id,
        }
    }
}

impl From<MongoMemberDocument> for AssignedMemberEntity {
    fn from(value: MongoMemberDocument) -> Self {
        Self {
            id: value.id,
            name: value.name,
            avatar_url: value.avatar_url,
            start_time: value.start_time.map(DateTime::to_system_time),
            end_time: value.end_time.map(DateTime::to_system_time),
            remaining_on_pause_secs: value.remaining_on_pause_secs.map(unsigned),
            status: value.status,
            recharge_id: value.recharge_id,
            package_id: value.package_id,
        }
    }
}

impl From<BillItemEntity> for MongoBillItemDocument {
    fn from(value: BillItemEntity) -> Self {
        Self {
            item_id: value.item_id,
            name: value.name,
            unit_price: i64::from(value.unit_price),
            quantity: i64::from(value.quantity),
            added_at: DateTime::from_system_time(value.added_at),
        }
    }
}

impl From<MongoBillItemDocument> for BillItemEntity {
    fn from(value: MongoBillItemDocument) -> Self {
        Self {
            item_id: value.item_id,
            name: value.name,
            unit_price: u32::try_from(value.unit_price).unwrap_or(0),
            quantity: u32::try_from(value.quantity).unwrap_or(0),
            added_at: value.added_at.to_system_time(),
        }
    }
}

impl From<AnnouncementEntity> for MongoAnnouncementDocument {
    fn from(value: AnnouncementEntity) -> Self {
        Self {
            id: value.id.to_string(),
            text: value.text,
            timestamp: DateTime::from_system_time(value.timestamp),
        }
    }
}

impl TryFrom<MongoAnnouncementDocument> for AnnouncementEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoAnnouncementDocument) -> Result<Self, Self::Error> {
        let id = Uuid::parse_str(&value.id).map_err(|err| MongoDaoError::InvalidDocument {
            id: value.id.clone(),
            reason: err.to_string(),
        })?;
        Ok(Self {
            id,
            text: value.text,
            timestamp: value.timestamp.to_system_time(),
        })
    }
}

/// BSON has no unsigned integers.
fn clamp_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn unsigned(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

pub fn doc_id(id: Uuid) -> Document {
    doc! {"_id": id.to_string()}
}
