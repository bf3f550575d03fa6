use std::collections::HashSet;

use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::{
    dao::models::StationEntity,
    dto::station::{
        AddPlayerRequest, AdjustTimeRequest, CreateStationRequest, MoveSessionRequest,
        SessionActionResponse, StartSessionRequest, StationView, UpdateStationRequest,
    },
    error::ServiceError,
    services::session_service,
    state::{
        SharedState,
        station::{SessionOutcome, SessionRejection, Station, StationPatch},
    },
};

/// Every station in the venue, read straight from the store.
pub async fn list_stations(state: &SharedState) -> Result<Vec<StationView>, ServiceError> {
    let store = state.require_store().await?;
    let stations = store.list_stations().await?;
    Ok(stations
        .into_iter()
        .map(|entity| Station::from(entity).into())
        .collect())
}

pub async fn get_station(state: &SharedState, id: Uuid) -> Result<StationView, ServiceError> {
    let store = state.require_store().await?;
    store
        .find_station(id)
        .await?
        .map(|entity| Station::from(entity).into())
        .ok_or_else(|| not_found(id))
}

/// Register a new, available station.
pub async fn create_station(
    state: &SharedState,
    request: CreateStationRequest,
) -> Result<StationView, ServiceError> {
    let store = state.require_store().await?;
    let station = Station::new(
        request.name.trim().to_string(),
        request.kind,
        OffsetDateTime::now_utc(),
    );
    store.save_station(StationEntity::from(station.clone())).await?;
    info!(station_id = %station.id, name = %station.name, "station created");
    Ok(station.into())
}

/// Apply an operator patch to station metadata.
pub async fn update_station(
    state: &SharedState,
    id: Uuid,
    request: UpdateStationRequest,
) -> Result<StationView, ServiceError> {
    let patch = StationPatch::from(request);
    if patch.is_empty() {
        return Err(ServiceError::InvalidInput("no field to update".into()));
    }

    let store = state.require_store().await?;
    let now = OffsetDateTime::now_utc();
    let outcome = session_service::update_station_with(store.as_ref(), id, |station| {
        patch.clone().apply(station, now);
        Ok(())
    })
    .await?;
    applied(outcome)
}

/// Remove a station for good.
pub async fn remove_station(state: &SharedState, id: Uuid) -> Result<(), ServiceError> {
    let store = state.require_store().await?;
    if !store.delete_station(id).await? {
        return Err(not_found(id));
    }
    info!(station_id = %id, "station removed");
    Ok(())
}

/// Start a session on an available station.
pub async fn start_session(
    state: &SharedState,
    id: Uuid,
    request: StartSessionRequest,
) -> Result<SessionActionResponse, ServiceError> {
    let mut seen = HashSet::new();
    if let Some(duplicate) = request
        .members
        .iter()
        .find(|member| !seen.insert(member.id.as_str()))
    {
        return Err(ServiceError::InvalidInput(format!(
            "member `{}` listed twice",
            duplicate.id
        )));
    }

    let store = state.require_store().await?;
    let now = OffsetDateTime::now_utc();
    let members: Vec<_> = request
        .members
        .into_iter()
        .map(|member| member.into_member(now))
        .collect();
    let bill: Vec<_> = request
        .bill
        .into_iter()
        .map(|item| item.into_bill_item(now))
        .collect();
    let package_name = request.package_name;

    let outcome = session_service::update_station_with(store.as_ref(), id, |station| {
        station.start_session(members.clone(), bill.clone(), package_name.clone(), now)
    })
    .await?;
    if outcome.is_applied() {
        info!(station_id = %id, "session started");
    }
    Ok(outcome.into())
}

/// Seat one more member at a station.
pub async fn add_player(
    state: &SharedState,
    id: Uuid,
    request: AddPlayerRequest,
) -> Result<SessionActionResponse, ServiceError> {
    let store = state.require_store().await?;
    let now = OffsetDateTime::now_utc();
    let member = request.member.into_member(now);
    let bill_item = request.bill_item.map(|item| item.into_bill_item(now));

    let outcome =
        session_service::add_player_to_session(store.as_ref(), id, member, bill_item, now).await?;
    Ok(outcome.into())
}

/// Move the session of station `id` onto the requested target.
pub async fn move_session(
    state: &SharedState,
    id: Uuid,
    request: MoveSessionRequest,
) -> Result<SessionActionResponse, ServiceError> {
    let store = state.require_store().await?;
    let outcome = session_service::move_station_session(
        store.as_ref(),
        id,
        request.target_id,
        OffsetDateTime::now_utc(),
    )
    .await?;
    Ok(outcome.into())
}

pub async fn add_member_time(
    state: &SharedState,
    id: Uuid,
    member_id: &str,
    request: AdjustTimeRequest,
) -> Result<StationView, ServiceError> {
    let extra = request.duration();
    let now = OffsetDateTime::now_utc();
    let bill_item = request.bill_item.map(|item| item.into_bill_item(now));
    let store = state.require_store().await?;

    let outcome = session_service::update_station_with(store.as_ref(), id, |station| {
        station.add_member_time(member_id, extra, bill_item.clone(), now)
    })
    .await?;
    let view = applied(outcome)?;
    info!(station_id = %id, member_id, minutes = request.minutes, "member time added");
    Ok(view)
}

pub async fn reduce_member_time(
    state: &SharedState,
    id: Uuid,
    member_id: &str,
    request: AdjustTimeRequest,
) -> Result<StationView, ServiceError> {
    let less = request.duration();
    let now = OffsetDateTime::now_utc();
    let store = state.require_store().await?;

    let outcome = session_service::update_station_with(store.as_ref(), id, |station| {
        station.reduce_member_time(member_id, less, now)
    })
    .await?;
    let view = applied(outcome)?;
    info!(station_id = %id, member_id, minutes = request.minutes, "member time reduced");
    Ok(view)
}

pub async fn pause_member(
    state: &SharedState,
    id: Uuid,
    member_id: &str,
) -> Result<StationView, ServiceError> {
    let now = OffsetDateTime::now_utc();
    let store = state.require_store().await?;
    let outcome = session_service::update_station_with(store.as_ref(), id, |station| {
        station.pause_member(member_id, now)
    })
    .await?;
    applied(outcome)
}

pub async fn resume_member(
    state: &SharedState,
    id: Uuid,
    member_id: &str,
) -> Result<StationView, ServiceError> {
    let now = OffsetDateTime::now_utc();
    let store = state.require_store().await?;
    let outcome = session_service::update_station_with(store.as_ref(), id, |station| {
        station.resume_member(member_id, now)
    })
    .await?;
    applied(outcome)
}

fn applied(outcome: SessionOutcome) -> Result<StationView, ServiceError> {
    match outcome {
        SessionOutcome::Applied(station) => Ok(station.into()),
        SessionOutcome::Rejected(reason) => Err(reason.into()),
    }
}

fn not_found(id: Uuid) -> ServiceError {
    SessionRejection::StationNotFound { id }.into()
}
