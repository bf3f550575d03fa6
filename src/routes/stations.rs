use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::station::{
        AddPlayerRequest, AdjustTimeRequest, CreateStationRequest, MoveSessionRequest,
        SessionActionResponse, StartSessionRequest, StationView, UpdateStationRequest,
    },
    error::AppError,
    services::station_service,
    state::SharedState,
};

/// Station management and session endpoints used by the floor UI.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/stations", get(list_stations).post(create_station))
        .route(
            "/stations/{id}",
            get(get_station).patch(update_station).delete(remove_station),
        )
        .route("/stations/{id}/session", post(start_session))
        .route("/stations/{id}/members", post(add_player))
        .route(
            "/stations/{id}/members/{member_id}/time/add",
            post(add_member_time),
        )
        .route(
            "/stations/{id}/members/{member_id}/time/reduce",
            post(reduce_member_time),
        )
        .route("/stations/{id}/members/{member_id}/pause", post(pause_member))
        .route(
            "/stations/{id}/members/{member_id}/resume",
            post(resume_member),
        )
        .route("/stations/{id}/move", post(move_session))
}

/// List every station of the venue.
#[utoipa::path(
    get,
    path = "/stations",
    tag = "stations",
    responses((status = 200, description = "Stations", body = [StationView]))
)]
pub async fn list_stations(
    State(state): State<SharedState>,
) -> Result<Json<Vec<StationView>>, AppError> {
    Ok(Json(station_service::list_stations(&state).await?))
}

/// Register a new station.
#[utoipa::path(
    post,
    path = "/stations",
    tag = "stations",
    request_body = CreateStationRequest,
    responses((status = 201, description = "Station created", body = StationView))
)]
pub async fn create_station(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<CreateStationRequest>>,
) -> Result<(StatusCode, Json<StationView>), AppError> {
    let station = station_service::create_station(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(station)))
}

/// Retrieve a station by its identifier.
#[utoipa::path(
    get,
    path = "/stations/{id}",
    tag = "stations",
    params(("id" = Uuid, Path, description = "Station identifier")),
    responses((status = 200, description = "Station", body = StationView))
)]
pub async fn get_station(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<StationView>, AppError> {
    Ok(Json(station_service::get_station(&state, id).await?))
}

/// Edit station metadata. Omitted fields are left untouched; `null` clears a nullable field.
#[utoipa::path(
    patch,
    path = "/stations/{id}",
    tag = "stations",
    params(("id" = Uuid, Path, description = "Station identifier")),
    request_body = UpdateStationRequest,
    responses((status = 200, description = "Station updated", body = StationView))
)]
pub async fn update_station(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<UpdateStationRequest>>,
) -> Result<Json<StationView>, AppError> {
    Ok(Json(
        station_service::update_station(&state, id, payload).await?,
    ))
}

/// Remove a station from the venue.
#[utoipa::path(
    delete,
    path = "/stations/{id}",
    tag = "stations",
    params(("id" = Uuid, Path, description = "Station identifier")),
    responses((status = 204, description = "Station removed"))
)]
pub async fn remove_station(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    station_service::remove_station(&state, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Start a session on an available station.
#[utoipa::path(
    post,
    path = "/stations/{id}/session",
    tag = "sessions",
    params(("id" = Uuid, Path, description = "Station identifier")),
    request_body = StartSessionRequest,
    responses((status = 200, description = "Session started or rejected", body = SessionActionResponse))
)]
pub async fn start_session(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<StartSessionRequest>>,
) -> Result<Json<SessionActionResponse>, AppError> {
    Ok(Json(
        station_service::start_session(&state, id, payload).await?,
    ))
}

/// Seat one more member at a station.
#[utoipa::path(
    post,
    path = "/stations/{id}/members",
    tag = "sessions",
    params(("id" = Uuid, Path, description = "Station identifier")),
    request_body = AddPlayerRequest,
    responses((status = 200, description = "Player joined or rejected", body = SessionActionResponse))
)]
pub async fn add_player(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<AddPlayerRequest>>,
) -> Result<Json<SessionActionResponse>, AppError> {
    Ok(Json(station_service::add_player(&state, id, payload).await?))
}

/// Move the station's whole session onto another, available station.
#[utoipa::path(
    post,
    path = "/stations/{id}/move",
    tag = "sessions",
    params(("id" = Uuid, Path, description = "Source station identifier")),
    request_body = MoveSessionRequest,
    responses((status = 200, description = "Session moved or rejected", body = SessionActionResponse))
)]
pub async fn move_session(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<MoveSessionRequest>,
) -> Result<Json<SessionActionResponse>, AppError> {
    Ok(Json(
        station_service::move_session(&state, id, payload).await?,
    ))
}

/// Give a member more time.
#[utoipa::path(
    post,
    path = "/stations/{id}/members/{member_id}/time/add",
    tag = "sessions",
    params(
        ("id" = Uuid, Path, description = "Station identifier"),
        ("member_id" = String, Path, description = "Member identifier"),
    ),
    request_body = AdjustTimeRequest,
    responses((status = 200, description = "Time added", body = StationView))
)]
pub async fn add_member_time(
    State(state): State<SharedState>,
    Path((id, member_id)): Path<(Uuid, String)>,
    Valid(Json(payload)): Valid<Json<AdjustTimeRequest>>,
) -> Result<Json<StationView>, AppError> {
    Ok(Json(
        station_service::add_member_time(&state, id, &member_id, payload).await?,
    ))
}

/// Take time away from a member.
#[utoipa::path(
    post,
    path = "/stations/{id}/members/{member_id}/time/reduce",
    tag = "sessions",
    params(
        ("id" = Uuid, Path, description = "Station identifier"),
        ("member_id" = String, Path, description = "Member identifier"),
    ),
    request_body = AdjustTimeRequest,
    responses((status = 200, description = "Time reduced", body = StationView))
)]
pub async fn reduce_member_time(
    State(state): State<SharedState>,
    Path((id, member_id)): Path<(Uuid, String)>,
    Valid(Json(payload)): Valid<Json<AdjustTimeRequest>>,
) -> Result<Json<StationView>, AppError> {
    Ok(Json(
        station_service::reduce_member_time(&state, id, &member_id, payload).await?,
    ))
}

/// Freeze a member's timer.
#[utoipa::path(
    post,
    path = "/stations/{id}/members/{member_id}/pause",
    tag = "sessions",
    params(
        ("id" = Uuid, Path, description = "Station identifier"),
        ("member_id" = String, Path, description = "Member identifier"),
    ),
    responses((status = 200, description = "Member paused", body = StationView))
)]
pub async fn pause_member(
    State(state): State<SharedState>,
    Path((id, member_id)): Path<(Uuid, String)>,
) -> Result<Json<StationView>, AppError> {
    Ok(Json(
        station_service::pause_member(&state, id, &member_id).await?,
    ))
}

/// Restart a paused member's timer.
#[utoipa::path(
    post,
    path = "/stations/{id}/members/{member_id}/resume",
    tag = "sessions",
    params(
        ("id" = Uuid, Path, description = "Station identifier"),
        ("member_id" = String, Path, description = "Member identifier"),
    ),
    responses((status = 200, description = "Member resumed", body = StationView))
)]
pub async fn resume_member(
    State(state): State<SharedState>,
    Path((id, member_id)): Path<(Uuid, String)>,
) -> Result<Json<StationView>, AppError> {
    Ok(Json(
        station_service::resume_member(&state, id, &member_id).await?,
    ))
}
