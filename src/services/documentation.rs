use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the floor node.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::sse::floor_stream,
        crate::routes::stations::list_stations,
        crate::routes::stations::create_station,
        crate::routes::stations::get_station,
        crate::routes::stations::update_station,
        crate::routes::stations::remove_station,
        crate::routes::stations::start_session,
        crate::routes::stations::add_player,
        crate::routes::stations::move_session,
        crate::routes::stations::add_member_time,
        crate::routes::stations::reduce_member_time,
        crate::routes::stations::pause_member,
        crate::routes::stations::resume_member,
        crate::routes::announcements::publish_announcement,
        crate::routes::floor::list_alerts,
        crate::routes::floor::dismiss_alert,
        crate::routes::floor::unlock_audio,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::station::StationView,
            crate::dto::station::MemberView,
            crate::dto::station::BillItemView,
            crate::dto::station::CreateStationRequest,
            crate::dto::station::UpdateStationRequest,
            crate::dto::station::MemberInput,
            crate::dto::station::BillItemInput,
            crate::dto::station::StartSessionRequest,
            crate::dto::station::AddPlayerRequest,
            crate::dto::station::AdjustTimeRequest,
            crate::dto::station::MoveSessionRequest,
            crate::dto::station::SessionActionResponse,
            crate::dto::announcement::AnnouncementRequest,
            crate::dto::announcement::AnnouncementResponse,
            crate::dto::alert::AlertView,
            crate::dto::alert::DismissAlertResponse,
            crate::dto::audio::AudioUnlockResponse,
            crate::dto::sse::Handshake,
            crate::dto::sse::SystemStatus,
            crate::dto::sse::StationsSnapshotEvent,
            crate::dto::sse::FloorNoticeEvent,
            crate::dto::sse::FloorNoticeKind,
            crate::dto::sse::AlertDismissedEvent,
            crate::dto::sse::OperatorAnnouncementEvent,
            crate::dao::models::StationKind,
            crate::dao::models::StationStatus,
            crate::dao::models::MemberStatus,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "sse", description = "Server-sent events streams"),
        (name = "stations", description = "Station management"),
        (name = "sessions", description = "Session protocols and seat timers"),
        (name = "announcements", description = "Operator announcements shared by every node"),
        (name = "floor", description = "Expiry acknowledgements and audio gate of this node"),
    )
)]
pub struct ApiDoc;
