use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dto::format_time,
    state::{Audience, ExpiryAlert},
};

/// Pending expiry acknowledgement.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AlertView {
    pub id: Uuid,
    pub station_id: Uuid,
    pub station_name: String,
    /// Member name, or `everyone` when several seats ran out together.
    pub audience: String,
    pub everyone: bool,
    pub raised_at: String,
}

impl From<ExpiryAlert> for AlertView {
    fn from(alert: ExpiryAlert) -> Self {
        Self {
            id: alert.id,
            station_id: alert.station_id,
            station_name: alert.station_name,
            audience: alert.audience.label().to_string(),
            everyone: alert.audience == Audience::Everyone,
            raised_at: format_time(alert.raised_at),
        }
    }
}

/// Returned on dismissal so the UI can open checkout for the station.
#[derive(Debug, Serialize, ToSchema)]
pub struct DismissAlertResponse {
    pub station_id: Uuid,
}
