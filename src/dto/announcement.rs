use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::dto::validation::validate_not_blank;

/// Operator message voiced on every floor node.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct AnnouncementRequest {
    #[validate(length(min = 1, max = 500), custom(function = "validate_not_blank"))]
    pub text: String,
}

/// Acknowledgement returned once the message reached the shared channel.
#[derive(Debug, Serialize, ToSchema)]
pub struct AnnouncementResponse {
    pub id: Uuid,
    pub timestamp: String,
}
