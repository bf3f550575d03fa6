use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct AudioUnlockResponse {
    pub unlocked: bool,
    /// False when an earlier gesture already unlocked audio.
    pub newly_unlocked: bool,
}
