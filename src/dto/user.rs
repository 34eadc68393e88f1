use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::dao::models::UserEntity;
use crate::dto::{format_system_time, validation::validate_display_name};

/// Payload used to register a player.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct RegisterUserRequest {
    /// Display name (3 to 20 characters once trimmed).
    #[validate(custom(function = "validate_display_name"))]
    pub name: String,
}

/// Registered player as returned to the client.
#[derive(Debug, Serialize, ToSchema)]
pub struct RegisterUserResponse {
    pub user_id: Uuid,
    pub name: String,
    /// Registration time, RFC 3339.
    pub created_at: String,
}

impl From<UserEntity> for RegisterUserResponse {
    fn from(user: UserEntity) -> Self {
        Self {
            user_id: user.id,
            name: user.name,
            created_at: format_system_time(user.created_at),
        }
    }
}
