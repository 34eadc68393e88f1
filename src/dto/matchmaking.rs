use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_with::{DurationMilliSeconds, serde_as};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{dao::models::LobbyTicket, dto::validation::validate_topic};

/// Payload used to enter matchmaking.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct JoinMatchmakingRequest {
    /// Identifier returned at registration.
    pub user_id: Uuid,
    /// Topic to play. Defaults to the configured topic.
    #[serde(default)]
    #[validate(custom(function = "validate_topic"))]
    pub topic: Option<String>,
}

/// Lobby the player landed in.
#[serde_as]
#[derive(Debug, Serialize, ToSchema)]
pub struct JoinMatchmakingResponse {
    pub match_id: Uuid,
    pub topic: String,
    /// Time left in the join window, in milliseconds.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[schema(value_type = u64)]
    pub remaining_time_ms: Duration,
    /// Whether this join opened the lobby.
    pub created: bool,
}

impl From<LobbyTicket> for JoinMatchmakingResponse {
    fn from(ticket: LobbyTicket) -> Self {
        Self {
            match_id: ticket.match_id,
            topic: ticket.topic,
            remaining_time_ms: ticket.remaining,
            created: ticket.created,
        }
    }
}
