use axum::{Json, Router, extract::State, routing::post};
use axum_valid::Valid;

use crate::{
    dto::matchmaking::{JoinMatchmakingRequest, JoinMatchmakingResponse},
    error::AppError,
    services::matchmaking_service,
    state::SharedState,
};

/// Lobby matchmaking.
pub fn router() -> Router<SharedState> {
    Router::new().route("/matchmaking/join", post(join_matchmaking))
}

/// Join the oldest open lobby for a topic, or open a new one.
#[utoipa::path(
    post,
    path = "/matchmaking/join",
    tag = "matchmaking",
    request_body = JoinMatchmakingRequest,
    responses(
        (status = 200, description = "Lobby joined", body = JoinMatchmakingResponse),
        (status = 404, description = "Unknown user"),
        (status = 409, description = "Lobby kept changing under concurrent joins"),
        (status = 503, description = "Storage unavailable")
    )
)]
pub async fn join_matchmaking(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<JoinMatchmakingRequest>>,
) -> Result<Json<JoinMatchmakingResponse>, AppError> {
    let ticket = matchmaking_service::join_matchmaking(&state, payload).await?;
    Ok(Json(ticket))
}
