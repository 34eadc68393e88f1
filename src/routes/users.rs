use axum::{Json, Router, extract::State, routing::post};
use axum_valid::Valid;

use crate::{
    dto::user::{RegisterUserRequest, RegisterUserResponse},
    error::AppError,
    services::matchmaking_service,
    state::SharedState,
};

/// Player registration.
pub fn router() -> Router<SharedState> {
    Router::new().route("/users", post(register_user))
}

/// Register a player and hand back its identifier.
#[utoipa::path(
    post,
    path = "/users",
    tag = "matchmaking",
    request_body = RegisterUserRequest,
    responses(
        (status = 200, description = "Player registered", body = RegisterUserResponse),
        (status = 400, description = "Invalid display name"),
        (status = 503, description = "Storage unavailable")
    )
)]
pub async fn register_user(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<RegisterUserRequest>>,
) -> Result<Json<RegisterUserResponse>, AppError> {
    let user = matchmaking_service::register_user(&state, payload).await?;
    Ok(Json(user))
}
