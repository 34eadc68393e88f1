use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::game::{MatchSnapshot, StartMatchRequest, SubmitAnswerRequest, SubmitAnswerResponse},
    error::AppError,
    services::match_service,
    state::SharedState,
};

/// Routes driving a match against the simulated opponent.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/matches", post(start_match))
        .route("/matches/{id}", get(get_match).delete(abandon_match))
        .route("/matches/{id}/answer", post(submit_answer))
}

/// Start a match; the first question is loaded in the background.
#[utoipa::path(
    post,
    path = "/matches",
    tag = "match",
    request_body = StartMatchRequest,
    responses(
        (status = 201, description = "Match started", body = MatchSnapshot),
        (status = 400, description = "Invalid names or topic")
    )
)]
pub async fn start_match(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<StartMatchRequest>>,
) -> (StatusCode, Json<MatchSnapshot>) {
    let snapshot = match_service::start_match(&state, payload);
    (StatusCode::CREATED, Json(snapshot))
}

/// Current state of a match.
#[utoipa::path(
    get,
    path = "/matches/{id}",
    tag = "match",
    params(("id" = Uuid, Path, description = "Match identifier")),
    responses(
        (status = 200, description = "Match snapshot", body = MatchSnapshot),
        (status = 404, description = "Unknown or expired match")
    )
)]
pub async fn get_match(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MatchSnapshot>, AppError> {
    let snapshot = match_service::get_match(&state, id)?;
    Ok(Json(snapshot))
}

/// Submit the player's answer for the question on screen.
#[utoipa::path(
    post,
    path = "/matches/{id}/answer",
    tag = "match",
    params(("id" = Uuid, Path, description = "Match identifier")),
    request_body = SubmitAnswerRequest,
    responses(
        (status = 200, description = "Submission processed; `accepted` tells whether it resolved the round", body = SubmitAnswerResponse),
        (status = 400, description = "Option not offered by the current question"),
        (status = 404, description = "Unknown or expired match")
    )
)]
pub async fn submit_answer(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<SubmitAnswerRequest>>,
) -> Result<Json<SubmitAnswerResponse>, AppError> {
    let response = match_service::submit_answer(&state, id, payload).await?;
    Ok(Json(response))
}

/// Abandon a match, cancelling its countdown and opponent timers.
#[utoipa::path(
    delete,
    path = "/matches/{id}",
    tag = "match",
    params(("id" = Uuid, Path, description = "Match identifier")),
    responses(
        (status = 204, description = "Match abandoned"),
        (status = 404, description = "Unknown or expired match")
    )
)]
pub async fn abandon_match(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    match_service::abandon_match(&state, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
