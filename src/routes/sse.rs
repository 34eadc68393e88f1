use std::convert::Infallible;

use axum::{
    Router,
    extract::{Path, State},
    response::sse::{Event, Sse},
    routing::get,
};
use futures::Stream;
use tracing::info;
use uuid::Uuid;

use crate::{
    error::AppError,
    services::sse_service::{self, StreamKind},
    state::SharedState,
};

#[utoipa::path(
    get,
    path = "/sse/public",
    tag = "sse",
    responses((status = 200, description = "Public SSE stream", content_type = "text/event-stream", body = String))
)]
/// Stream system-wide events such as degraded mode changes.
pub async fn public_stream(
    State(state): State<SharedState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (receiver, greeting) = sse_service::subscribe_public(&state);
    info!("new public SSE connection");
    sse_service::to_sse_stream(receiver, greeting, StreamKind::Public)
}

#[utoipa::path(
    get,
    path = "/matches/{id}/events",
    tag = "sse",
    params(("id" = Uuid, Path, description = "Match identifier")),
    responses(
        (status = 200, description = "Match SSE stream", content_type = "text/event-stream", body = String),
        (status = 404, description = "Unknown match")
    )
)]
/// Stream the realtime events of one match.
pub async fn match_stream(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let (receiver, greeting) = sse_service::subscribe_match(&state, id)?;
    info!(match_id = %id, "new match SSE connection");
    Ok(sse_service::to_sse_stream(
        receiver,
        greeting,
        StreamKind::Match(id),
    ))
}

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/sse/public", get(public_stream))
        .route("/matches/{id}/events", get(match_stream))
}
