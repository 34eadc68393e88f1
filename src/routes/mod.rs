use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{services::documentation::ApiDoc, state::SharedState};

pub mod health;
pub mod matches;
pub mod matchmaking;
pub mod sse;
pub mod users;

/// Compose all route trees, wiring in shared state and the Swagger UI.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(sse::router())
        .merge(users::router())
        .merge(matchmaking::router())
        .merge(matches::router());

    let docs_router: Router<SharedState> = SwaggerUi::new("/docs")
        .url("/api-doc/openapi.json", ApiDoc::openapi())
        .into();

    api_router.merge(docs_router).with_state(state)
}
