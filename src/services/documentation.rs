use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Quiz Clash Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::sse::public_stream,
        crate::routes::sse::match_stream,
        crate::routes::users::register_user,
        crate::routes::matchmaking::join_matchmaking,
        crate::routes::matches::start_match,
        crate::routes::matches::get_match,
        crate::routes::matches::submit_answer,
        crate::routes::matches::abandon_match,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::user::RegisterUserRequest,
            crate::dto::user::RegisterUserResponse,
            crate::dto::matchmaking::JoinMatchmakingRequest,
            crate::dto::matchmaking::JoinMatchmakingResponse,
            crate::dto::game::StartMatchRequest,
            crate::dto::game::SubmitAnswerRequest,
            crate::dto::game::SubmitAnswerResponse,
            crate::dto::game::MatchSnapshot,
            crate::dto::sse::Handshake,
            crate::dto::sse::SystemStatus,
            crate::dto::sse::PhaseChangedEvent,
            crate::dto::sse::QuestionEvent,
            crate::dto::sse::TickEvent,
            crate::dto::sse::RoundResolvedEvent,
            crate::dto::sse::GameOverEvent,
            crate::dto::sse::MatchAbandonedEvent,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "sse", description = "Server-sent events streams"),
        (name = "matchmaking", description = "Player registration and lobbies"),
        (name = "match", description = "Matches against the simulated opponent"),
    )
)]
pub struct ApiDoc;
