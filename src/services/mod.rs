/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Match lifecycle: start, query, answer, abandon.
pub mod match_service;
/// Player registration and lobby matchmaking.
pub mod matchmaking_service;
/// Question generation with fallback.
pub mod question_service;
/// Server-Sent Events message generation.
pub mod sse_events;
/// Server-Sent Events streaming service.
pub mod sse_service;
/// Storage connection supervisor toggling degraded mode.
pub mod storage_supervisor;
