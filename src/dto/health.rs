use serde::Serialize;
use utoipa::ToSchema;

/// Health payload returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// `ok`, or `degraded` while the session store is unreachable.
    pub status: String,
    /// Matches currently registered, finished ones included until they expire.
    pub active_matches: usize,
}

impl HealthResponse {
    /// Build the payload for the given storage state.
    pub fn new(degraded: bool, active_matches: usize) -> Self {
        let status = if degraded { "degraded" } else { "ok" };
        Self {
            status: status.to_string(),
            active_matches,
        }
    }
}
