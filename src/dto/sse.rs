use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::dto::{
    common::{CombatantView, QuestionView, ResolutionView},
    phase::{VisibleMatchPhase, VisibleOutcome},
};

#[derive(Clone, Debug)]
/// Dispatched payload carried across SSE channels.
pub struct ServerEvent {
    pub event: Option<String>,
    pub data: String,
}

impl ServerEvent {
    /// Build an event from an already serialized payload.
    pub fn new(event: Option<String>, data: String) -> Self {
        Self { event, data }
    }

    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Initial metadata sent to an SSE client when it connects.
pub struct Handshake {
    /// Identifier of the SSE stream (`public` or `match`).
    pub stream: String,
    /// Human-readable message confirming the subscription.
    pub message: String,
    /// Whether the backend is running without a storage backend connection.
    pub degraded: bool,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when the backend enters or leaves degraded mode.
pub struct SystemStatus {
    pub degraded: bool,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast whenever the match phase changes.
pub struct PhaseChangedEvent {
    pub match_id: Uuid,
    pub phase: VisibleMatchPhase,
    pub question_index: u32,
    pub version: usize,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when a new question goes on screen.
pub struct QuestionEvent {
    pub match_id: Uuid,
    pub question_index: u32,
    pub question: QuestionView,
    /// Countdown budget in seconds.
    pub time_remaining: u32,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast once per second while a question is on screen.
pub struct TickEvent {
    pub match_id: Uuid,
    pub question_index: u32,
    pub time_remaining: u32,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when a trigger resolves the round.
pub struct RoundResolvedEvent {
    pub match_id: Uuid,
    pub question_index: u32,
    pub resolution: ResolutionView,
    pub player: CombatantView,
    pub opponent: CombatantView,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast once when the match is decided.
pub struct GameOverEvent {
    pub match_id: Uuid,
    pub outcome: VisibleOutcome,
    pub player: CombatantView,
    pub opponent: CombatantView,
    /// Number of questions played.
    pub questions_played: u32,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when the player abandons the match.
pub struct MatchAbandonedEvent {
    pub match_id: Uuid,
}
