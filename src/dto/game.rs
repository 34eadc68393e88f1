use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::{
        common::{CombatantView, QuestionView, ResolutionView},
        phase::{VisibleMatchPhase, VisibleOutcome},
        validation::{validate_display_name, validate_topic},
    },
    match_engine::session::MatchSession,
};

/// Payload used to start a match against the simulated opponent.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct StartMatchRequest {
    /// Display name of the player (3 to 20 characters).
    #[validate(custom(function = "validate_display_name"))]
    pub player_name: String,
    /// Name shown for the opponent. Defaults to the configured opponent name.
    #[serde(default)]
    #[validate(custom(function = "validate_display_name"))]
    pub opponent_name: Option<String>,
    /// Topic questions are generated for. Defaults to the configured topic.
    #[serde(default)]
    #[validate(custom(function = "validate_topic"))]
    pub topic: Option<String>,
}

/// Answer submitted by the player for the question on screen.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct SubmitAnswerRequest {
    /// Text of the selected option.
    #[validate(length(min = 1))]
    pub option: String,
}

/// Outcome of an answer submission.
///
/// Submissions that arrive too late or outside a running round are not errors:
/// they come back with `accepted = false` and a human-readable reason.
#[derive(Debug, Serialize, ToSchema)]
pub struct SubmitAnswerResponse {
    /// Whether the answer was recorded for the current round.
    pub accepted: bool,
    /// Why the answer was ignored, only set when `accepted` is false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Outcome of the round this answer resolved, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<ResolutionView>,
    /// Match state right after the submission.
    pub snapshot: MatchSnapshot,
}

/// Full view of a match as seen by the player.
#[derive(Debug, Serialize, ToSchema, Clone, PartialEq, Eq)]
pub struct MatchSnapshot {
    pub match_id: Uuid,
    pub topic: String,
    pub phase: VisibleMatchPhase,
    pub outcome: VisibleOutcome,
    /// Number of phase transitions so far; grows monotonically.
    pub version: usize,
    /// One-based index of the current question.
    pub question_index: u32,
    pub time_remaining: u32,
    pub player: CombatantView,
    pub opponent: CombatantView,
    /// Question on screen; absent while loading.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question: Option<QuestionView>,
    /// Resolution of the current round, once resolved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<ResolutionView>,
}

impl From<&MatchSession> for MatchSnapshot {
    fn from(session: &MatchSession) -> Self {
        let round = session.round();
        Self {
            match_id: session.id(),
            topic: session.topic().to_string(),
            phase: session.phase().into(),
            outcome: session.outcome().into(),
            version: session.version(),
            question_index: round.question_index(),
            time_remaining: round.time_remaining(),
            player: session.player().into(),
            opponent: session.opponent().into(),
            question: round.question().map(QuestionView::from),
            resolution: round.resolution().map(ResolutionView::from),
        }
    }
}
