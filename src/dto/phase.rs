use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    match_engine::resolver::Verdict,
    state::{
        match_state::{MatchOutcome, QuestionProvenance},
        state_machine::MatchPhase,
    },
};

/// Publicly visible match phase exposed to clients (REST/SSE).
#[derive(Debug, Serialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VisibleMatchPhase {
    /// Fetching the next question.
    Loading,
    /// Question on screen, countdown running.
    Active,
    /// Round resolved, result on display.
    Resolved,
    /// Match decided.
    GameOver,
}

impl From<MatchPhase> for VisibleMatchPhase {
    fn from(value: MatchPhase) -> Self {
        match value {
            MatchPhase::Loading => VisibleMatchPhase::Loading,
            MatchPhase::Active => VisibleMatchPhase::Active,
            MatchPhase::Resolved => VisibleMatchPhase::Resolved,
            MatchPhase::GameOver => VisibleMatchPhase::GameOver,
        }
    }
}

/// Match outcome as exposed to clients.
#[derive(Debug, Serialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VisibleOutcome {
    InProgress,
    PlayerWins,
    OpponentWins,
    Draw,
}

impl From<MatchOutcome> for VisibleOutcome {
    fn from(value: MatchOutcome) -> Self {
        match value {
            MatchOutcome::InProgress => VisibleOutcome::InProgress,
            MatchOutcome::PlayerWins => VisibleOutcome::PlayerWins,
            MatchOutcome::OpponentWins => VisibleOutcome::OpponentWins,
            MatchOutcome::Draw => VisibleOutcome::Draw,
        }
    }
}

/// Where the question on screen came from.
#[derive(Debug, Serialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VisibleProvenance {
    /// Generated with a resolved answer.
    Generated,
    /// Generated, but the first option was assumed correct.
    Degraded,
    /// Built-in fallback question.
    Fallback,
}

impl From<QuestionProvenance> for VisibleProvenance {
    fn from(value: QuestionProvenance) -> Self {
        match value {
            QuestionProvenance::Generated => VisibleProvenance::Generated,
            QuestionProvenance::Degraded => VisibleProvenance::Degraded,
            QuestionProvenance::Fallback => VisibleProvenance::Fallback,
        }
    }
}

/// Round verdict as exposed to clients.
#[derive(Debug, Serialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VisibleVerdict {
    PlayerCorrect,
    PlayerWrong,
    OpponentCorrect,
    TimedOut,
}

impl From<Verdict> for VisibleVerdict {
    fn from(value: Verdict) -> Self {
        match value {
            Verdict::PlayerCorrect => VisibleVerdict::PlayerCorrect,
            Verdict::PlayerWrong => VisibleVerdict::PlayerWrong,
            Verdict::OpponentCorrect => VisibleVerdict::OpponentCorrect,
            Verdict::TimedOut => VisibleVerdict::TimedOut,
        }
    }
}
