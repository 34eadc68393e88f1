use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    dto::phase::{VisibleProvenance, VisibleVerdict},
    match_engine::resolver::{Resolution, Trigger},
    state::match_state::{Combatant, Question},
};

/// Name and health of one combatant.
#[derive(Debug, Serialize, ToSchema, Clone, PartialEq, Eq)]
pub struct CombatantView {
    pub name: String,
    /// Health in `0..=100`.
    pub health: u8,
}

impl From<&Combatant> for CombatantView {
    fn from(combatant: &Combatant) -> Self {
        Self {
            name: combatant.name.clone(),
            health: combatant.health(),
        }
    }
}

/// Question as shown to the player. The correct option is withheld.
#[derive(Debug, Serialize, ToSchema, Clone, PartialEq, Eq)]
pub struct QuestionView {
    pub text: String,
    pub options: Vec<String>,
    pub provenance: VisibleProvenance,
}

impl From<&Question> for QuestionView {
    fn from(question: &Question) -> Self {
        Self {
            text: question.text().to_string(),
            options: question.options().to_vec(),
            provenance: question.provenance().into(),
        }
    }
}

/// Which trigger closed a round.
#[derive(Debug, Serialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    Player,
    Opponent,
    Timeout,
}

impl From<&Trigger> for TriggerKind {
    fn from(trigger: &Trigger) -> Self {
        match trigger {
            Trigger::Player { .. } => TriggerKind::Player,
            Trigger::Opponent => TriggerKind::Opponent,
            Trigger::Timeout => TriggerKind::Timeout,
        }
    }
}

/// Result of a resolved round, revealing the correct option.
#[derive(Debug, Serialize, ToSchema, Clone, PartialEq, Eq)]
pub struct ResolutionView {
    pub trigger: TriggerKind,
    pub verdict: VisibleVerdict,
    /// Damage dealt to the player this round.
    pub player_damage: u8,
    /// Damage dealt to the opponent this round.
    pub opponent_damage: u8,
    pub correct_option: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_option: Option<String>,
    /// Seconds left on the clock when the round closed.
    pub time_remaining: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

impl From<&Resolution> for ResolutionView {
    fn from(resolution: &Resolution) -> Self {
        Self {
            trigger: (&resolution.trigger).into(),
            verdict: resolution.verdict.into(),
            player_damage: resolution.delta.player,
            opponent_damage: resolution.delta.opponent,
            correct_option: resolution.correct_option.clone(),
            selected_option: resolution.selected_option.clone(),
            time_remaining: resolution.time_remaining,
            explanation: resolution.explanation.clone(),
        }
    }
}
