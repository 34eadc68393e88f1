//! Match-level data model: combatants, canonical questions and outcomes.

use thiserror::Error;

/// Health every combatant starts a match with.
pub const MAX_HEALTH: u8 = 100;

/// Which side of the battle a combatant fights on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    /// The human player driving the match through answer submissions.
    Player,
    /// The locally simulated opponent.
    Opponent,
}

/// One participant of a match, tracked by health only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Combatant {
    /// Display name shown to the player.
    pub name: String,
    /// Side this combatant fights on.
    pub side: Side,
    health: u8,
}

impl Combatant {
    /// Create a combatant at full health.
    pub fn new(name: impl Into<String>, side: Side) -> Self {
        Self {
            name: name.into(),
            side,
            health: MAX_HEALTH,
        }
    }

    /// Current health, always within `0..=MAX_HEALTH`.
    pub fn health(&self) -> u8 {
        self.health
    }

    /// True once the combatant has no health left.
    pub fn is_defeated(&self) -> bool {
        self.health == 0
    }

    /// Apply damage, clamping at zero. Returns the damage actually taken.
    pub(crate) fn take_damage(&mut self, amount: u8) -> u8 {
        let before = self.health;
        self.health = self.health.saturating_sub(amount);
        before - self.health
    }
}

/// Terminal or running state of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchOutcome {
    /// Both combatants still have health.
    #[default]
    InProgress,
    /// The opponent reached zero health first.
    PlayerWins,
    /// The player reached zero health first.
    OpponentWins,
    /// Both combatants reached zero health in the same resolution.
    Draw,
}

impl MatchOutcome {
    /// Decide the outcome from the current health of both combatants.
    pub fn decide(player: &Combatant, opponent: &Combatant) -> Self {
        match (player.is_defeated(), opponent.is_defeated()) {
            (true, true) => MatchOutcome::Draw,
            (true, false) => MatchOutcome::OpponentWins,
            (false, true) => MatchOutcome::PlayerWins,
            (false, false) => MatchOutcome::InProgress,
        }
    }

    /// Whether the match has ended.
    pub fn is_terminal(self) -> bool {
        !matches!(self, MatchOutcome::InProgress)
    }
}

/// Where a canonical question came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionProvenance {
    /// Generated externally and the correct answer was resolved from the payload.
    Generated,
    /// Generated externally but no correct answer could be resolved; the first option was used.
    Degraded,
    /// Built-in question served because generation failed.
    Fallback,
}

/// Reasons a question cannot be made canonical.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidQuestion {
    /// The prompt is empty.
    #[error("question text is empty")]
    EmptyText,
    /// Fewer than two options were supplied.
    #[error("a question needs at least two options (got {0})")]
    TooFewOptions(usize),
    /// An option is blank.
    #[error("option {0} is empty")]
    EmptyOption(usize),
    /// Two options carry the same text.
    #[error("option `{0}` appears more than once")]
    DuplicateOption(String),
    /// The correct option index does not point into the options.
    #[error("correct option index {index} is out of range for {len} options")]
    CorrectOutOfRange {
        /// Offending index.
        index: usize,
        /// Number of options available.
        len: usize,
    },
}

/// Canonical multiple-choice question consumed by the match engine.
///
/// The correct option is always one of `options`; the constructor refuses
/// anything else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    text: String,
    options: Vec<String>,
    correct_option: String,
    explanation: Option<String>,
    provenance: QuestionProvenance,
}

impl Question {
    /// Build a canonical question, trimming text and options.
    pub fn new(
        text: &str,
        options: Vec<String>,
        correct_index: usize,
        explanation: Option<String>,
        provenance: QuestionProvenance,
    ) -> Result<Self, InvalidQuestion> {
        let text = text.trim();
        if text.is_empty() {
            return Err(InvalidQuestion::EmptyText);
        }

        let options: Vec<String> = options
            .into_iter()
            .map(|option| option.trim().to_string())
            .collect();
        if options.len() < 2 {
            return Err(InvalidQuestion::TooFewOptions(options.len()));
        }
        for (index, option) in options.iter().enumerate() {
            if option.is_empty() {
                return Err(InvalidQuestion::EmptyOption(index));
            }
            if options[..index].contains(option) {
                return Err(InvalidQuestion::DuplicateOption(option.clone()));
            }
        }

        let correct_option =
            options
                .get(correct_index)
                .cloned()
                .ok_or(InvalidQuestion::CorrectOutOfRange {
                    index: correct_index,
                    len: options.len(),
                })?;

        Ok(Self {
            text: text.to_string(),
            options,
            correct_option,
            explanation: explanation
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty()),
            provenance,
        })
    }

    /// Built-in question served whenever generation cannot produce one.
    pub fn fallback() -> Self {
        Self {
            text: "What is the capital of France?".into(),
            options: vec![
                "Paris".into(),
                "Berlin".into(),
                "London".into(),
                "Rome".into(),
            ],
            correct_option: "Paris".into(),
            explanation: None,
            provenance: QuestionProvenance::Fallback,
        }
    }

    /// The prompt shown to the player.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Ordered answer options.
    pub fn options(&self) -> &[String] {
        &self.options
    }

    /// Text of the correct option.
    pub fn correct_option(&self) -> &str {
        &self.correct_option
    }

    /// Optional one-sentence explanation revealed after resolution.
    pub fn explanation(&self) -> Option<&str> {
        self.explanation.as_deref()
    }

    /// How this question was obtained.
    pub fn provenance(&self) -> QuestionProvenance {
        self.provenance
    }

    /// Whether `option` is one of the offered answers.
    pub fn has_option(&self, option: &str) -> bool {
        self.options.iter().any(|candidate| candidate == option)
    }

    /// Whether `option` is the correct answer.
    pub fn is_correct(&self, option: &str) -> bool {
        self.correct_option == option
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn fallback_question_satisfies_invariant() {
        let question = Question::fallback();
        assert!(question.has_option(question.correct_option()));
        assert_eq!(question.provenance(), QuestionProvenance::Fallback);
        assert_eq!(question.options().len(), 4);
    }

    #[test]
    fn constructor_trims_and_resolves_correct_option() {
        let question = Question::new(
            "  Largest planet? ",
            options(&[" Jupiter", "Mars ", "Venus"]),
            0,
            Some("  ".into()),
            QuestionProvenance::Generated,
        )
        .unwrap();

        assert_eq!(question.text(), "Largest planet?");
        assert_eq!(question.correct_option(), "Jupiter");
        assert!(question.has_option("Mars"));
        assert_eq!(question.explanation(), None);
    }

    #[test]
    fn constructor_rejects_broken_questions() {
        let provenance = QuestionProvenance::Generated;
        assert_eq!(
            Question::new(" ", options(&["a", "b"]), 0, None, provenance).unwrap_err(),
            InvalidQuestion::EmptyText
        );
        assert_eq!(
            Question::new("q", options(&["a"]), 0, None, provenance).unwrap_err(),
            InvalidQuestion::TooFewOptions(1)
        );
        assert_eq!(
            Question::new("q", options(&["a", " "]), 0, None, provenance).unwrap_err(),
            InvalidQuestion::EmptyOption(1)
        );
        assert_eq!(
            Question::new("q", options(&["a", "b", "a "]), 0, None, provenance).unwrap_err(),
            InvalidQuestion::DuplicateOption("a".into())
        );
        assert_eq!(
            Question::new("q", options(&["a", "b"]), 2, None, provenance).unwrap_err(),
            InvalidQuestion::CorrectOutOfRange { index: 2, len: 2 }
        );
    }

    #[test]
    fn damage_clamps_at_zero() {
        let mut combatant = Combatant::new("Ada", Side::Player);
        assert_eq!(combatant.take_damage(30), 30);
        assert_eq!(combatant.health(), 70);
        assert_eq!(combatant.take_damage(90), 70);
        assert_eq!(combatant.health(), 0);
        assert!(combatant.is_defeated());
        assert_eq!(combatant.take_damage(10), 0);
    }

    #[test]
    fn outcome_is_decided_from_health() {
        let mut player = Combatant::new("Ada", Side::Player);
        let mut opponent = Combatant::new("Bot", Side::Opponent);
        assert_eq!(
            MatchOutcome::decide(&player, &opponent),
            MatchOutcome::InProgress
        );

        opponent.take_damage(100);
        assert_eq!(
            MatchOutcome::decide(&player, &opponent),
            MatchOutcome::PlayerWins
        );

        player.take_damage(100);
        assert_eq!(MatchOutcome::decide(&player, &opponent), MatchOutcome::Draw);
        assert!(MatchOutcome::Draw.is_terminal());
        assert!(!MatchOutcome::InProgress.is_terminal());
    }
}
