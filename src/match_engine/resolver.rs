//! Round resolution: turns the first trigger of a round into health damage.

use serde::{Deserialize, Serialize};

use crate::state::match_state::Question;

/// What closed the round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    /// The player picked an option.
    Player {
        /// Option text the player selected.
        selected: String,
    },
    /// The simulated opponent answered correctly.
    Opponent,
    /// The countdown reached zero.
    Timeout,
}

/// Classification of a resolved round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The player answered correctly and hit the opponent.
    PlayerCorrect,
    /// The player answered incorrectly; both sides take damage.
    PlayerWrong,
    /// The opponent answered correctly first and hit the player.
    OpponentCorrect,
    /// Nobody answered in time; both sides take damage.
    TimedOut,
}

/// Damage to apply to each combatant. Values are subtracted from health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HealthDelta {
    /// Damage dealt to the player.
    pub player: u8,
    /// Damage dealt to the opponent.
    pub opponent: u8,
}

/// Damage values and speed thresholds applied by the resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DamageTable {
    /// Remaining seconds at or above which a correct answer deals `fast_hit`.
    pub fast_threshold_secs: u32,
    /// Remaining seconds at or above which a correct answer deals `steady_hit`.
    pub steady_threshold_secs: u32,
    /// Damage of a fast correct answer.
    pub fast_hit: u8,
    /// Damage of a steady correct answer.
    pub steady_hit: u8,
    /// Damage of a slow correct answer.
    pub slow_hit: u8,
    /// Damage both sides take on a wrong answer (player side).
    pub wrong_answer_self: u8,
    /// Damage both sides take on a wrong answer (opponent side).
    pub wrong_answer_opponent: u8,
    /// Damage of an opponent's correct answer.
    pub opponent_hit: u8,
    /// Damage the player takes on timeout.
    pub timeout_player: u8,
    /// Damage the opponent takes on timeout.
    pub timeout_opponent: u8,
}

impl Default for DamageTable {
    fn default() -> Self {
        Self {
            fast_threshold_secs: 25,
            steady_threshold_secs: 15,
            fast_hit: 30,
            steady_hit: 20,
            slow_hit: 10,
            wrong_answer_self: 10,
            wrong_answer_opponent: 10,
            opponent_hit: 20,
            timeout_player: 10,
            timeout_opponent: 10,
        }
    }
}

impl DamageTable {
    fn correct_answer_hit(&self, time_remaining: u32) -> u8 {
        if time_remaining >= self.fast_threshold_secs {
            self.fast_hit
        } else if time_remaining >= self.steady_threshold_secs {
            self.steady_hit
        } else {
            self.slow_hit
        }
    }
}

/// One-shot latch closing a round.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionGuard {
    resolved: bool,
}

impl ResolutionGuard {
    /// Claim the round. Only the first caller gets `true`.
    pub fn try_claim(&mut self) -> bool {
        !std::mem::replace(&mut self.resolved, true)
    }

    /// Whether the round has been claimed.
    pub fn is_resolved(&self) -> bool {
        self.resolved
    }
}

/// Outcome of evaluating a trigger against a question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Trigger that closed the round.
    pub trigger: Trigger,
    /// Classification of the round.
    pub verdict: Verdict,
    /// Damage to apply.
    pub delta: HealthDelta,
    /// Correct option, revealed now that the round is over.
    pub correct_option: String,
    /// Option the player picked, if any.
    pub selected_option: Option<String>,
    /// Clock value at resolution time.
    pub time_remaining: u32,
    /// Optional explanation carried by the question.
    pub explanation: Option<String>,
}

/// Stateless evaluator for round triggers.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnswerResolver {
    table: DamageTable,
}

impl AnswerResolver {
    /// Build a resolver using the given damage table.
    pub fn new(table: DamageTable) -> Self {
        Self { table }
    }

    /// Evaluate `trigger`. The caller is responsible for claiming the round first.
    pub fn resolve(&self, trigger: Trigger, question: &Question, time_remaining: u32) -> Resolution {
        let table = &self.table;
        let (verdict, delta, selected_option) = match &trigger {
            Trigger::Player { selected } if question.is_correct(selected) => (
                Verdict::PlayerCorrect,
                HealthDelta {
                    player: 0,
                    opponent: table.correct_answer_hit(time_remaining),
                },
                Some(selected.clone()),
            ),
            Trigger::Player { selected } => (
                Verdict::PlayerWrong,
                HealthDelta {
                    player: table.wrong_answer_self,
                    opponent: table.wrong_answer_opponent,
                },
                Some(selected.clone()),
            ),
            Trigger::Opponent => (
                Verdict::OpponentCorrect,
                HealthDelta {
                    player: table.opponent_hit,
                    opponent: 0,
                },
                None,
            ),
            Trigger::Timeout => (
                Verdict::TimedOut,
                HealthDelta {
                    player: table.timeout_player,
                    opponent: table.timeout_opponent,
                },
                None,
            ),
        };

        Resolution {
            trigger,
            verdict,
            delta,
            correct_option: question.correct_option().to_string(),
            selected_option,
            time_remaining,
            explanation: question.explanation().map(str::to_string),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(selected: &str) -> Trigger {
        Trigger::Player {
            selected: selected.into(),
        }
    }

    #[test]
    fn correct_answer_damage_depends_on_speed() {
        let resolver = AnswerResolver::default();
        let question = Question::fallback();

        let cases = [(30, 30), (27, 30), (25, 30), (24, 20), (18, 20), (15, 20), (14, 10), (1, 10)];
        for (remaining, damage) in cases {
            let resolution = resolver.resolve(player("Paris"), &question, remaining);
            assert_eq!(resolution.verdict, Verdict::PlayerCorrect);
            assert_eq!(
                resolution.delta,
                HealthDelta {
                    player: 0,
                    opponent: damage
                },
                "at {remaining}s"
            );
        }
    }

    #[test]
    fn wrong_answer_hurts_both_sides() {
        let resolution =
            AnswerResolver::default().resolve(player("Berlin"), &Question::fallback(), 29);

        assert_eq!(resolution.verdict, Verdict::PlayerWrong);
        assert_eq!(
            resolution.delta,
            HealthDelta {
                player: 10,
                opponent: 10
            }
        );
        assert_eq!(resolution.selected_option.as_deref(), Some("Berlin"));
        assert_eq!(resolution.correct_option, "Paris");
    }

    #[test]
    fn opponent_and_timeout_triggers() {
        let resolver = AnswerResolver::default();
        let question = Question::fallback();

        let opponent = resolver.resolve(Trigger::Opponent, &question, 12);
        assert_eq!(opponent.verdict, Verdict::OpponentCorrect);
        assert_eq!(
            opponent.delta,
            HealthDelta {
                player: 20,
                opponent: 0
            }
        );

        let timeout = resolver.resolve(Trigger::Timeout, &question, 0);
        assert_eq!(timeout.verdict, Verdict::TimedOut);
        assert_eq!(
            timeout.delta,
            HealthDelta {
                player: 10,
                opponent: 10
            }
        );
        assert_eq!(timeout.selected_option, None);
    }

    #[test]
    fn guard_is_claimed_once() {
        let mut guard = ResolutionGuard::default();
        assert!(!guard.is_resolved());
        assert!(guard.try_claim());
        assert!(!guard.try_claim());
        assert!(guard.is_resolved());
    }
}
