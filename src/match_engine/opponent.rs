//! Simulated opponent: how long it takes to answer and whether it is right.

use std::time::Duration;

use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};

/// Decision drawn for the opponent at the start of a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReactionPlan {
    /// Seconds after round start at which the opponent acts.
    pub delay_secs: u32,
    /// Whether the opponent answers correctly.
    pub correct: bool,
}

impl ReactionPlan {
    /// Delay as a [`Duration`].
    pub fn delay(&self) -> Duration {
        Duration::from_secs(u64::from(self.delay_secs))
    }
}

/// Source of opponent decisions, one per round.
pub trait OpponentModel: Send {
    /// Draw the plan for the next round.
    fn draw(&mut self) -> ReactionPlan;
}

/// Tunables of the random opponent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpponentProfile {
    /// Shortest reaction delay in seconds.
    pub min_delay_secs: u32,
    /// Longest reaction delay in seconds (inclusive).
    pub max_delay_secs: u32,
    /// Probability of answering correctly.
    pub accuracy: f64,
}

impl Default for OpponentProfile {
    fn default() -> Self {
        Self {
            min_delay_secs: 1,
            max_delay_secs: 30,
            accuracy: 0.6,
        }
    }
}

impl OpponentProfile {
    /// Return a profile with an ordered, non-empty delay range and a probability in `[0, 1]`.
    pub fn sanitized(self) -> Self {
        let min = self.min_delay_secs.max(1);
        let max = self.max_delay_secs.max(min);
        let accuracy = if self.accuracy.is_nan() {
            Self::default().accuracy
        } else {
            self.accuracy.clamp(0.0, 1.0)
        };

        Self {
            min_delay_secs: min,
            max_delay_secs: max,
            accuracy,
        }
    }
}

/// Opponent drawing uniform delays and Bernoulli correctness.
#[derive(Debug)]
pub struct RandomOpponent {
    profile: OpponentProfile,
    rng: StdRng,
}

impl RandomOpponent {
    /// Create an opponent seeded from the operating system.
    pub fn new(profile: OpponentProfile) -> Self {
        Self {
            profile: profile.sanitized(),
            rng: StdRng::from_os_rng(),
        }
    }

    /// Create a reproducible opponent.
    pub fn seeded(profile: OpponentProfile, seed: u64) -> Self {
        Self {
            profile: profile.sanitized(),
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl OpponentModel for RandomOpponent {
    fn draw(&mut self) -> ReactionPlan {
        let OpponentProfile {
            min_delay_secs,
            max_delay_secs,
            accuracy,
        } = self.profile;

        ReactionPlan {
            delay_secs: self.rng.random_range(min_delay_secs..=max_delay_secs),
            correct: self.rng.random_bool(accuracy),
        }
    }
}

/// Opponent replaying a fixed list of plans, then missing forever.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct ScriptedOpponent {
    plans: std::collections::VecDeque<ReactionPlan>,
}

#[cfg(test)]
impl ScriptedOpponent {
    /// Replay `plans` in order.
    pub fn new(plans: impl IntoIterator<Item = ReactionPlan>) -> Self {
        Self {
            plans: plans.into_iter().collect(),
        }
    }
}

#[cfg(test)]
impl OpponentModel for ScriptedOpponent {
    fn draw(&mut self) -> ReactionPlan {
        self.plans.pop_front().unwrap_or(ReactionPlan {
            delay_secs: 30,
            correct: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draws_stay_within_profile_bounds() {
        let mut opponent = RandomOpponent::seeded(OpponentProfile::default(), 7);
        for _ in 0..1_000 {
            let plan = opponent.draw();
            assert!((1..=30).contains(&plan.delay_secs));
        }
    }

    #[test]
    fn accuracy_is_roughly_respected() {
        let mut opponent = RandomOpponent::seeded(OpponentProfile::default(), 42);
        let correct = (0..10_000).filter(|_| opponent.draw().correct).count();
        assert!((5_500..6_500).contains(&correct), "got {correct}");
    }

    #[test]
    fn seeded_opponents_are_reproducible() {
        let mut first = RandomOpponent::seeded(OpponentProfile::default(), 3);
        let mut second = RandomOpponent::seeded(OpponentProfile::default(), 3);
        for _ in 0..50 {
            assert_eq!(first.draw(), second.draw());
        }
    }

    #[test]
    fn sanitize_repairs_inverted_ranges_and_probabilities() {
        let profile = OpponentProfile {
            min_delay_secs: 0,
            max_delay_secs: 0,
            accuracy: 4.0,
        }
        .sanitized();
        assert_eq!(profile.min_delay_secs, 1);
        assert_eq!(profile.max_delay_secs, 1);
        assert_eq!(profile.accuracy, 1.0);

        let mut opponent = RandomOpponent::seeded(profile, 1);
        assert_eq!(
            opponent.draw(),
            ReactionPlan {
                delay_secs: 1,
                correct: true
            }
        );
    }

    #[test]
    fn scripted_opponent_misses_once_exhausted() {
        let plan = ReactionPlan {
            delay_secs: 4,
            correct: true,
        };
        let mut opponent = ScriptedOpponent::new([plan]);
        assert_eq!(opponent.draw(), plan);
        assert!(!opponent.draw().correct);
    }
}
