use thiserror::Error;

/// High-level phases a match can be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPhase {
    /// The next question is being fetched and normalized.
    Loading,
    /// The countdown is running and the round awaits a trigger.
    Active,
    /// A trigger resolved the round; the result is on display before advancing.
    Resolved,
    /// A combatant reached zero health. Terminal.
    GameOver,
}

/// Events that can be applied to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchEvent {
    /// A canonical question is available; the round starts.
    QuestionReady,
    /// A trigger resolved the round and both combatants are still standing.
    RoundResolved,
    /// A trigger resolved the round and a combatant reached zero health.
    MatchDecided,
    /// The post-resolution pause elapsed; load the next question.
    Advance,
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The phase the state machine was in when the invalid event was received.
    pub from: MatchPhase,
    /// The event that cannot be applied from this phase.
    pub event: MatchEvent,
}

/// Snapshot of the current state machine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    /// Current phase of the state machine.
    pub phase: MatchPhase,
    /// Version number of the state machine (increments on each transition).
    pub version: usize,
}

/// State machine sequencing the rounds of one match.
#[derive(Debug, Clone)]
pub struct MatchStateMachine {
    phase: MatchPhase,
    version: usize,
}

impl Default for MatchStateMachine {
    fn default() -> Self {
        Self {
            phase: MatchPhase::Loading,
            version: 0,
        }
    }
}

impl MatchStateMachine {
    /// Create a new state machine waiting for its first question.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inspect the current phase.
    pub fn phase(&self) -> MatchPhase {
        self.phase
    }

    /// Create a snapshot of the current state machine state.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            phase: self.phase,
            version: self.version,
        }
    }

    /// Apply an event, moving to the next phase when the transition is valid.
    pub fn apply(&mut self, event: MatchEvent) -> Result<MatchPhase, InvalidTransition> {
        let next = self.compute_transition(event)?;
        self.phase = next;
        self.version += 1;
        Ok(next)
    }

    fn compute_transition(&self, event: MatchEvent) -> Result<MatchPhase, InvalidTransition> {
        let next = match (self.phase, event) {
            (MatchPhase::Loading, MatchEvent::QuestionReady) => MatchPhase::Active,
            (MatchPhase::Active, MatchEvent::RoundResolved) => MatchPhase::Resolved,
            (MatchPhase::Active, MatchEvent::MatchDecided) => MatchPhase::GameOver,
            (MatchPhase::Resolved, MatchEvent::Advance) => MatchPhase::Loading,
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(sm: &mut MatchStateMachine, event: MatchEvent) -> MatchPhase {
        sm.apply(event).unwrap()
    }

    #[test]
    fn initial_state_is_loading() {
        let sm = MatchStateMachine::new();
        assert_eq!(sm.phase(), MatchPhase::Loading);
        assert_eq!(sm.snapshot().version, 0);
    }

    #[test]
    fn rounds_cycle_until_the_match_is_decided() {
        let mut sm = MatchStateMachine::new();

        assert_eq!(apply(&mut sm, MatchEvent::QuestionReady), MatchPhase::Active);
        assert_eq!(apply(&mut sm, MatchEvent::RoundResolved), MatchPhase::Resolved);
        assert_eq!(apply(&mut sm, MatchEvent::Advance), MatchPhase::Loading);
        assert_eq!(apply(&mut sm, MatchEvent::QuestionReady), MatchPhase::Active);
        assert_eq!(apply(&mut sm, MatchEvent::MatchDecided), MatchPhase::GameOver);
        assert_eq!(sm.snapshot().version, 5);
    }

    #[test]
    fn game_over_is_terminal() {
        let mut sm = MatchStateMachine::new();
        apply(&mut sm, MatchEvent::QuestionReady);
        apply(&mut sm, MatchEvent::MatchDecided);

        for event in [
            MatchEvent::QuestionReady,
            MatchEvent::RoundResolved,
            MatchEvent::MatchDecided,
            MatchEvent::Advance,
        ] {
            let err = sm.apply(event).unwrap_err();
            assert_eq!(err.from, MatchPhase::GameOver);
            assert_eq!(err.event, event);
        }
        assert_eq!(sm.phase(), MatchPhase::GameOver);
    }

    #[test]
    fn invalid_transition_leaves_state_untouched() {
        let mut sm = MatchStateMachine::new();
        let err = sm.apply(MatchEvent::RoundResolved).unwrap_err();
        assert_eq!(
            err,
            InvalidTransition {
                from: MatchPhase::Loading,
                event: MatchEvent::RoundResolved,
            }
        );
        assert_eq!(sm.snapshot().version, 0);
    }
}
