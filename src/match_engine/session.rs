//! The match session controller.
//!
//! [`MatchSession`] owns every piece of mutable match state. It is a plain,
//! synchronous value: the driver serializes access to it from a single task,
//! and the tests call it directly with explicit round tickets.
//!
//! Every trigger goes through `settle`, which checks that the round is open,
//! claims the round's [`ResolutionGuard`] and only then mutates health. A
//! trigger arriving after the claim, or carrying the ticket of an older round,
//! is rejected without side effects.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    match_engine::{
        countdown::{Countdown, CountdownTick},
        opponent::ReactionPlan,
        resolver::{AnswerResolver, DamageTable, ResolutionGuard, Resolution, Trigger},
    },
    state::{
        match_state::{Combatant, MatchOutcome, Question, Side},
        state_machine::{InvalidTransition, MatchEvent, MatchPhase, MatchStateMachine},
    },
};

/// Per-match tunables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchRules {
    /// Countdown budget of each question, in seconds.
    pub round_duration_secs: u32,
    /// Damage applied by the resolver.
    pub damage: DamageTable,
}

impl Default for MatchRules {
    fn default() -> Self {
        Self {
            round_duration_secs: 30,
            damage: DamageTable::default(),
        }
    }
}

/// Identifies one round. Deferred work carries the ticket of the round it was
/// scheduled for and is dropped when the session has moved on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RoundTicket(u32);

impl RoundTicket {
    /// Question index this ticket belongs to.
    pub fn question_index(self) -> u32 {
        self.0
    }
}

/// Why an operation was refused. Refusals never change the session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    /// The match ended; nothing else can happen.
    #[error("the match is over")]
    MatchOver,
    /// Answers are only accepted while a question is on screen.
    #[error("answers are not accepted while the match is {phase:?}")]
    NotAcceptingAnswers {
        /// Phase at the time of the submission.
        phase: MatchPhase,
    },
    /// Another trigger already resolved the round.
    #[error("the round is already resolved")]
    AlreadyResolved,
    /// The submitted option is not one of the question's options.
    #[error("`{0}` is not one of the offered options")]
    UnknownOption(String),
    /// Deferred work for a round that is no longer current.
    #[error("stale round ticket {stale} (current round is {current})")]
    StaleRound {
        /// Question index carried by the ticket.
        stale: u32,
        /// Current question index.
        current: u32,
    },
    /// The operation does not apply to the current phase.
    #[error(transparent)]
    InvalidPhase(#[from] InvalidTransition),
}

/// Result of feeding a tick to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// The clock moved; seconds remaining.
    Counting(u32),
    /// The clock hit zero and the timeout resolved the round.
    TimedOut(Resolution),
    /// The clock is stopped; nothing happened.
    Stopped,
}

/// Result of advancing after the resolution pause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceOutcome {
    /// A new round is loading.
    NextRound(RoundTicket),
    /// The match is over; no further round starts.
    Finished(MatchOutcome),
}

/// State of the current question. Reset on every advance.
#[derive(Debug, Clone)]
pub struct RoundState {
    question_index: u32,
    question: Option<Question>,
    countdown: Countdown,
    guard: ResolutionGuard,
    selected_option: Option<String>,
    opponent_plan: Option<ReactionPlan>,
    resolution: Option<Resolution>,
}

impl RoundState {
    fn new(question_index: u32, budget: u32) -> Self {
        Self {
            question_index,
            question: None,
            countdown: Countdown::new(budget),
            guard: ResolutionGuard::default(),
            selected_option: None,
            opponent_plan: None,
            resolution: None,
        }
    }

    /// One-based index of the question.
    pub fn question_index(&self) -> u32 {
        self.question_index
    }

    /// Question on screen, once loaded.
    pub fn question(&self) -> Option<&Question> {
        self.question.as_ref()
    }

    /// Seconds left on the clock.
    pub fn time_remaining(&self) -> u32 {
        self.countdown.remaining()
    }

    /// Whether a trigger has closed the round.
    pub fn is_resolved(&self) -> bool {
        self.guard.is_resolved()
    }

    /// Option the player picked, if any.
    pub fn selected_option(&self) -> Option<&str> {
        self.selected_option.as_deref()
    }

    /// Opponent decision drawn for this round.
    pub fn opponent_plan(&self) -> Option<ReactionPlan> {
        self.opponent_plan
    }

    /// How the round was resolved.
    pub fn resolution(&self) -> Option<&Resolution> {
        self.resolution.as_ref()
    }
}

/// One battle between the player and the simulated opponent.
#[derive(Debug, Clone)]
pub struct MatchSession {
    id: Uuid,
    topic: String,
    player: Combatant,
    opponent: Combatant,
    machine: MatchStateMachine,
    round: RoundState,
    outcome: MatchOutcome,
    resolver: AnswerResolver,
    rules: MatchRules,
}

impl MatchSession {
    /// Start a match: both combatants at full health, waiting for question 1.
    pub fn start(
        id: Uuid,
        player_name: impl Into<String>,
        opponent_name: impl Into<String>,
        topic: impl Into<String>,
        rules: MatchRules,
    ) -> Self {
        let session = Self {
            id,
            topic: topic.into(),
            player: Combatant::new(player_name, Side::Player),
            opponent: Combatant::new(opponent_name, Side::Opponent),
            machine: MatchStateMachine::new(),
            round: RoundState::new(1, rules.round_duration_secs),
            outcome: MatchOutcome::InProgress,
            resolver: AnswerResolver::new(rules.damage),
            rules,
        };
        info!(
            match_id = %session.id,
            player = %session.player.name,
            opponent = %session.opponent.name,
            topic = %session.topic,
            "match started"
        );
        session
    }

    /// Match identifier.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Topic questions are generated for.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// The human player.
    pub fn player(&self) -> &Combatant {
        &self.player
    }

    /// The simulated opponent.
    pub fn opponent(&self) -> &Combatant {
        &self.opponent
    }

    /// Current phase.
    pub fn phase(&self) -> MatchPhase {
        self.machine.phase()
    }

    /// Number of phase transitions so far.
    pub fn version(&self) -> usize {
        self.machine.snapshot().version
    }

    /// Current outcome.
    pub fn outcome(&self) -> MatchOutcome {
        self.outcome
    }

    /// Current round.
    pub fn round(&self) -> &RoundState {
        &self.round
    }

    /// Rules the match runs with.
    pub fn rules(&self) -> &MatchRules {
        &self.rules
    }

    /// Ticket of the current round.
    pub fn ticket(&self) -> RoundTicket {
        RoundTicket(self.round.question_index)
    }

    /// Put the loaded question on screen and start the round.
    pub fn begin_round(
        &mut self,
        ticket: RoundTicket,
        question: Question,
        plan: ReactionPlan,
    ) -> Result<(), Rejection> {
        self.check_ticket(ticket)?;
        self.machine.apply(MatchEvent::QuestionReady)?;

        self.round.question = Some(question);
        self.round.opponent_plan = Some(plan);
        debug!(
            match_id = %self.id,
            question_index = self.round.question_index,
            opponent_delay_secs = plan.delay_secs,
            opponent_correct = plan.correct,
            "round started"
        );
        Ok(())
    }

    /// Player picks `option`.
    pub fn submit_answer(&mut self, option: &str) -> Result<Resolution, Rejection> {
        self.ensure_open()?;

        let selected = option.trim();
        let offered = self
            .round
            .question
            .as_ref()
            .is_some_and(|question| question.has_option(selected));
        if !offered {
            return Err(Rejection::UnknownOption(selected.to_string()));
        }

        self.round.selected_option = Some(selected.to_string());
        self.settle(Trigger::Player {
            selected: selected.to_string(),
        })
    }

    /// Feed one second to the countdown of the round identified by `ticket`.
    pub fn tick(&mut self, ticket: RoundTicket) -> Result<TickOutcome, Rejection> {
        self.check_ticket(ticket)?;
        self.ensure_open()?;

        match self.round.countdown.tick() {
            CountdownTick::Running(remaining) => Ok(TickOutcome::Counting(remaining)),
            CountdownTick::Expired => self.on_timeout(ticket).map(TickOutcome::TimedOut),
            CountdownTick::Idle => Ok(TickOutcome::Stopped),
        }
    }

    /// The opponent's reaction delay elapsed.
    ///
    /// Only correct reactions are routed here; an incorrect opponent does
    /// nothing for the rest of the round.
    pub fn on_opponent_reaction(&mut self, ticket: RoundTicket) -> Result<Resolution, Rejection> {
        self.check_ticket(ticket)?;
        self.settle(Trigger::Opponent)
    }

    /// The countdown reached zero.
    pub fn on_timeout(&mut self, ticket: RoundTicket) -> Result<Resolution, Rejection> {
        self.check_ticket(ticket)?;
        self.settle(Trigger::Timeout)
    }

    /// Leave the resolved round behind after the display pause.
    pub fn advance(&mut self, ticket: RoundTicket) -> Result<AdvanceOutcome, Rejection> {
        if self.outcome.is_terminal() {
            return Ok(AdvanceOutcome::Finished(self.outcome));
        }
        self.check_ticket(ticket)?;
        self.machine.apply(MatchEvent::Advance)?;

        self.round = RoundState::new(
            self.round.question_index + 1,
            self.rules.round_duration_secs,
        );
        Ok(AdvanceOutcome::NextRound(self.ticket()))
    }

    fn check_ticket(&self, ticket: RoundTicket) -> Result<(), Rejection> {
        if self.outcome.is_terminal() {
            return Err(Rejection::MatchOver);
        }
        if ticket.0 != self.round.question_index {
            return Err(Rejection::StaleRound {
                stale: ticket.0,
                current: self.round.question_index,
            });
        }
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), Rejection> {
        match self.machine.phase() {
            MatchPhase::Active if !self.round.guard.is_resolved() => Ok(()),
            MatchPhase::Active | MatchPhase::Resolved => Err(Rejection::AlreadyResolved),
            MatchPhase::GameOver => Err(Rejection::MatchOver),
            phase => Err(Rejection::NotAcceptingAnswers { phase }),
        }
    }

    fn settle(&mut self, trigger: Trigger) -> Result<Resolution, Rejection> {
        self.ensure_open()?;
        let Some(question) = self.round.question.as_ref() else {
            return Err(Rejection::NotAcceptingAnswers {
                phase: self.machine.phase(),
            });
        };
        if !self.round.guard.try_claim() {
            return Err(Rejection::AlreadyResolved);
        }

        self.round.countdown.cancel();
        let resolution = self
            .resolver
            .resolve(trigger, question, self.round.countdown.remaining());

        self.player.take_damage(resolution.delta.player);
        self.opponent.take_damage(resolution.delta.opponent);
        self.outcome = MatchOutcome::decide(&self.player, &self.opponent);

        let event = if self.outcome.is_terminal() {
            MatchEvent::MatchDecided
        } else {
            MatchEvent::RoundResolved
        };
        self.machine.apply(event)?;
        self.round.resolution = Some(resolution.clone());

        info!(
            match_id = %self.id,
            question_index = self.round.question_index,
            verdict = ?resolution.verdict,
            player_health = self.player.health(),
            opponent_health = self.opponent.health(),
            "round resolved"
        );
        if self.outcome.is_terminal() {
            info!(match_id = %self.id, outcome = ?self.outcome, "match over");
        }

        Ok(resolution)
    }
}
