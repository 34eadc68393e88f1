//! Per-match actor.
//!
//! Each match runs in its own task that owns the [`MatchSession`] and handles
//! one [`MatchCommand`] at a time. The countdown ticker, the opponent's
//! reaction timer, the question loader and the post-resolution pause are
//! spawned as [`TaskGuard`]s and feed commands back into the inbox, tagged with
//! the ticket of the round they were scheduled for. Leaving a phase drops the
//! guards, which aborts whatever is still pending; the ticket check in the
//! session discards anything that was already queued.

use std::{future::Future, ops::ControlFlow, sync::Arc, time::Duration};

use dashmap::DashMap;
use thiserror::Error;
use tokio::{
    sync::{broadcast, mpsc, oneshot, watch},
    time::{self, Instant},
};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    dto::{game::MatchSnapshot, sse::ServerEvent},
    match_engine::{
        TaskGuard,
        opponent::{OpponentModel, ReactionPlan},
        resolver::Resolution,
        session::{
            AdvanceOutcome, MatchRules, MatchSession, Rejection, RoundTicket, TickOutcome,
        },
    },
    services::{question_service::QuestionProvider, sse_events},
    state::{SseHub, match_state::Question},
};

const COMMAND_CAPACITY: usize = 32;
const EVENT_CAPACITY: usize = 64;
const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Running matches keyed by identifier.
pub type MatchRegistry = Arc<DashMap<Uuid, MatchHandle>>;

/// Reply to an answer submission.
pub type SubmitReply = Result<Resolution, Rejection>;

/// Wall-clock pacing of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchTiming {
    /// Pause between a resolution and the next question.
    pub resolution_pause: Duration,
    /// How long a finished match stays queryable.
    pub retention: Duration,
}

impl Default for MatchTiming {
    fn default() -> Self {
        Self {
            resolution_pause: Duration::from_millis(2_000),
            retention: Duration::from_secs(300),
        }
    }
}

/// Everything needed to start a match.
#[derive(Debug, Clone)]
pub struct MatchSetup {
    /// Match identifier, shared with the lobby that produced it.
    pub id: Uuid,
    /// Display name of the human player.
    pub player_name: String,
    /// Display name of the simulated opponent.
    pub opponent_name: String,
    /// Topic sent to the question generator for every round.
    pub topic: String,
    pub rules: MatchRules,
    /// Round and between-round delays.
    pub timing: MatchTiming,
}

/// The match actor has exited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("match {0} is no longer running")]
pub struct MatchGone(pub Uuid);

enum MatchCommand {
    SubmitAnswer {
        option: String,
        reply: oneshot::Sender<SubmitReply>,
    },
    QuestionReady {
        ticket: RoundTicket,
        question: Question,
    },
    Tick {
        ticket: RoundTicket,
    },
    OpponentReacted {
        ticket: RoundTicket,
    },
    Advance {
        ticket: RoundTicket,
    },
    Abandon {
        reply: oneshot::Sender<()>,
    },
    Expire,
}

/// Cloneable handle to a running match.
#[derive(Clone)]
pub struct MatchHandle {
    id: Uuid,
    commands: mpsc::Sender<MatchCommand>,
    snapshot: watch::Receiver<MatchSnapshot>,
    events: Arc<SseHub>,
}

impl MatchHandle {
    /// Match identifier.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Latest published state of the match.
    pub fn snapshot(&self) -> MatchSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Receiver notified on every state change.
    pub fn watch(&self) -> watch::Receiver<MatchSnapshot> {
        self.snapshot.clone()
    }

    /// Subscribe to the match event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.events.subscribe()
    }

    /// Submit the player's answer and wait for the verdict.
    pub async fn submit_answer(&self, option: String) -> Result<SubmitReply, MatchGone> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(MatchCommand::SubmitAnswer { option, reply })
            .await
            .map_err(|_| MatchGone(self.id))?;
        response.await.map_err(|_| MatchGone(self.id))
    }

    /// Stop the match and every pending round task.
    pub async fn abandon(&self) -> Result<(), MatchGone> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(MatchCommand::Abandon { reply })
            .await
            .map_err(|_| MatchGone(self.id))?;
        response.await.map_err(|_| MatchGone(self.id))
    }
}

/// Start a match actor and register its handle.
///
/// The actor deregisters itself when the match is abandoned or once the
/// retention period after game over has elapsed.
pub fn spawn_match(
    setup: MatchSetup,
    opponent: Box<dyn OpponentModel>,
    questions: Arc<QuestionProvider>,
    registry: MatchRegistry,
) -> MatchHandle {
    let session = MatchSession::start(
        setup.id,
        setup.player_name,
        setup.opponent_name,
        setup.topic,
        setup.rules,
    );

    let (commands_tx, commands_rx) = mpsc::channel(COMMAND_CAPACITY);
    let (snapshot_tx, snapshot_rx) = watch::channel(MatchSnapshot::from(&session));
    let events = Arc::new(SseHub::new(EVENT_CAPACITY));

    let handle = MatchHandle {
        id: setup.id,
        commands: commands_tx.clone(),
        snapshot: snapshot_rx,
        events: events.clone(),
    };
    registry.insert(setup.id, handle.clone());

    let driver = MatchDriver {
        session,
        opponent,
        questions,
        commands: commands_tx.downgrade(),
        snapshot: snapshot_tx,
        events,
        timing: setup.timing,
        tasks: Vec::new(),
        registry,
    };
    tokio::spawn(driver.run(commands_rx));

    handle
}

struct MatchDriver {
    session: MatchSession,
    opponent: Box<dyn OpponentModel>,
    questions: Arc<QuestionProvider>,
    commands: mpsc::WeakSender<MatchCommand>,
    snapshot: watch::Sender<MatchSnapshot>,
    events: Arc<SseHub>,
    timing: MatchTiming,
    tasks: Vec<TaskGuard>,
    registry: MatchRegistry,
}

impl MatchDriver {
    async fn run(mut self, mut inbox: mpsc::Receiver<MatchCommand>) {
        self.load_question();

        while let Some(command) = inbox.recv().await {
            if self.handle(command).is_break() {
                break;
            }
        }

        self.tasks.clear();
        self.registry.remove(&self.session.id());
        info!(match_id = %self.session.id(), "match driver stopped");
    }

    fn handle(&mut self, command: MatchCommand) -> ControlFlow<()> {
        match command {
            MatchCommand::QuestionReady { ticket, question } => {
                let plan = self.opponent.draw();
                match self.session.begin_round(ticket, question, plan) {
                    Ok(()) => self.on_round_started(ticket, plan),
                    Err(rejection) => self.ignore("question_ready", &rejection),
                }
            }
            MatchCommand::Tick { ticket } => match self.session.tick(ticket) {
                Ok(TickOutcome::Counting(_)) => {
                    self.publish();
                    sse_events::broadcast_tick(&self.events, &self.session);
                }
                Ok(TickOutcome::TimedOut(resolution)) => self.on_resolved(&resolution),
                Ok(TickOutcome::Stopped) => {}
                Err(rejection) => self.ignore("tick", &rejection),
            },
            MatchCommand::OpponentReacted { ticket } => {
                match self.session.on_opponent_reaction(ticket) {
                    Ok(resolution) => self.on_resolved(&resolution),
                    Err(rejection) => self.ignore("opponent_reaction", &rejection),
                }
            }
            MatchCommand::SubmitAnswer { option, reply } => {
                let result = self.session.submit_answer(&option);
                match &result {
                    Ok(resolution) => self.on_resolved(resolution),
                    Err(rejection) => self.ignore("submit_answer", rejection),
                }
                let _ = reply.send(result);
            }
            MatchCommand::Advance { ticket } => match self.session.advance(ticket) {
                Ok(AdvanceOutcome::NextRound(_)) => {
                    self.publish();
                    sse_events::broadcast_phase_changed(&self.events, &self.session);
                    self.load_question();
                }
                Ok(AdvanceOutcome::Finished(_)) => {}
                Err(rejection) => self.ignore("advance", &rejection),
            },
            MatchCommand::Abandon { reply } => {
                self.tasks.clear();
                info!(match_id = %self.session.id(), "match abandoned");
                sse_events::broadcast_match_abandoned(&self.events, &self.session);
                let _ = reply.send(());
                return ControlFlow::Break(());
            }
            MatchCommand::Expire => {
                debug!(match_id = %self.session.id(), "retention elapsed");
                return ControlFlow::Break(());
            }
        }

        ControlFlow::Continue(())
    }

    fn on_round_started(&mut self, ticket: RoundTicket, plan: ReactionPlan) {
        self.tasks.clear();
        self.publish();
        sse_events::broadcast_phase_changed(&self.events, &self.session);
        sse_events::broadcast_question(&self.events, &self.session);

        self.schedule(move |commands| run_ticker(commands, ticket));

        if plan.correct {
            let delay = plan.delay();
            self.schedule(move |commands| async move {
                time::sleep(delay).await;
                let _ = commands
                    .send(MatchCommand::OpponentReacted { ticket })
                    .await;
            });
        } else {
            debug!(
                match_id = %self.session.id(),
                question_index = ticket.question_index(),
                "opponent will miss this round"
            );
        }
    }

    fn on_resolved(&mut self, resolution: &Resolution) {
        self.tasks.clear();
        self.publish();
        sse_events::broadcast_phase_changed(&self.events, &self.session);
        sse_events::broadcast_round_resolved(&self.events, &self.session, resolution);

        if self.session.outcome().is_terminal() {
            sse_events::broadcast_game_over(&self.events, &self.session);
            let retention = self.timing.retention;
            self.schedule(move |commands| async move {
                time::sleep(retention).await;
                let _ = commands.send(MatchCommand::Expire).await;
            });
        } else {
            let ticket = self.session.ticket();
            let pause = self.timing.resolution_pause;
            self.schedule(move |commands| async move {
                time::sleep(pause).await;
                let _ = commands.send(MatchCommand::Advance { ticket }).await;
            });
        }
    }

    fn load_question(&mut self) {
        self.tasks.clear();
        let ticket = self.session.ticket();
        let topic = self.session.topic().to_string();
        let questions = self.questions.clone();

        self.schedule(move |commands| async move {
            let question = questions.next_question(&topic).await;
            let _ = commands
                .send(MatchCommand::QuestionReady { ticket, question })
                .await;
        });
    }

    fn schedule<F, Fut>(&mut self, task: F)
    where
        F: FnOnce(mpsc::Sender<MatchCommand>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        match self.commands.upgrade() {
            Some(commands) => self.tasks.push(TaskGuard::spawn(task(commands))),
            None => debug!(match_id = %self.session.id(), "match inbox closed; task not scheduled"),
        }
    }

    fn publish(&self) {
        self.snapshot
            .send_replace(MatchSnapshot::from(&self.session));
    }

    fn ignore(&self, command: &'static str, rejection: &Rejection) {
        debug!(
            match_id = %self.session.id(),
            command,
            reason = %rejection,
            "ignoring trigger"
        );
    }
}

async fn run_ticker(commands: mpsc::Sender<MatchCommand>, ticket: RoundTicket) {
    let mut interval = time::interval_at(Instant::now() + TICK_PERIOD, TICK_PERIOD);
    loop {
        interval.tick().await;
        if commands.send(MatchCommand::Tick { ticket }).await.is_err() {
            break;
        }
    }
}
