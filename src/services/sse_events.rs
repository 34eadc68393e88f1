use serde::Serialize;
use tracing::warn;

use crate::{
    dto::{
        common::{QuestionView, ResolutionView},
        sse::{
            GameOverEvent, MatchAbandonedEvent, PhaseChangedEvent, QuestionEvent,
            RoundResolvedEvent, ServerEvent, SystemStatus, TickEvent,
        },
    },
    match_engine::{resolver::Resolution, session::MatchSession},
    state::SseHub,
};

const EVENT_PHASE_CHANGED: &str = "phase_changed";
const EVENT_QUESTION: &str = "question";
const EVENT_TICK: &str = "tick";
const EVENT_ROUND_RESOLVED: &str = "round_resolved";
const EVENT_GAME_OVER: &str = "game_over";
const EVENT_MATCH_ABANDONED: &str = "match_abandoned";
const EVENT_SYSTEM_STATUS: &str = "system_status";

/// Broadcast the current phase of a match.
pub fn broadcast_phase_changed(hub: &SseHub, session: &MatchSession) {
    let payload = PhaseChangedEvent {
        match_id: session.id(),
        phase: session.phase().into(),
        question_index: session.round().question_index(),
        version: session.version(),
    };
    send_event(hub, EVENT_PHASE_CHANGED, &payload);
}

/// Broadcast the question that just went on screen. The correct option stays hidden.
pub fn broadcast_question(hub: &SseHub, session: &MatchSession) {
    let round = session.round();
    let Some(question) = round.question() else {
        return;
    };

    let payload = QuestionEvent {
        match_id: session.id(),
        question_index: round.question_index(),
        question: QuestionView::from(question),
        time_remaining: round.time_remaining(),
    };
    send_event(hub, EVENT_QUESTION, &payload);
}

/// Broadcast the countdown value.
pub fn broadcast_tick(hub: &SseHub, session: &MatchSession) {
    let round = session.round();
    let payload = TickEvent {
        match_id: session.id(),
        question_index: round.question_index(),
        time_remaining: round.time_remaining(),
    };
    send_event(hub, EVENT_TICK, &payload);
}

/// Broadcast how a round was resolved along with the updated health bars.
pub fn broadcast_round_resolved(hub: &SseHub, session: &MatchSession, resolution: &Resolution) {
    let payload = RoundResolvedEvent {
        match_id: session.id(),
        question_index: session.round().question_index(),
        resolution: ResolutionView::from(resolution),
        player: session.player().into(),
        opponent: session.opponent().into(),
    };
    send_event(hub, EVENT_ROUND_RESOLVED, &payload);
}

/// Broadcast the final outcome of a match.
pub fn broadcast_game_over(hub: &SseHub, session: &MatchSession) {
    let payload = GameOverEvent {
        match_id: session.id(),
        outcome: session.outcome().into(),
        player: session.player().into(),
        opponent: session.opponent().into(),
        questions_played: session.round().question_index(),
    };
    send_event(hub, EVENT_GAME_OVER, &payload);
}

/// Broadcast that the player left the match.
pub fn broadcast_match_abandoned(hub: &SseHub, session: &MatchSession) {
    let payload = MatchAbandonedEvent {
        match_id: session.id(),
    };
    send_event(hub, EVENT_MATCH_ABANDONED, &payload);
}

/// Broadcast the degraded flag on the public stream.
pub fn broadcast_system_status(hub: &SseHub, degraded: bool) {
    send_event(hub, EVENT_SYSTEM_STATUS, &SystemStatus { degraded });
}

fn send_event(hub: &SseHub, event: &str, payload: &impl Serialize) {
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(event) => hub.broadcast(event),
        Err(err) => warn!(event, error = %err, "failed to serialize SSE payload"),
    }
}
