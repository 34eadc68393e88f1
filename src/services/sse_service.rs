use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::{
    broadcast::{self, error::RecvError},
    mpsc,
};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dto::sse::{Handshake, ServerEvent},
    error::ServiceError,
    match_engine::driver::MatchHandle,
    services::match_service,
    state::SharedState,
};

const EVENT_HANDSHAKE: &str = "handshake";
const EVENT_SNAPSHOT: &str = "snapshot";

/// Identifies the target SSE stream for connection bookkeeping.
#[derive(Clone, Copy, Debug)]
pub enum StreamKind {
    Public,
    Match(Uuid),
}

/// Subscribe to the shared public SSE stream.
pub fn subscribe_public(state: &SharedState) -> (broadcast::Receiver<ServerEvent>, Vec<ServerEvent>) {
    let receiver = state.public_sse().subscribe();
    let greeting = handshake("public", "public stream connected", state.is_degraded());
    (receiver, greeting.into_iter().collect())
}

/// Subscribe to the events of one match, starting with its current snapshot.
pub fn subscribe_match(
    state: &SharedState,
    match_id: Uuid,
) -> Result<(broadcast::Receiver<ServerEvent>, Vec<ServerEvent>), ServiceError> {
    let handle: MatchHandle = match_service::find_match(state, match_id)?;
    // Subscribe before reading the snapshot so no change falls between the two.
    let receiver = handle.subscribe();

    let mut greeting: Vec<ServerEvent> =
        handshake("match", "match stream connected", state.is_degraded())
            .into_iter()
            .collect();
    match ServerEvent::json(Some(EVENT_SNAPSHOT.to_string()), &handle.snapshot()) {
        Ok(event) => greeting.push(event),
        Err(err) => warn!(match_id = %match_id, error = %err, "failed to serialize match snapshot"),
    }

    Ok((receiver, greeting))
}

fn handshake(stream: &str, message: &str, degraded: bool) -> Option<ServerEvent> {
    let payload = Handshake {
        stream: stream.to_string(),
        message: message.to_string(),
        degraded,
    };
    match ServerEvent::json(Some(EVENT_HANDSHAKE.to_string()), &payload) {
        Ok(event) => Some(event),
        Err(err) => {
            warn!(stream, error = %err, "failed to serialize SSE handshake");
            None
        }
    }
}

fn to_event(payload: ServerEvent) -> Event {
    let mut event = Event::default().data(payload.data);
    if let Some(name) = payload.event {
        event = event.event(name);
    }
    event
}

/// Convert a broadcast receiver into an SSE response, forwarding events and
/// cleaning up once the client disconnects. `greeting` is sent first.
pub fn to_sse_stream(
    mut receiver: broadcast::Receiver<ServerEvent>,
    greeting: Vec<ServerEvent>,
    kind: StreamKind,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    tokio::spawn(async move {
        for payload in greeting {
            if tx.send(Ok(to_event(payload))).await.is_err() {
                return;
            }
        }

        loop {
            tokio::select! {
                _ = tx.closed() => break,
                recv_result = receiver.recv() => {
                    match recv_result {
                        Ok(payload) => {
                            if tx.send(Ok(to_event(payload))).await.is_err() {
                                break;
                            }
                        }
                        // match actor gone
                        Err(RecvError::Closed) => break,
                        Err(RecvError::Lagged(_)) => continue,
                    }
                }
            }
        }

        match kind {
            StreamKind::Public => info!("public SSE stream disconnected"),
            StreamKind::Match(match_id) => info!(match_id = %match_id, "match SSE stream disconnected"),
        }
    });

    // response stream reads from mpsc; when client disconnects axum drops this stream
    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::AppConfig, services::question_service::QuestionProvider, state::AppState};

    #[test]
    fn public_greeting_reports_degraded_mode() {
        let state = AppState::new(AppConfig::default(), QuestionProvider::offline());
        let (_receiver, greeting) = subscribe_public(&state);

        assert_eq!(greeting.len(), 1);
        assert_eq!(greeting[0].event.as_deref(), Some("handshake"));
        assert!(greeting[0].data.contains(r#""degraded":true"#));
    }

    #[test]
    fn unknown_match_cannot_be_streamed() {
        let state = AppState::new(AppConfig::default(), QuestionProvider::offline());
        assert!(matches!(
            subscribe_match(&state, Uuid::new_v4()),
            Err(ServiceError::NotFound(_))
        ));
    }
}
