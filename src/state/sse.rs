use tokio::sync::broadcast;

use crate::dto::sse::ServerEvent;

/// Simple broadcast hub wrapper used by the SSE services.
///
/// The application owns one public hub; every running match owns its own.
pub struct SseHub {
    sender: broadcast::Sender<ServerEvent>,
}

impl SseHub {
    /// Construct a new hub backed by a Tokio broadcast channel with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Register a new subscriber that will receive subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.sender.subscribe()
    }

    /// Send an event to all current subscribers, ignoring delivery errors.
    pub fn broadcast(&self, event: ServerEvent) {
        let _ = self.sender.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_events_sent_after_subscribing() {
        let hub = SseHub::new(4);
        hub.broadcast(ServerEvent::new(Some("early".into()), "{}".into()));

        let mut receiver = hub.subscribe();
        hub.broadcast(ServerEvent::new(Some("tick".into()), "{\"time_remaining\":29}".into()));

        let event = receiver.recv().await.unwrap();
        assert_eq!(event.event.as_deref(), Some("tick"));
        assert!(receiver.try_recv().is_err());
    }
}
