//! Transport Contract
//!
//! What the session controller needs from a message channel: create or join
//! a session, fire-and-forget game events, and a subscription that yields
//! numbered inbound events. Delivery is exactly-once but may be out of order.

use std::future::Future;

use tokio::sync::mpsc;

use crate::game::snake::PlayerId;
use crate::network::protocol::{GamePayload, JoinMetadata, TransportEvent};

/// Identity handed out when hosting or joining.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    /// Shareable session id
    pub session_id: String,
    /// This participant's id within the session
    pub client_id: PlayerId,
}

/// Transport errors.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Channel could not be established or broke.
    #[error("Connection error: {0}")]
    Connection(String),

    /// No session with that id.
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Operation needs an active session.
    #[error("Not connected to a session")]
    NotConnected,

    /// The inbound stream was already handed out.
    #[error("Already subscribed")]
    AlreadySubscribed,

    /// Payload could not be encoded or decoded.
    #[error("Codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

/// A message channel between participants of one session.
pub trait Transport: Send {
    /// Create a session and become its first member.
    fn create_session(
        &mut self,
        metadata: JoinMetadata,
    ) -> impl Future<Output = Result<SessionInfo, TransportError>> + Send;

    /// Join an existing session. Existing members receive a `joined` event
    /// carrying `metadata`.
    fn join_session(
        &mut self,
        session_id: &str,
        metadata: JoinMetadata,
    ) -> impl Future<Output = Result<SessionInfo, TransportError>> + Send;

    /// Send a payload to every other member.
    fn send_event(&mut self, payload: &GamePayload) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Take the inbound event stream for the current session.
    fn subscribe(&mut self) -> Result<Subscription, TransportError>;

    /// Leave the current session.
    fn close(&mut self) -> impl Future<Output = ()> + Send;
}

// =============================================================================
// SUBSCRIPTION
// =============================================================================

/// Handle on a session's inbound events.
///
/// Dropping the handle cancels it as well.
#[derive(Debug)]
pub struct Subscription {
    receiver: mpsc::UnboundedReceiver<TransportEvent>,
}

impl Subscription {
    /// Wrap a receiving channel.
    pub fn new(receiver: mpsc::UnboundedReceiver<TransportEvent>) -> Self {
        Self { receiver }
    }

    /// Next event if one is ready. Never waits.
    pub fn try_next(&mut self) -> Option<TransportEvent> {
        self.receiver.try_recv().ok()
    }

    /// Wait for the next event. `None` once the sender side is gone.
    pub async fn recv(&mut self) -> Option<TransportEvent> {
        self.receiver.recv().await
    }

    /// Stop receiving. Events already queued are discarded.
    pub fn unsubscribe(mut self) {
        self.receiver.close();
        while self.receiver.try_recv().is_ok() {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::protocol::EventKind;
    use serde_json::Value;

    fn event(sequence: u64) -> TransportEvent {
        TransportEvent {
            kind: EventKind::Game,
            sequence,
            sender: PlayerId::new("peer"),
            payload: Value::Null,
        }
    }

    #[tokio::test]
    async fn test_subscription_delivers_in_send_order() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut sub = Subscription::new(rx);

        assert!(sub.try_next().is_none());
        tx.send(event(1)).unwrap();
        tx.send(event(0)).unwrap();

        assert_eq!(sub.try_next().map(|e| e.sequence), Some(1));
        assert_eq!(sub.recv().await.map(|e| e.sequence), Some(0));

        drop(tx);
        assert!(sub.recv().await.is_none());
    }

    #[test]
    fn test_unsubscribe_closes_sender() {
        let (tx, rx) = mpsc::unbounded_channel();
        let sub = Subscription::new(rx);
        sub.unsubscribe();

        assert!(tx.send(event(0)).is_err());
        assert!(tx.is_closed());
    }
}
