//! In-Process Loopback Transport
//!
//! A hub shared by several `LoopbackTransport`s in one process. Behaves like
//! the relay: per-receiver message ids from 0, `joined` events to existing
//! members, game events to everyone but the sender. Used by tests and the
//! demo binary.
//!
//! With reordering enabled the hub holds events back until
//! `release_held()`, then delivers them in a shuffled order.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tracing::debug;

use crate::core::rng::DeterministicRng;
use crate::game::snake::PlayerId;
use crate::network::protocol::{EventKind, GamePayload, JoinMetadata, TransportEvent};
use crate::network::transport::{SessionInfo, Subscription, Transport, TransportError};

/// One member of a loopback session.
struct HubMember {
    sender: mpsc::UnboundedSender<TransportEvent>,
    next_sequence: u64,
    held: Vec<TransportEvent>,
}

#[derive(Default)]
struct HubState {
    rooms: BTreeMap<String, BTreeMap<PlayerId, HubMember>>,
    reorder: Option<DeterministicRng>,
}

impl HubState {
    /// Number and deliver (or hold) an event to every member except `from`.
    fn fan_out(&mut self, session: &str, from: &PlayerId, kind: EventKind, payload: serde_json::Value) {
        let Some(room) = self.rooms.get_mut(session) else {
            return;
        };
        let hold = self.reorder.is_some();

        for (id, member) in room.iter_mut().filter(|(id, _)| *id != from) {
            let event = TransportEvent {
                kind,
                sequence: member.next_sequence,
                sender: from.clone(),
                payload: payload.clone(),
            };
            member.next_sequence += 1;

            if hold {
                member.held.push(event);
            } else if member.sender.send(event).is_err() {
                debug!("Loopback member {} is no longer listening", id);
            }
        }
    }
}

/// Shared in-process session registry.
#[derive(Clone, Default)]
pub struct LoopbackHub {
    state: Arc<Mutex<HubState>>,
}

impl LoopbackHub {
    /// Create a hub that delivers immediately.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a hub that holds events until `release_held`.
    pub fn with_reordering(seed: u32) -> Self {
        let state = HubState {
            rooms: BTreeMap::new(),
            reorder: Some(DeterministicRng::new(seed)),
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Create a transport attached to this hub.
    pub fn connect(&self) -> LoopbackTransport {
        LoopbackTransport {
            hub: self.clone(),
            session: None,
            inbox: None,
        }
    }

    /// Deliver every held event, each member's batch in shuffled order.
    ///
    /// Returns the number of events released.
    pub async fn release_held(&self) -> usize {
        let mut state = self.state.lock().await;
        let HubState { rooms, reorder } = &mut *state;
        let Some(rng) = reorder.as_mut() else {
            return 0;
        };

        let mut released = 0;
        for member in rooms.values_mut().flat_map(|room| room.values_mut()) {
            let mut batch = std::mem::take(&mut member.held);
            // Fisher-Yates
            for i in (1..batch.len()).rev() {
                let j = rng.next_index(i as u32 + 1) as usize;
                batch.swap(i, j);
            }
            released += batch.len();
            for event in batch {
                let _ = member.sender.send(event);
            }
        }
        released
    }

    /// Number of open sessions.
    pub async fn session_count(&self) -> usize {
        self.state.lock().await.rooms.len()
    }
}

/// One participant's handle on a `LoopbackHub`.
pub struct LoopbackTransport {
    hub: LoopbackHub,
    session: Option<SessionInfo>,
    inbox: Option<mpsc::UnboundedReceiver<TransportEvent>>,
}

impl LoopbackTransport {
    /// Current session, if any.
    pub fn session(&self) -> Option<&SessionInfo> {
        self.session.as_ref()
    }

    /// Enter `session_id` as a new member and remember the inbox.
    fn enter(&mut self, state: &mut HubState, session_id: &str) -> SessionInfo {
        let client_id = PlayerId::new(uuid::Uuid::new_v4().to_string());
        let (sender, receiver) = mpsc::unbounded_channel();

        state.rooms.entry(session_id.to_string()).or_default().insert(
            client_id.clone(),
            HubMember {
                sender,
                next_sequence: 0,
                held: Vec::new(),
            },
        );

        let info = SessionInfo {
            session_id: session_id.to_string(),
            client_id,
        };
        self.session = Some(info.clone());
        self.inbox = Some(receiver);
        info
    }
}

/// Remove a member; drop the room once empty.
fn remove_member(state: &mut HubState, info: &SessionInfo) {
    if let Some(room) = state.rooms.get_mut(&info.session_id) {
        room.remove(&info.client_id);
        if room.is_empty() {
            state.rooms.remove(&info.session_id);
        }
    }
}

impl Transport for LoopbackTransport {
    async fn create_session(&mut self, _metadata: JoinMetadata) -> Result<SessionInfo, TransportError> {
        let hub = self.hub.clone();
        let mut state = hub.state.lock().await;
        if let Some(previous) = self.session.take() {
            remove_member(&mut state, &previous);
        }

        let session_id = uuid::Uuid::new_v4().to_string();
        Ok(self.enter(&mut state, &session_id))
    }

    async fn join_session(&mut self, session_id: &str, metadata: JoinMetadata) -> Result<SessionInfo, TransportError> {
        let hub = self.hub.clone();
        let mut state = hub.state.lock().await;
        if !state.rooms.contains_key(session_id) {
            return Err(TransportError::SessionNotFound(session_id.to_string()));
        }
        if let Some(previous) = self.session.take() {
            remove_member(&mut state, &previous);
            if !state.rooms.contains_key(session_id) {
                return Err(TransportError::SessionNotFound(session_id.to_string()));
            }
        }

        let info = self.enter(&mut state, session_id);
        state.fan_out(session_id, &info.client_id, EventKind::Joined, metadata.to_value());
        Ok(info)
    }

    async fn send_event(&mut self, payload: &GamePayload) -> Result<(), TransportError> {
        let info = self.session.as_ref().ok_or(TransportError::NotConnected)?;
        let value = payload.to_value()?;

        let mut state = self.hub.state.lock().await;
        state.fan_out(&info.session_id, &info.client_id, EventKind::Game, value);
        Ok(())
    }

    fn subscribe(&mut self) -> Result<Subscription, TransportError> {
        if self.session.is_none() {
            return Err(TransportError::NotConnected);
        }
        self.inbox
            .take()
            .map(Subscription::new)
            .ok_or(TransportError::AlreadySubscribed)
    }

    async fn close(&mut self) {
        self.inbox = None;
        if let Some(info) = self.session.take() {
            let mut state = self.hub.state.lock().await;
            remove_member(&mut state, &info);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::grid::Direction;
    use crate::network::protocol::RequestAction;

    #[tokio::test]
    async fn test_host_join_and_fan_out() {
        let hub = LoopbackHub::new();
        let mut host = hub.connect();
        let mut guest = hub.connect();

        let hosted = host.create_session(JoinMetadata::default()).await.unwrap();
        let mut host_events = host.subscribe().unwrap();

        let joined = guest
            .join_session(&hosted.session_id, JoinMetadata::new("Bob", "#123456"))
            .await
            .unwrap();
        let mut guest_events = guest.subscribe().unwrap();
        assert_eq!(joined.session_id, hosted.session_id);
        assert_ne!(joined.client_id, hosted.client_id);

        let join_event = host_events.try_next().unwrap();
        assert_eq!(join_event.kind, EventKind::Joined);
        assert_eq!(join_event.sequence, 0);
        assert_eq!(join_event.sender, joined.client_id);
        assert_eq!(
            JoinMetadata::from_value(&join_event.payload).display_name(&joined.client_id),
            "Bob"
        );

        guest.send_event(&GamePayload::Input { dir: Direction::Up }).await.unwrap();
        let input = host_events.try_next().unwrap();
        assert_eq!(input.sequence, 1);
        assert_eq!(GamePayload::from_value(&input.payload), Some(GamePayload::Input { dir: Direction::Up }));

        // Sender does not hear itself; guest numbering starts at 0.
        assert!(guest_events.try_next().is_none());
        host.send_event(&GamePayload::Req { action: RequestAction::Pause }).await.unwrap();
        assert_eq!(guest_events.try_next().map(|e| e.sequence), Some(0));
    }

    #[tokio::test]
    async fn test_errors() {
        let hub = LoopbackHub::new();
        let mut t = hub.connect();

        assert!(matches!(t.subscribe(), Err(TransportError::NotConnected)));
        assert!(matches!(
            t.send_event(&GamePayload::Input { dir: Direction::Up }).await,
            Err(TransportError::NotConnected)
        ));
        assert!(matches!(
            t.join_session("nope", JoinMetadata::default()).await,
            Err(TransportError::SessionNotFound(_))
        ));

        t.create_session(JoinMetadata::default()).await.unwrap();
        t.subscribe().unwrap();
        assert!(matches!(t.subscribe(), Err(TransportError::AlreadySubscribed)));
    }

    #[tokio::test]
    async fn test_close_removes_empty_room() {
        let hub = LoopbackHub::new();
        let mut t = hub.connect();
        t.create_session(JoinMetadata::default()).await.unwrap();
        assert_eq!(hub.session_count().await, 1);

        t.close().await;
        assert_eq!(hub.session_count().await, 0);
        assert!(t.session().is_none());
    }

    #[tokio::test]
    async fn test_reordering_hub_shuffles_but_numbers_in_order() {
        let hub = LoopbackHub::with_reordering(7);
        let mut host = hub.connect();
        let mut guest = hub.connect();

        let hosted = host.create_session(JoinMetadata::default()).await.unwrap();
        guest.join_session(&hosted.session_id, JoinMetadata::default()).await.unwrap();
        let mut guest_events = guest.subscribe().unwrap();

        for _ in 0..20 {
            host.send_event(&GamePayload::Req { action: RequestAction::Pause }).await.unwrap();
        }
        assert!(guest_events.try_next().is_none());

        // 20 to the guest plus the guest's own `joined` to the host.
        assert_eq!(hub.release_held().await, 21);

        let mut seqs = Vec::new();
        while let Some(e) = guest_events.try_next() {
            seqs.push(e.sequence);
        }
        let mut sorted = seqs.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..20).collect::<Vec<_>>());
        assert_ne!(seqs, sorted);
    }
}
