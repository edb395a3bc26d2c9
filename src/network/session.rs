//! Session Controller
//!
//! Binds a `Transport` to the world and a `SequencedDeliveryBuffer`.
//!
//! - **Local**: no session; the instance simulates its configured players.
//! - **Host**: simulates, applies remote input and broadcasts a snapshot
//!   after every fixed step.
//! - **Client**: never simulates; replaces its world with each snapshot,
//!   in sequence order.
//!
//! The world is only touched synchronously. Transport I/O happens in the
//! async methods, after any simulation work for the call is done.

use tracing::{debug, info, instrument, warn};

use crate::config::GameConfig;
use crate::core::grid::Direction;
use crate::game::clock::FixedStepClock;
use crate::game::snake::PlayerId;
use crate::game::state::{MatchStatus, World};
use crate::game::tick::advance;
use crate::network::protocol::{
    EventKind, GamePayload, JoinMetadata, RequestAction, TransportEvent, DEFAULT_JOIN_COLOR,
};
use crate::network::sequence::SequencedDeliveryBuffer;
use crate::network::transport::{SessionInfo, Subscription, Transport, TransportError};

/// Display name used when hosting without one.
pub const DEFAULT_HOST_NAME: &str = "Host";
/// Display color used when hosting without one.
pub const DEFAULT_HOST_COLOR: &str = "#7cf7c2";
/// Display name used when joining without one.
pub const DEFAULT_CLIENT_NAME: &str = "Client";

/// What this participant is doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// No session; simulate locally.
    Local,
    /// Authoritative participant of a session.
    Host,
    /// Passive participant of a session.
    Client,
}

/// Session errors.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Transport failure.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Join attempted with a blank session id.
    #[error("Session id is empty")]
    EmptySessionId,

    /// Operation needs a hosted or joined session.
    #[error("Not in a session")]
    NotInSession,
}

/// Fill in a name and color where the caller gave none.
fn with_defaults(metadata: JoinMetadata, name: &str, color: &str) -> JoinMetadata {
    let pick = |value: Option<String>, fallback: &str| match value {
        Some(v) if !v.trim().is_empty() => v,
        _ => fallback.to_string(),
    };
    JoinMetadata {
        name: Some(pick(metadata.name, name)),
        color: Some(pick(metadata.color, color)),
    }
}

/// Drives one participant: local play, hosting or joining.
pub struct SessionController<T: Transport> {
    config: GameConfig,
    transport: T,
    role: Role,
    world: World,
    buffer: SequencedDeliveryBuffer<TransportEvent>,
    subscription: Option<Subscription>,
    clock: FixedStepClock,
    local_id: Option<PlayerId>,
    session: Option<SessionInfo>,
    outbox: Vec<GamePayload>,
}

impl<T: Transport> SessionController<T> {
    /// Create a controller in local mode with an empty world.
    pub fn new(config: GameConfig, transport: T) -> Self {
        let world = World::new(&config);
        let clock = FixedStepClock::new(config.tick_ms());

        Self {
            config,
            transport,
            role: Role::Local,
            world,
            buffer: SequencedDeliveryBuffer::new(),
            subscription: None,
            clock,
            local_id: None,
            session: None,
            outbox: Vec::new(),
        }
    }

    /// The world as this participant sees it.
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Current role.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Active session, if hosting or joined.
    pub fn session(&self) -> Option<&SessionInfo> {
        self.session.as_ref()
    }

    /// Id of the snake this participant steers.
    pub fn local_id(&self) -> Option<&PlayerId> {
        self.local_id.as_ref()
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Start a local match with the configured players.
    pub fn start_local(&mut self) {
        self.world.clear_snakes();
        for player in &self.config.local_players {
            self.world
                .add_or_update_snake(PlayerId::new(player.id.clone()), &player.name, &player.color);
        }
        self.local_id = self.config.local_players.first().map(|p| PlayerId::new(p.id.clone()));
        self.clock.reset();
        self.world.start_new_match();
        info!("Local match started with {} players", self.world.snakes.len());
    }

    /// Create a session and host a fresh match in it.
    #[instrument(skip(self, metadata))]
    pub async fn host(&mut self, metadata: JoinMetadata) -> Result<SessionInfo, SessionError> {
        self.leave_if_connected().await;

        let metadata = with_defaults(metadata, DEFAULT_HOST_NAME, DEFAULT_HOST_COLOR);
        let info = self.transport.create_session(metadata.clone()).await?;
        self.attach(Role::Host, info.clone())?;

        self.world.clear_snakes();
        self.world.add_or_update_snake(
            info.client_id.clone(),
            &metadata.display_name(&info.client_id),
            &metadata.display_color(),
        );
        self.world.start_new_match();
        self.queue_state();
        self.flush().await;

        info!("Hosting session {} as {}", info.session_id, info.client_id);
        Ok(info)
    }

    /// Join an existing session as a passive client.
    #[instrument(skip(self, metadata))]
    pub async fn join(&mut self, session_id: &str, metadata: JoinMetadata) -> Result<SessionInfo, SessionError> {
        let session_id = session_id.trim();
        if session_id.is_empty() {
            return Err(SessionError::EmptySessionId);
        }
        self.leave_if_connected().await;

        let metadata = with_defaults(metadata, DEFAULT_CLIENT_NAME, DEFAULT_JOIN_COLOR);
        let info = self.transport.join_session(session_id, metadata).await?;
        self.attach(Role::Client, info.clone())?;

        self.world.clear_snakes();
        self.world.status = MatchStatus::Menu;
        self.world.outcome = None;

        info!("Joined session {} as {}", info.session_id, info.client_id);
        Ok(info)
    }

    /// Leave the current session and fall back to local mode.
    pub async fn leave(&mut self) -> Result<(), SessionError> {
        if self.role == Role::Local {
            return Err(SessionError::NotInSession);
        }

        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
        self.buffer.reset();
        self.outbox.clear();
        self.transport.close().await;

        if let Some(info) = self.session.take() {
            info!("Left session {}", info.session_id);
        }
        self.role = Role::Local;
        self.local_id = None;
        self.world.clear_snakes();
        self.world.status = MatchStatus::Menu;
        Ok(())
    }

    async fn leave_if_connected(&mut self) {
        if self.role != Role::Local {
            let _ = self.leave().await;
        }
    }

    fn attach(&mut self, role: Role, info: SessionInfo) -> Result<(), SessionError> {
        let subscription = self.transport.subscribe()?;
        self.subscription = Some(subscription);
        self.buffer.reset();
        self.clock.reset();
        self.outbox.clear();
        self.role = role;
        self.local_id = Some(info.client_id.clone());
        self.session = Some(info);
        Ok(())
    }

    // =========================================================================
    // INBOUND
    // =========================================================================

    /// Feed one transport event through the delivery buffer.
    ///
    /// Returns how many events were dispatched as a result.
    pub fn handle_event(&mut self, event: TransportEvent) -> usize {
        let ready = self.buffer.push(event.sequence, event);
        if let Some(missing) = self.buffer.missing() {
            debug!("Waiting for event {} ({} buffered)", missing, self.buffer.pending_len());
        }

        let count = ready.len();
        for event in ready {
            self.dispatch(event);
        }
        count
    }

    /// Handle every event already received. Never waits.
    pub fn poll_inbound(&mut self) -> usize {
        let mut received = 0;
        while let Some(event) = self.subscription.as_mut().and_then(Subscription::try_next) {
            received += 1;
            self.handle_event(event);
        }
        received
    }

    fn dispatch(&mut self, event: TransportEvent) {
        #[cfg(feature = "debug-tracing")]
        tracing::trace!(
            "dispatch seq={} kind={:?} from={}",
            event.sequence,
            event.kind,
            event.sender
        );

        match (event.kind, self.role) {
            (EventKind::Joined, Role::Host) => {
                let metadata = JoinMetadata::from_value(&event.payload);
                let name = metadata.display_name(&event.sender);
                info!("{} joined as {}", event.sender, name);
                self.world
                    .add_or_update_snake(event.sender, &name, &metadata.display_color());
                self.queue_state();
            }
            (EventKind::Game, _) => match GamePayload::from_value(&event.payload) {
                Some(payload) => self.apply_payload(&event.sender, payload),
                None => debug!("Ignoring unrecognized payload from {}", event.sender),
            },
            (kind, role) => debug!("Ignoring {:?} event as {:?}", kind, role),
        }
    }

    fn apply_payload(&mut self, sender: &PlayerId, payload: GamePayload) {
        match (self.role, payload) {
            (Role::Host, GamePayload::Input { dir }) => {
                self.world.queue_direction(sender, dir);
            }
            (Role::Host, GamePayload::Req { action }) => {
                self.apply_request(action);
                self.queue_state();
            }
            (Role::Client, GamePayload::State { state }) => {
                self.world.apply_snapshot(&state);
            }
            (role, payload) => debug!("Ignoring {:?} from {} as {:?}", payload, sender, role),
        }
    }

    fn apply_request(&mut self, action: RequestAction) {
        match action {
            RequestAction::NewMatch => {
                self.clock.reset();
                self.world.start_new_match();
            }
            RequestAction::Pause => self.world.toggle_pause(),
        }
    }

    // =========================================================================
    // SIMULATION
    // =========================================================================

    /// Drain inbound events, run due steps, then send queued payloads.
    ///
    /// Returns the number of simulation steps run (always 0 for clients).
    pub async fn pump(&mut self, elapsed_ms: u64) -> u32 {
        self.poll_inbound();

        let steps = match self.role {
            Role::Client => 0,
            Role::Local | Role::Host => self.clock.accumulate(elapsed_ms),
        };

        let step_ms = self.clock.step_ms();
        for _ in 0..steps {
            let result = advance(&mut self.world, step_ms);
            if result.match_ended {
                info!("Match over at tick {}: {}", self.world.tick, self.world.outcome_text());
            }
            if self.role == Role::Host {
                self.queue_state();
            }
        }

        self.flush().await;
        steps
    }

    // =========================================================================
    // LOCAL ACTIONS
    // =========================================================================

    /// Steer this participant's snake.
    ///
    /// Clients forward the direction to the host instead.
    pub async fn steer(&mut self, dir: Direction) {
        match self.role {
            Role::Client => {
                self.outbox.push(GamePayload::Input { dir });
                self.flush().await;
            }
            Role::Local | Role::Host => {
                if let Some(id) = &self.local_id {
                    self.world.queue_direction(id, dir);
                }
            }
        }
    }

    /// Steer the `index`-th configured local player. Local mode only.
    pub fn steer_local_player(&mut self, index: usize, dir: Direction) -> bool {
        if self.role != Role::Local {
            return false;
        }
        match self.config.local_players.get(index) {
            Some(player) => {
                let id = PlayerId::new(player.id.clone());
                self.world.queue_direction(&id, dir)
            }
            None => false,
        }
    }

    /// Restart the match, or ask the host to.
    pub async fn request_new_match(&mut self) {
        self.request(RequestAction::NewMatch).await;
    }

    /// Toggle pause, or ask the host to.
    pub async fn request_toggle_pause(&mut self) {
        self.request(RequestAction::Pause).await;
    }

    async fn request(&mut self, action: RequestAction) {
        match self.role {
            Role::Client => self.outbox.push(GamePayload::Req { action }),
            Role::Host => {
                self.apply_request(action);
                self.queue_state();
            }
            Role::Local => self.apply_request(action),
        }
        self.flush().await;
    }

    // =========================================================================
    // OUTBOUND
    // =========================================================================

    fn queue_state(&mut self) {
        self.outbox.push(GamePayload::State {
            state: self.world.snapshot(),
        });
    }

    async fn flush(&mut self) {
        if self.role == Role::Local {
            self.outbox.clear();
            return;
        }
        for payload in std::mem::take(&mut self.outbox) {
            if let Err(e) = self.transport.send_event(&payload).await {
                warn!("Failed to send payload: {}", e);
            }
        }
    }
}
