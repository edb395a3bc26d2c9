//! WebSocket Relay Server
//!
//! Hands out sessions and client ids and forwards game payloads between the
//! members of a session. The relay never looks inside payloads; all game
//! logic runs on the hosting participant.
//!
//! Message ids are counted per receiving connection, starting at 0.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, instrument, warn};

use crate::game::snake::PlayerId;
use crate::network::protocol::{ErrorCode, EventKind, RelayRequest, RelayResponse};

/// Relay configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            max_connections: 1000,
        }
    }
}

/// Relay errors.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    BindFailed(#[from] std::io::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

/// Connected participant.
struct ConnectedClient {
    /// Id handed out on connect.
    client_id: PlayerId,
    /// Session joined or hosted, if any.
    session: Option<String>,
    /// Connection time.
    connected_at: Instant,
}

/// A session member's outbound queue and message counter.
struct RelayMember {
    sender: mpsc::UnboundedSender<RelayResponse>,
    next_message_id: u64,
}

type Rooms = Arc<RwLock<BTreeMap<String, BTreeMap<PlayerId, RelayMember>>>>;
type Clients = Arc<RwLock<BTreeMap<SocketAddr, ConnectedClient>>>;

/// Send an event to every member of `room` except `from`.
fn fan_out(room: &mut BTreeMap<PlayerId, RelayMember>, from: &PlayerId, event: EventKind, data: &Value) -> usize {
    let mut delivered = 0;
    for (id, member) in room.iter_mut() {
        if id == from {
            continue;
        }
        let message = RelayResponse::Event {
            event,
            message_id: member.next_message_id,
            client_id: from.clone(),
            data: data.clone(),
        };
        member.next_message_id += 1;
        if member.sender.send(message).is_ok() {
            delivered += 1;
        }
    }
    delivered
}

/// The relay server.
pub struct RelayServer {
    /// Server configuration.
    config: RelayConfig,
    /// Sessions and their members.
    rooms: Rooms,
    /// Connected clients.
    clients: Clients,
    /// Shutdown signal.
    shutdown_tx: broadcast::Sender<()>,
}

impl RelayServer {
    /// Create a new relay.
    pub fn new(config: RelayConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            rooms: Arc::new(RwLock::new(BTreeMap::new())),
            clients: Arc::new(RwLock::new(BTreeMap::new())),
            shutdown_tx,
        }
    }

    /// Bind the configured address and serve until shutdown.
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<(), RelayError> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        info!("Relay listening on {}", self.config.bind_addr);
        self.run_with_listener(listener).await
    }

    /// Serve on an already bound listener until shutdown.
    pub async fn run_with_listener(&self, listener: TcpListener) -> Result<(), RelayError> {
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            let clients_count = self.clients.read().await.len();
                            if clients_count >= self.config.max_connections {
                                warn!("Connection limit reached, rejecting {}", addr);
                                Self::reject_connection(stream, addr);
                                continue;
                            }

                            info!("New connection from {}", addr);
                            self.handle_connection(stream, addr);
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Complete the handshake only to report `server_full`.
    fn reject_connection(stream: TcpStream, addr: SocketAddr) {
        tokio::spawn(async move {
            let mut ws = match accept_async(stream).await {
                Ok(ws) => ws,
                Err(e) => {
                    debug!("Handshake failed for rejected {}: {}", addr, e);
                    return;
                }
            };
            let response = RelayResponse::Error {
                code: ErrorCode::ServerFull,
                message: "Connection limit reached".to_string(),
            };
            if let Ok(text) = response.to_json() {
                let _ = ws.send(Message::Text(text)).await;
            }
            let _ = ws.close(None).await;
        });
    }

    /// Handle a new WebSocket connection.
    fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let clients = self.clients.clone();
        let rooms = self.rooms.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let ws_stream = match accept_async(stream).await {
                Ok(ws) => ws,
                Err(e) => {
                    error!("WebSocket handshake failed for {}: {}", addr, e);
                    return;
                }
            };

            let (mut ws_sender, mut ws_receiver) = ws_stream.split();
            let (msg_tx, mut msg_rx) = mpsc::unbounded_channel::<RelayResponse>();
            let client_id = PlayerId::new(uuid::Uuid::new_v4().to_string());

            // Register client
            {
                let mut clients = clients.write().await;
                clients.insert(addr, ConnectedClient {
                    client_id: client_id.clone(),
                    session: None,
                    connected_at: Instant::now(),
                });
            }

            // Spawn message sender task
            let sender_task = tokio::spawn(async move {
                while let Some(msg) = msg_rx.recv().await {
                    let text = match msg.to_json() {
                        Ok(t) => t,
                        Err(e) => {
                            error!("Failed to serialize message: {}", e);
                            continue;
                        }
                    };
                    if ws_sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
            });

            // Handle incoming messages
            loop {
                tokio::select! {
                    msg = ws_receiver.next() => {
                        match msg {
                            Some(Ok(Message::Text(text))) => {
                                match RelayRequest::from_json(&text) {
                                    Ok(request) => {
                                        Self::handle_request(addr, &client_id, request, &rooms, &clients, &msg_tx).await;
                                    }
                                    Err(e) => {
                                        debug!("Invalid message from {}: {}", addr, e);
                                        let _ = msg_tx.send(RelayResponse::Error {
                                            code: ErrorCode::InvalidMessage,
                                            message: "Invalid message format".to_string(),
                                        });
                                    }
                                }
                            }
                            Some(Ok(Message::Close(_))) | None => {
                                debug!("Client {} disconnected", addr);
                                break;
                            }
                            Some(Err(e)) => {
                                warn!("WebSocket error for {}: {}", addr, e);
                                break;
                            }
                            _ => {}
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        break;
                    }
                }
            }

            // Cleanup
            sender_task.abort();
            Self::leave_session(addr, &rooms, &clients).await;
            if let Some(client) = clients.write().await.remove(&addr) {
                info!(
                    "Client {} ({}) cleaned up after {:?}",
                    addr,
                    client.client_id,
                    client.connected_at.elapsed()
                );
            }
        });
    }

    /// Handle one relay request.
    async fn handle_request(
        addr: SocketAddr,
        client_id: &PlayerId,
        request: RelayRequest,
        rooms: &Rooms,
        clients: &Clients,
        sender: &mpsc::UnboundedSender<RelayResponse>,
    ) {
        match request {
            RelayRequest::Host { .. } => {
                Self::leave_session(addr, rooms, clients).await;

                let session = uuid::Uuid::new_v4().to_string();
                {
                    let mut rooms = rooms.write().await;
                    let mut room = BTreeMap::new();
                    room.insert(client_id.clone(), RelayMember {
                        sender: sender.clone(),
                        next_message_id: 0,
                    });
                    rooms.insert(session.clone(), room);
                }
                Self::set_session(addr, Some(session.clone()), clients).await;

                info!("Client {} hosted session {}", client_id, session);
                let _ = sender.send(RelayResponse::Hosted {
                    session,
                    client_id: client_id.clone(),
                });
            }

            RelayRequest::Join { session, data } => {
                Self::leave_session(addr, rooms, clients).await;

                let notified = {
                    let mut rooms = rooms.write().await;
                    let Some(room) = rooms.get_mut(&session) else {
                        debug!("Client {} tried to join unknown session {}", client_id, session);
                        let _ = sender.send(RelayResponse::Error {
                            code: ErrorCode::SessionNotFound,
                            message: format!("No session {session}"),
                        });
                        return;
                    };

                    let notified = fan_out(room, client_id, EventKind::Joined, &data);
                    room.insert(client_id.clone(), RelayMember {
                        sender: sender.clone(),
                        next_message_id: 0,
                    });
                    notified
                };
                Self::set_session(addr, Some(session.clone()), clients).await;

                info!("Client {} joined session {} ({} notified)", client_id, session, notified);
                let _ = sender.send(RelayResponse::Joined {
                    session,
                    client_id: client_id.clone(),
                });
            }

            RelayRequest::Game { data } => {
                let session = clients.read().await.get(&addr).and_then(|c| c.session.clone());
                let Some(session) = session else {
                    let _ = sender.send(RelayResponse::Error {
                        code: ErrorCode::NotInSession,
                        message: "Host or join a session first".to_string(),
                    });
                    return;
                };

                let mut rooms = rooms.write().await;
                if let Some(room) = rooms.get_mut(&session) {
                    fan_out(room, client_id, EventKind::Game, &data);
                }
            }
        }
    }

    /// Record the session a connection belongs to.
    async fn set_session(addr: SocketAddr, session: Option<String>, clients: &Clients) {
        let mut clients = clients.write().await;
        if let Some(client) = clients.get_mut(&addr) {
            client.session = session;
        }
    }

    /// Remove a connection from its session; drop the session once empty.
    async fn leave_session(addr: SocketAddr, rooms: &Rooms, clients: &Clients) {
        let (client_id, session) = {
            let mut clients = clients.write().await;
            match clients.get_mut(&addr) {
                Some(c) => (c.client_id.clone(), c.session.take()),
                None => return,
            }
        };
        let Some(session) = session else {
            return;
        };

        let mut rooms = rooms.write().await;
        if let Some(room) = rooms.get_mut(&session) {
            room.remove(&client_id);
            if room.is_empty() {
                rooms.remove(&session);
                debug!("Session {} closed", session);
            }
        }
    }

    /// Shutdown the server.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Get active connection count.
    pub async fn connection_count(&self) -> usize {
        self.clients.read().await.len()
    }

    /// Get active session count.
    pub async fn session_count(&self) -> usize {
        self.rooms.read().await.len()
    }
}
