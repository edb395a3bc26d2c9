//! WebSocket Transport
//!
//! Talks to a `RelayServer` over one WebSocket connection. Replies to
//! `host` and `join` arrive in request order, so pending requests wait in a
//! FIFO of oneshot channels; relayed events go to the active subscription.

use std::collections::VecDeque;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use crate::network::protocol::{ErrorCode, GamePayload, JoinMetadata, RelayRequest, RelayResponse, TransportEvent};
use crate::network::transport::{SessionInfo, Subscription, Transport, TransportError};

type Waiters = Arc<Mutex<VecDeque<oneshot::Sender<RelayResponse>>>>;
type EventSink = Arc<Mutex<Option<mpsc::UnboundedSender<TransportEvent>>>>;

/// Transport over a WebSocket connection to the relay.
pub struct WsTransport {
    outbound: mpsc::UnboundedSender<Message>,
    waiters: Waiters,
    sink: EventSink,
    inbox: Option<mpsc::UnboundedReceiver<TransportEvent>>,
    session: Option<SessionInfo>,
    writer: JoinHandle<()>,
    reader: JoinHandle<()>,
}

fn closed() -> TransportError {
    TransportError::Connection("relay connection closed".to_string())
}

impl WsTransport {
    /// Connect to a relay at `url`, e.g. `ws://127.0.0.1:8080`.
    pub async fn connect(url: &str) -> Result<Self, TransportError> {
        let (ws_stream, _) = connect_async(url)
            .await
            .map_err(|e| TransportError::Connection(e.to_string()))?;
        info!("Connected to relay at {}", url);

        let (mut ws_sender, mut ws_receiver) = ws_stream.split();
        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<Message>();
        let waiters: Waiters = Arc::new(Mutex::new(VecDeque::new()));
        let sink: EventSink = Arc::new(Mutex::new(None));

        let writer = tokio::spawn(async move {
            while let Some(msg) = outbound_rx.recv().await {
                let closing = matches!(msg, Message::Close(_));
                if ws_sender.send(msg).await.is_err() || closing {
                    break;
                }
            }
        });

        let reader = {
            let waiters = waiters.clone();
            let sink = sink.clone();
            tokio::spawn(async move {
                while let Some(msg) = ws_receiver.next().await {
                    let text = match msg {
                        Ok(Message::Text(text)) => text,
                        Ok(Message::Close(_)) => break,
                        Ok(_) => continue,
                        Err(e) => {
                            warn!("Relay connection error: {}", e);
                            break;
                        }
                    };

                    let response = match RelayResponse::from_json(&text) {
                        Ok(r) => r,
                        Err(e) => {
                            debug!("Ignoring unparseable relay message: {}", e);
                            continue;
                        }
                    };

                    match response {
                        RelayResponse::Event { .. } => {
                            let Some(event) = response.into_transport_event() else {
                                continue;
                            };
                            if let Some(tx) = sink.lock().await.as_ref() {
                                let _ = tx.send(event);
                            }
                        }
                        reply => match waiters.lock().await.pop_front() {
                            Some(waiter) => {
                                let _ = waiter.send(reply);
                            }
                            None => warn!("Unsolicited relay reply: {:?}", reply),
                        },
                    }
                }

                debug!("Relay reader finished");
                waiters.lock().await.clear();
                sink.lock().await.take();
            })
        };

        Ok(Self {
            outbound,
            waiters,
            sink,
            inbox: None,
            session: None,
            writer,
            reader,
        })
    }

    /// Current session, if any.
    pub fn session(&self) -> Option<&SessionInfo> {
        self.session.as_ref()
    }

    /// Send a request and wait for the relay's reply.
    async fn request(&mut self, request: RelayRequest) -> Result<RelayResponse, TransportError> {
        let text = request.to_json()?;
        let (tx, rx) = oneshot::channel();
        self.waiters.lock().await.push_back(tx);
        self.outbound.send(Message::Text(text)).map_err(|_| closed())?;
        rx.await.map_err(|_| closed())
    }

    /// Route events to a fresh inbox before entering a session.
    async fn open_inbox(&mut self) {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.sink.lock().await = Some(tx);
        self.inbox = Some(rx);
    }

    async fn discard_inbox(&mut self) {
        self.sink.lock().await.take();
        self.inbox = None;
    }
}

impl Transport for WsTransport {
    async fn create_session(&mut self, metadata: JoinMetadata) -> Result<SessionInfo, TransportError> {
        self.open_inbox().await;
        let reply = self.request(RelayRequest::Host { data: metadata.to_value() }).await;

        match reply {
            Ok(RelayResponse::Hosted { session, client_id }) => {
                let info = SessionInfo {
                    session_id: session,
                    client_id,
                };
                self.session = Some(info.clone());
                Ok(info)
            }
            Ok(other) => {
                self.discard_inbox().await;
                Err(TransportError::Connection(format!("Unexpected reply to host: {other:?}")))
            }
            Err(e) => {
                self.discard_inbox().await;
                Err(e)
            }
        }
    }

    async fn join_session(&mut self, session_id: &str, metadata: JoinMetadata) -> Result<SessionInfo, TransportError> {
        self.open_inbox().await;
        let reply = self
            .request(RelayRequest::Join {
                session: session_id.to_string(),
                data: metadata.to_value(),
            })
            .await;

        let result = match reply {
            Ok(RelayResponse::Joined { session, client_id }) => {
                let info = SessionInfo {
                    session_id: session,
                    client_id,
                };
                self.session = Some(info.clone());
                return Ok(info);
            }
            Ok(RelayResponse::Error {
                code: ErrorCode::SessionNotFound,
                ..
            }) => TransportError::SessionNotFound(session_id.to_string()),
            Ok(RelayResponse::Error { message, .. }) => TransportError::Connection(message),
            Ok(other) => TransportError::Connection(format!("Unexpected reply to join: {other:?}")),
            Err(e) => e,
        };

        // The relay drops the previous membership before looking the session up.
        self.session = None;
        self.discard_inbox().await;
        Err(result)
    }

    async fn send_event(&mut self, payload: &GamePayload) -> Result<(), TransportError> {
        if self.session.is_none() {
            return Err(TransportError::NotConnected);
        }
        let text = RelayRequest::Game {
            data: payload.to_value()?,
        }
        .to_json()?;
        self.outbound.send(Message::Text(text)).map_err(|_| closed())
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
        self.discard_inbox().await;
        if self.session.take().is_some() {
            debug!("Closing relay connection");
        }
        let _ = self.outbound.send(Message::Close(None));
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        self.writer.abort();
        self.reader.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::grid::Direction;
    use crate::network::protocol::EventKind;
    use crate::network::relay::{RelayConfig, RelayServer};
    use std::time::Duration;
    use tokio::net::TcpListener;

    async fn start_relay() -> (Arc<RelayServer>, String) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = Arc::new(RelayServer::new(RelayConfig {
            bind_addr: addr,
            ..RelayConfig::default()
        }));
        let running = server.clone();
        tokio::spawn(async move {
            running.run_with_listener(listener).await.unwrap();
        });
        (server, format!("ws://{addr}"))
    }

    async fn next(sub: &mut Subscription) -> TransportEvent {
        tokio::time::timeout(Duration::from_secs(5), sub.recv())
            .await
            .expect("timed out waiting for event")
            .expect("subscription closed")
    }

    #[tokio::test]
    async fn test_host_join_and_exchange() {
        let (server, url) = start_relay().await;

        let mut host = WsTransport::connect(&url).await.unwrap();
        let hosted = host.create_session(JoinMetadata::new("Host", "#7cf7c2")).await.unwrap();
        let mut host_events = host.subscribe().unwrap();

        let mut guest = WsTransport::connect(&url).await.unwrap();
        let joined = guest
            .join_session(&hosted.session_id, JoinMetadata::new("Bob", "#788cff"))
            .await
            .unwrap();
        let mut guest_events = guest.subscribe().unwrap();
        assert_eq!(joined.session_id, hosted.session_id);

        let join = next(&mut host_events).await;
        assert_eq!(join.kind, EventKind::Joined);
        assert_eq!(join.sequence, 0);
        assert_eq!(join.sender, joined.client_id);
        assert_eq!(JoinMetadata::from_value(&join.payload).display_name(&join.sender), "Bob");

        guest.send_event(&GamePayload::Input { dir: Direction::Left }).await.unwrap();
        let input = next(&mut host_events).await;
        assert_eq!(input.sequence, 1);
        assert_eq!(GamePayload::from_value(&input.payload), Some(GamePayload::Input { dir: Direction::Left }));

        host.send_event(&GamePayload::Input { dir: Direction::Up }).await.unwrap();
        let echoed = next(&mut guest_events).await;
        assert_eq!(echoed.sequence, 0);
        assert_eq!(echoed.sender, hosted.client_id);

        server.shutdown();
    }

    #[tokio::test]
    async fn test_join_unknown_session() {
        let (server, url) = start_relay().await;
        let mut t = WsTransport::connect(&url).await.unwrap();

        let err = t.join_session("missing", JoinMetadata::default()).await.unwrap_err();
        assert!(matches!(err, TransportError::SessionNotFound(id) if id == "missing"));
        assert!(matches!(t.subscribe(), Err(TransportError::NotConnected)));
        assert!(matches!(
            t.send_event(&GamePayload::Input { dir: Direction::Up }).await,
            Err(TransportError::NotConnected)
        ));

        server.shutdown();
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = WsTransport::connect(&format!("ws://{addr}")).await;
        assert!(matches!(result, Err(TransportError::Connection(_))));
    }
}
