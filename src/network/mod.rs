//! Network Layer
//!
//! Relay server, transports and the session controller.
//! This layer is **non-deterministic** - all game logic runs through `game/`.

pub mod protocol;
pub mod sequence;
pub mod transport;
pub mod loopback;
pub mod ws;
pub mod relay;
pub mod session;

pub use protocol::{
    EventKind, GamePayload, JoinMetadata, RelayRequest, RelayResponse, RequestAction, TransportEvent,
};
pub use sequence::SequencedDeliveryBuffer;
pub use transport::{SessionInfo, Subscription, Transport, TransportError};
pub use loopback::{LoopbackHub, LoopbackTransport};
pub use ws::WsTransport;
pub use relay::{RelayConfig, RelayError, RelayServer};
pub use session::{Role, SessionController, SessionError};
