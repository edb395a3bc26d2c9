//! Protocol Messages
//!
//! Two layers, both JSON:
//! - application payloads exchanged between host and clients (`GamePayload`)
//! - relay wire messages that carry those payloads (`RelayRequest`,
//!   `RelayResponse`)

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::grid::Direction;
use crate::game::snake::PlayerId;
use crate::game::snapshot::WorldSnapshot;

/// Color used for joining players that do not send one.
pub const DEFAULT_JOIN_COLOR: &str = "#788cff";

// =============================================================================
// APPLICATION PAYLOADS
// =============================================================================

/// Host ⇄ client game messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GamePayload {
    /// Host → clients: full world snapshot.
    State { state: WorldSnapshot },

    /// Client → host: steer the sender's snake.
    Input { dir: Direction },

    /// Client → host: ask for a match-level action.
    Req { action: RequestAction },
}

/// Actions a client may request from the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RequestAction {
    /// Restart the match.
    NewMatch,
    /// Toggle pause.
    Pause,
}

impl GamePayload {
    /// Interpret a raw payload. Anything unrecognized yields `None`.
    pub fn from_value(value: &Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }

    /// Convert to a raw payload.
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

/// Metadata a participant sends when hosting or joining.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinMetadata {
    /// Display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Display color, e.g. `#788cff`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl JoinMetadata {
    /// Metadata with both fields set.
    pub fn new(name: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            color: Some(color.into()),
        }
    }

    /// Lenient parse: a missing or malformed object yields empty metadata.
    pub fn from_value(value: &Value) -> Self {
        serde_json::from_value(value.clone()).unwrap_or_default()
    }

    /// Convert to a raw payload.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Name to display for `client_id`.
    pub fn display_name(&self, client_id: &PlayerId) -> String {
        match self.name.as_deref() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => format!("Player-{client_id}"),
        }
    }

    /// Color to display.
    pub fn display_color(&self) -> String {
        match self.color.as_deref() {
            Some(color) if !color.is_empty() => color.to_string(),
            _ => DEFAULT_JOIN_COLOR.to_string(),
        }
    }
}

// =============================================================================
// TRANSPORT EVENTS
// =============================================================================

/// Kind of event delivered by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A participant joined the session; payload is its metadata.
    Joined,
    /// A game payload from another participant.
    Game,
    /// Anything else.
    #[serde(other)]
    Other,
}

/// One inbound event, numbered per receiving connection.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportEvent {
    /// Event kind
    pub kind: EventKind,
    /// Position in this connection's stream, from 0
    pub sequence: u64,
    /// Originating participant
    pub sender: PlayerId,
    /// Raw payload
    pub payload: Value,
}

// =============================================================================
// RELAY WIRE MESSAGES
// =============================================================================

/// Messages sent from a participant to the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelayRequest {
    /// Create a session and become its first member.
    Host {
        #[serde(default)]
        data: Value,
    },

    /// Join an existing session.
    Join {
        session: String,
        #[serde(default)]
        data: Value,
    },

    /// Fan a payload out to the other members.
    Game { data: Value },
}

/// Messages sent from the relay to a participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelayResponse {
    /// Session created.
    Hosted { session: String, client_id: PlayerId },

    /// Session joined.
    Joined { session: String, client_id: PlayerId },

    /// Event from another member.
    Event {
        event: EventKind,
        message_id: u64,
        client_id: PlayerId,
        data: Value,
    },

    /// Request failed.
    Error { code: ErrorCode, message: String },
}

/// Relay error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// No session with that id.
    SessionNotFound,
    /// `game` sent before hosting or joining.
    NotInSession,
    /// Unparseable request.
    InvalidMessage,
    /// Connection limit reached.
    ServerFull,
}

impl RelayResponse {
    /// Convert an `Event` into a transport event.
    pub fn into_transport_event(self) -> Option<TransportEvent> {
        match self {
            RelayResponse::Event {
                event,
                message_id,
                client_id,
                data,
            } => Some(TransportEvent {
                kind: event,
                sequence: message_id,
                sender: client_id,
                payload: data,
            }),
            _ => None,
        }
    }
}

// =============================================================================
// SERIALIZATION HELPERS
// =============================================================================

impl RelayRequest {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl RelayResponse {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}
