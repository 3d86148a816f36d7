//! Wire messages exchanged over the realtime WebSocket.
//!
//! Everything on the wire is a JSON object with a `type` discriminator.
//! The client only ever sends the three [`ClientMessage`] shapes; the server
//! may send anything, so [`ServerMessage`] keeps unknown fields around.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Error;

/// Channel names the server publishes on.
pub mod channels {
    pub const SERVER_STATUS: &str = "server_status";
    pub const TRAFFIC: &str = "traffic";
    pub const CLIENTS: &str = "clients";
    pub const INBOUNDS: &str = "inbounds";
}

// ── Outgoing ─────────────────────────────────────────────────────────

/// A message the client writes to the socket.
///
/// Subscribe and unsubscribe are fire-and-forget: the server answers with
/// `subscribed`/`unsubscribed`, but nothing waits for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    Subscribe { channel: String },
    Unsubscribe { channel: String },
    Ping,
}

impl ClientMessage {
    pub fn subscribe(channel: impl Into<String>) -> Self {
        Self::Subscribe {
            channel: channel.into(),
        }
    }

    pub fn unsubscribe(channel: impl Into<String>) -> Self {
        Self::Unsubscribe {
            channel: channel.into(),
        }
    }

    /// Serialize to the JSON text frame.
    pub fn to_text(&self) -> Result<String, Error> {
        serde_json::to_string(self).map_err(|e| Error::Send(e.to_string()))
    }
}

// ── Incoming ─────────────────────────────────────────────────────────

/// A message pushed by the server.
///
/// Known kinds: `subscribed`, `unsubscribed`, `pong`, `server_status`,
/// `traffic_update`, `client_update`, `inbound_update`. Anything else is
/// passed through as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerMessage {
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    /// Server-side monotonic timestamp in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,

    /// All remaining fields the server sends (e.g. `status`).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ServerMessage {
    /// `true` for the server's acknowledgements of subscribe/unsubscribe/ping.
    pub fn is_ack(&self) -> bool {
        matches!(self.kind.as_str(), "subscribed" | "unsubscribed" | "pong")
    }
}

/// Parse a text frame into a [`ServerMessage`].
pub fn parse_server_message(text: &str) -> Result<ServerMessage, Error> {
    serde_json::from_str(text).map_err(|e| Error::Deserialization {
        message: e.to_string(),
        body: text.to_owned(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn client_messages_serialize_with_type_tag() {
        assert_eq!(
            ClientMessage::subscribe("traffic").to_text().unwrap(),
            r#"{"type":"subscribe","channel":"traffic"}"#
        );
        assert_eq!(
            ClientMessage::unsubscribe("clients").to_text().unwrap(),
            r#"{"type":"unsubscribe","channel":"clients"}"#
        );
        assert_eq!(ClientMessage::Ping.to_text().unwrap(), r#"{"type":"ping"}"#);
    }

    #[test]
    fn parse_broadcast_message() {
        let raw = json!({
            "type": "traffic_update",
            "data": { "node": 1, "up": 1024 },
            "timestamp": 1234.5
        });

        let msg = parse_server_message(&raw.to_string()).unwrap();
        assert_eq!(msg.kind, "traffic_update");
        assert_eq!(msg.data, Some(json!({ "node": 1, "up": 1024 })));
        assert_eq!(msg.timestamp, Some(1234.5));
        assert!(msg.channel.is_none());
        assert!(!msg.is_ack());
    }

    #[test]
    fn parse_ack_keeps_extra_fields() {
        let raw = r#"{"type":"subscribed","channel":"inbounds","status":"success"}"#;
        let msg = parse_server_message(raw).unwrap();
        assert!(msg.is_ack());
        assert_eq!(msg.channel.as_deref(), Some("inbounds"));
        assert_eq!(msg.extra["status"], "success");
    }

    #[test]
    fn parse_minimal_message() {
        let msg = parse_server_message(r#"{"type":"ping"}"#).unwrap();
        assert_eq!(msg.kind, "ping");
        assert!(msg.extra.is_empty());
    }

    #[test]
    fn malformed_text_is_a_deserialization_error() {
        let err = parse_server_message("not json at all").unwrap_err();
        assert!(matches!(err, Error::Deserialization { .. }));

        let err = parse_server_message(r#"{"channel":"x"}"#).unwrap_err();
        assert!(matches!(err, Error::Deserialization { .. }));
    }
}
