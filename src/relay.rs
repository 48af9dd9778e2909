//! Relay events: what the chat side hands to the pub/sub side.
//!
//! Besides channel messages, the bot announces its own lifecycle on the same
//! topic (`bot_enter`, `botregistered`, `boterror`).

use serde::Serialize;

/// Leading marker some servers put on unverified idents.
const IDENT_MARKER: char = '~';

/// A channel message destined for the outbound topic.
///
/// Serializes to `{"type":"message","from":..,"to":..,"message":..}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelayEvent {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub from: String,
    pub to: String,
    pub message: String,
}

impl RelayEvent {
    /// Build a `message` event, stripping one leading `~` from `from`.
    pub fn message(from: &str, channel: &str, text: &str) -> Self {
        Self {
            kind: "message",
            from: from.strip_prefix(IDENT_MARKER).unwrap_or(from).to_string(),
            to: channel.to_string(),
            message: text.to_string(),
        }
    }

    /// JSON payload for the broker.
    pub fn to_payload(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

/// Bot lifecycle notice. Carries no sender or channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusEvent {
    #[serde(rename = "type")]
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl StatusEvent {
    /// Broker session established.
    pub fn entered() -> Self {
        Self {
            kind: "bot_enter",
            message: None,
        }
    }

    /// IRC registration completed; `text` is the welcome line.
    pub fn registered(text: &str) -> Self {
        Self {
            kind: "botregistered",
            message: Some(text.to_string()),
        }
    }

    /// The IRC server reported an error.
    pub fn error(text: &str) -> Self {
        Self {
            kind: "boterror",
            message: Some(text.to_string()),
        }
    }

    pub fn to_payload(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

/// Destination for relay events.
///
/// Implementations must not block the caller: the chat read loop calls this
/// inline and does not wait for delivery.
pub trait RelaySink: Send + Sync {
    fn publish(&self, event: &RelayEvent);

    fn announce(&self, status: &StatusEvent);
}
