//! Unified error handling for ircmq-relay.
//!
//! One error enum per concern, all `thiserror`-derived. Startup converts them
//! into `anyhow` at the orchestrator boundary; nothing below `main` exits the
//! process on its own.

use thiserror::Error;

// ============================================================================
// Wire protocol
// ============================================================================

/// Errors produced while framing or parsing IRC lines.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed message {string:?}: {cause}")]
    InvalidMessage { string: String, cause: String },
}

// ============================================================================
// Chat session
// ============================================================================

/// IRC transport errors.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("failed to connect to IRC server {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("connection closed by server")]
    Closed,

    #[error("outbound queue closed")]
    WriterGone,
}

impl ChatError {
    /// Static label for log fields and metrics.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Connect { .. } => "connect",
            Self::Protocol(_) => "protocol",
            Self::Closed => "closed",
            Self::WriterGone => "writer_gone",
        }
    }
}

// ============================================================================
// Pub/sub connector
// ============================================================================

/// MQTT session errors.
#[derive(Debug, Error)]
pub enum PubSubError {
    #[error("failed to connect to broker: {0}")]
    Connect(#[from] rumqttc::ConnectionError),

    #[error("broker refused connection: {0:?}")]
    Refused(rumqttc::ConnectReturnCode),

    #[error("timed out waiting for {0}")]
    Timeout(&'static str),

    #[error("broker rejected subscription to {0}")]
    Subscribe(String),

    #[error("client request failed: {0}")]
    Client(#[from] rumqttc::ClientError),
}
