//! Tracing setup and standardized spans.

use tracing::{Span, info_span};
use tracing_subscriber::EnvFilter;

/// Install the global `fmt` subscriber. `RUST_LOG` overrides the default
/// `info` filter.
pub fn init() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();
}

/// Span for the IRC side.
pub fn chat(server: &str, nick: &str) -> Span {
    info_span!("irc", server = %server, nick = %nick)
}

/// Span for the MQTT side.
pub fn broker(host: &str, topic: &str) -> Span {
    info_span!("mqtt", host = %host, topic = %topic)
}
