//! Integration test common infrastructure.
//!
//! A scripted IRC server the relay connects to, a mock MQTT broker, and a
//! sink that records relay events instead of publishing them.

pub mod broker;
pub mod server;
pub mod sink;

#[allow(unused_imports)]
pub use broker::{Behavior, BrokerLog, MockBroker, Received};
#[allow(unused_imports)]
pub use server::{MockPeer, MockServer};
#[allow(unused_imports)]
pub use sink::RecordingSink;

use ircmq_relay::chat::{ChatSession, Identity};

/// Session for `bot1` on `#general`, optionally identifying with `secret`.
#[allow(dead_code)]
pub fn session(secret: Option<&str>) -> ChatSession {
    ChatSession::new(
        Identity {
            nickname: "bot1".to_string(),
            secret: secret.map(str::to_string),
        },
        "#general",
    )
}

/// Broker settings pointing at a [`MockBroker`] on `port`.
#[allow(dead_code)]
pub fn mqtt_config(port: u16) -> ircmq_relay::config::MqttConfig {
    ircmq_relay::config::MqttConfig {
        host: "127.0.0.1".to_string(),
        port,
        topic: "chat".to_string(),
        credentials: Some(ircmq_relay::config::Credentials {
            username: "relay".to_string(),
            password: "hunter2".to_string(),
        }),
    }
}
