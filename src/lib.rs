//! ircmq-relay - bridges one IRC channel onto an MQTT topic.
//!
//! Channel messages are published as JSON relay events. The binary in
//! `main.rs` wires the pieces together; everything it uses lives here so the
//! integration tests can drive the same code.

pub mod chat;
pub mod config;
pub mod context;
pub mod error;
pub mod http;
pub mod metrics;
pub mod proto;
pub mod pubsub;
pub mod relay;
pub mod shutdown;
pub mod telemetry;
