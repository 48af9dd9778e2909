//! Chat session: the IRC side of the relay.
//!
//! - [`session`] is the sans-IO handshake and classification state machine.
//! - [`connection`] drives it over a TCP transport.
//! - [`event`] is the event-code table both share.

pub mod connection;
pub mod event;
pub mod session;

pub use connection::{ChatConnection, ChatHandle};
pub use event::EventKind;
pub use session::{ChatAction, ChatSession, Identity};
