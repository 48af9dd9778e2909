//! Minimal IRC wire protocol: message parsing, serialization and line framing.

mod codec;
mod message;

pub use codec::{IrcCodec, MAX_LINE_LEN};
pub use message::{Message, Prefix};
