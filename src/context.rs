//! Process-wide relay state, owned by the orchestrator.
//!
//! Both connection handles are written once during startup and only read
//! afterwards. `OnceLock` gives the release/acquire pairing between the
//! startup task and the liveness and shutdown tasks.

use std::sync::OnceLock;

use crate::chat::ChatHandle;
use crate::pubsub::PubSubConnector;

#[derive(Default)]
pub struct RelayContext {
    chat: OnceLock<ChatHandle>,
    pubsub: OnceLock<PubSubConnector>,
}

impl RelayContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the chat handle. A second call is ignored and returns `false`.
    pub fn set_chat(&self, handle: ChatHandle) -> bool {
        self.chat.set(handle).is_ok()
    }

    /// Store the pub/sub connector. A second call is ignored and returns `false`.
    pub fn set_pubsub(&self, connector: PubSubConnector) -> bool {
        self.pubsub.set(connector).is_ok()
    }

    pub fn chat(&self) -> Option<&ChatHandle> {
        self.chat.get()
    }

    pub fn pubsub(&self) -> Option<&PubSubConnector> {
        self.pubsub.get()
    }

    /// Chat side is up once its handle exists; transport health is not probed.
    pub fn chat_status(&self) -> bool {
        self.chat.get().is_some()
    }

    pub fn pubsub_status(&self) -> bool {
        self.pubsub.get().is_some_and(PubSubConnector::report_status)
    }

    /// Up iff the chat handle exists and the broker session is connected.
    pub fn is_live(&self) -> bool {
        self.chat_status() && self.pubsub_status()
    }
}
