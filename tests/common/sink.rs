//! Relay sink that keeps events in memory.

use std::sync::Mutex;

use ircmq_relay::relay::{RelayEvent, RelaySink, StatusEvent};

#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<RelayEvent>>,
    statuses: Mutex<Vec<StatusEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<RelayEvent> {
        self.events.lock().unwrap().clone()
    }

    #[allow(dead_code)]
    pub fn statuses(&self) -> Vec<StatusEvent> {
        self.statuses.lock().unwrap().clone()
    }
}

impl RelaySink for RecordingSink {
    fn publish(&self, event: &RelayEvent) {
        self.events.lock().unwrap().push(event.clone());
    }

    fn announce(&self, status: &StatusEvent) {
        self.statuses.lock().unwrap().push(status.clone());
    }
}
