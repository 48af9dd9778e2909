//! Pub/sub connector: the MQTT side of the relay.
//!
//! Connects with short keep-alive so a dead broker is noticed quickly,
//! subscribes to the reserved inbound topic, and publishes relay events
//! fire-and-forget at QoS 0.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use rand::Rng;
use rumqttc::{
    AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Packet, Publish, QoS,
    SubscribeReasonCode,
};
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, info, trace, warn};

use crate::config::MqttConfig;
use crate::error::PubSubError;
use crate::metrics;
use crate::relay::{RelayEvent, RelaySink, StatusEvent};

const KEEP_ALIVE: Duration = Duration::from_secs(2);
/// Upper bound on the initial CONNECT/SUBSCRIBE round trips.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(1);
/// Pause between failed polls once running; rumqttc re-dials on the next poll.
const RECONNECT_DELAY: Duration = Duration::from_secs(1);
/// Requests buffered between the client handle and the event loop.
const REQUEST_CAPACITY: usize = 64;

/// One MQTT session: the publishing side, shared across tasks.
pub struct PubSubConnector {
    client: AsyncClient,
    topic: String,
    inbound_topic: String,
    connected: Arc<AtomicBool>,
}

/// The session's event loop. Must be polled for anything to reach the
/// broker; [`BrokerLoop::spawn`] hands it to a background task.
pub struct BrokerLoop {
    eventloop: EventLoop,
    client: AsyncClient,
    connected: Arc<AtomicBool>,
    topic: String,
    inbound_topic: String,
}

impl PubSubConnector {
    /// Connect and wait for CONNACK. Any failure is returned to the caller,
    /// which treats it as fatal.
    pub async fn connect(config: &MqttConfig) -> Result<(Self, BrokerLoop), PubSubError> {
        let client_id = format!("ircmq-relay-{:08x}", rand::thread_rng().r#gen::<u32>());
        let mut options = MqttOptions::new(client_id, config.host.clone(), config.port);
        options.set_keep_alive(KEEP_ALIVE);
        options.set_clean_session(true);
        if let Some(creds) = &config.credentials {
            options.set_credentials(creds.username.clone(), creds.password.clone());
        }

        let (client, mut eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);
        tokio::time::timeout(HANDSHAKE_TIMEOUT, wait_for_connack(&mut eventloop))
            .await
            .map_err(|_| PubSubError::Timeout("CONNACK"))??;

        info!(broker = %config.broker_url(), "Connected");
        let connected = Arc::new(AtomicBool::new(true));
        let connector = Self {
            client,
            topic: config.topic.clone(),
            inbound_topic: config.inbound_topic(),
            connected: Arc::clone(&connected),
        };
        let events = BrokerLoop {
            eventloop,
            client: connector.client.clone(),
            connected,
            topic: config.topic.clone(),
            inbound_topic: config.inbound_topic(),
        };
        Ok((connector, events))
    }

    /// Subscribe at QoS 0 and wait for the SUBACK. A rejected subscription
    /// is an error.
    pub async fn subscribe(
        &self,
        events: &mut BrokerLoop,
        topic: &str,
    ) -> Result<(), PubSubError> {
        self.client.subscribe(topic, QoS::AtMostOnce).await?;
        let suback = wait_for_suback(&mut events.eventloop, topic);
        tokio::time::timeout(HANDSHAKE_TIMEOUT, suback)
            .await
            .map_err(|_| PubSubError::Timeout("SUBACK"))??;

        info!(topic = %topic, "Subscribed");
        Ok(())
    }

    /// Publish without waiting for the broker. Fails only if the request
    /// queue is full or the event loop is gone.
    pub fn publish_to(&self, topic: &str, payload: Vec<u8>) -> Result<(), PubSubError> {
        self.client
            .try_publish(topic, QoS::AtMostOnce, false, payload)
            .map_err(PubSubError::from)
    }

    /// Announce the bot on the outbound topic. Needs the event loop running.
    pub fn enter(&self) {
        self.announce(&StatusEvent::entered());
    }

    fn send_payload(&self, payload: Result<Vec<u8>, serde_json::Error>) {
        let payload = match payload {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "Failed to encode event");
                return;
            }
        };

        match self.publish_to(&self.topic, payload) {
            Ok(()) => metrics::record_relayed(),
            Err(e) => {
                metrics::record_publish_failure();
                debug!(topic = %self.topic, error = %e, "Publish dropped");
            }
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn inbound_topic(&self) -> &str {
        &self.inbound_topic
    }

    /// True only while the session is actively connected.
    pub fn report_status(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// A connector whose event loop has already been dropped, so every
    /// publish fails.
    #[cfg(test)]
    pub(crate) fn detached(topic: &str) -> Self {
        let options = MqttOptions::new("test", "localhost", crate::config::MQTT_PORT);
        let (client, _eventloop) = AsyncClient::new(options, 1);
        Self {
            client,
            topic: topic.to_string(),
            inbound_topic: format!("{topic}{}", crate::config::INBOUND_TOPIC_SUFFIX),
            connected: Arc::new(AtomicBool::new(false)),
        }
    }

    #[cfg(test)]
    pub(crate) fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Release);
    }
}

impl RelaySink for PubSubConnector {
    /// Best effort: failures are counted and dropped.
    fn publish(&self, event: &RelayEvent) {
        self.send_payload(event.to_payload());
    }

    fn announce(&self, status: &StatusEvent) {
        debug!(kind = status.kind, "Announcing");
        self.send_payload(status.to_payload());
    }
}

async fn wait_for_connack(eventloop: &mut EventLoop) -> Result<(), PubSubError> {
    loop {
        if let Event::Incoming(Packet::ConnAck(ack)) = eventloop.poll().await? {
            if ack.code == ConnectReturnCode::Success {
                return Ok(());
            }
            return Err(PubSubError::Refused(ack.code));
        }
    }
}

async fn wait_for_suback(eventloop: &mut EventLoop, topic: &str) -> Result<(), PubSubError> {
    loop {
        if let Event::Incoming(Packet::SubAck(ack)) = eventloop.poll().await? {
            if ack
                .return_codes
                .iter()
                .any(|code| matches!(code, SubscribeReasonCode::Failure))
            {
                return Err(PubSubError::Subscribe(topic.to_string()));
            }
            return Ok(());
        }
    }
}

impl BrokerLoop {
    /// Keep the session alive in the background and track the connected flag.
    /// The task inherits the caller's current span.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move { self.drive().await }.in_current_span())
    }

    async fn drive(mut self) {
        loop {
            match self.eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    let ok = ack.code == ConnectReturnCode::Success;
                    self.connected.store(ok, Ordering::Release);
                    if ok {
                        info!("Reconnected");
                        self.on_reconnect();
                    } else {
                        warn!(code = ?ack.code, "Broker refused reconnect");
                    }
                }
                Ok(Event::Incoming(Packet::Publish(publish)))
                    if publish.topic == self.inbound_topic =>
                {
                    on_inbound(&publish);
                }
                Ok(_) => {}
                Err(e) => {
                    if self.connected.swap(false, Ordering::AcqRel) {
                        warn!(error = %e, "Broker connection lost");
                    } else {
                        debug!(error = %e, "Broker still unreachable");
                    }
                    tokio::time::sleep(RECONNECT_DELAY).await;
                }
            }
        }
    }

    /// Clean sessions drop subscriptions; restore ours and re-announce.
    fn on_reconnect(&self) {
        if let Err(e) = self.client.try_subscribe(&self.inbound_topic, QoS::AtMostOnce) {
            warn!(topic = %self.inbound_topic, error = %e, "Resubscribe failed");
        }
        match StatusEvent::entered().to_payload() {
            Ok(payload) => {
                if let Err(e) =
                    self.client
                        .try_publish(&self.topic, QoS::AtMostOnce, false, payload)
                {
                    debug!(error = %e, "Re-announce dropped");
                }
            }
            Err(e) => warn!(error = %e, "Failed to encode status event"),
        }
    }
}

/// Inbound topic is reserved; messages are acknowledged by reading them and
/// nothing else.
fn on_inbound(publish: &Publish) {
    trace!(topic = %publish.topic, bytes = publish.payload.len(), "Inbound message ignored");
}
