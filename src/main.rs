//! ircmq-relay - IRC channel to MQTT topic relay.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tracing::{Instrument, error, info};

use ircmq_relay::chat::{ChatConnection, ChatSession};
use ircmq_relay::config::Config;
use ircmq_relay::context::RelayContext;
use ircmq_relay::pubsub::PubSubConnector;
use ircmq_relay::relay::RelaySink;
use ircmq_relay::shutdown::{self, ShutdownSignals};
use ircmq_relay::{http, metrics, telemetry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = Config::load(config_path.as_deref()).map_err(|e| {
        error!(error = %e, "Invalid configuration");
        e
    })?;

    info!(
        irc_server = %config.irc.server,
        irc_channel = %config.irc.channel,
        irc_nickname = %config.irc.nickname,
        identify = config.irc.password.is_some(),
        mqtt_server = %config.mqtt.broker_url(),
        mqtt_topic = %config.mqtt.topic,
        mqtt_user = config.mqtt.credentials.as_ref().map(|c| c.username.as_str()).unwrap_or("-"),
        "Starting ircmq-relay"
    );

    metrics::init();
    let ctx = Arc::new(RelayContext::new());

    // Broker first: relay events have nowhere to go without it.
    let broker_span = telemetry::broker(&config.mqtt.host, &config.mqtt.topic);
    let inbound = config.mqtt.inbound_topic();
    let (connector, events) = async {
        let (connector, mut events) = PubSubConnector::connect(&config.mqtt).await?;
        connector.subscribe(&mut events, &inbound).await?;
        Ok::<_, ircmq_relay::error::PubSubError>((connector, events))
    }
    .instrument(broker_span.clone())
    .await
    .map_err(|e| {
        error!(broker = %config.mqtt.broker_url(), error = %e, "MQTT startup failed");
        e
    })?;
    let _broker_task = broker_span.in_scope(|| events.spawn());
    connector.enter();
    ctx.set_pubsub(connector);

    let conn = ChatConnection::connect(&config.irc.server)
        .await
        .map_err(|e| {
            error!(code = e.error_code(), error = %e, "IRC startup failed");
            e
        })?;
    ctx.set_chat(conn.handle());

    tokio::spawn(http::run_http_server(http::HEALTH_PORT, Arc::clone(&ctx)));

    let signals = ShutdownSignals::register().context("failed to install signal handlers")?;
    let done = shutdown::spawn(signals.wait(), Arc::clone(&ctx), shutdown::GRACE_PERIOD);

    let sink: &dyn RelaySink = ctx
        .pubsub()
        .context("pub/sub connector missing after startup")?;
    let session = ChatSession::from_config(&config.irc);
    conn.run(session, sink)
        .instrument(telemetry::chat(&config.irc.server, &config.irc.nickname))
        .await
        .map_err(|e| {
            error!(code = e.error_code(), error = %e, "IRC connection ended");
            e
        })?;

    // The read loop only ends cleanly after a shutdown signal.
    shutdown::completed(done).await;
    info!("Exiting");
    Ok(())
}
