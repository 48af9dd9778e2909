//! Prometheus metrics for the relay.
//!
//! - `relay_events_total` - relay events handed to the broker
//! - `relay_publish_failures_total` - publishes dropped (best effort)
//! - `irc_events_total{kind}` - inbound IRC lines by classified kind
//! - `relay_up` - 1 while the liveness check passes

use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use std::sync::{Once, OnceLock};

/// Global Prometheus registry for all metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

static INIT: Once = Once::new();

pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

/// Relay events successfully queued for publishing.
pub static RELAY_EVENTS: OnceLock<IntCounter> = OnceLock::new();

/// Relay events dropped because the publish could not be queued.
pub static PUBLISH_FAILURES: OnceLock<IntCounter> = OnceLock::new();

/// Inbound IRC lines by event kind.
pub static IRC_EVENTS: OnceLock<IntCounterVec> = OnceLock::new();

/// Last liveness result.
pub static RELAY_UP: OnceLock<IntGauge> = OnceLock::new();

/// Initialize the metrics registry. Later calls are no-ops.
pub fn init() {
    INIT.call_once(|| {
        let r = registry();

        macro_rules! register {
            ($metric:ident, $init:expr) => {
                match $init {
                    Ok(m) => {
                        if let Err(e) = r.register(Box::new(m.clone())) {
                            tracing::warn!(error = %e, concat!("Failed to register metric ", stringify!($metric)));
                        }
                        let _ = $metric.set(m);
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, concat!("Failed to create metric ", stringify!($metric)));
                    }
                }
            };
        }

        register!(RELAY_EVENTS, IntCounter::new("relay_events_total", "Relay events published"));
        register!(PUBLISH_FAILURES, IntCounter::new("relay_publish_failures_total", "Relay events dropped on publish"));
        register!(IRC_EVENTS, IntCounterVec::new(Opts::new("irc_events_total", "Inbound IRC events by kind"), &["kind"]));
        register!(RELAY_UP, IntGauge::new("relay_up", "1 if both connections are up"));
    });
}

/// Gather all metrics and encode them in Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = registry().gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode Prometheus metrics");
        return String::new();
    }
    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Prometheus metrics were not valid UTF-8");
            String::new()
        }
    }
}

#[inline]
pub fn record_relayed() {
    if let Some(c) = RELAY_EVENTS.get() {
        c.inc();
    }
}

#[inline]
pub fn record_publish_failure() {
    if let Some(c) = PUBLISH_FAILURES.get() {
        c.inc();
    }
}

pub fn publish_failures() -> u64 {
    PUBLISH_FAILURES.get().map_or(0, IntCounter::get)
}

#[inline]
pub fn record_irc_event(kind: &str) {
    if let Some(c) = IRC_EVENTS.get() {
        c.with_label_values(&[kind]).inc();
    }
}

#[inline]
pub fn set_up(up: bool) {
    if let Some(g) = RELAY_UP.get() {
        g.set(i64::from(up));
    }
}
