//! HTTP listener for liveness probes and Prometheus scraping.
//!
//! Runs on its own tokio task. `/` and `/health` answer `200 OK` while both
//! connections are up and `503` otherwise; `/metrics` serves Prometheus text.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Router, extract::State, http::StatusCode, routing::get};

use crate::context::RelayContext;

/// Fixed liveness port.
pub const HEALTH_PORT: u16 = 8000;

async fn health_handler(State(ctx): State<Arc<RelayContext>>) -> (StatusCode, &'static str) {
    let up = ctx.is_live();
    crate::metrics::set_up(up);
    if up {
        (StatusCode::OK, "OK")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "DOWN")
    }
}

async fn metrics_handler() -> String {
    crate::metrics::gather_metrics()
}

pub fn router(ctx: Arc<RelayContext>) -> Router {
    Router::new()
        .route("/", get(health_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(ctx)
}

/// Run the liveness listener on `0.0.0.0:port`.
///
/// Long-running; spawn it. A bind failure is logged and the task ends
/// without affecting the relay.
pub async fn run_http_server(port: u16, ctx: Arc<RelayContext>) {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Error starting healthcheck on {}: {}", addr, e);
            return;
        }
    };
    tracing::info!("Healthcheck listening on {}", addr);

    if let Err(e) = axum::serve(listener, router(ctx)).await {
        tracing::error!("Healthcheck server error: {}", e);
    }
}
