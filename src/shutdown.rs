//! Signal-triggered graceful shutdown.
//!
//! On SIGINT/SIGTERM/SIGABRT: queue a farewell QUIT, give the writer a grace
//! period to drain it, close the IRC transport (which ends the read loop),
//! then fire a one-shot completion signal.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::{info, warn};

use crate::context::RelayContext;

pub const FAREWELL: &str = "Farewell my friends";

/// Time between QUIT and closing the transport.
pub const GRACE_PERIOD: Duration = Duration::from_secs(5);

#[cfg(unix)]
const SIGABRT: i32 = 6;

/// Registered OS signal streams.
pub struct ShutdownSignals {
    #[cfg(unix)]
    interrupt: tokio::signal::unix::Signal,
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
    #[cfg(unix)]
    abort: tokio::signal::unix::Signal,
}

impl ShutdownSignals {
    /// Install handlers now so a registration failure surfaces at startup.
    #[cfg(unix)]
    pub fn register() -> std::io::Result<Self> {
        use tokio::signal::unix::{SignalKind, signal};
        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
            abort: signal(SignalKind::from_raw(SIGABRT))?,
        })
    }

    #[cfg(not(unix))]
    pub fn register() -> std::io::Result<Self> {
        Ok(Self {})
    }

    /// Resolve with the name of the first signal received.
    pub async fn wait(mut self) -> &'static str {
        self.recv().await
    }

    /// Wait for the first signal and name it.
    #[cfg(unix)]
    pub async fn recv(&mut self) -> &'static str {
        tokio::select! {
            _ = self.interrupt.recv() => "SIGINT",
            _ = self.terminate.recv() => "SIGTERM",
            _ = self.abort.recv() => "SIGABRT",
        }
    }

    #[cfg(not(unix))]
    pub async fn recv(&mut self) -> &'static str {
        let _ = tokio::signal::ctrl_c().await;
        "ctrl-c"
    }
}

/// QUIT, wait `grace`, close. No-op if the chat side never came up.
pub async fn shutdown_sequence(ctx: &RelayContext, grace: Duration) {
    let Some(chat) = ctx.chat() else {
        return;
    };

    if let Err(e) = chat.quit(FAREWELL).await {
        warn!(error = %e, "Failed to queue QUIT");
    }
    tokio::time::sleep(grace).await;
    chat.close();
}

/// Spawn the shutdown task. It waits for `trigger` (normally
/// [`ShutdownSignals::wait`]), which resolves with the signal name. The
/// returned receiver completes once the shutdown sequence has finished.
pub fn spawn<F>(trigger: F, ctx: Arc<RelayContext>, grace: Duration) -> oneshot::Receiver<()>
where
    F: Future<Output = &'static str> + Send + 'static,
{
    let (done_tx, done_rx) = oneshot::channel();
    tokio::spawn(async move {
        let name = trigger.await;
        warn!(signal = name, "Received signal");
        shutdown_sequence(&ctx, grace).await;
        info!("Shutdown complete");
        let _ = done_tx.send(());
    });
    done_rx
}

/// Wait for the shutdown task to report completion. Returns `false` if the
/// task went away without reporting, which only happens if it panicked.
pub async fn completed(done: oneshot::Receiver<()>) -> bool {
    match done.await {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "Shutdown task ended without signalling completion");
            false
        }
    }
}
