//! IRC transport driver.
//!
//! Owns the TCP stream, splits it into a framed reader (driven by
//! [`ChatConnection::run`]) and a writer task fed through a bounded queue.
//! [`ChatHandle`] is the cloneable side other tasks use to send lines, quit,
//! and close the transport.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::event::EventKind;
use super::session::{ChatAction, ChatSession};
use crate::error::ChatError;
use crate::metrics;
use crate::proto::{IrcCodec, Message};
use crate::relay::RelaySink;

/// Outbound lines buffered ahead of the socket.
const OUTBOUND_QUEUE_SIZE: usize = 64;

/// Cloneable control side of a chat connection.
#[derive(Clone, Debug)]
pub struct ChatHandle {
    tx: mpsc::Sender<Message>,
    quitting: Arc<AtomicBool>,
    closed: CancellationToken,
}

impl ChatHandle {
    /// Queue a line for the writer task.
    pub async fn send(&self, msg: Message) -> Result<(), ChatError> {
        self.tx.send(msg).await.map_err(|_| ChatError::WriterGone)
    }

    /// Queue `QUIT :<farewell>` and stop relaying.
    ///
    /// The transport stays open; call [`ChatHandle::close`] once in-flight
    /// lines have had time to drain.
    pub async fn quit(&self, farewell: &str) -> Result<(), ChatError> {
        self.quitting.store(true, Ordering::Release);
        info!(reason = %farewell, "Sending QUIT");
        self.send(Message::quit(farewell)).await
    }

    pub fn is_quitting(&self) -> bool {
        self.quitting.load(Ordering::Acquire)
    }

    /// Tear down the transport. Unblocks the read loop and stops the writer.
    pub fn close(&self) {
        self.closed.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }
}

/// A live IRC connection.
#[derive(Debug)]
pub struct ChatConnection {
    reader: FramedRead<OwnedReadHalf, IrcCodec>,
    handle: ChatHandle,
}

impl ChatConnection {
    /// Open the transport. No retry: the caller treats failure as fatal.
    pub async fn connect(address: &str) -> Result<Self, ChatError> {
        let stream = TcpStream::connect(address)
            .await
            .map_err(|source| ChatError::Connect {
                address: address.to_string(),
                source,
            })?;
        if let Err(e) = stream.set_nodelay(true) {
            debug!(error = %e, "Failed to set TCP_NODELAY");
        }
        info!(server = %address, "Connected to IRC server");
        Ok(Self::from_stream(stream))
    }

    fn from_stream(stream: TcpStream) -> Self {
        let (read_half, write_half) = stream.into_split();
        let (tx, rx) = mpsc::channel(OUTBOUND_QUEUE_SIZE);
        let closed = CancellationToken::new();

        tokio::spawn(write_loop(
            FramedWrite::new(write_half, IrcCodec::new()),
            rx,
            closed.clone(),
        ));

        Self {
            reader: FramedRead::new(read_half, IrcCodec::new()),
            handle: ChatHandle {
                tx,
                quitting: Arc::new(AtomicBool::new(false)),
                closed,
            },
        }
    }

    pub fn handle(&self) -> ChatHandle {
        self.handle.clone()
    }

    /// Register, then read and dispatch until the transport ends.
    ///
    /// Returns `Ok(())` when the connection was closed on purpose (via
    /// [`ChatHandle::close`], or the server hanging up after our QUIT), and an
    /// error for any other end of stream.
    pub async fn run(
        mut self,
        mut session: ChatSession,
        sink: &dyn RelaySink,
    ) -> Result<(), ChatError> {
        for action in session.registration() {
            self.apply(action, sink).await?;
        }

        loop {
            let next = tokio::select! {
                _ = self.handle.closed.cancelled() => {
                    debug!("Read loop cancelled");
                    return Ok(());
                }
                next = self.reader.next() => next,
            };

            let msg = match next {
                Some(Ok(msg)) => msg,
                Some(Err(e)) => {
                    if self.handle.is_quitting() {
                        return Ok(());
                    }
                    return Err(e.into());
                }
                None if self.handle.is_quitting() => return Ok(()),
                None => return Err(ChatError::Closed),
            };

            metrics::record_irc_event(EventKind::classify(&msg.command).as_str());
            for action in session.handle(&msg) {
                match self.apply(action, sink).await {
                    Ok(()) => {}
                    Err(ChatError::WriterGone) if self.handle.is_quitting() => return Ok(()),
                    Err(e) => return Err(e),
                }
            }
        }
    }

    async fn apply(&self, action: ChatAction, sink: &dyn RelaySink) -> Result<(), ChatError> {
        match action {
            ChatAction::Send(msg) => self.handle.send(msg).await,
            ChatAction::Relay(event) => {
                if self.handle.is_quitting() {
                    debug!(channel = %event.to, "Dropping relay event after QUIT");
                } else {
                    sink.publish(&event);
                }
                Ok(())
            }
            ChatAction::Announce(status) => {
                if self.handle.is_quitting() {
                    debug!(kind = status.kind, "Dropping status event after QUIT");
                } else {
                    sink.announce(&status);
                }
                Ok(())
            }
        }
    }
}

async fn write_loop(
    mut sink: FramedWrite<OwnedWriteHalf, IrcCodec>,
    mut rx: mpsc::Receiver<Message>,
    closed: CancellationToken,
) {
    loop {
        let msg = tokio::select! {
            _ = closed.cancelled() => break,
            msg = rx.recv() => match msg {
                Some(msg) => msg,
                None => break,
            },
        };

        // Only the command word: IDENTIFY lines carry the password.
        debug!(command = %msg.command, "-> IRC");
        if let Err(e) = sink.send(msg).await {
            warn!(error = %e, "IRC write failed");
            break;
        }
    }

    if let Err(e) = sink.close().await {
        debug!(error = %e, "Error closing IRC transport");
    }
    info!("IRC transport closed");
}
