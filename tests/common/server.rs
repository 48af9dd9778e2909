//! Scripted IRC server.
//!
//! Listens on an ephemeral localhost port. Each accepted connection becomes a
//! [`MockPeer`] the test drives line by line.

use std::time::Duration;

use ircmq_relay::proto::Message;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::TcpListener;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::time::timeout;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

pub struct MockServer {
    listener: TcpListener,
}

impl MockServer {
    pub async fn bind() -> anyhow::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        Ok(Self { listener })
    }

    /// `host:port` to hand to the relay.
    pub fn address(&self) -> String {
        self.listener
            .local_addr()
            .map(|a| a.to_string())
            .unwrap_or_default()
    }

    pub async fn accept(&self) -> anyhow::Result<MockPeer> {
        let (stream, _) = timeout(RECV_TIMEOUT, self.listener.accept()).await??;
        let (read_half, write_half) = stream.into_split();
        Ok(MockPeer {
            lines: BufReader::new(read_half).lines(),
            writer: write_half,
        })
    }
}

/// The server's end of one relay connection.
pub struct MockPeer {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl MockPeer {
    /// Send a raw line; CRLF is appended.
    pub async fn send_raw(&mut self, line: &str) -> anyhow::Result<()> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\r\n").await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Send raw bytes; CRLF is appended. For lines that are not UTF-8.
    #[allow(dead_code)]
    pub async fn send_bytes(&mut self, line: &[u8]) -> anyhow::Result<()> {
        self.writer.write_all(line).await?;
        self.writer.write_all(b"\r\n").await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Next raw line from the relay, without the line ending.
    pub async fn recv_line(&mut self) -> anyhow::Result<String> {
        match timeout(RECV_TIMEOUT, self.lines.next_line()).await?? {
            Some(line) => Ok(line.trim_end_matches('\r').to_string()),
            None => anyhow::bail!("relay closed the connection"),
        }
    }

    #[allow(dead_code)]
    pub async fn recv(&mut self) -> anyhow::Result<Message> {
        let line = self.recv_line().await?;
        line.parse::<Message>()
            .map_err(|e| anyhow::anyhow!("Parse error: {}", e))
    }

    /// Read lines until `predicate` matches; returns everything read.
    pub async fn recv_until<F>(&mut self, mut predicate: F) -> anyhow::Result<Vec<String>>
    where
        F: FnMut(&str) -> bool,
    {
        let mut seen = Vec::new();
        loop {
            let line = self.recv_line().await?;
            let done = predicate(&line);
            seen.push(line);
            if done {
                return Ok(seen);
            }
        }
    }

    /// Consume `NICK` and `USER`, then send the welcome numeric.
    pub async fn welcome(&mut self, nick: &str) -> anyhow::Result<()> {
        let registration = [self.recv_line().await?, self.recv_line().await?];
        anyhow::ensure!(
            registration[0] == format!("NICK {nick}"),
            "unexpected registration: {registration:?}"
        );
        anyhow::ensure!(
            registration[1].starts_with("USER "),
            "unexpected registration: {registration:?}"
        );
        self.send_raw(&format!(":irc.example.net 001 {nick} :Welcome to ExampleNet {nick}"))
            .await
    }

    /// Round-trip a PING so every line sent before it has been handled.
    pub async fn sync(&mut self, token: &str) -> anyhow::Result<Vec<String>> {
        self.send_raw(&format!("PING :{token}")).await?;
        let expected = format!("PONG {token}");
        self.recv_until(|line| line == expected).await
    }

    /// Wait for the relay to drop the connection.
    #[allow(dead_code)]
    pub async fn expect_eof(&mut self) -> anyhow::Result<Vec<String>> {
        let mut trailing = Vec::new();
        loop {
            match timeout(RECV_TIMEOUT, self.lines.next_line()).await? {
                Ok(Some(line)) => trailing.push(line),
                Ok(None) | Err(_) => return Ok(trailing),
            }
        }
    }
}
