//! Minimal MQTT 3.1.1 broker.
//!
//! Accepts one client, answers CONNECT, SUBSCRIBE and PINGREQ, and records
//! every packet it reads so tests can assert on what the relay sent.

#![allow(dead_code)]

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// A packet the broker received, decoded just enough to assert on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Received {
    Connect {
        client_id: String,
        keep_alive: u16,
        clean_session: bool,
        username: Option<String>,
        password: Option<String>,
    },
    Subscribe {
        topics: Vec<(String, u8)>,
    },
    Publish {
        topic: String,
        qos: u8,
        retain: bool,
        payload: Vec<u8>,
    },
    PingReq,
    Disconnect,
    Other(u8),
}

/// Reply codes the broker uses. Zero means success for both.
#[derive(Debug, Clone, Copy, Default)]
pub struct Behavior {
    pub connack_code: u8,
    pub suback_code: u8,
}

pub struct MockBroker {
    listener: TcpListener,
    behavior: Behavior,
}

impl MockBroker {
    pub async fn bind() -> anyhow::Result<Self> {
        Self::with_behavior(Behavior::default()).await
    }

    pub async fn with_behavior(behavior: Behavior) -> anyhow::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        Ok(Self { listener, behavior })
    }

    pub fn port(&self) -> u16 {
        self.listener.local_addr().map(|a| a.port()).unwrap_or_default()
    }

    /// Serve the first client in the background.
    pub fn spawn(self) -> BrokerLog {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            if let Ok((stream, _)) = self.listener.accept().await {
                let _ = serve(stream, self.behavior, tx).await;
            }
        });
        BrokerLog { rx }
    }
}

/// Packets as the broker read them, in order.
pub struct BrokerLog {
    rx: mpsc::UnboundedReceiver<Received>,
}

impl BrokerLog {
    pub async fn next(&mut self) -> anyhow::Result<Received> {
        match timeout(RECV_TIMEOUT, self.rx.recv()).await? {
            Some(packet) => Ok(packet),
            None => anyhow::bail!("client disconnected"),
        }
    }

    /// Next packet that is not a keep-alive.
    pub async fn next_significant(&mut self) -> anyhow::Result<Received> {
        loop {
            let packet = self.next().await?;
            if packet != Received::PingReq {
                return Ok(packet);
            }
        }
    }

    /// Next PUBLISH, skipping everything else.
    pub async fn next_publish(&mut self) -> anyhow::Result<Received> {
        loop {
            let packet = self.next().await?;
            if matches!(packet, Received::Publish { .. }) {
                return Ok(packet);
            }
        }
    }
}

async fn serve(
    mut stream: TcpStream,
    behavior: Behavior,
    log: mpsc::UnboundedSender<Received>,
) -> anyhow::Result<()> {
    while let Some((header, body)) = read_packet(&mut stream).await? {
        let received = match header >> 4 {
            1 => {
                stream.write_all(&[0x20, 0x02, 0x00, behavior.connack_code]).await?;
                decode_connect(&body)?
            }
            3 => decode_publish(header, &body)?,
            8 => {
                let (packet_id, topics) = decode_subscribe(&body)?;
                let mut reply = vec![0x90, 2 + topics.len() as u8];
                reply.extend_from_slice(&packet_id.to_be_bytes());
                reply.extend(topics.iter().map(|_| behavior.suback_code));
                stream.write_all(&reply).await?;
                Received::Subscribe { topics }
            }
            12 => {
                stream.write_all(&[0xD0, 0x00]).await?;
                Received::PingReq
            }
            14 => Received::Disconnect,
            other => Received::Other(other),
        };
        if log.send(received).is_err() {
            break;
        }
    }
    Ok(())
}

async fn read_packet(stream: &mut TcpStream) -> anyhow::Result<Option<(u8, Vec<u8>)>> {
    let mut header = [0u8; 1];
    if stream.read_exact(&mut header).await.is_err() {
        return Ok(None);
    }

    let mut len = 0usize;
    let mut shift = 0;
    loop {
        let byte = stream.read_u8().await?;
        len |= usize::from(byte & 0x7F) << shift;
        if byte & 0x80 == 0 {
            break;
        }
        shift += 7;
        anyhow::ensure!(shift <= 21, "malformed remaining length");
    }

    let mut body = vec![0u8; len];
    stream.read_exact(&mut body).await?;
    Ok(Some((header[0], body)))
}

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn u8(&mut self) -> anyhow::Result<u8> {
        let byte = *self
            .buf
            .get(self.pos)
            .ok_or_else(|| anyhow::anyhow!("short packet"))?;
        self.pos += 1;
        Ok(byte)
    }

    fn u16(&mut self) -> anyhow::Result<u16> {
        Ok(u16::from_be_bytes([self.u8()?, self.u8()?]))
    }

    fn bytes(&mut self) -> anyhow::Result<&'a [u8]> {
        let len = usize::from(self.u16()?);
        let end = self.pos + len;
        anyhow::ensure!(end <= self.buf.len(), "short packet");
        let out = &self.buf[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn string(&mut self) -> anyhow::Result<String> {
        Ok(String::from_utf8(self.bytes()?.to_vec())?)
    }

    fn rest(&self) -> &'a [u8] {
        &self.buf[self.pos..]
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }
}

fn decode_connect(body: &[u8]) -> anyhow::Result<Received> {
    let mut c = Cursor::new(body);
    let protocol = c.string()?;
    anyhow::ensure!(protocol == "MQTT", "unexpected protocol {protocol}");
    let _level = c.u8()?;
    let flags = c.u8()?;
    let keep_alive = c.u16()?;
    let client_id = c.string()?;
    if flags & 0x04 != 0 {
        c.string()?;
        c.bytes()?;
    }
    let username = if flags & 0x80 != 0 { Some(c.string()?) } else { None };
    let password = if flags & 0x40 != 0 { Some(c.string()?) } else { None };
    Ok(Received::Connect {
        client_id,
        keep_alive,
        clean_session: flags & 0x02 != 0,
        username,
        password,
    })
}

fn decode_subscribe(body: &[u8]) -> anyhow::Result<(u16, Vec<(String, u8)>)> {
    let mut c = Cursor::new(body);
    let packet_id = c.u16()?;
    let mut topics = Vec::new();
    while !c.is_empty() {
        let topic = c.string()?;
        let qos = c.u8()?;
        topics.push((topic, qos));
    }
    Ok((packet_id, topics))
}

fn decode_publish(header: u8, body: &[u8]) -> anyhow::Result<Received> {
    let qos = (header >> 1) & 0x03;
    let mut c = Cursor::new(body);
    let topic = c.string()?;
    if qos > 0 {
        c.u16()?;
    }
    Ok(Received::Publish {
        topic,
        qos,
        retain: header & 0x01 != 0,
        payload: c.rest().to_vec(),
    })
}
