//! Sans-IO chat session state machine.
//!
//! Consumes parsed inbound messages and produces actions (lines to send,
//! events to relay). No sockets, no timers: the connection driver in
//! [`super::connection`] does the I/O.

use tracing::{debug, info, warn};

use super::event::{EventKind, is_channel_name};
use crate::config::IrcConfig;
use crate::proto::Message;
use crate::relay::{RelayEvent, StatusEvent};

/// Text NickServ sends once IDENTIFY succeeds.
pub const IDENTIFIED_MARKER: &str = "You are now identified";

/// Who we are on the network. Fixed for the lifetime of the process.
#[derive(Clone)]
pub struct Identity {
    pub nickname: String,
    /// NickServ password.
    pub secret: Option<String>,
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("nickname", &self.nickname)
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Output of the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatAction {
    /// Write this line to the server.
    Send(Message),
    /// Hand this event to the relay sink.
    Relay(RelayEvent),
    /// Publish a bot lifecycle notice.
    Announce(StatusEvent),
}

/// Handshake and classification state for one connection.
#[derive(Debug, Clone)]
pub struct ChatSession {
    identity: Identity,
    channel: String,
    logged_in: bool,
}

impl ChatSession {
    pub fn new(identity: Identity, channel: impl Into<String>) -> Self {
        Self {
            identity,
            channel: channel.into(),
            logged_in: false,
        }
    }

    pub fn from_config(config: &IrcConfig) -> Self {
        Self::new(
            Identity {
                nickname: config.nickname.clone(),
                secret: config.password.clone(),
            },
            config.channel.clone(),
        )
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn logged_in(&self) -> bool {
        self.logged_in
    }

    /// Connection registration lines (`NICK`, `USER`).
    pub fn registration(&self) -> Vec<ChatAction> {
        let nick = &self.identity.nickname;
        vec![
            ChatAction::Send(Message::nick(nick)),
            ChatAction::Send(Message::user(nick, nick)),
        ]
    }

    /// Identify with services, or mark ourselves logged in when there is no
    /// secret to identify with.
    pub fn login(&mut self) -> Vec<ChatAction> {
        match &self.identity.secret {
            Some(secret) => {
                debug!(nick = %self.identity.nickname, "Identifying with NickServ");
                vec![ChatAction::Send(Message::nickserv_identify(
                    &self.identity.nickname,
                    secret,
                ))]
            }
            None => {
                self.logged_in = true;
                Vec::new()
            }
        }
    }

    /// Join `channel`, identifying first if a secret is configured and we
    /// have not been confirmed yet. In that case no JOIN is sent; the
    /// confirmation notice re-drives the join.
    pub fn join_channel(&mut self, channel: &str) -> Vec<ChatAction> {
        if !self.logged_in {
            let actions = self.login();
            if !self.logged_in {
                return actions;
            }
        }
        info!(channel = %channel, "Joining channel");
        vec![ChatAction::Send(Message::join(channel))]
    }

    /// Feed one inbound message.
    pub fn handle(&mut self, msg: &Message) -> Vec<ChatAction> {
        match EventKind::classify(&msg.command) {
            EventKind::Welcome => {
                info!(nick = %self.identity.nickname, "Registered with server");
                let text = msg.params.last().map(String::as_str).unwrap_or_default();
                let mut actions = vec![ChatAction::Announce(StatusEvent::registered(text))];
                let channel = self.channel.clone();
                actions.extend(self.join_channel(&channel));
                actions
            }
            EventKind::Motd => {
                if let Some(line) = msg.param(1) {
                    info!(target: "ircmq_relay::motd", "MOTD: {line}");
                }
                Vec::new()
            }
            EventKind::UserReport => {
                if let Some(report) = msg.param(1) {
                    info!("{report}");
                }
                Vec::new()
            }
            EventKind::NickInUse => self.on_nick_in_use(msg),
            EventKind::Informational => Vec::new(),
            EventKind::Notice => self.on_notice(msg),
            EventKind::Privmsg => self.on_privmsg(msg),
            EventKind::Join => {
                if let (Some(who), Some(channel)) = (msg.source_nickname(), msg.param(0)) {
                    info!(nick = %who, channel = %channel, "JOIN");
                }
                Vec::new()
            }
            EventKind::Ping => {
                let token = msg.params.last().map(String::as_str).unwrap_or_default();
                vec![ChatAction::Send(Message::pong(token))]
            }
            EventKind::Error => {
                let text = msg.params.last().map(String::as_str).unwrap_or_default();
                warn!("Server error: {text}");
                vec![ChatAction::Announce(StatusEvent::error(text))]
            }
            EventKind::Unknown => {
                debug!(command = %msg.command, params = ?msg.params, "Unhandled event");
                Vec::new()
            }
        }
    }

    /// Retry registration with `<nick>_`. The new nickname sticks, so a later
    /// IDENTIFY names the account we actually hold.
    fn on_nick_in_use(&mut self, msg: &Message) -> Vec<ChatAction> {
        let taken = msg.param(1).unwrap_or(self.identity.nickname.as_str()).to_string();
        self.identity.nickname.push('_');
        warn!(taken = %taken, next = %self.identity.nickname, "Nickname unavailable, retrying");
        vec![ChatAction::Send(Message::nick(&self.identity.nickname))]
    }

    fn on_notice(&mut self, msg: &Message) -> Vec<ChatAction> {
        let Some(text) = msg.params.last().filter(|_| msg.params.len() >= 2) else {
            return Vec::new();
        };
        info!("NOTICE: {text}");

        if !text.contains(IDENTIFIED_MARKER) || self.logged_in {
            return Vec::new();
        }

        info!(nick = %self.identity.nickname, "Identified with NickServ");
        self.logged_in = true;
        let channel = self.channel.clone();
        self.join_channel(&channel)
    }

    fn on_privmsg(&self, msg: &Message) -> Vec<ChatAction> {
        if msg.params.len() < 2 {
            return Vec::new();
        }
        let (target, text) = (&msg.params[0], &msg.params[1]);
        if !is_channel_name(target) {
            debug!(from = ?msg.source_nickname(), "PM: {text}");
            return Vec::new();
        }
        if !target.eq_ignore_ascii_case(&self.channel) {
            return Vec::new();
        }
        let Some(from) = msg.source_user().or_else(|| msg.source_nickname()) else {
            return Vec::new();
        };

        let event = RelayEvent::message(from, target, text);
        info!(channel = %event.to, from = %event.from, "{}", event.message);
        vec![ChatAction::Relay(event)]
    }
}
