//! Event-code classification.
//!
//! Maps the command word or numeric of an inbound line onto the handful of
//! kinds the session reacts to. Everything the relay has no use for still gets
//! a named kind so the table documents what is deliberately ignored.

/// Classified inbound event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// `001` RPL_WELCOME
    Welcome,
    /// `375`/`372` MOTD start and body.
    Motd,
    /// `251` RPL_LUSERCLIENT
    UserReport,
    /// `433` ERR_NICKNAMEINUSE, `437` ERR_UNAVAILRESOURCE
    NickInUse,
    /// Registration burst and name-list numerics with no relay effect.
    Informational,
    Notice,
    Privmsg,
    Join,
    Ping,
    /// Server `ERROR`, usually right before it drops the link.
    Error,
    Unknown,
}

impl EventKind {
    pub fn classify(command: &str) -> Self {
        match command {
            "001" => Self::Welcome,
            "375" | "372" => Self::Motd,
            "251" => Self::UserReport,
            "433" | "437" => Self::NickInUse,
            "002" | "003" | "004" | "005" | "250" | "252" | "253" | "254" | "255" | "265"
            | "266" | "353" | "366" | "376" => Self::Informational,
            "NOTICE" => Self::Notice,
            "PRIVMSG" => Self::Privmsg,
            "JOIN" => Self::Join,
            "PING" => Self::Ping,
            "ERROR" => Self::Error,
            _ => Self::Unknown,
        }
    }

    /// Static label for metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Welcome => "welcome",
            Self::Motd => "motd",
            Self::UserReport => "user_report",
            Self::NickInUse => "nick_in_use",
            Self::Informational => "informational",
            Self::Notice => "notice",
            Self::Privmsg => "privmsg",
            Self::Join => "join",
            Self::Ping => "ping",
            Self::Error => "error",
            Self::Unknown => "unknown",
        }
    }
}

/// Channel names start with one of the RFC 2811 channel prefixes.
pub fn is_channel_name(target: &str) -> bool {
    target.starts_with(['#', '&', '+', '!'])
}
