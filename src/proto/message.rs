//! Owned IRC message type and its nom parser.
//!
//! Only the subset a client-side relay needs: tags are skipped, the prefix is
//! split into nick/user/host, and parameters are kept as raw strings so the
//! event table can dispatch on the command text.

use std::fmt;
use std::str::FromStr;

use nom::{
    IResult,
    bytes::complete::{take_until, take_while1},
    character::complete::{char, space0},
    combinator::opt,
    error::ErrorKind,
    sequence::preceded,
};

use crate::error::ProtocolError;

/// RFC 2812: at most 15 parameters.
const MAX_PARAMS: usize = 15;

/// Message source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prefix {
    /// `irc.example.net`
    ServerName(String),
    /// `nick!user@host`; user and host may be empty.
    Nickname(String, String, String),
}

impl Prefix {
    /// Split a raw prefix. Anything without `!`/`@` and with a dot is a server.
    pub fn parse(raw: &str) -> Self {
        let (nick_user, host) = match raw.split_once('@') {
            Some((left, host)) => (left, host),
            None => (raw, ""),
        };
        let (nick, user) = match nick_user.split_once('!') {
            Some((nick, user)) => (nick, user),
            None => (nick_user, ""),
        };

        if user.is_empty() && host.is_empty() && nick.contains('.') {
            Prefix::ServerName(raw.to_string())
        } else {
            Prefix::Nickname(nick.to_string(), user.to_string(), host.to_string())
        }
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Prefix::ServerName(name) => f.write_str(name),
            Prefix::Nickname(nick, user, host) => {
                f.write_str(nick)?;
                if !user.is_empty() {
                    write!(f, "!{user}")?;
                }
                if !host.is_empty() {
                    write!(f, "@{host}")?;
                }
                Ok(())
            }
        }
    }
}

/// A single IRC protocol line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub prefix: Option<Prefix>,
    /// Command word (uppercased) or three-digit numeric.
    pub command: String,
    pub params: Vec<String>,
}

impl Message {
    /// Build an outbound message with no prefix.
    pub fn new(command: &str, params: Vec<String>) -> Self {
        Self {
            prefix: None,
            command: command.to_string(),
            params,
        }
    }

    pub fn nick(nickname: &str) -> Self {
        Self::new("NICK", vec![nickname.to_string()])
    }

    /// `USER <user> 0 * :<realname>`
    pub fn user(username: &str, realname: &str) -> Self {
        Self::new(
            "USER",
            vec![
                username.to_string(),
                "0".to_string(),
                "*".to_string(),
                realname.to_string(),
            ],
        )
    }

    pub fn join(channel: &str) -> Self {
        Self::new("JOIN", vec![channel.to_string()])
    }

    pub fn pong(token: &str) -> Self {
        Self::new("PONG", vec![token.to_string()])
    }

    pub fn quit(reason: &str) -> Self {
        Self::new("QUIT", vec![reason.to_string()])
    }

    /// Services alias: `NICKSERV IDENTIFY <account> <password>`.
    ///
    /// Sent as plain middle parameters so the line reads exactly as a user
    /// would type it.
    pub fn nickserv_identify(account: &str, password: &str) -> Self {
        Self::new(
            "NICKSERV",
            vec![
                "IDENTIFY".to_string(),
                account.to_string(),
                password.to_string(),
            ],
        )
    }

    /// Nickname of the sender, if the prefix names a user.
    pub fn source_nickname(&self) -> Option<&str> {
        match &self.prefix {
            Some(Prefix::Nickname(nick, _, _)) => Some(nick),
            _ => None,
        }
    }

    /// Ident part of a `nick!user@host` prefix.
    pub fn source_user(&self) -> Option<&str> {
        match &self.prefix {
            Some(Prefix::Nickname(_, user, _)) if !user.is_empty() => Some(user),
            _ => None,
        }
    }

    pub fn param(&self, index: usize) -> Option<&str> {
        self.params.get(index).map(String::as_str)
    }

    /// Parse one line (without requiring the trailing CRLF).
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        let trimmed = line.trim_end_matches(['\r', '\n']);
        match parse_line(trimmed) {
            Ok((_, parsed)) => Ok(parsed),
            Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
                Err(ProtocolError::InvalidMessage {
                    string: trimmed.to_string(),
                    cause: format!(
                        "{:?} at position {}",
                        e.code,
                        trimmed.len() - e.input.len()
                    ),
                })
            }
            Err(nom::Err::Incomplete(_)) => Err(ProtocolError::InvalidMessage {
                string: trimmed.to_string(),
                cause: "incomplete".to_string(),
            }),
        }
    }
}

impl FromStr for Message {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Message::parse(s)
    }
}

impl fmt::Display for Message {
    /// Serializes without the line terminator; the codec appends CRLF.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(prefix) = &self.prefix {
            write!(f, ":{prefix} ")?;
        }
        f.write_str(&self.command)?;

        let last = self.params.len().saturating_sub(1);
        for (i, param) in self.params.iter().enumerate() {
            let needs_colon = param.is_empty() || param.contains(' ') || param.starts_with(':');
            if i == last && needs_colon {
                write!(f, " :{param}")?;
            } else {
                write!(f, " {param}")?;
            }
        }
        Ok(())
    }
}

fn parse_tags(input: &str) -> IResult<&str, &str> {
    preceded(char('@'), take_until(" "))(input)
}

fn parse_prefix(input: &str) -> IResult<&str, &str> {
    preceded(char(':'), take_while1(|c| c != ' '))(input)
}

/// RFC 2812: `command = 1*letter / 3digit`.
fn parse_command(input: &str) -> IResult<&str, &str> {
    let (rest, cmd) = take_while1(|c: char| c.is_ascii_alphanumeric())(input)?;

    let is_all_letters = cmd.chars().all(|c| c.is_ascii_alphabetic());
    let is_three_digits = cmd.len() == 3 && cmd.chars().all(|c| c.is_ascii_digit());

    if is_all_letters || is_three_digits {
        Ok((rest, cmd))
    } else {
        Err(nom::Err::Error(nom::error::Error::new(
            input,
            ErrorKind::AlphaNumeric,
        )))
    }
}

fn parse_params(input: &str) -> (&str, Vec<&str>) {
    let mut params = Vec::new();
    let mut rest = input;

    while rest.starts_with(' ') {
        if params.len() >= MAX_PARAMS {
            break;
        }
        rest = rest.trim_start_matches(' ');
        if rest.is_empty() {
            break;
        }

        if let Some(trailing) = rest.strip_prefix(':') {
            params.push(trailing);
            rest = "";
            break;
        }

        let end = rest.find(' ').unwrap_or(rest.len());
        params.push(&rest[..end]);
        rest = &rest[end..];
    }

    (rest, params)
}

fn parse_line(input: &str) -> IResult<&str, Message> {
    let (input, _) = opt(parse_tags)(input)?;
    let (input, _) = space0(input)?;
    let (input, prefix) = opt(parse_prefix)(input)?;
    let (input, _) = space0(input)?;
    let (input, command) = parse_command(input)?;
    let (rest, params) = parse_params(input);

    Ok((
        rest,
        Message {
            prefix: prefix.map(Prefix::parse),
            command: command.to_ascii_uppercase(),
            params: params.into_iter().map(str::to_string).collect(),
        },
    ))
}
