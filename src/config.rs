//! Configuration loading and management.
//!
//! The relay is configured through environment variables (`irc_server`,
//! `mqtt_topic`, ...). A TOML file using the same keys may be passed on the
//! command line instead; environment variables fill whatever the file omits.

use rand::Rng;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

/// Fixed MQTT broker port (plain TCP).
pub const MQTT_PORT: u16 = 1883;

/// Suffix appended to the outbound topic to form the inbound one.
pub const INBOUND_TOPIC_SUFFIX: &str = "_msg";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required settings: {}", .0.join(", "))]
    Missing(Vec<&'static str>),
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Raw settings as they appear in the environment or a config file.
///
/// Every field is optional here; [`Settings::validate`] decides what is
/// required.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    pub irc_server: Option<String>,
    pub irc_channel: Option<String>,
    pub irc_nickname: Option<String>,
    pub irc_password: Option<String>,
    pub mqtt_server: Option<String>,
    pub mqtt_topic: Option<String>,
    pub mqtt_user: Option<String>,
    pub mqtt_pass: Option<String>,
}

impl Settings {
    /// Read every key through `lookup`. Empty values count as unset.
    pub fn from_lookup<F>(mut lookup: F) -> Self
    where
        F: FnMut(&str) -> Option<String>,
    {
        let mut get = |key: &str| lookup(key).filter(|v| !v.is_empty());
        Self {
            irc_server: get("irc_server"),
            irc_channel: get("irc_channel"),
            irc_nickname: get("irc_nickname"),
            irc_password: get("irc_password"),
            mqtt_server: get("mqtt_server"),
            mqtt_topic: get("mqtt_topic"),
            mqtt_user: get("mqtt_user"),
            mqtt_pass: get("mqtt_pass"),
        }
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load a TOML file with the same keys as the environment.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let settings: Settings = toml::from_str(&content)?;
        Ok(settings.without_empty())
    }

    /// Fill unset fields from `other`.
    pub fn or(self, other: Settings) -> Self {
        Self {
            irc_server: self.irc_server.or(other.irc_server),
            irc_channel: self.irc_channel.or(other.irc_channel),
            irc_nickname: self.irc_nickname.or(other.irc_nickname),
            irc_password: self.irc_password.or(other.irc_password),
            mqtt_server: self.mqtt_server.or(other.mqtt_server),
            mqtt_topic: self.mqtt_topic.or(other.mqtt_topic),
            mqtt_user: self.mqtt_user.or(other.mqtt_user),
            mqtt_pass: self.mqtt_pass.or(other.mqtt_pass),
        }
    }

    fn without_empty(self) -> Self {
        let keep = |v: Option<String>| v.filter(|s| !s.is_empty());
        Self {
            irc_server: keep(self.irc_server),
            irc_channel: keep(self.irc_channel),
            irc_nickname: keep(self.irc_nickname),
            irc_password: keep(self.irc_password),
            mqtt_server: keep(self.mqtt_server),
            mqtt_topic: keep(self.mqtt_topic),
            mqtt_user: keep(self.mqtt_user),
            mqtt_pass: keep(self.mqtt_pass),
        }
    }

    /// Check required keys and resolve defaults.
    ///
    /// Reports every missing key at once rather than the first one found.
    pub fn validate(self) -> Result<Config, ConfigError> {
        let mut missing = Vec::new();
        if self.irc_server.is_none() {
            missing.push("irc_server");
        }
        if self.irc_channel.is_none() {
            missing.push("irc_channel");
        }
        if self.mqtt_server.is_none() {
            missing.push("mqtt_server");
        }
        if self.mqtt_topic.is_none() {
            missing.push("mqtt_topic");
        }

        let (Some(server), Some(channel), Some(broker_host), Some(topic)) = (
            self.irc_server,
            self.irc_channel,
            self.mqtt_server,
            self.mqtt_topic,
        ) else {
            return Err(ConfigError::Missing(missing));
        };

        let nickname = self.irc_nickname.unwrap_or_else(generate_nickname);
        let credentials = self.mqtt_user.map(|username| Credentials {
            username,
            password: self.mqtt_pass.unwrap_or_default(),
        });

        Ok(Config {
            irc: IrcConfig {
                server,
                channel,
                nickname,
                password: self.irc_password,
            },
            mqtt: MqttConfig {
                host: broker_host,
                port: MQTT_PORT,
                topic,
                credentials,
            },
        })
    }
}

/// `redbot-<0..99>`
pub fn generate_nickname() -> String {
    let n: u32 = rand::thread_rng().gen_range(0..100);
    format!("redbot-{n}")
}

/// Validated relay configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub irc: IrcConfig,
    pub mqtt: MqttConfig,
}

/// IRC side.
#[derive(Debug, Clone)]
pub struct IrcConfig {
    /// `host:port`
    pub server: String,
    pub channel: String,
    pub nickname: String,
    /// NickServ password; enables identify-then-join.
    pub password: Option<String>,
}

/// MQTT side.
#[derive(Debug, Clone)]
pub struct MqttConfig {
    pub host: String,
    /// Always [`MQTT_PORT`] from configuration.
    pub port: u16,
    /// Outbound topic.
    pub topic: String,
    pub credentials: Option<Credentials>,
}

#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl MqttConfig {
    /// Reserved inbound topic, `<topic>_msg`.
    pub fn inbound_topic(&self) -> String {
        format!("{}{}", self.topic, INBOUND_TOPIC_SUFFIX)
    }

    pub fn broker_url(&self) -> String {
        format!("tcp://{}:{}", self.host, self.port)
    }
}

impl Config {
    /// Load from an optional TOML file, then the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let env = Settings::from_env();
        let settings = match path {
            Some(path) => Settings::load(path)?.or(env),
            None => env,
        };
        settings.validate()
    }
}
