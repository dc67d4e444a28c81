//! Configuration loading and management
//!
//! # Hierarchy
//!
//! Configuration is loaded in this order (later overrides earlier):
//! 1. Built-in defaults
//! 2. Config file (TOML), when one is given
//! 3. Environment variables: `DISPATCH_*`
//! 4. CLI flags (applied by the binary)
//!
//! # Example Config
//!
//! ```toml
//! [server]
//! bind = "0.0.0.0"
//! port = 8082
//!
//! [broker]
//! inbound_topics = ["resources-topic-2"]
//! poll_timeout_ms = 500
//!
//! [engine]
//! report_topic = "functionalities"
//! ```

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

// ═══════════════════════════════════════════════════════════════════════════
// CONFIGURATION STRUCTURES
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DispatchConfig {
    pub server: ServerConfig,
    pub broker: BrokerConfig,
    pub engine: EngineConfig,
}

/// HTTP API listener.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: IpAddr,
    pub port: u16,
}

/// Message bus settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BrokerConfig {
    /// Topics the dispatcher consumes resource and custom messages from.
    pub inbound_topics: Vec<String>,
    /// Upper bound on a single poll of one topic.
    pub poll_timeout_ms: u64,
    /// Maximum envelopes returned by one poll.
    pub max_batch: usize,
    /// Cap on the wait an HTTP client may request when polling a topic.
    pub max_http_poll_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    /// Topic receiving allocation reports after a rebalance.
    pub report_topic: String,
}

// ═══════════════════════════════════════════════════════════════════════════
// DEFAULT IMPLEMENTATIONS
// ═══════════════════════════════════════════════════════════════════════════

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 8081,
        }
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            inbound_topics: vec!["resources-topic-1".to_string()],
            poll_timeout_ms: 1000,
            max_batch: 500,
            max_http_poll_ms: 60_000,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            report_topic: "functionalities".to_string(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// PUBLIC API
// ═══════════════════════════════════════════════════════════════════════════

impl DispatchConfig {
    /// Load configuration from defaults, an optional file, and the process environment.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The config file cannot be read or is malformed TOML
    /// - An environment override cannot be parsed
    /// - The resulting values fail validation
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML config file. Missing sections keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or is malformed TOML.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::config_read_failed(path, e.to_string()))?;
        Self::from_toml(&content)
    }

    /// Parse TOML text.
    ///
    /// # Errors
    ///
    /// Returns error if the text is malformed TOML.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(Error::from)
    }

    /// Apply `DISPATCH_*` overrides using the given variable lookup.
    ///
    /// # Errors
    ///
    /// Returns error if a variable is set to an unparsable value.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("DISPATCH_BIND") {
            self.server.bind = value
                .parse()
                .map_err(|e| Error::invalid_config(format!("Invalid DISPATCH_BIND value: {e}")))?;
        }

        if let Some(value) = lookup("DISPATCH_PORT") {
            self.server.port = value
                .parse()
                .map_err(|e| Error::invalid_config(format!("Invalid DISPATCH_PORT value: {e}")))?;
        }

        if let Some(value) = lookup("DISPATCH_TOPICS") {
            self.broker.inbound_topics = value
                .split(',')
                .map(str::trim)
                .filter(|topic| !topic.is_empty())
                .map(String::from)
                .collect();
        }

        if let Some(value) = lookup("DISPATCH_POLL_TIMEOUT_MS") {
            self.broker.poll_timeout_ms = value.parse().map_err(|e| {
                Error::invalid_config(format!("Invalid DISPATCH_POLL_TIMEOUT_MS value: {e}"))
            })?;
        }

        if let Some(value) = lookup("DISPATCH_REPORT_TOPIC") {
            self.engine.report_topic = value;
        }

        Ok(())
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns error if a value is out of range.
    pub fn validate(&self) -> Result<()> {
        if self.broker.inbound_topics.is_empty() {
            return Err(Error::invalid_config("at least one inbound topic is required"));
        }
        if self.broker.inbound_topics.iter().any(String::is_empty) {
            return Err(Error::invalid_config("inbound topic names must not be empty"));
        }
        if self.broker.poll_timeout_ms == 0 {
            return Err(Error::invalid_config("poll_timeout_ms must be greater than 0"));
        }
        if self.broker.max_batch == 0 {
            return Err(Error::invalid_config("max_batch must be greater than 0"));
        }
        if self.engine.report_topic.is_empty() {
            return Err(Error::invalid_config("report_topic must not be empty"));
        }
        Ok(())
    }

    /// Socket address the HTTP API listens on.
    pub const fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.server.bind, self.server.port)
    }
}

impl BrokerConfig {
    pub const fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    pub const fn max_http_poll(&self) -> Duration {
        Duration::from_millis(self.max_http_poll_ms)
    }
}
