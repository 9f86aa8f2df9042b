//! Client and relay configuration
//!
//! Both configs have sensible defaults and can be read from `KATANA_*`
//! environment variables.

use std::net::SocketAddr;
use std::time::Duration;

use crate::error::ConfigError;

/// Live channel URL, e.g. `ws://buildmaster:8010/ws`
pub const ENV_REALTIME_SERVER: &str = "KATANA_REALTIME_SERVER";
/// Cooldown window in milliseconds
pub const ENV_RELOAD_COOLDOWN_MS: &str = "KATANA_RELOAD_COOLDOWN_MS";
/// Relay listen address
pub const ENV_RELAY_ADDR: &str = "KATANA_RELAY_ADDR";
/// Relay poll interval in seconds
pub const ENV_RELAY_POLL_SECS: &str = "KATANA_RELAY_POLL_SECS";
/// Poll failures tolerated before a URL is evicted
pub const ENV_RELAY_MAX_ERRORS: &str = "KATANA_RELAY_MAX_ERRORS";

/// Configuration for the realtime client
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RealtimeConfig {
    /// Live channel URL; `None` keeps the client snapshot-only
    pub server_url: Option<String>,
    /// Cooldown window; zero disables throttling
    pub reload_cooldown: Duration,
}

impl RealtimeConfig {
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: Some(server_url.into()),
            ..Default::default()
        }
    }

    pub fn with_reload_cooldown(mut self, cooldown: Duration) -> Self {
        self.reload_cooldown = cooldown;
        self
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let server_url = lookup(ENV_REALTIME_SERVER).filter(|url| !url.trim().is_empty());
        let reload_cooldown = match lookup(ENV_RELOAD_COOLDOWN_MS) {
            Some(raw) => Duration::from_millis(parse_number(ENV_RELOAD_COOLDOWN_MS, &raw)?),
            None => Duration::ZERO,
        };

        Ok(Self {
            server_url,
            reload_cooldown,
        })
    }
}

/// Configuration for the relay server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    pub listen_addr: SocketAddr,
    /// Minimum time between two polls of the same URL
    pub poll_interval: Duration,
    /// How often the poller wakes up to look for due URLs
    pub tick_interval: Duration,
    /// Failures after which a URL is evicted
    pub max_errors: u32,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8010)),
            poll_interval: Duration::from_secs(5),
            tick_interval: Duration::from_secs(1),
            max_errors: 5,
        }
    }
}

impl RelayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_RELAY_ADDR) {
            config.listen_addr = raw.parse().map_err(|_| invalid(ENV_RELAY_ADDR, &raw))?;
        }
        if let Some(raw) = lookup(ENV_RELAY_POLL_SECS) {
            let secs = parse_number(ENV_RELAY_POLL_SECS, &raw)?;
            if secs == 0 {
                return Err(invalid(ENV_RELAY_POLL_SECS, &raw));
            }
            config.poll_interval = Duration::from_secs(secs);
        }
        if let Some(raw) = lookup(ENV_RELAY_MAX_ERRORS) {
            config.max_errors = raw
                .trim()
                .parse()
                .map_err(|_| invalid(ENV_RELAY_MAX_ERRORS, &raw))?;
        }

        Ok(config)
    }

    /// Per-request timeout: one second less than the poll interval
    pub fn request_timeout(&self) -> Duration {
        self.poll_interval
            .saturating_sub(Duration::from_secs(1))
            .max(Duration::from_millis(500))
    }
}

fn parse_number(name: &'static str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim().parse().map_err(|_| invalid(name, raw))
}

fn invalid(name: &'static str, raw: &str) -> ConfigError {
    ConfigError::InvalidValue {
        name,
        value: raw.to_string(),
    }
}
