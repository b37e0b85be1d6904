//! Process configuration.
//!
//! Values come from environment variables so the hub can run unchanged on
//! hosting platforms that inject `PORT`. Anything unset falls back to the
//! defaults below.

use crate::store::DEFAULT_QUEUE_CAPACITY;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Default listen port.
pub const DEFAULT_PORT: u16 = 8080;

/// Upper bound for an ingest request body.
pub const MAX_REQUEST_BODY_BYTES: usize = 8 * 1024;

/// Runtime configuration for the HTTP server and subscriber delivery.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the listener binds to.
    pub bind_addr: IpAddr,

    /// TCP port (`PORT`).
    pub port: u16,

    /// Payloads a subscriber may have queued before it is dropped as lagging.
    pub queue_capacity: usize,

    /// Deadline for a single WebSocket write to a subscriber.
    pub send_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            send_timeout: Duration::from_secs(5),
        }
    }
}

impl ServerConfig {
    /// Loads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`, which maps a variable name to
    /// its value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = non_empty(lookup("BIND_ADDR")) {
            config.bind_addr = parse("BIND_ADDR", &value)?;
        }
        if let Some(value) = non_empty(lookup("PORT")) {
            config.port = parse("PORT", &value)?;
        }
        if let Some(value) = non_empty(lookup("SUBSCRIBER_QUEUE_CAPACITY")) {
            let capacity: usize = parse("SUBSCRIBER_QUEUE_CAPACITY", &value)?;
            if capacity == 0 {
                return Err(ConfigError::Invalid {
                    key: "SUBSCRIBER_QUEUE_CAPACITY",
                    value,
                    reason: "must be at least 1".to_string(),
                });
            }
            config.queue_capacity = capacity;
        }
        if let Some(value) = non_empty(lookup("SUBSCRIBER_SEND_TIMEOUT_MS")) {
            let millis: u64 = parse("SUBSCRIBER_SEND_TIMEOUT_MS", &value)?;
            config.send_timeout = Duration::from_millis(millis);
        }

        Ok(config)
    }

    /// Socket address to listen on.
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.port)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse<T>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason: e.to_string(),
    })
}

/// Error raised when an environment variable holds an unusable value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Invalid { key, value, reason } => {
                write!(f, "Invalid value {:?} for {}: {}", value, key, reason)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<ServerConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = load(&[]).unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.queue_capacity, DEFAULT_QUEUE_CAPACITY);
        assert_eq!(config.listen_addr().to_string(), "0.0.0.0:8080");
    }

    #[test]
    fn test_port_from_env() {
        let config = load(&[("PORT", "10000")]).unwrap();
        assert_eq!(config.port, 10000);
    }

    #[test]
    fn test_empty_port_falls_back() {
        let config = load(&[("PORT", "")]).unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
    }

    #[test]
    fn test_invalid_port_rejected() {
        let err = load(&[("PORT", "http")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "PORT", .. }));
    }

    #[test]
    fn test_delivery_tuning() {
        let config = load(&[
            ("BIND_ADDR", "127.0.0.1"),
            ("SUBSCRIBER_QUEUE_CAPACITY", "4"),
            ("SUBSCRIBER_SEND_TIMEOUT_MS", "250"),
        ])
        .unwrap();

        assert_eq!(config.listen_addr().to_string(), "127.0.0.1:8080");
        assert_eq!(config.queue_capacity, 4);
        assert_eq!(config.send_timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_zero_queue_capacity_rejected() {
        assert!(load(&[("SUBSCRIBER_QUEUE_CAPACITY", "0")]).is_err());
    }
}
