//! Configuration for the relay server.
//!
//! Defaults can be overridden via environment variables:
//!
//! - `RELAY_BIND_ADDR`            (default: "0.0.0.0")
//! - `RELAY_PORT`                 (default: "5000")
//! - `RELAY_MAX_CLIENTS`          (default: "1024")
//! - `RELAY_ALLOWED_ORIGIN`       (default: "http://localhost:5173")
//! - `RELAY_DELIVERY`             (default: "broadcast"; or "targeted")
//! - `RELAY_REQUIRE_REGISTRATION` (default: "false")
//! - `RELAY_PING_INTERVAL_SECS`   (default: "30"; "0" disables heartbeats)
//! - `RELAY_PONG_TIMEOUT_SECS`    (default: "10")

use std::env;
use std::str::FromStr;
use std::time::Duration;

use relay_core::{DeliveryPolicy, RelayPolicy};
use thiserror::Error;
use tokio::sync::Semaphore;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Liveness check for a single connection: ping every `interval`,
/// give up if the pong takes longer than `timeout`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Heartbeat {
    pub interval: Duration,
    pub timeout: Duration,
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// IP address / interface to bind to (e.g. "0.0.0.0" or "127.0.0.1").
    pub bind_addr: String,

    /// TCP port to listen on.
    pub port: u16,

    /// Maximum number of simultaneously open connections.
    pub max_clients: usize,

    /// The single origin browsers may connect from.
    pub allowed_origin: String,

    /// Message routing and registration rules.
    pub policy: RelayPolicy,

    /// `None` disables heartbeats.
    pub heartbeat: Option<Heartbeat>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bind_addr: "0.0.0.0".to_string(),
            port: 5000,
            max_clients: 1024,
            allowed_origin: "http://localhost:5173".to_string(),
            policy: RelayPolicy::default(),
            heartbeat: Some(Heartbeat {
                interval: Duration::from_secs(30),
                timeout: Duration::from_secs(10),
            }),
        }
    }
}

impl Config {
    /// Construct a `Config` from environment variables, falling back
    /// to the defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::from_lookup(|key| env::var(key).ok())
    }

    /// Construct a `Config` from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        let bind_addr = lookup("RELAY_BIND_ADDR").unwrap_or(defaults.bind_addr);
        let port = parse_or(&lookup, "RELAY_PORT", defaults.port)?;
        let max_clients = parse_or(&lookup, "RELAY_MAX_CLIENTS", defaults.max_clients)?;
        if max_clients > Semaphore::MAX_PERMITS {
            return Err(ConfigError::Invalid {
                key: "RELAY_MAX_CLIENTS",
                value: max_clients.to_string(),
                reason: format!("must be at most {}", Semaphore::MAX_PERMITS),
            });
        }
        let allowed_origin = lookup("RELAY_ALLOWED_ORIGIN").unwrap_or(defaults.allowed_origin);

        let delivery = match lookup("RELAY_DELIVERY") {
            None => defaults.policy.delivery,
            Some(value) => parse_delivery(&value).ok_or_else(|| ConfigError::Invalid {
                key: "RELAY_DELIVERY",
                value,
                reason: "expected \"broadcast\" or \"targeted\"".to_string(),
            })?,
        };

        let require_registration = match lookup("RELAY_REQUIRE_REGISTRATION") {
            None => defaults.policy.require_registration,
            Some(value) => parse_flag(&value).ok_or_else(|| ConfigError::Invalid {
                key: "RELAY_REQUIRE_REGISTRATION",
                value,
                reason: "expected true/false".to_string(),
            })?,
        };

        let ping_secs: u64 = parse_or(&lookup, "RELAY_PING_INTERVAL_SECS", 30)?;
        let pong_secs: u64 = parse_or(&lookup, "RELAY_PONG_TIMEOUT_SECS", 10)?;
        if ping_secs > 0 && pong_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "RELAY_PONG_TIMEOUT_SECS",
                value: pong_secs.to_string(),
                reason: "must be positive while heartbeats are enabled".to_string(),
            });
        }
        let heartbeat = (ping_secs > 0).then(|| Heartbeat {
            interval: Duration::from_secs(ping_secs),
            timeout: Duration::from_secs(pong_secs),
        });

        Ok(Config {
            bind_addr,
            port,
            max_clients,
            allowed_origin,
            policy: RelayPolicy {
                delivery,
                require_registration,
            },
            heartbeat,
        })
    }

    /// Convenience: `addr:port` socket string.
    pub fn socket_addr_string(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(value) => value.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
            key,
            reason: e.to_string(),
            value,
        }),
        None => Ok(default),
    }
}

fn parse_delivery(value: &str) -> Option<DeliveryPolicy> {
    match value.trim().to_ascii_lowercase().as_str() {
        "broadcast" => Some(DeliveryPolicy::Broadcast),
        "targeted" => Some(DeliveryPolicy::Targeted),
        _ => None,
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
