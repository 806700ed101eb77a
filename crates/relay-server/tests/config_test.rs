// crates/relay-server/tests/config_test.rs
use std::collections::HashMap;
use std::time::Duration;

use relay_core::DeliveryPolicy;
use relay_server::config::{Config, ConfigError, Heartbeat};
use tokio::sync::Semaphore;

fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key: &str| map.get(key).cloned()
}

#[test]
fn defaults_when_nothing_is_set() {
    let config = Config::from_lookup(lookup(&[])).unwrap();

    assert_eq!(config.socket_addr_string(), "0.0.0.0:5000");
    assert_eq!(config.max_clients, 1024);
    assert_eq!(config.allowed_origin, "http://localhost:5173");
    assert_eq!(config.policy.delivery, DeliveryPolicy::Broadcast);
    assert!(!config.policy.require_registration);
    assert_eq!(
        config.heartbeat,
        Some(Heartbeat {
            interval: Duration::from_secs(30),
            timeout: Duration::from_secs(10),
        })
    );
}

#[test]
fn overrides_are_applied() {
    let config = Config::from_lookup(lookup(&[
        ("RELAY_BIND_ADDR", "127.0.0.1"),
        ("RELAY_PORT", "7000"),
        ("RELAY_MAX_CLIENTS", "8"),
        ("RELAY_ALLOWED_ORIGIN", "https://chat.example.com"),
        ("RELAY_DELIVERY", "Targeted"),
        ("RELAY_REQUIRE_REGISTRATION", "yes"),
        ("RELAY_PING_INTERVAL_SECS", "0"),
    ]))
    .unwrap();

    assert_eq!(config.socket_addr_string(), "127.0.0.1:7000");
    assert_eq!(config.max_clients, 8);
    assert_eq!(config.allowed_origin, "https://chat.example.com");
    assert_eq!(config.policy.delivery, DeliveryPolicy::Targeted);
    assert!(config.policy.require_registration);
    assert_eq!(config.heartbeat, None);
}

#[test]
fn invalid_values_are_reported_with_their_key() {
    for (key, value) in [
        ("RELAY_PORT", "not-a-port"),
        ("RELAY_PORT", "70000"),
        ("RELAY_MAX_CLIENTS", "-1"),
        ("RELAY_DELIVERY", "multicast"),
        ("RELAY_REQUIRE_REGISTRATION", "maybe"),
        ("RELAY_PONG_TIMEOUT_SECS", "0"),
    ] {
        match Config::from_lookup(lookup(&[(key, value)])) {
            Err(ConfigError::Invalid { key: k, value: v, .. }) => {
                assert_eq!(k, key);
                assert_eq!(v, value);
            }
            Ok(config) => panic!("{key}={value} should be rejected, got {config:?}"),
        }
    }
}

#[test]
fn max_clients_beyond_semaphore_capacity_is_rejected() {
    let too_many = usize::MAX.to_string();
    match Config::from_lookup(lookup(&[("RELAY_MAX_CLIENTS", too_many.as_str())])) {
        Err(ConfigError::Invalid { key, value, .. }) => {
            assert_eq!(key, "RELAY_MAX_CLIENTS");
            assert_eq!(value, too_many);
        }
        Ok(config) => panic!("max_clients={too_many} should be rejected, got {config:?}"),
    }

    let at_limit = Semaphore::MAX_PERMITS.to_string();
    let config = Config::from_lookup(lookup(&[("RELAY_MAX_CLIENTS", at_limit.as_str())])).unwrap();
    assert_eq!(config.max_clients, Semaphore::MAX_PERMITS);
}

#[test]
fn zero_pong_timeout_is_fine_without_heartbeats() {
    let config = Config::from_lookup(lookup(&[
        ("RELAY_PING_INTERVAL_SECS", "0"),
        ("RELAY_PONG_TIMEOUT_SECS", "0"),
    ]))
    .unwrap();
    assert_eq!(config.heartbeat, None);
}
