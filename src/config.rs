//! System configuration parameters
//!
//! All tunable parameters for the VacRelay bridge. The defaults mirror
//! a typical home deployment; a flashing build can bake its own values
//! by constructing [`RelayConfig`] in `main` or deserializing one from
//! an embedded JSON blob.

use serde::{Deserialize, Serialize};

/// Core bridge configuration, passed to every adapter at construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    // --- Messaging channel ---
    /// Broker address (IP or hostname).
    pub broker_host: String,
    /// Broker TCP port.
    pub broker_port: u16,
    /// Broker credentials.
    pub username: String,
    pub password: String,
    /// Inbound topic carrying command tokens.
    pub command_topic: String,
    /// Outbound topic for human-readable status echoes.
    pub status_topic: String,

    // --- Station link ---
    /// Access-point SSID.
    pub wifi_ssid: String,
    /// Access-point passphrase.
    pub wifi_password: String,

    // --- Identity ---
    /// Display name the smart-plug emulation registers with.
    pub device_display_name: String,
    /// Network hostname for the station interface.
    pub hostname: String,

    // --- Timing ---
    /// Relay pulse hold time (milliseconds).
    pub pulse_duration_ms: u32,
    /// One-shot reconnect backoff for network and channel (milliseconds).
    pub reconnect_delay_ms: u64,
    /// Minimum interval between firmware-update progress log lines
    /// (milliseconds).
    pub ota_log_interval_ms: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            broker_host: "192.168.0.200".into(),
            broker_port: 1883,
            username: "robovac".into(),
            password: "change-me".into(),
            command_topic: "robovac/in/cmd".into(),
            status_topic: "robovac/out".into(),

            wifi_ssid: "home-iot".into(),
            wifi_password: "change-me".into(),

            device_display_name: "ROBOT VACUUM".into(),
            hostname: "robovac-relay".into(),

            pulse_duration_ms: 100,
            reconnect_delay_ms: 2_000,
            ota_log_interval_ms: 1_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_sane() {
        let c = RelayConfig::default();
        assert!(c.broker_port > 0);
        assert!(!c.command_topic.is_empty());
        assert!(!c.status_topic.is_empty());
        assert_ne!(c.command_topic, c.status_topic);
        assert!(c.pulse_duration_ms > 0);
        assert!(c.reconnect_delay_ms > 0);
    }

    #[test]
    fn serde_roundtrip() {
        let c = RelayConfig::default();
        let json = serde_json::to_string(&c).unwrap();
        let c2: RelayConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(c.broker_host, c2.broker_host);
        assert_eq!(c.command_topic, c2.command_topic);
        assert_eq!(c.pulse_duration_ms, c2.pulse_duration_ms);
        assert_eq!(c.reconnect_delay_ms, c2.reconnect_delay_ms);
    }

    #[test]
    fn pulse_is_short_relative_to_backoff() {
        // The pulse blocks the loop; it must stay well under the
        // reconnect backoff so link supervision is never starved.
        let c = RelayConfig::default();
        assert!(u64::from(c.pulse_duration_ms) * 10 <= c.reconnect_delay_ms);
    }
}
