//! WiFi station-mode adapter.
//!
//! Implements [`ConnectivityPort`] — the boundary for network
//! attachment. Connection *timing* (the fixed one-shot reconnect
//! backoff) lives in the [`LinkSupervisor`](crate::dispatch::LinkSupervisor);
//! this adapter only knows how to associate, drop, and report link
//! status.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: real ESP-IDF WiFi driver calls via
//!   `esp_idf_svc::wifi`.
//! - **all other targets**: simulation stubs with scripted failures for
//!   supervisor tests.

use log::{error, info};

use crate::error::CommsError;

// ───────────────────────────────────────────────────────────────
// Port trait
// ───────────────────────────────────────────────────────────────

/// Network-attachment port the polling loop drives.
pub trait ConnectivityPort {
    fn connect(&mut self) -> Result<(), CommsError>;
    fn disconnect(&mut self);
    fn is_connected(&self) -> bool;
}

// ───────────────────────────────────────────────────────────────
// WiFi adapter
// ───────────────────────────────────────────────────────────────

pub struct WifiAdapter {
    hostname: heapless::String<32>,
    connected: bool,
    /// Simulation: pre-programmed failures for the next N connect calls.
    #[cfg(not(target_os = "espidf"))]
    sim_failures_remaining: u32,
    #[cfg(target_os = "espidf")]
    wifi: Option<esp_idf_svc::wifi::BlockingWifi<esp_idf_svc::wifi::EspWifi<'static>>>,
}

impl WifiAdapter {
    pub fn new(hostname: &str) -> Self {
        let mut h = heapless::String::new();
        // Longer hostnames are truncated; the station still associates.
        for ch in hostname.chars() {
            if h.push(ch).is_err() {
                break;
            }
        }
        Self {
            hostname: h,
            connected: false,
            #[cfg(not(target_os = "espidf"))]
            sim_failures_remaining: 0,
            #[cfg(target_os = "espidf")]
            wifi: None,
        }
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Hand over the initialized ESP-IDF WiFi driver. `main` constructs
    /// it from the modem peripheral, event loop, and credentials before
    /// the polling loop starts.
    #[cfg(target_os = "espidf")]
    pub fn attach_driver(
        &mut self,
        wifi: esp_idf_svc::wifi::BlockingWifi<esp_idf_svc::wifi::EspWifi<'static>>,
    ) {
        self.wifi = Some(wifi);
    }

    /// Simulation: make the next `n` connect attempts fail.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_fail_next_connects(&mut self, n: u32) {
        self.sim_failures_remaining = n;
    }

    /// Address the station acquired, once associated. LAN endpoints
    /// embed this in discovery replies; `None` while the link is down.
    #[cfg(target_os = "espidf")]
    pub fn station_ip(&self) -> Option<std::net::Ipv4Addr> {
        self.wifi
            .as_ref()
            .and_then(|w| w.wifi().sta_netif().get_ip_info().ok())
            .map(|info| info.ip)
    }

    /// Address the station acquired, once associated. LAN endpoints
    /// embed this in discovery replies; `None` while the link is down.
    #[cfg(not(target_os = "espidf"))]
    pub fn station_ip(&self) -> Option<std::net::Ipv4Addr> {
        self.connected.then_some(std::net::Ipv4Addr::LOCALHOST)
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_connect(&mut self) -> Result<(), CommsError> {
        let Some(wifi) = self.wifi.as_mut() else {
            error!("wifi(espidf): driver not attached");
            return Err(CommsError::NetworkConnectFailed);
        };
        wifi.start().map_err(|e| {
            error!("wifi(espidf): start failed: {}", e);
            CommsError::NetworkConnectFailed
        })?;
        wifi.connect().map_err(|e| {
            error!("wifi(espidf): connect failed: {}", e);
            CommsError::NetworkConnectFailed
        })?;
        wifi.wait_netif_up().map_err(|e| {
            error!("wifi(espidf): netif up wait failed: {}", e);
            CommsError::NetworkConnectFailed
        })?;
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_connect(&mut self) -> Result<(), CommsError> {
        if self.sim_failures_remaining > 0 {
            self.sim_failures_remaining -= 1;
            return Err(CommsError::NetworkConnectFailed);
        }
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_disconnect(&mut self) {
        if let Some(wifi) = self.wifi.as_mut() {
            let _ = wifi.disconnect();
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_disconnect(&mut self) {}

    #[cfg(target_os = "espidf")]
    fn platform_is_connected(&self) -> bool {
        self.wifi
            .as_ref()
            .and_then(|w| w.is_connected().ok())
            .unwrap_or(false)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_is_connected(&self) -> bool {
        self.connected
    }
}

// ───────────────────────────────────────────────────────────────
// ConnectivityPort
// ───────────────────────────────────────────────────────────────

impl ConnectivityPort for WifiAdapter {
    fn connect(&mut self) -> Result<(), CommsError> {
        info!("wifi: associating as '{}'", self.hostname);
        match self.platform_connect() {
            Ok(()) => {
                self.connected = true;
                info!("wifi: associated");
                Ok(())
            }
            Err(e) => {
                self.connected = false;
                error!("wifi: association failed — {}", e);
                Err(e)
            }
        }
    }

    fn disconnect(&mut self) {
        self.platform_disconnect();
        self.connected = false;
        info!("wifi: disconnected");
    }

    fn is_connected(&self) -> bool {
        self.platform_is_connected()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_disconnect_roundtrip() {
        let mut w = WifiAdapter::new("robovac-relay");
        assert!(!w.is_connected());
        w.connect().unwrap();
        assert!(w.is_connected());
        w.disconnect();
        assert!(!w.is_connected());
    }

    #[test]
    fn scripted_failures_then_success() {
        let mut w = WifiAdapter::new("robovac-relay");
        w.sim_fail_next_connects(2);
        assert_eq!(w.connect(), Err(CommsError::NetworkConnectFailed));
        assert_eq!(w.connect(), Err(CommsError::NetworkConnectFailed));
        assert!(w.connect().is_ok());
        assert!(w.is_connected());
    }

    #[test]
    fn station_ip_tracks_association() {
        let mut w = WifiAdapter::new("robovac-relay");
        assert_eq!(w.station_ip(), None);
        w.connect().unwrap();
        assert!(w.station_ip().is_some());
        w.disconnect();
        assert_eq!(w.station_ip(), None);
    }

    #[test]
    fn overlong_hostname_is_truncated() {
        let w = WifiAdapter::new("a-hostname-well-beyond-the-thirty-two-byte-limit");
        assert_eq!(w.hostname().len(), 32);
    }
}
