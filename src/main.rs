//! VacRelay Firmware — Main Entry Point
//!
//! Hexagonal layout with a single-threaded polling loop.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  WifiAdapter     MqttChannel      UpdateEndpoint               │
//! │  (Connectivity)  (ChannelEvents,  (firmware upload)            │
//! │                   StatusPublisher)                             │
//! │  SmartPlugAdapter    LogStatusSink     Uptime                  │
//! │  (voice levels)      (StatusPublisher) (monotonic clock)       │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              AppService (pure logic)                   │    │
//! │  │  Command parsing · PendingActions · status echoes      │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  LinkSupervisor (one-shot reconnect timers, no I/O)            │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

// ── Module declarations ───────────────────────────────────────
pub mod command;
pub mod config;
mod dispatch;
mod error;
mod pending;
mod pins;

pub mod app;
mod adapters;
mod drivers;

// ── Imports ───────────────────────────────────────────────────
use anyhow::Result;
use log::{info, warn};

use adapters::log_sink::LogStatusSink;
use adapters::mqtt::{ChannelState, MqttChannel};
use adapters::ota::UpdateEndpoint;
use adapters::smart_plug::SmartPlugAdapter;
use adapters::time::Uptime;
use adapters::wifi::{ConnectivityPort, WifiAdapter};
use app::notify::StatusBuffer;
use app::service::AppService;
use config::RelayConfig;
use dispatch::{Dispatcher, LinkAction, LinkActions, LinkState, LinkSupervisor};
use drivers::relay::RelayDriver;

// ── Link action execution ─────────────────────────────────────
//
// The supervisor owns the reconnect policy but performs no I/O; the
// loop turns its emitted actions into adapter calls and feeds results
// straight back. A successful network connect yields follow-up start
// actions, so the worklist can grow while draining.

#[allow(clippy::too_many_arguments)]
fn execute_link_actions(
    initial: LinkActions,
    now_ms: u64,
    supervisor: &mut LinkSupervisor,
    wifi: &mut WifiAdapter,
    channel: &mut MqttChannel,
    endpoint: &mut UpdateEndpoint,
    plug: &mut SmartPlugAdapter,
) {
    let mut worklist: Vec<LinkAction> = initial.iter().copied().collect();
    let mut at = 0;
    while at < worklist.len() {
        let action = worklist[at];
        at += 1;
        match action {
            LinkAction::ConnectNetwork => match wifi.connect() {
                Ok(()) => worklist.extend(supervisor.on_network_connected()),
                Err(_) => supervisor.on_network_lost(now_ms),
            },
            LinkAction::ConnectChannel => {
                if channel.connect().is_err() {
                    supervisor.on_channel_lost(now_ms);
                }
            }
            LinkAction::StartUpdateEndpoint => {
                if let Err(e) = endpoint.start() {
                    warn!("update endpoint start failed: {}", e);
                }
            }
            LinkAction::StartSmartPlug => match wifi.station_ip() {
                Some(ip) => {
                    if let Err(e) = plug.start(ip) {
                        warn!("smart-plug start failed: {}", e);
                    }
                }
                None => warn!("smart-plug start skipped: no station address yet"),
            },
        }
    }
}

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  VacRelay v{}                       ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 1b. Firmware rollback check ───────────────────────────
    adapters::ota::check_rollback();

    // ── 1c. Initialise relay + indicator outputs ──────────────
    if let Err(e) = drivers::hw_init::init_outputs() {
        // Output init failure is critical — the relay pin state would
        // be undefined. Log and halt.
        log::error!("HAL init failed: {} — halting", e);
        #[allow(clippy::empty_loop)]
        loop {}
    }

    // ── 2. Configuration ──────────────────────────────────────
    let config = RelayConfig::default();
    info!(
        "Config: broker={}:{} cmd='{}' status='{}'",
        config.broker_host, config.broker_port, config.command_topic, config.status_topic
    );

    // ── 3. Construct adapters ─────────────────────────────────
    let mut wifi = WifiAdapter::new(&config.hostname);
    {
        use esp_idf_svc::eventloop::EspSystemEventLoop;
        use esp_idf_svc::hal::peripherals::Peripherals;
        use esp_idf_svc::nvs::EspDefaultNvsPartition;
        use esp_idf_svc::wifi::{BlockingWifi, ClientConfiguration, Configuration, EspWifi};

        let peripherals = Peripherals::take()?;
        let sys_loop = EspSystemEventLoop::take()?;
        let nvs = EspDefaultNvsPartition::take()?;

        let mut driver = EspWifi::new(peripherals.modem, sys_loop.clone(), Some(nvs))?;
        driver.set_configuration(&Configuration::Client(ClientConfiguration {
            ssid: config
                .wifi_ssid
                .as_str()
                .try_into()
                .map_err(|_| anyhow::anyhow!("SSID too long"))?,
            password: config
                .wifi_password
                .as_str()
                .try_into()
                .map_err(|_| anyhow::anyhow!("passphrase too long"))?,
            ..Default::default()
        }))?;
        wifi.attach_driver(BlockingWifi::wrap(driver, sys_loop)?);
    }

    let mut channel = MqttChannel::new(&config);
    let mut endpoint = UpdateEndpoint::new(config.ota_log_interval_ms);
    let mut plug = SmartPlugAdapter::new(&config.device_display_name);
    let mut relay = RelayDriver::new(config.pulse_duration_ms);
    let mut log_sink = LogStatusSink::new();
    let clock = Uptime::new();

    // ── 4. Construct app service + supervisor ─────────────────
    let app = AppService::new();
    let mut supervisor = LinkSupervisor::new(config.reconnect_delay_ms);
    let mut status = StatusBuffer::new();

    info!("System ready. Entering polling loop.");

    // ── 5. Polling loop ───────────────────────────────────────
    loop {
        let now_ms = clock.now_ms();

        // Detect a dropped station link. The channel and both LAN
        // endpoints come down with it; the supervisor cancels any
        // pending channel reconnect before scheduling the network one.
        if supervisor.network_state() == LinkState::Connected && !wifi.is_connected() {
            plug.stop();
            endpoint.stop();
            channel.disconnect();
            supervisor.on_network_lost(now_ms);
        }

        // Fire due one-shot reconnect timers.
        let actions = supervisor.poll(now_ms);
        execute_link_actions(
            actions,
            now_ms,
            &mut supervisor,
            &mut wifi,
            &mut channel,
            &mut endpoint,
            &mut plug,
        );

        // Service channel events; all ChannelEvents callbacks run here,
        // on this thread. The subscription is issued afterwards because
        // the channel is mutably borrowed while being serviced.
        let subscribe_requested = {
            let mut shim = Dispatcher::new(
                &mut supervisor,
                &app,
                &mut status,
                &config.command_topic,
                now_ms,
            );
            channel.service(&mut shim);
            shim.subscribe_requested
        };
        if subscribe_requested && channel.subscribe_command_topic().is_err() {
            supervisor.on_channel_lost(now_ms);
        }

        // Voice-assistant level requests.
        while let Some(level) = plug.poll_set_level() {
            let _ = app.handle_brightness(level, &mut status);
        }

        // Flush buffered status echoes — to the broker when the session
        // is up, to the serial console otherwise.
        if channel.state() == ChannelState::Connected {
            status.flush_into(&mut channel);
        } else {
            status.flush_into(&mut log_sink);
        }

        // Actuate coalesced commands.
        let _ = app.drain_pending(&mut relay);

        // Yield to FreeRTOS.
        esp_idf_svc::hal::delay::FreeRtos::delay_ms(20);
    }
}
