//! Smart-plug emulation adapter.
//!
//! Presents the relay as a dimmable plug named after
//! `device_display_name`, so voice assistants on the LAN can address it
//! ("turn on <name>" / "turn off <name>"). The Wemo-style discovery
//! flow is:
//!
//! 1. the assistant multicasts an SSDP `M-SEARCH` probe for
//!    `urn:Belkin:device`;
//! 2. the responder replies with a `LOCATION` URL built from the
//!    station's own address;
//! 3. the assistant fetches `/setup.xml` from that URL and registers
//!    the `friendlyName` it finds there;
//! 4. control requests then arrive on the same listener carrying a
//!    level byte (255 = on, 0 = off, with dimming percentages scaled
//!    into the same byte by the assistant).
//!
//! The adapter never interprets levels itself. It queues them and the
//! polling loop drains the queue through
//! [`poll_set_level`](SmartPlugAdapter::poll_set_level), feeding each
//! byte to the command interpreter.
//!
//! Lifecycle is tied to the network link: start on connect (with the
//! acquired station address), stop on disconnect. The wire formatting
//! and request routing are pure functions, tested on the host.

use std::net::Ipv4Addr;

use log::info;

use crate::error::CommsError;

const DISCOVERY_PORT: u16 = 1900;
const CONTROL_PORT: u16 = 52000;

/// Smart-plug emulation adapter.
pub struct SmartPlugAdapter {
    display_name: heapless::String<32>,
    active: bool,

    #[cfg(target_os = "espidf")]
    levels_rx: Option<std::sync::mpsc::Receiver<u8>>,
    #[cfg(target_os = "espidf")]
    shutdown: Option<std::sync::Arc<std::sync::atomic::AtomicBool>>,

    #[cfg(not(target_os = "espidf"))]
    sim_levels: std::collections::VecDeque<u8>,
}

impl SmartPlugAdapter {
    pub fn new(display_name: &str) -> Self {
        let mut name = heapless::String::new();
        // Names longer than the buffer are truncated, not rejected.
        for ch in display_name.chars() {
            if name.push(ch).is_err() {
                break;
            }
        }
        Self {
            display_name: name,
            active: false,

            #[cfg(target_os = "espidf")]
            levels_rx: None,
            #[cfg(target_os = "espidf")]
            shutdown: None,

            #[cfg(not(target_os = "espidf"))]
            sim_levels: std::collections::VecDeque::new(),
        }
    }

    /// Whether the emulated plug is currently discoverable.
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Start discovery + control listeners. `station_ip` is the address
    /// the assistant will be told to fetch the device description from,
    /// so it must be the station's own.
    /// Call after the network link is up.
    pub fn start(&mut self, station_ip: Ipv4Addr) -> Result<(), CommsError> {
        if self.active {
            return Ok(());
        }
        self.platform_start(station_ip)?;
        self.active = true;
        info!(
            "smart-plug: '{}' discoverable at {}:{}",
            self.display_name, station_ip, CONTROL_PORT
        );
        Ok(())
    }

    /// Stop the listeners.
    /// Call on network loss.
    pub fn stop(&mut self) {
        if !self.active {
            return;
        }
        self.platform_stop();
        self.active = false;
        info!("smart-plug: stopped");
    }

    /// Next queued level request, if any. Non-blocking; the polling loop
    /// calls this once per pass and hands the byte to the interpreter.
    pub fn poll_set_level(&mut self) -> Option<u8> {
        if !self.active {
            return None;
        }
        self.platform_poll_level()
    }

    // ── Platform: ESP-IDF ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_start(&mut self, station_ip: Ipv4Addr) -> Result<(), CommsError> {
        use std::io::{Read, Write};
        use std::net::{TcpListener, UdpSocket};
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::sync::mpsc;
        use std::sync::Arc;
        use std::time::Duration;

        let (tx, rx) = mpsc::channel();
        let shutdown = Arc::new(AtomicBool::new(false));

        // Discovery responder: answers M-SEARCH probes with the
        // description URL so assistants can find the plug.
        let discovery = UdpSocket::bind(("0.0.0.0", DISCOVERY_PORT)).map_err(|e| {
            log::error!("smart-plug(espidf): discovery bind failed: {}", e);
            CommsError::EndpointStartFailed
        })?;
        discovery
            .set_read_timeout(Some(Duration::from_millis(250)))
            .map_err(|_| CommsError::EndpointStartFailed)?;

        let control = TcpListener::bind(("0.0.0.0", CONTROL_PORT)).map_err(|e| {
            log::error!("smart-plug(espidf): control bind failed: {}", e);
            CommsError::EndpointStartFailed
        })?;
        control
            .set_nonblocking(true)
            .map_err(|_| CommsError::EndpointStartFailed)?;

        let name: String = self.display_name.as_str().into();
        let stop_flag = Arc::clone(&shutdown);
        std::thread::Builder::new()
            .name("smart-plug".into())
            .stack_size(6144)
            .spawn(move || {
                let mut probe = [0u8; 512];
                while !stop_flag.load(Ordering::Relaxed) {
                    if let Ok((len, peer)) = discovery.recv_from(&mut probe) {
                        let req = String::from_utf8_lossy(&probe[..len]);
                        if req.starts_with("M-SEARCH") && req.contains("urn:Belkin:device") {
                            let reply = discovery_reply(station_ip, &name);
                            let _ = discovery.send_to(reply.as_bytes(), peer);
                        }
                    }
                    while let Ok((mut stream, _)) = control.accept() {
                        // Accepted sockets inherit the listener's
                        // non-blocking flag on lwIP; force blocking with
                        // a bounded timeout so an idle peer cannot stall
                        // the discovery responder, and a slow one is
                        // retried instead of dropped.
                        let _ = stream.set_nonblocking(false);
                        let _ = stream.set_read_timeout(Some(Duration::from_millis(250)));

                        let mut buf = [0u8; 1024];
                        let mut len = 0;
                        for _ in 0..4 {
                            match stream.read(&mut buf) {
                                Ok(n) => {
                                    len = n;
                                    break;
                                }
                                Err(e) if should_retry_read(e.kind()) => continue,
                                Err(_) => break,
                            }
                        }
                        if len == 0 {
                            continue;
                        }

                        match route_control_request(&buf[..len]) {
                            ControlAction::ServeSetup => {
                                let body = setup_xml(&name);
                                let resp = format!(
                                    "HTTP/1.1 200 OK\r\nContent-Type: text/xml\r\n\
                                     Content-Length: {}\r\n\r\n{}",
                                    body.len(),
                                    body
                                );
                                let _ = stream.write_all(resp.as_bytes());
                            }
                            ControlAction::SetLevel(level) => {
                                if tx.send(level).is_err() {
                                    return; // Adapter went away.
                                }
                                let _ = stream
                                    .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n");
                            }
                            ControlAction::Ignore => {}
                        }
                    }
                }
            })
            .map_err(|e| {
                log::error!("smart-plug(espidf): thread spawn failed: {}", e);
                CommsError::EndpointStartFailed
            })?;

        self.levels_rx = Some(rx);
        self.shutdown = Some(shutdown);
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_stop(&mut self) {
        if let Some(flag) = self.shutdown.take() {
            flag.store(true, std::sync::atomic::Ordering::Relaxed);
        }
        self.levels_rx = None;
    }

    #[cfg(target_os = "espidf")]
    fn platform_poll_level(&mut self) -> Option<u8> {
        self.levels_rx.as_ref()?.try_recv().ok()
    }

    // ── Platform: simulation ──────────────────────────────────

    #[cfg(not(target_os = "espidf"))]
    fn platform_start(&mut self, station_ip: Ipv4Addr) -> Result<(), CommsError> {
        info!(
            "smart-plug(sim): '{}' registered at {}",
            self.display_name, station_ip
        );
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_stop(&mut self) {
        self.sim_levels.clear();
        info!("smart-plug(sim): unregistered");
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_poll_level(&mut self) -> Option<u8> {
        self.sim_levels.pop_front()
    }

    /// Simulation: queue a voice-assistant level request.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_inject_level(&mut self, level: u8) {
        self.sim_levels.push_back(level);
    }
}

// ── Wire formatting and routing (pure) ────────────────────────

/// What a control-listener request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(not(target_os = "espidf"), allow(dead_code))]
enum ControlAction {
    /// `GET /setup.xml` — the assistant is fetching the device
    /// description it was pointed at by the discovery reply.
    ServeSetup,
    /// A control body carrying a level byte.
    SetLevel(u8),
    /// Anything else; dropped without a reply.
    Ignore,
}

/// SSDP reply to an `M-SEARCH` probe. `LOCATION` must carry the
/// station's own address — the assistant fetches the device
/// description from it.
#[cfg_attr(not(target_os = "espidf"), allow(dead_code))]
fn discovery_reply(station_ip: Ipv4Addr, name: &str) -> String {
    format!(
        "HTTP/1.1 200 OK\r\n\
         CACHE-CONTROL: max-age=86400\r\n\
         ST: urn:Belkin:device:**\r\n\
         LOCATION: http://{station_ip}:{CONTROL_PORT}/setup.xml\r\n\
         USN: uuid:Socket-1_0-{name}\r\n\r\n"
    )
}

/// Minimal Wemo device description; `friendlyName` is the name the
/// assistant registers and answers to.
#[cfg_attr(not(target_os = "espidf"), allow(dead_code))]
fn setup_xml(name: &str) -> String {
    format!(
        "<?xml version=\"1.0\"?><root><device>\
         <deviceType>urn:Belkin:device:controllee:1</deviceType>\
         <friendlyName>{name}</friendlyName>\
         <manufacturer>Belkin International Inc.</manufacturer>\
         <modelName>Socket</modelName>\
         <modelNumber>1.0</modelNumber>\
         <UDN>uuid:Socket-1_0-{name}</UDN>\
         </device></root>"
    )
}

/// Classify an inbound control-listener request.
#[cfg_attr(not(target_os = "espidf"), allow(dead_code))]
fn route_control_request(raw: &[u8]) -> ControlAction {
    if raw.starts_with(b"GET /setup.xml") {
        return ControlAction::ServeSetup;
    }
    match parse_level_request(raw) {
        Some(level) => ControlAction::SetLevel(level),
        None => ControlAction::Ignore,
    }
}

/// Extract the requested level byte from a control request body.
///
/// On/off requests carry `<BinaryState>1</BinaryState>` (mapped to 255)
/// or `<BinaryState>0</BinaryState>`; dim requests carry an explicit
/// `<brightness>N</brightness>` byte.
#[cfg_attr(not(target_os = "espidf"), allow(dead_code))]
fn parse_level_request(raw: &[u8]) -> Option<u8> {
    let text = core::str::from_utf8(raw).ok()?;
    if let Some(value) = extract_tag(text, "brightness") {
        return value.parse::<u8>().ok();
    }
    match extract_tag(text, "BinaryState")? {
        "1" => Some(255),
        "0" => Some(0),
        _ => None,
    }
}

#[cfg_attr(not(target_os = "espidf"), allow(dead_code))]
fn extract_tag<'a>(text: &'a str, tag: &str) -> Option<&'a str> {
    let open_at = text.find(&format!("<{tag}>"))? + tag.len() + 2;
    let close_at = text[open_at..].find(&format!("</{tag}>"))? + open_at;
    Some(text[open_at..close_at].trim())
}

/// Whether a failed control-stream read should be retried on the same
/// connection rather than dropping it.
#[cfg_attr(not(target_os = "espidf"), allow(dead_code))]
fn should_retry_read(kind: std::io::ErrorKind) -> bool {
    matches!(
        kind,
        std::io::ErrorKind::WouldBlock
            | std::io::ErrorKind::TimedOut
            | std::io::ErrorKind::Interrupted
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const IP: Ipv4Addr = Ipv4Addr::new(192, 168, 0, 42);

    #[test]
    fn start_stop_lifecycle() {
        let mut plug = SmartPlugAdapter::new("ROBOT VACUUM");
        assert!(!plug.is_active());
        plug.start(IP).unwrap();
        assert!(plug.is_active());
        plug.stop();
        assert!(!plug.is_active());
    }

    #[test]
    fn double_start_is_idempotent() {
        let mut plug = SmartPlugAdapter::new("ROBOT VACUUM");
        plug.start(IP).unwrap();
        plug.start(IP).unwrap();
        assert!(plug.is_active());
    }

    #[test]
    fn levels_drain_in_arrival_order() {
        let mut plug = SmartPlugAdapter::new("ROBOT VACUUM");
        plug.start(IP).unwrap();
        plug.sim_inject_level(255);
        plug.sim_inject_level(0);
        assert_eq!(plug.poll_set_level(), Some(255));
        assert_eq!(plug.poll_set_level(), Some(0));
        assert_eq!(plug.poll_set_level(), None);
    }

    #[test]
    fn inactive_plug_yields_no_levels() {
        let mut plug = SmartPlugAdapter::new("ROBOT VACUUM");
        plug.sim_inject_level(255);
        assert_eq!(plug.poll_set_level(), None);
    }

    #[test]
    fn discovery_reply_points_at_the_station_address() {
        let reply = discovery_reply(IP, "ROBOT VACUUM");
        assert!(reply.contains("LOCATION: http://192.168.0.42:52000/setup.xml"));
        assert!(reply.contains("ST: urn:Belkin:device:**"));
        assert!(!reply.contains("0.0.0.0"));
    }

    #[test]
    fn setup_xml_registers_the_display_name() {
        let xml = setup_xml("ROBOT VACUUM");
        assert!(xml.contains("<friendlyName>ROBOT VACUUM</friendlyName>"));
        assert!(xml.contains("urn:Belkin:device:controllee:1"));
    }

    #[test]
    fn description_fetch_routes_to_setup() {
        let req = b"GET /setup.xml HTTP/1.1\r\nHost: 192.168.0.42:52000\r\n\r\n";
        assert_eq!(route_control_request(&req[..]), ControlAction::ServeSetup);
    }

    #[test]
    fn control_body_routes_to_set_level() {
        let req = b"POST /upnp/control/basicevent1 HTTP/1.1\r\n\r\n<BinaryState>1</BinaryState>";
        assert_eq!(
            route_control_request(&req[..]),
            ControlAction::SetLevel(255)
        );
    }

    #[test]
    fn unrelated_request_is_ignored() {
        assert_eq!(
            route_control_request(b"GET /favicon.ico HTTP/1.1\r\n\r\n"),
            ControlAction::Ignore
        );
    }

    #[test]
    fn binary_state_maps_to_level_endpoints() {
        assert_eq!(
            parse_level_request(b"<BinaryState>1</BinaryState>"),
            Some(255)
        );
        assert_eq!(parse_level_request(b"<BinaryState>0</BinaryState>"), Some(0));
        assert_eq!(parse_level_request(b"<BinaryState>2</BinaryState>"), None);
    }

    #[test]
    fn brightness_tag_wins_over_binary_state() {
        let body = b"<BinaryState>1</BinaryState><brightness>128</brightness>";
        assert_eq!(parse_level_request(&body[..]), Some(128));
    }

    #[test]
    fn transient_read_errors_retry_hard_ones_drop() {
        use std::io::ErrorKind;
        assert!(should_retry_read(ErrorKind::WouldBlock));
        assert!(should_retry_read(ErrorKind::TimedOut));
        assert!(should_retry_read(ErrorKind::Interrupted));
        assert!(!should_retry_read(ErrorKind::ConnectionReset));
        assert!(!should_retry_read(ErrorKind::UnexpectedEof));
    }

    #[test]
    fn long_display_name_is_truncated() {
        let plug = SmartPlugAdapter::new("A VERY LONG SMART PLUG DISPLAY NAME INDEED");
        assert_eq!(plug.display_name().len(), 32);
    }
}
