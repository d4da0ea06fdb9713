//! Messaging-channel adapter (MQTT).
//!
//! Wraps the broker session behind three thin surfaces:
//!
//! - connect / disconnect / subscribe, driven by the polling loop on
//!   behalf of the link supervisor;
//! - [`service`](MqttChannel::service), which drains queued transport
//!   events into a [`ChannelEvents`] handler *inside the loop*, so
//!   command interpretation never runs on a transport thread;
//! - the [`StatusPublisher`] port, publishing plain ASCII status lines
//!   to the single outbound topic with no retry.
//!
//! ## cfg gating
//!
//! On `target_os = "espidf"` the adapter owns an `esp-idf-svc`
//! `EspMqttClient`; its connection is pumped by a forwarding thread that
//! does nothing but push raw events into an in-process queue (the
//! esp-idf-svc connection must be consumed continuously or the client
//! stalls). All interpretation still happens in the polling loop.
//!
//! On other targets the adapter is an in-memory simulation: tests
//! inject session events and inbound messages and inspect what was
//! published and subscribed.

use log::{error, info, warn};

use crate::app::ports::{ChannelEvents, StatusPublisher};
use crate::config::RelayConfig;
use crate::error::CommsError;

// ───────────────────────────────────────────────────────────────
// Session state and raw events
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Disconnected,
    Connecting,
    Connected,
}

/// Transport-level events queued between the session callbacks and the
/// polling loop.
#[derive(Debug)]
enum RawChannelEvent {
    Connected { session_present: bool },
    Disconnected,
    Message { topic: String, payload: Vec<u8> },
    PublishAck(i32),
}

// ───────────────────────────────────────────────────────────────
// Channel adapter
// ───────────────────────────────────────────────────────────────

pub struct MqttChannel {
    state: ChannelState,
    broker_url: String,
    // Session credentials are consumed by the ESP-IDF client only.
    #[cfg_attr(not(target_os = "espidf"), allow(dead_code))]
    client_id: String,
    #[cfg_attr(not(target_os = "espidf"), allow(dead_code))]
    username: String,
    #[cfg_attr(not(target_os = "espidf"), allow(dead_code))]
    password: String,
    command_topic: String,
    status_topic: String,

    #[cfg(target_os = "espidf")]
    client: Option<esp_idf_svc::mqtt::client::EspMqttClient<'static>>,
    #[cfg(target_os = "espidf")]
    events_rx: Option<std::sync::mpsc::Receiver<RawChannelEvent>>,

    #[cfg(not(target_os = "espidf"))]
    sim_inbox: std::collections::VecDeque<RawChannelEvent>,
    #[cfg(not(target_os = "espidf"))]
    sim_published: Vec<(String, String)>,
    #[cfg(not(target_os = "espidf"))]
    sim_subscriptions: Vec<String>,
}

impl MqttChannel {
    pub fn new(config: &RelayConfig) -> Self {
        Self {
            state: ChannelState::Disconnected,
            broker_url: format!("mqtt://{}:{}", config.broker_host, config.broker_port),
            client_id: config.hostname.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
            command_topic: config.command_topic.clone(),
            status_topic: config.status_topic.clone(),

            #[cfg(target_os = "espidf")]
            client: None,
            #[cfg(target_os = "espidf")]
            events_rx: None,

            #[cfg(not(target_os = "espidf"))]
            sim_inbox: std::collections::VecDeque::new(),
            #[cfg(not(target_os = "espidf"))]
            sim_published: Vec::new(),
            #[cfg(not(target_os = "espidf"))]
            sim_subscriptions: Vec::new(),
        }
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Open the broker session. Completion is reported asynchronously
    /// through [`service`](Self::service) as an `on_connect` callback.
    pub fn connect(&mut self) -> Result<(), CommsError> {
        info!("channel: connecting to {}", self.broker_url);
        self.state = ChannelState::Connecting;
        self.platform_connect()
    }

    /// Tear the session down without scheduling anything.
    pub fn disconnect(&mut self) {
        self.platform_disconnect();
        self.state = ChannelState::Disconnected;
        info!("channel: disconnected");
    }

    /// Subscribe to the one inbound command topic.
    pub fn subscribe_command_topic(&mut self) -> Result<(), CommsError> {
        info!("channel: subscribing to '{}'", self.command_topic);
        self.platform_subscribe()
    }

    /// Drain queued transport events into the handler. Runs in the
    /// polling loop; every `ChannelEvents` callback executes
    /// synchronously here.
    pub fn service(&mut self, handler: &mut impl ChannelEvents) {
        while let Some(event) = self.next_raw_event() {
            match event {
                RawChannelEvent::Connected { session_present } => {
                    self.state = ChannelState::Connected;
                    handler.on_connect(session_present);
                }
                RawChannelEvent::Disconnected => {
                    self.state = ChannelState::Disconnected;
                    handler.on_disconnect();
                }
                RawChannelEvent::Message { topic, payload } => {
                    handler.on_message(&topic, &payload);
                }
                RawChannelEvent::PublishAck(id) => {
                    handler.on_publish_ack(id);
                }
            }
        }
    }

    // ── Platform: ESP-IDF ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_connect(&mut self) -> Result<(), CommsError> {
        use esp_idf_svc::mqtt::client::{EspMqttClient, MqttClientConfiguration};

        let conf = MqttClientConfiguration {
            client_id: Some(&self.client_id),
            username: Some(&self.username),
            password: Some(&self.password),
            ..Default::default()
        };

        let (client, mut connection) =
            EspMqttClient::new(&self.broker_url, &conf).map_err(|e| {
                error!("channel(espidf): client init failed: {}", e);
                CommsError::ChannelConnectFailed
            })?;

        let (tx, rx) = std::sync::mpsc::channel();

        // Forwarding thread: pumps the esp-idf-svc connection and queues
        // raw events for the polling loop. No interpretation happens here.
        std::thread::Builder::new()
            .name("mqtt-events".into())
            .stack_size(6144)
            .spawn(move || {
                use esp_idf_svc::mqtt::client::EventPayload;
                while let Ok(event) = connection.next() {
                    let forwarded = match event.payload() {
                        EventPayload::Connected(session_present) => {
                            Some(RawChannelEvent::Connected { session_present })
                        }
                        EventPayload::Disconnected => Some(RawChannelEvent::Disconnected),
                        EventPayload::Received { topic, data, .. } => {
                            topic.map(|t| RawChannelEvent::Message {
                                topic: t.to_string(),
                                payload: data.to_vec(),
                            })
                        }
                        EventPayload::Published(id) => Some(RawChannelEvent::PublishAck(id)),
                        _ => None,
                    };
                    if let Some(ev) = forwarded {
                        if tx.send(ev).is_err() {
                            break; // Adapter dropped the receiver.
                        }
                    }
                }
            })
            .map_err(|e| {
                error!("channel(espidf): event thread spawn failed: {}", e);
                CommsError::ChannelConnectFailed
            })?;

        self.client = Some(client);
        self.events_rx = Some(rx);
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_disconnect(&mut self) {
        // Dropping the client closes the session and unblocks the
        // forwarding thread.
        self.client = None;
        self.events_rx = None;
    }

    #[cfg(target_os = "espidf")]
    fn platform_subscribe(&mut self) -> Result<(), CommsError> {
        use esp_idf_svc::mqtt::client::QoS;
        let Some(client) = self.client.as_mut() else {
            return Err(CommsError::SubscribeFailed);
        };
        client
            .subscribe(&self.command_topic, QoS::AtMostOnce)
            .map(|_| ())
            .map_err(|e| {
                error!("channel(espidf): subscribe failed: {}", e);
                CommsError::SubscribeFailed
            })
    }

    #[cfg(target_os = "espidf")]
    fn platform_publish(&mut self, text: &str) -> Result<(), CommsError> {
        use esp_idf_svc::mqtt::client::QoS;
        let Some(client) = self.client.as_mut() else {
            return Err(CommsError::PublishFailed);
        };
        client
            .enqueue(&self.status_topic, QoS::AtMostOnce, false, text.as_bytes())
            .map(|_| ())
            .map_err(|e| {
                error!("channel(espidf): publish failed: {}", e);
                CommsError::PublishFailed
            })
    }

    #[cfg(target_os = "espidf")]
    fn next_raw_event(&mut self) -> Option<RawChannelEvent> {
        self.events_rx.as_ref()?.try_recv().ok()
    }

    // ── Platform: simulation ──────────────────────────────────

    #[cfg(not(target_os = "espidf"))]
    fn platform_connect(&mut self) -> Result<(), CommsError> {
        // The simulated broker accepts immediately; the session event is
        // observed on the next service pass, like the real transport.
        self.sim_inbox.push_back(RawChannelEvent::Connected {
            session_present: false,
        });
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_disconnect(&mut self) {
        self.sim_inbox.clear();
        self.sim_subscriptions.clear();
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_subscribe(&mut self) -> Result<(), CommsError> {
        self.sim_subscriptions.push(self.command_topic.clone());
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_publish(&mut self, text: &str) -> Result<(), CommsError> {
        self.sim_published
            .push((self.status_topic.clone(), text.to_string()));
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn next_raw_event(&mut self) -> Option<RawChannelEvent> {
        self.sim_inbox.pop_front()
    }

    /// Simulation: deliver an inbound message on `topic`.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_inject_message(&mut self, topic: &str, payload: &[u8]) {
        self.sim_inbox.push_back(RawChannelEvent::Message {
            topic: topic.to_string(),
            payload: payload.to_vec(),
        });
    }

    /// Simulation: drop the session from the broker side.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_inject_disconnect(&mut self) {
        self.sim_inbox.push_back(RawChannelEvent::Disconnected);
    }

    /// Simulation: acknowledge an outbound publish.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_inject_publish_ack(&mut self, id: i32) {
        self.sim_inbox.push_back(RawChannelEvent::PublishAck(id));
    }

    /// Simulation: `(topic, text)` pairs published so far.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_published(&self) -> &[(String, String)] {
        &self.sim_published
    }

    /// Simulation: topics subscribed so far.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_subscriptions(&self) -> &[String] {
        &self.sim_subscriptions
    }
}

// ───────────────────────────────────────────────────────────────
// StatusPublisher
// ───────────────────────────────────────────────────────────────

impl StatusPublisher for MqttChannel {
    fn publish_status(&mut self, text: &str) {
        if self.state != ChannelState::Connected {
            warn!("channel: dropping status '{}' (not connected)", text);
            return;
        }
        if let Err(e) = self.platform_publish(text) {
            error!("channel: status publish failed — {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct RecordingHandler {
        connects: u32,
        disconnects: u32,
        messages: Vec<(String, Vec<u8>)>,
        acks: Vec<i32>,
    }

    impl RecordingHandler {
        fn new() -> Self {
            Self {
                connects: 0,
                disconnects: 0,
                messages: Vec::new(),
                acks: Vec::new(),
            }
        }
    }

    impl ChannelEvents for RecordingHandler {
        fn on_connect(&mut self, _session_present: bool) {
            self.connects += 1;
        }
        fn on_disconnect(&mut self) {
            self.disconnects += 1;
        }
        fn on_message(&mut self, topic: &str, payload: &[u8]) {
            self.messages.push((topic.to_string(), payload.to_vec()));
        }
        fn on_publish_ack(&mut self, id: i32) {
            self.acks.push(id);
        }
    }

    fn channel() -> MqttChannel {
        MqttChannel::new(&RelayConfig::default())
    }

    #[test]
    fn connect_surfaces_as_a_serviced_event() {
        let mut ch = channel();
        let mut handler = RecordingHandler::new();

        ch.connect().unwrap();
        assert_eq!(ch.state(), ChannelState::Connecting);

        ch.service(&mut handler);
        assert_eq!(handler.connects, 1);
        assert_eq!(ch.state(), ChannelState::Connected);
    }

    #[test]
    fn inbound_payload_reaches_handler_byte_exact() {
        let mut ch = channel();
        let mut handler = RecordingHandler::new();
        ch.connect().unwrap();
        ch.sim_inject_message("robovac/in/cmd", b"TURN_ON");
        ch.service(&mut handler);

        assert_eq!(handler.messages.len(), 1);
        let (topic, payload) = &handler.messages[0];
        assert_eq!(topic, "robovac/in/cmd");
        assert_eq!(payload.as_slice(), b"TURN_ON");
        assert_eq!(payload.len(), 7); // length-exact, no terminator
    }

    #[test]
    fn disconnect_event_updates_state() {
        let mut ch = channel();
        let mut handler = RecordingHandler::new();
        ch.connect().unwrap();
        ch.service(&mut handler);
        ch.sim_inject_disconnect();
        ch.service(&mut handler);

        assert_eq!(handler.disconnects, 1);
        assert_eq!(ch.state(), ChannelState::Disconnected);
    }

    #[test]
    fn publish_only_while_connected() {
        let mut ch = channel();
        ch.publish_status("early");
        assert!(ch.sim_published().is_empty());

        let mut handler = RecordingHandler::new();
        ch.connect().unwrap();
        ch.service(&mut handler);
        ch.publish_status("cmd: TURN_ON");

        assert_eq!(ch.sim_published().len(), 1);
        let (topic, text) = &ch.sim_published()[0];
        assert_eq!(topic, "robovac/out");
        assert_eq!(text, "cmd: TURN_ON");
    }

    #[test]
    fn subscribe_targets_the_command_topic() {
        let mut ch = channel();
        ch.subscribe_command_topic().unwrap();
        assert_eq!(ch.sim_subscriptions(), ["robovac/in/cmd"]);
    }

    #[test]
    fn publish_acks_are_forwarded() {
        let mut ch = channel();
        let mut handler = RecordingHandler::new();
        ch.connect().unwrap();
        ch.sim_inject_publish_ack(7);
        ch.service(&mut handler);
        assert_eq!(handler.acks, [7]);
    }
}
