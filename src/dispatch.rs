//! Event dispatch shim — connectivity supervision and callback routing.
//!
//! Two cooperating pieces:
//!
//! - [`LinkSupervisor`]: the connectivity state machine. Tracks the
//!   network attachment (Wi-Fi station) and the messaging channel
//!   independently through `Disconnected → Connecting → Connected`, and
//!   owns the two one-shot reconnect timers. It performs no I/O itself;
//!   it emits [`LinkAction`]s that the polling loop executes against the
//!   real adapters, which keeps every transition testable on the host.
//!
//! - [`Dispatcher`]: the [`ChannelEvents`] implementation the messaging
//!   transport calls into. Routes command-topic payloads to the
//!   [`AppService`], collects status echoes into a [`StatusBuffer`],
//!   and feeds session changes back into the supervisor.
//!
//! Timer policy: a reconnect is scheduled once per detected loss, after
//! a fixed backoff. Re-entering a loss state while a timer is already
//! pending keeps the existing timer, so attempts never overlap. On
//! network loss the channel's in-flight timer is cancelled *first* —
//! reconnecting the channel onto a dead network would only fail again.

use log::{debug, info, warn};

use crate::app::notify::StatusBuffer;
use crate::app::ports::ChannelEvents;
use crate::app::service::AppService;

// ───────────────────────────────────────────────────────────────
// Link state machine
// ───────────────────────────────────────────────────────────────

/// Connectivity phase of one link (network attachment or channel).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connecting,
    Connected,
}

/// I/O the polling loop must perform on behalf of the supervisor.
///
/// On network-up the three start actions are emitted in a fixed order:
/// the channel connect first, then the update endpoint, then the
/// smart-plug endpoint — the latter two attach to an HTTP listener that
/// must bind on the freshly acquired address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkAction {
    ConnectNetwork,
    ConnectChannel,
    StartUpdateEndpoint,
    StartSmartPlug,
}

/// Actions emitted per transition; network-up produces three.
pub type LinkActions = heapless::Vec<LinkAction, 4>;

/// Connectivity supervisor for the network link and the messaging channel.
pub struct LinkSupervisor {
    network: LinkState,
    channel: LinkState,
    /// One-shot deadline for the next network connect attempt.
    network_retry_at_ms: Option<u64>,
    /// One-shot deadline for the next channel connect attempt.
    channel_retry_at_ms: Option<u64>,
    backoff_ms: u64,
}

impl LinkSupervisor {
    /// The initial network attempt fires on the first `poll`.
    pub const fn new(backoff_ms: u64) -> Self {
        Self {
            network: LinkState::Disconnected,
            channel: LinkState::Disconnected,
            network_retry_at_ms: Some(0),
            channel_retry_at_ms: None,
            backoff_ms,
        }
    }

    pub fn network_state(&self) -> LinkState {
        self.network
    }

    pub fn channel_state(&self) -> LinkState {
        self.channel
    }

    // ── Transitions ───────────────────────────────────────────

    /// Network attachment succeeded; returns the startup actions in
    /// dependency order.
    pub fn on_network_connected(&mut self) -> LinkActions {
        info!("link: network attached");
        self.network = LinkState::Connected;
        self.network_retry_at_ms = None;
        self.channel = LinkState::Connecting;

        let mut actions = LinkActions::new();
        // Infallible: capacity 4, three pushes.
        let _ = actions.push(LinkAction::ConnectChannel);
        let _ = actions.push(LinkAction::StartUpdateEndpoint);
        let _ = actions.push(LinkAction::StartSmartPlug);
        actions
    }

    /// Network attachment lost (or a connect attempt failed).
    pub fn on_network_lost(&mut self, now_ms: u64) {
        // Cancel the channel timer first: no channel reconnect onto a
        // dead network.
        if self.channel_retry_at_ms.take().is_some() {
            debug!("link: cancelled pending channel reconnect");
        }
        self.channel = LinkState::Disconnected;
        self.network = LinkState::Disconnected;

        if self.network_retry_at_ms.is_none() {
            let at = now_ms + self.backoff_ms;
            self.network_retry_at_ms = Some(at);
            warn!("link: network lost, reconnect in {} ms", self.backoff_ms);
        }
    }

    /// Messaging channel session established.
    pub fn on_channel_connected(&mut self) {
        info!("link: channel connected");
        self.channel = LinkState::Connected;
        self.channel_retry_at_ms = None;
    }

    /// Messaging channel lost (or a connect attempt failed). A reconnect
    /// is scheduled only while the network is still attached.
    pub fn on_channel_lost(&mut self, now_ms: u64) {
        self.channel = LinkState::Disconnected;
        if self.network == LinkState::Connected && self.channel_retry_at_ms.is_none() {
            let at = now_ms + self.backoff_ms;
            self.channel_retry_at_ms = Some(at);
            warn!("link: channel lost, reconnect in {} ms", self.backoff_ms);
        }
    }

    // ── Timer servicing ───────────────────────────────────────

    /// Fire any due one-shot timers, emitting the connect actions to
    /// execute. Called once per loop iteration.
    pub fn poll(&mut self, now_ms: u64) -> LinkActions {
        let mut actions = LinkActions::new();

        if self.network_retry_at_ms.is_some_and(|at| now_ms >= at) {
            self.network_retry_at_ms = None;
            self.network = LinkState::Connecting;
            let _ = actions.push(LinkAction::ConnectNetwork);
        }

        if self.network == LinkState::Connected
            && self.channel_retry_at_ms.is_some_and(|at| now_ms >= at)
        {
            self.channel_retry_at_ms = None;
            self.channel = LinkState::Connecting;
            let _ = actions.push(LinkAction::ConnectChannel);
        }

        actions
    }
}

// ───────────────────────────────────────────────────────────────
// Dispatcher
// ───────────────────────────────────────────────────────────────

/// Per-iteration view the channel transport dispatches events into.
///
/// Borrowed fresh each loop pass; the transport calls the
/// [`ChannelEvents`] methods synchronously while being serviced, and
/// the loop reads `subscribe_requested` afterwards to perform the
/// single command-topic subscription (the channel itself is mutably
/// borrowed during servicing, so the subscription cannot be issued
/// re-entrantly).
pub struct Dispatcher<'a> {
    pub supervisor: &'a mut LinkSupervisor,
    pub app: &'a AppService,
    pub status: &'a mut StatusBuffer,
    pub command_topic: &'a str,
    pub now_ms: u64,
    /// Set on connect; the loop subscribes to the command topic once.
    pub subscribe_requested: bool,
}

impl<'a> Dispatcher<'a> {
    pub fn new(
        supervisor: &'a mut LinkSupervisor,
        app: &'a AppService,
        status: &'a mut StatusBuffer,
        command_topic: &'a str,
        now_ms: u64,
    ) -> Self {
        Self {
            supervisor,
            app,
            status,
            command_topic,
            now_ms,
            subscribe_requested: false,
        }
    }
}

impl ChannelEvents for Dispatcher<'_> {
    fn on_connect(&mut self, session_present: bool) {
        debug!("channel: connected (session_present={})", session_present);
        self.supervisor.on_channel_connected();
        self.subscribe_requested = true;
    }

    fn on_disconnect(&mut self) {
        self.supervisor.on_channel_lost(self.now_ms);
    }

    fn on_message(&mut self, topic: &str, payload: &[u8]) {
        if topic == self.command_topic {
            self.app.handle_payload(payload, self.status);
        } else {
            debug!("channel: ignoring message on '{}'", topic);
        }
    }

    fn on_publish_ack(&mut self, message_id: i32) {
        debug!("channel: publish acknowledged (id={})", message_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Command;

    const BACKOFF: u64 = 2_000;

    #[test]
    fn startup_attempts_network_immediately() {
        let mut sup = LinkSupervisor::new(BACKOFF);
        assert_eq!(sup.network_state(), LinkState::Disconnected);
        let actions = sup.poll(0);
        assert_eq!(&actions[..], [LinkAction::ConnectNetwork]);
        assert_eq!(sup.network_state(), LinkState::Connecting);
        // One-shot: no repeat on the next pass.
        assert!(sup.poll(1).is_empty());
    }

    #[test]
    fn network_up_starts_services_in_order() {
        let mut sup = LinkSupervisor::new(BACKOFF);
        let _ = sup.poll(0);
        let actions = sup.on_network_connected();
        assert_eq!(
            &actions[..],
            [
                LinkAction::ConnectChannel,
                LinkAction::StartUpdateEndpoint,
                LinkAction::StartSmartPlug,
            ]
        );
        assert_eq!(sup.network_state(), LinkState::Connected);
        assert_eq!(sup.channel_state(), LinkState::Connecting);
    }

    #[test]
    fn network_loss_schedules_single_one_shot_reconnect() {
        let mut sup = LinkSupervisor::new(BACKOFF);
        let _ = sup.poll(0);
        let _ = sup.on_network_connected();

        sup.on_network_lost(10_000);
        // A second loss report while the timer is pending keeps it.
        sup.on_network_lost(10_500);

        assert!(sup.poll(10_000 + BACKOFF - 1).is_empty());
        let actions = sup.poll(10_000 + BACKOFF);
        assert_eq!(&actions[..], [LinkAction::ConnectNetwork]);
        assert!(sup.poll(10_000 + BACKOFF + 1).is_empty());
    }

    #[test]
    fn channel_loss_reconnects_while_network_up() {
        let mut sup = LinkSupervisor::new(BACKOFF);
        let _ = sup.poll(0);
        let _ = sup.on_network_connected();
        sup.on_channel_connected();

        sup.on_channel_lost(5_000);
        assert!(sup.poll(5_000 + BACKOFF - 1).is_empty());
        let actions = sup.poll(5_000 + BACKOFF);
        assert_eq!(&actions[..], [LinkAction::ConnectChannel]);
        assert_eq!(sup.channel_state(), LinkState::Connecting);
    }

    #[test]
    fn network_loss_cancels_pending_channel_reconnect() {
        let mut sup = LinkSupervisor::new(BACKOFF);
        let _ = sup.poll(0);
        let _ = sup.on_network_connected();
        sup.on_channel_connected();

        sup.on_channel_lost(5_000);
        sup.on_network_lost(5_100);

        // Only the network timer remains; the channel timer is gone.
        let actions = sup.poll(5_100 + BACKOFF);
        assert_eq!(&actions[..], [LinkAction::ConnectNetwork]);
        // Even far in the future, no stale channel connect fires before
        // the network comes back up.
        assert!(sup.poll(60_000).is_empty());
    }

    #[test]
    fn channel_loss_without_network_is_not_rescheduled() {
        let mut sup = LinkSupervisor::new(BACKOFF);
        sup.on_channel_lost(1_000);
        let _ = sup.poll(0); // initial network attempt
        assert!(sup.poll(1_000 + BACKOFF).is_empty());
    }

    // ── Dispatcher routing ────────────────────────────────────

    fn routed(topic: &str, payload: &[u8]) -> (Command, Vec<String>, bool) {
        let mut sup = LinkSupervisor::new(BACKOFF);
        let _ = sup.poll(0);
        let _ = sup.on_network_connected();
        let app = AppService::new();
        let mut status = StatusBuffer::new();

        let mut shim = Dispatcher::new(&mut sup, &app, &mut status, "robovac/in/cmd", 0);
        shim.on_connect(false);
        shim.on_message(topic, payload);
        let subscribed = shim.subscribe_requested;

        let pending = if app.pending().is_pending(Command::TurnOn) {
            Command::TurnOn
        } else if app.pending().is_pending(Command::TurnOff) {
            Command::TurnOff
        } else {
            Command::Unknown
        };
        (pending, status.lines().map(String::from).collect(), subscribed)
    }

    #[test]
    fn command_topic_payload_reaches_the_service() {
        let (pending, lines, subscribed) = routed("robovac/in/cmd", b"TURN_ON");
        assert_eq!(pending, Command::TurnOn);
        assert_eq!(lines, ["cmd: TURN_ON"]);
        assert!(subscribed);
    }

    #[test]
    fn foreign_topic_is_ignored() {
        let (pending, lines, _) = routed("robovac/other", b"TURN_ON");
        assert_eq!(pending, Command::Unknown);
        assert!(lines.is_empty());
    }

    #[test]
    fn disconnect_flows_back_into_the_supervisor() {
        let mut sup = LinkSupervisor::new(BACKOFF);
        let _ = sup.poll(0);
        let _ = sup.on_network_connected();
        let app = AppService::new();
        let mut status = StatusBuffer::new();

        let mut shim = Dispatcher::new(&mut sup, &app, &mut status, "robovac/in/cmd", 7_000);
        shim.on_connect(false);
        shim.on_disconnect();
        drop(shim);

        assert_eq!(sup.channel_state(), LinkState::Disconnected);
        let actions = sup.poll(7_000 + BACKOFF);
        assert_eq!(&actions[..], [LinkAction::ConnectChannel]);
    }
}
