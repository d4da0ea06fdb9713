//! Application service — the hexagonal core.
//!
//! [`AppService`] is the single point where heterogeneous triggers
//! become actuations:
//!
//! ```text
//!  channel payload ──▶ ┌──────────────────────┐ ──▶ StatusPublisher
//!  smart-plug level ──▶│      AppService       │
//!                      │ interpret · flag · echo│
//!  polling loop ──────▶│ drain_pending          │──▶ RelayPort
//!                      └──────────────────────┘
//! ```
//!
//! Handler methods take `&self`: the only mutable state is the pair of
//! atomic pending flags, so the service can be shared with callback
//! contexts without locking. Draining — the only blocking path — is a
//! separate method called exclusively from the polling loop.

use log::{info, warn};

use crate::app::notify::{self, CommandOrigin};
use crate::app::ports::{RelayPort, StatusPublisher};
use crate::command::Command;
use crate::pending::PendingActions;

/// The application service orchestrates command handling.
pub struct AppService {
    pending: PendingActions,
}

impl AppService {
    pub const fn new() -> Self {
        Self {
            pending: PendingActions::new(),
        }
    }

    /// Handle a raw payload received on the command topic.
    ///
    /// A recognized token sets its pending flag exactly once and is
    /// echoed on the status channel. An unrecognized token is logged
    /// and otherwise ignored — no flag, no echo.
    pub fn handle_payload(&self, payload: &[u8], sink: &mut impl StatusPublisher) -> Command {
        let cmd = Command::from_payload(payload);
        if cmd.is_actuatable() {
            info!("command: {} received on command topic", cmd);
            self.pending.request(cmd);
            notify::announce(sink, CommandOrigin::CommandTopic, cmd);
        } else {
            warn!("command: unrecognized payload ({} bytes)", payload.len());
        }
        cmd
    }

    /// Handle a set-level call from the smart-plug emulation.
    ///
    /// Full scale / zero map to the two commands; any other level is
    /// rejected with an explicit status line and never actuates.
    pub fn handle_brightness(&self, level: u8, sink: &mut impl StatusPublisher) -> Command {
        let cmd = Command::from_brightness(level);
        if cmd.is_actuatable() {
            info!("command: {} via smart-plug (level {})", cmd, level);
            self.pending.request(cmd);
            notify::announce(sink, CommandOrigin::SmartPlug, cmd);
        } else {
            notify::announce_rejected_level(sink, CommandOrigin::SmartPlug, level);
        }
        cmd
    }

    /// Drain all pending flags into relay pulses. Polling-loop context
    /// only — each pulse blocks for the hold time, and pulses for flags
    /// set before this call run back-to-back to completion.
    ///
    /// Both commands collapse to the same physical toggle, so the drain
    /// order (TurnOn first) carries no hardware meaning; it exists so
    /// the behavior is deterministic.
    pub fn drain_pending(&self, relay: &mut impl RelayPort) -> u8 {
        let mut pulses = 0;
        for cmd in [Command::TurnOn, Command::TurnOff] {
            if self.pending.take(cmd) {
                relay.pulse();
                pulses += 1;
            }
        }
        pulses
    }

    /// The shared pending-flag pair (tests and loop introspection).
    pub fn pending(&self) -> &PendingActions {
        &self.pending
    }
}

impl Default for AppService {
    fn default() -> Self {
        Self::new()
    }
}
