//! Pending-actuation flags.
//!
//! One independent bit per actuatable command, bridging the transport
//! callback context (producer) and the polling loop (consumer):
//!
//! ```text
//! ┌──────────────────┐  request()   ┌────────────────┐  take()   ┌───────────┐
//! │ channel/smart-   │─────────────▶│ PendingActions │──────────▶│ poll loop │
//! │ plug callbacks   │              │ (two AtomicBool)│           │ → pulse() │
//! └──────────────────┘              └────────────────┘           └───────────┘
//! ```
//!
//! Rapid repeated requests of the same kind before a loop drain coalesce
//! into a single actuation — a single bit cannot count. That is the
//! intended last-write-wins behavior, not a defect. Flags are set only
//! through [`PendingActions::request`] and cleared only through
//! [`PendingActions::take`]; each is a single-bit atomic, so no lock is
//! needed between the two contexts.

use core::sync::atomic::{AtomicBool, Ordering};

use crate::command::Command;

/// The pair of coalescing actuation-request flags.
pub struct PendingActions {
    turn_on: AtomicBool,
    turn_off: AtomicBool,
}

impl PendingActions {
    /// Both flags start cleared; there is no teardown on a device that
    /// never gracefully shuts down.
    pub const fn new() -> Self {
        Self {
            turn_on: AtomicBool::new(false),
            turn_off: AtomicBool::new(false),
        }
    }

    fn flag(&self, cmd: Command) -> Option<&AtomicBool> {
        match cmd {
            Command::TurnOn => Some(&self.turn_on),
            Command::TurnOff => Some(&self.turn_off),
            Command::Unknown => None,
        }
    }

    /// Mark an actuation of this kind as requested.
    ///
    /// Safe to call from any callback context. Returns `false` for
    /// [`Command::Unknown`], which has no flag and never actuates.
    pub fn request(&self, cmd: Command) -> bool {
        match self.flag(cmd) {
            Some(flag) => {
                flag.store(true, Ordering::Release);
                true
            }
            None => false,
        }
    }

    /// Consume the flag for `cmd`, returning whether it was set.
    ///
    /// Called exclusively from the polling loop.
    pub fn take(&self, cmd: Command) -> bool {
        match self.flag(cmd) {
            Some(flag) => flag.swap(false, Ordering::AcqRel),
            None => false,
        }
    }

    /// Non-consuming peek at one flag.
    pub fn is_pending(&self, cmd: Command) -> bool {
        self.flag(cmd)
            .is_some_and(|flag| flag.load(Ordering::Acquire))
    }

    /// Whether any actuation is waiting for the next loop drain.
    pub fn any_pending(&self) -> bool {
        self.is_pending(Command::TurnOn) || self.is_pending(Command::TurnOff)
    }
}

impl Default for PendingActions {
    fn default() -> Self {
        Self::new()
    }
}
