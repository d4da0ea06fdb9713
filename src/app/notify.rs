//! Status notifications — echoes of received commands.
//!
//! Every recognized command is echoed back on the outbound channel as
//! `"<origin prefix>: <token>"`, so an operator watching the status
//! topic can tell which trigger source produced an actuation. A
//! smart-plug level that is neither 0 nor 255 additionally produces an
//! explicit rejection line rather than being dropped silently.

use core::fmt::Write as _;

use log::warn;

use crate::app::ports::StatusPublisher;
use crate::command::Command;

/// Longest status line we ever format; sized with ample headroom over
/// `"alexa: rejected level 255"`.
const STATUS_LINE_CAP: usize = 96;

/// Where a command entered the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOrigin {
    /// Raw token on the messaging command topic.
    CommandTopic,
    /// Set-level call from the smart-plug emulation.
    SmartPlug,
}

impl CommandOrigin {
    /// Display prefix identifying the trigger source in status echoes.
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::CommandTopic => "cmd",
            Self::SmartPlug => "alexa",
        }
    }
}

/// Echo a received command: one outbound publish of `"<prefix>: <token>"`.
pub fn announce(sink: &mut impl StatusPublisher, origin: CommandOrigin, cmd: Command) {
    let mut line = heapless::String::<STATUS_LINE_CAP>::new();
    if write!(line, "{}: {}", origin.prefix(), cmd.token()).is_ok() {
        sink.publish_status(&line);
    }
}

/// Report a smart-plug level that maps to no command.
pub fn announce_rejected_level(sink: &mut impl StatusPublisher, origin: CommandOrigin, level: u8) {
    warn!("notify: rejected level {} from {}", level, origin.prefix());
    let mut line = heapless::String::<STATUS_LINE_CAP>::new();
    if write!(line, "{}: rejected level {}", origin.prefix(), level).is_ok() {
        sink.publish_status(&line);
    }
}

// ───────────────────────────────────────────────────────────────
// Buffered status sink
// ───────────────────────────────────────────────────────────────

/// Bounded collector implementing [`StatusPublisher`].
///
/// Transport callbacks raise notifications while the channel itself is
/// mutably borrowed by the servicing call, so the shim writes into this
/// buffer and the polling loop flushes it to the channel afterwards.
/// On overflow the newest line is dropped with a warning; with at most
/// a couple of echoes per serviced callback the bound is never hit in
/// practice.
pub struct StatusBuffer {
    lines: heapless::Vec<heapless::String<STATUS_LINE_CAP>, 8>,
}

impl StatusBuffer {
    pub const fn new() -> Self {
        Self {
            lines: heapless::Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Read-only view of the buffered lines (tests).
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(heapless::String::as_str)
    }

    /// Move every buffered line into the real publisher.
    pub fn flush_into(&mut self, sink: &mut impl StatusPublisher) {
        for line in &self.lines {
            sink.publish_status(line);
        }
        self.lines.clear();
    }
}

impl Default for StatusBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusPublisher for StatusBuffer {
    fn publish_status(&mut self, text: &str) {
        let mut line = heapless::String::new();
        if line.push_str(text).is_err() {
            warn!("notify: status line too long, dropped");
            return;
        }
        if self.lines.push(line).is_err() {
            warn!("notify: status buffer full, dropped '{}'", text);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn announce_formats_prefix_and_token() {
        let mut buf = StatusBuffer::new();
        announce(&mut buf, CommandOrigin::CommandTopic, Command::TurnOn);
        announce(&mut buf, CommandOrigin::SmartPlug, Command::TurnOff);
        let lines: Vec<&str> = buf.lines().collect();
        assert_eq!(lines, ["cmd: TURN_ON", "alexa: TURN_OFF"]);
    }

    #[test]
    fn rejection_names_the_offending_level() {
        let mut buf = StatusBuffer::new();
        announce_rejected_level(&mut buf, CommandOrigin::SmartPlug, 42);
        let lines: Vec<&str> = buf.lines().collect();
        assert_eq!(lines, ["alexa: rejected level 42"]);
    }

    #[test]
    fn flush_empties_the_buffer_in_order() {
        struct Recorder(Vec<String>);
        impl StatusPublisher for Recorder {
            fn publish_status(&mut self, text: &str) {
                self.0.push(text.to_string());
            }
        }

        let mut buf = StatusBuffer::new();
        announce(&mut buf, CommandOrigin::CommandTopic, Command::TurnOn);
        announce(&mut buf, CommandOrigin::CommandTopic, Command::TurnOff);

        let mut out = Recorder(Vec::new());
        buf.flush_into(&mut out);
        assert!(buf.is_empty());
        assert_eq!(out.0, ["cmd: TURN_ON", "cmd: TURN_OFF"]);
    }

    #[test]
    fn overflow_drops_rather_than_panics() {
        let mut buf = StatusBuffer::new();
        for _ in 0..20 {
            buf.publish_status("line");
        }
        assert_eq!(buf.len(), 8);
    }
}
