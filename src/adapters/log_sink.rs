//! Log-based status sink adapter.
//!
//! Implements [`StatusPublisher`] by writing status lines to the
//! ESP-IDF logger (UART / USB-CDC in production). Used at boot and
//! whenever the messaging channel is down, so command handling always
//! has somewhere to announce itself.

use log::info;

use crate::app::ports::StatusPublisher;

/// Adapter that logs every status line to the serial console.
pub struct LogStatusSink;

impl LogStatusSink {
    pub fn new() -> Self {
        Self
    }
}

impl StatusPublisher for LogStatusSink {
    fn publish_status(&mut self, text: &str) {
        info!("STATUS | {}", text);
    }
}
