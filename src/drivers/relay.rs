//! Relay pulse driver.
//!
//! The vacuum's power button sits behind a relay contact: a momentary
//! drive-low / hold / drive-high cycle presses the button once. There
//! is no steady "on" output level to model — the device toggles on
//! pulse, so both recognized commands collapse to this single action.
//! The on-board indicator LED mirrors the relay during the pulse.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: drives real GPIO via hw_init helpers and blocks on a
//! FreeRTOS delay for the hold time.
//! On host/test: sleeps the same hold time and counts pulses.

use log::info;

use crate::app::ports::RelayPort;
use crate::drivers::hw_init;
use crate::pins;

pub struct RelayDriver {
    pulse_ms: u32,
    pulse_count: u32,
}

impl RelayDriver {
    pub const fn new(pulse_ms: u32) -> Self {
        Self {
            pulse_ms,
            pulse_count: 0,
        }
    }

    /// One power-cycle pulse: relay and indicator low, hold, both high.
    ///
    /// Blocks the calling task for the hold time — polling-loop context
    /// only, never a transport callback. Fire-and-forget: there is no
    /// sensor feedback confirming the vacuum reacted.
    pub fn pulse(&mut self) {
        hw_init::gpio_write(pins::RELAY_GPIO, false);
        hw_init::gpio_write(pins::INDICATOR_LED_GPIO, false);
        hw_init::delay_ms(self.pulse_ms);
        hw_init::gpio_write(pins::RELAY_GPIO, true);
        hw_init::gpio_write(pins::INDICATOR_LED_GPIO, true);

        self.pulse_count = self.pulse_count.wrapping_add(1);
        info!("relay: pulse #{} ({} ms)", self.pulse_count, self.pulse_ms);
    }

    /// Total pulses fired since boot.
    pub fn pulse_count(&self) -> u32 {
        self.pulse_count
    }
}

impl RelayPort for RelayDriver {
    fn pulse(&mut self) {
        Self::pulse(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pulse_increments_counter() {
        let mut relay = RelayDriver::new(1);
        relay.pulse();
        relay.pulse();
        assert_eq!(relay.pulse_count(), 2);
    }

    #[test]
    fn pulse_holds_for_configured_duration() {
        let mut relay = RelayDriver::new(20);
        let start = std::time::Instant::now();
        relay.pulse();
        assert!(start.elapsed() >= std::time::Duration::from_millis(20));
    }
}
