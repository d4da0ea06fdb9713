//! GPIO pin assignments for the VacRelay board.
//!
//! Single source of truth — every driver references this module rather
//! than hard-coding pin numbers.

// ---------------------------------------------------------------------------
// Relay (vacuum power button)
// ---------------------------------------------------------------------------

/// Digital output driving the relay input. The relay module is
/// active-low: LOW closes the contact across the vacuum's power button,
/// HIGH (the rest level) leaves it open.
pub const RELAY_GPIO: i32 = 13;

// ---------------------------------------------------------------------------
// Indicator LED
// ---------------------------------------------------------------------------

/// On-board status LED, active-low. Mirrors the relay during a pulse so
/// a command is visible without a meter on the relay contacts.
pub const INDICATOR_LED_GPIO: i32 = 2;
