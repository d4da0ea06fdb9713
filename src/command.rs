//! Command vocabulary and interpreter.
//!
//! Every external trigger — a raw MQTT payload on the command topic or a
//! brightness-style set-level call from the smart-plug emulation — is
//! normalized here into one canonical [`Command`]. This is the single
//! normalization point in the firmware; nothing downstream ever looks at
//! wire text or brightness values again.
//!
//! Token matching is exact: case-sensitive, no trimming. A payload that
//! differs by a single byte resolves to [`Command::Unknown`] and must
//! never reach the relay.

use log::debug;

/// Canonical commands plus the `Unknown` sentinel for unrecognized input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Request to power the vacuum on.
    TurnOn,
    /// Request to power the vacuum off.
    TurnOff,
    /// Anything that matched no known token or level. Never actuated.
    Unknown,
}

/// Known tokens in enumeration order. First exact match wins (tokens are
/// unique, so ties are impossible).
const VOCABULARY: [Command; 2] = [Command::TurnOn, Command::TurnOff];

impl Command {
    /// Canonical wire/display token for this command.
    pub const fn token(self) -> &'static str {
        match self {
            Self::TurnOn => "TURN_ON",
            Self::TurnOff => "TURN_OFF",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Exact case-sensitive token lookup. Unmatched text → `Unknown`.
    pub fn from_token(text: &str) -> Self {
        for cmd in VOCABULARY {
            if text == cmd.token() {
                return cmd;
            }
        }
        Self::Unknown
    }

    /// Interpret a raw message payload.
    ///
    /// The broker hands over a length-delimited byte buffer with no NUL
    /// terminator; it is materialized at its exact length (no implicit
    /// growth, no truncation) before token lookup. Non-UTF-8 payloads
    /// cannot match any token and resolve to `Unknown`.
    pub fn from_payload(payload: &[u8]) -> Self {
        match core::str::from_utf8(payload) {
            Ok(text) => Self::from_token(text),
            Err(_) => {
                debug!("command: non-UTF-8 payload ({} bytes)", payload.len());
                Self::Unknown
            }
        }
    }

    /// Interpret a smart-plug set-level call.
    ///
    /// The emulation layer reports switch intents as brightness: full
    /// scale means on, zero means off. Any intermediate dim level has no
    /// meaning for a toggle-button device and resolves to `Unknown`.
    pub const fn from_brightness(level: u8) -> Self {
        match level {
            255 => Self::TurnOn,
            0 => Self::TurnOff,
            _ => Self::Unknown,
        }
    }

    /// Whether this command may drive the relay.
    pub const fn is_actuatable(self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

impl core::fmt::Display for Command {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.token())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trip_for_all_known_commands() {
        for cmd in VOCABULARY {
            assert_eq!(Command::from_token(cmd.token()), cmd);
        }
    }

    #[test]
    fn unknown_token_text_stays_unknown() {
        // "UNKNOWN" is not in the vocabulary, so it round-trips too.
        assert_eq!(Command::from_token(Command::Unknown.token()), Command::Unknown);
    }

    #[test]
    fn empty_and_garbage_resolve_to_unknown() {
        assert_eq!(Command::from_token(""), Command::Unknown);
        assert_eq!(Command::from_token("garbage"), Command::Unknown);
    }

    #[test]
    fn matching_is_case_sensitive() {
        assert_eq!(Command::from_token("turn_on"), Command::Unknown);
        assert_eq!(Command::from_token("Turn_On"), Command::Unknown);
        assert_eq!(Command::from_token("TURN_OFF "), Command::Unknown);
    }

    #[test]
    fn payload_is_matched_at_exact_length() {
        // 7 bytes, no trailing NUL — the wire shape of the real broker.
        assert_eq!(Command::from_payload(b"TURN_ON"), Command::TurnOn);
        assert_eq!(Command::from_payload(b"TURN_OFF"), Command::TurnOff);
        // One extra byte must not match.
        assert_eq!(Command::from_payload(b"TURN_ON\0"), Command::Unknown);
        assert_eq!(Command::from_payload(b"TURN_O"), Command::Unknown);
    }

    #[test]
    fn non_utf8_payload_is_unknown() {
        assert_eq!(Command::from_payload(&[0xFF, 0xFE, 0x41]), Command::Unknown);
    }

    #[test]
    fn brightness_endpoints_map_to_commands() {
        assert_eq!(Command::from_brightness(255), Command::TurnOn);
        assert_eq!(Command::from_brightness(0), Command::TurnOff);
        assert_eq!(Command::from_brightness(128), Command::Unknown);
        assert_eq!(Command::from_brightness(1), Command::Unknown);
        assert_eq!(Command::from_brightness(254), Command::Unknown);
    }

    #[test]
    fn only_known_commands_are_actuatable() {
        assert!(Command::TurnOn.is_actuatable());
        assert!(Command::TurnOff.is_actuatable());
        assert!(!Command::Unknown.is_actuatable());
    }
}
