//! Fuzz target: `Command::from_payload`
//!
//! Drives arbitrary byte sequences through the payload parser and
//! asserts that it never panics and only ever recognizes the exact
//! vocabulary tokens.
//!
//! cargo fuzz run fuzz_command_parser

#![no_main]

use libfuzzer_sys::fuzz_target;
use vacrelay::command::Command;

fuzz_target!(|data: &[u8]| {
    let cmd = Command::from_payload(data);

    // A recognized command implies the payload was byte-for-byte one of
    // the vocabulary tokens.
    match cmd {
        Command::TurnOn => assert_eq!(data, b"TURN_ON"),
        Command::TurnOff => assert_eq!(data, b"TURN_OFF"),
        Command::Unknown => {}
    }

    // Parsing is a pure function of the bytes.
    assert_eq!(Command::from_payload(data), cmd);
});
