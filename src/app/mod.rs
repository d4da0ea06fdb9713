//! Application core — pure domain logic, zero I/O.
//!
//! This module contains the business rules for the VacRelay bridge:
//! command normalization, pending-actuation bookkeeping, and status
//! echoes. All interaction with hardware and transports happens through
//! **port traits** defined in [`ports`], keeping this layer fully
//! testable without real peripherals or a broker.

pub mod notify;
pub mod ports;
pub mod service;
