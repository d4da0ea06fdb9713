//! Relay-controller firmware library.
//!
//! Exposes the pure-logic modules for integration testing and external
//! inspection. All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod app;
pub mod command;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod pending;
pub mod pins;

// ESP-IDF-backed boundary layers; the platform implementations are
// guarded by cfg attributes inside, simulation stands in elsewhere.
pub mod adapters;
pub mod drivers;
