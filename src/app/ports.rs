//! Port traits — the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ AppService (domain)
//! ```
//!
//! Driven adapters (relay driver, messaging channel, smart-plug
//! emulation) implement these traits. The
//! [`AppService`](super::service::AppService) consumes them via
//! generics, so the domain core never touches hardware or a socket
//! directly.

// ───────────────────────────────────────────────────────────────
// Actuator port (domain → hardware)
// ───────────────────────────────────────────────────────────────

/// Write-side port: the domain calls this to fire the power-cycle pulse.
///
/// A pulse is the only physical effect in the system and is identical
/// for both recognized commands — the vacuum exposes one toggle button
/// behind the relay. Implementations block for the pulse hold time, so
/// this must only ever be invoked from the polling-loop context, never
/// from inside a transport callback.
pub trait RelayPort {
    fn pulse(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Status port (domain → outbound channel)
// ───────────────────────────────────────────────────────────────

/// Outbound port for human-readable status echoes.
///
/// One publish per invocation; no retry, no delivery confirmation
/// beyond what the channel itself offers.
pub trait StatusPublisher {
    fn publish_status(&mut self, text: &str);
}

// ───────────────────────────────────────────────────────────────
// Channel event interface (transport → dispatch shim)
// ───────────────────────────────────────────────────────────────

/// Callbacks the messaging-channel transport delivers into the dispatch
/// shim. The transport collaborator is injected as a dependency, so a
/// fake implementation can drive the shim in tests.
pub trait ChannelEvents {
    /// Session established with the broker.
    fn on_connect(&mut self, session_present: bool);
    /// Session lost; the shim schedules the one-shot reconnect.
    fn on_disconnect(&mut self);
    /// A message arrived on a subscribed topic. `payload` is
    /// length-delimited raw bytes, not NUL-terminated.
    fn on_message(&mut self, topic: &str, payload: &[u8]);
    /// Broker acknowledged an outbound publish.
    fn on_publish_ack(&mut self, message_id: i32);
}
