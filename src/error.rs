//! Unified error types for the VacRelay firmware.
//!
//! Transport-level failures are transient and recovered locally by the
//! link supervisor; they never surface to the command layer. An
//! unrecognized command is not an error at all — it resolves to the
//! `Unknown` sentinel in [`crate::command`]. What remains here are the
//! typed failures the adapters can report upward.

use core::fmt;

/// Communication-subsystem failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommsError {
    /// Station interface refused to associate.
    NetworkConnectFailed,
    /// Messaging channel could not reach the broker.
    ChannelConnectFailed,
    /// Command-topic subscription was rejected.
    SubscribeFailed,
    /// Outbound status publish failed.
    PublishFailed,
    /// HTTP listener for the update / smart-plug endpoints failed to start.
    EndpointStartFailed,
}

impl fmt::Display for CommsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NetworkConnectFailed => write!(f, "network connect failed"),
            Self::ChannelConnectFailed => write!(f, "channel connect failed"),
            Self::SubscribeFailed => write!(f, "command-topic subscribe failed"),
            Self::PublishFailed => write!(f, "status publish failed"),
            Self::EndpointStartFailed => write!(f, "HTTP endpoint start failed"),
        }
    }
}

impl core::error::Error for CommsError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_every_variant() {
        assert!(CommsError::NetworkConnectFailed.to_string().contains("network"));
        assert!(CommsError::ChannelConnectFailed.to_string().contains("channel"));
        assert!(CommsError::SubscribeFailed.to_string().contains("subscribe"));
        assert!(CommsError::PublishFailed.to_string().contains("publish"));
        assert!(CommsError::EndpointStartFailed.to_string().contains("endpoint"));
    }
}
