// ── Connection state ──

use serde::Serialize;
use strum::{Display, IntoStaticStr};

/// Lifecycle of the single logical realtime connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Display, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// Not wanted, or explicitly torn down.
    #[default]
    Disconnected,
    /// A link is being opened.
    Connecting,
    /// A link is open and channels have been announced.
    Connected,
    /// Waiting out a backoff delay before the next attempt.
    Backoff,
    /// Retries suspended after repeated failures to ever connect.
    Cooldown,
    /// The server rejected the credentials; nothing happens until the
    /// caller reconnects explicitly.
    Blocked,
}

impl ConnectionState {
    pub fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }

    /// `true` while the machine will try again on its own.
    pub fn is_retrying(self) -> bool {
        matches!(self, Self::Backoff | Self::Cooldown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_snake_case() {
        assert_eq!(ConnectionState::Cooldown.to_string(), "cooldown");
        assert_eq!(ConnectionState::Blocked.to_string(), "blocked");
    }

    #[test]
    fn only_connected_is_connected() {
        assert!(ConnectionState::Connected.is_connected());
        assert!(!ConnectionState::Backoff.is_connected());
        assert!(ConnectionState::Backoff.is_retrying());
        assert!(!ConnectionState::Blocked.is_retrying());
    }
}
