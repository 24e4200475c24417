//! Connection status.

use std::fmt;

/// Where a [`NetworkConnection`](crate::NetworkConnection) is in its
/// lifecycle.
///
/// ```text
///            ┌──→ Connected ──(link drops)──→ Reconnecting ──┐
/// Pending ───┤        ↑                            │         │
///            │        └────────(back in)───────────┘         ▼
///            └──→ RoomNotFound / RoomFull /            Disconnected
///                 ApiMismatch / GenericError
/// ```
///
/// Every state except `Pending`, `Connected` and `Reconnecting` is
/// terminal: the connection will not leave it, and the owner should drop it
/// and build a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NetStatus {
    /// Gave up on the session (reconnect failed or was refused).
    Disconnected,
    /// Host waiting on a room id, or client waiting on a player id.
    Pending,
    /// In the session.
    Connected,
    /// Client lost its host link and is trying to get back in.
    Reconnecting,
    /// The room id is unknown to the rendezvous server.
    RoomNotFound,
    /// The room exists but has no free slot, or the game already started.
    RoomFull,
    /// Api versions differ between peers or with the rendezvous server.
    ApiMismatch,
    /// Anything else, including the host leaving.
    GenericError,
}

impl NetStatus {
    /// Whether the connection can never leave this status.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending | Self::Connected | Self::Reconnecting)
    }
}

impl fmt::Display for NetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Pending => "pending",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::RoomNotFound => "room-not-found",
            Self::RoomFull => "room-full",
            Self::ApiMismatch => "api-mismatch",
            Self::GenericError => "generic-error",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_terminal_only_for_final_states() {
        assert!(!NetStatus::Pending.is_terminal());
        assert!(!NetStatus::Connected.is_terminal());
        assert!(!NetStatus::Reconnecting.is_terminal());
        for status in [
            NetStatus::Disconnected,
            NetStatus::RoomNotFound,
            NetStatus::RoomFull,
            NetStatus::ApiMismatch,
            NetStatus::GenericError,
        ] {
            assert!(status.is_terminal(), "{status} should be terminal");
        }
    }

    #[test]
    fn test_display_is_kebab_case() {
        assert_eq!(NetStatus::RoomNotFound.to_string(), "room-not-found");
    }
}
