//! Session configuration.

use std::time::Duration;

use relaynet_transport::PeerAddress;
use serde::{Deserialize, Serialize};

use crate::SessionError;

/// Largest session size the player-id space allows (ids `0..=255`).
pub const MAX_PLAYERS_LIMIT: u32 = 256;

/// Configuration shared by hosts and clients.
///
/// Every peer in a session must agree on `api_version`; the rendezvous
/// server may also enforce a minimum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Host name or IP of the punchthrough (rendezvous) server.
    pub punchthrough_server_addr: String,

    /// Port of the punchthrough server.
    pub punchthrough_server_port: u16,

    /// Session capacity including the host. Must be in `1..=256`.
    pub max_num_players: u32,

    /// Protocol version announced on every connection.
    pub api_version: u8,

    /// How long a host keeps a dropped client's slot reserved, and how long
    /// a client keeps trying to get back in.
    ///
    /// Default: 30 seconds. Set to 0 to give up on the first drop.
    pub reconnect_grace_secs: u64,

    /// Punchthrough attempts a client makes after losing the host before
    /// settling on `Disconnected`.
    pub max_reconnect_attempts: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            punchthrough_server_addr: "127.0.0.1".to_owned(),
            punchthrough_server_port: 61111,
            max_num_players: 3,
            api_version: 0,
            reconnect_grace_secs: 30,
            max_reconnect_attempts: 5,
        }
    }
}

impl SessionConfig {
    /// Builds a config from the four values every session needs; the
    /// reconnect settings keep their defaults.
    pub fn new(
        punchthrough_server_addr: impl Into<String>,
        punchthrough_server_port: u16,
        max_num_players: u32,
        api_version: u8,
    ) -> Self {
        Self {
            punchthrough_server_addr: punchthrough_server_addr.into(),
            punchthrough_server_port,
            max_num_players,
            api_version,
            ..Self::default()
        }
    }

    /// Checks the invariants the orchestrator relies on.
    ///
    /// # Errors
    /// Returns [`SessionError::InvalidConfig`] when the player count is
    /// outside `1..=256` or the server address is empty.
    pub fn validate(&self) -> Result<(), SessionError> {
        if !(1..=MAX_PLAYERS_LIMIT).contains(&self.max_num_players) {
            return Err(SessionError::InvalidConfig(format!(
                "max_num_players must be in 1..={MAX_PLAYERS_LIMIT}, got {}",
                self.max_num_players
            )));
        }
        if self.punchthrough_server_addr.is_empty() {
            return Err(SessionError::InvalidConfig(
                "punchthrough_server_addr is empty".to_owned(),
            ));
        }
        Ok(())
    }

    /// Address of the punchthrough server.
    pub fn rendezvous_address(&self) -> PeerAddress {
        PeerAddress::new(&self.punchthrough_server_addr, self.punchthrough_server_port)
    }

    pub fn reconnect_grace(&self) -> Duration {
        Duration::from_secs(self.reconnect_grace_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_keeps_reconnect_defaults() {
        let config = SessionConfig::new("34.74.68.73", 61111, 3, 0);
        assert_eq!(config.max_num_players, 3);
        assert_eq!(config.reconnect_grace_secs, 30);
        assert_eq!(config.max_reconnect_attempts, 5);
        assert_eq!(config.rendezvous_address().as_str(), "34.74.68.73:61111");
    }

    #[test]
    fn test_validate_accepts_bounds() {
        assert!(SessionConfig::new("a", 1, 1, 0).validate().is_ok());
        assert!(SessionConfig::new("a", 1, 256, 0).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_players() {
        let err = SessionConfig::new("a", 1, 0, 0).validate().unwrap_err();
        assert!(matches!(err, SessionError::InvalidConfig(_)));
    }

    #[test]
    fn test_validate_rejects_more_than_256_players() {
        let err = SessionConfig::new("a", 1, 257, 0).validate().unwrap_err();
        assert!(err.to_string().contains("257"));
    }

    #[test]
    fn test_validate_rejects_empty_address() {
        assert!(SessionConfig::new("", 1, 2, 0).validate().is_err());
    }

    #[test]
    fn test_deserialize_partial_config_fills_defaults() {
        let config: SessionConfig =
            serde_json::from_str(r#"{"max_num_players": 4, "api_version": 2}"#).unwrap();
        assert_eq!(config.max_num_players, 4);
        assert_eq!(config.api_version, 2);
        assert_eq!(config.punchthrough_server_port, 61111);
    }
}
