//! Transport abstraction layer for Relaynet.
//!
//! The session layer never touches sockets. It talks to a [`Transport`]:
//! something that can reach a rendezvous (NAT punchthrough) server, punch
//! through to a peer by room id, open links to peers, and hand back
//! whatever arrived since the last poll as a list of [`Packet`]s.
//!
//! Every frame carries a [`ControlPacketKind`]. That tag travels beside the
//! payload bytes, so application payloads (`Standard`) and session control
//! messages never share an encoding.
//!
//! # Feature Flags
//!
//! - `memory` (default): [`MemoryNetwork`], an in-process rendezvous server
//!   and peer mesh for tests and demos

mod error;
#[cfg(feature = "memory")]
mod memory;

pub use error::TransportError;
#[cfg(feature = "memory")]
pub use memory::{DEFAULT_RENDEZVOUS_PORT, MemoryNetwork, MemoryTransport};

use std::fmt;

// ---------------------------------------------------------------------------
// PeerAddress
// ---------------------------------------------------------------------------

/// Network address of a peer or server, in `host:port` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerAddress(String);

impl PeerAddress {
    /// Builds an address from a host name (or IP) and a port.
    pub fn new(host: &str, port: u16) -> Self {
        Self(format!("{host}:{port}"))
    }

    /// Returns the address as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// ControlPacketKind
// ---------------------------------------------------------------------------

/// Out-of-band message type attached to every frame.
///
/// `Standard` frames carry application bytes. Everything else is session
/// bookkeeping consumed by the connection state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlPacketKind {
    Standard,
    AssignedRoom,
    JoinRoom,
    JoinRoomFail,
    Reconnect,
    PlayerJoined,
    PlayerLeft,
    StartGame,
}

impl ControlPacketKind {
    /// `true` for every kind except `Standard`.
    pub fn is_control(self) -> bool {
        !matches!(self, Self::Standard)
    }
}

impl fmt::Display for ControlPacketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Standard => "standard",
            Self::AssignedRoom => "assigned-room",
            Self::JoinRoom => "join-room",
            Self::JoinRoomFail => "join-room-fail",
            Self::Reconnect => "reconnect",
            Self::PlayerJoined => "player-joined",
            Self::PlayerLeft => "player-left",
            Self::StartGame => "start-game",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Why a punchthrough attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PunchFailure {
    /// The rendezvous server has no endpoint registered under that room.
    TargetNotConnected,
    /// The target is registered but did not answer.
    TargetUnresponsive,
}

/// Something that happened on the transport since the last poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// An outgoing `connect` completed.
    ConnectionAccepted,
    /// A remote peer opened a link to us.
    IncomingConnection,
    /// An outgoing `connect` could not be completed.
    ConnectionFailed,
    /// The remote side runs a different api version.
    IncompatibleVersion,
    /// The remote side closed the link on purpose.
    Disconnected,
    /// The link dropped without a goodbye.
    ConnectionLost,
    /// NAT punchthrough reached the peer; it can now be connected to.
    PunchSucceeded,
    /// NAT punchthrough failed.
    PunchFailed(PunchFailure),
    /// A frame arrived.
    Frame {
        kind: ControlPacketKind,
        payload: Vec<u8>,
    },
}

/// An event together with the peer it concerns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub from: PeerAddress,
    pub event: TransportEvent,
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// The capabilities a connection orchestrator needs from the network.
///
/// All methods are non-blocking. The outcome of `connect` and
/// `resolve_and_punch` arrives later as events from [`poll`](Self::poll).
pub trait Transport {
    /// The address other peers see for this endpoint.
    fn local_address(&self) -> PeerAddress;

    /// Opens a link to `address`, announcing our api version.
    fn connect(
        &mut self,
        address: &PeerAddress,
        api_version: u8,
    ) -> Result<(), TransportError>;

    /// Drains everything that arrived since the previous call, in
    /// arrival order.
    fn poll(&mut self) -> Vec<Packet>;

    /// Sends one frame over an open link.
    fn send_to(
        &mut self,
        to: &PeerAddress,
        kind: ControlPacketKind,
        payload: &[u8],
    ) -> Result<(), TransportError>;

    /// Asks the rendezvous server to punch through to whoever hosts `room`.
    fn resolve_and_punch(
        &mut self,
        rendezvous: &PeerAddress,
        room: &str,
    ) -> Result<(), TransportError>;

    /// Closes the link to `peer`, telling it we left.
    fn disconnect(&mut self, peer: &PeerAddress);

    /// Unregisters from the rendezvous server and closes every link.
    fn shutdown(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peer_address_new_joins_host_and_port() {
        let addr = PeerAddress::new("34.74.68.73", 61111);
        assert_eq!(addr.as_str(), "34.74.68.73:61111");
        assert_eq!(addr.to_string(), "34.74.68.73:61111");
    }

    #[test]
    fn test_peer_address_hash_works_as_map_key() {
        use std::collections::HashMap;
        let mut map = HashMap::new();
        map.insert(PeerAddress::new("a", 1), "alice");
        map.insert(PeerAddress::new("b", 1), "bob");
        assert_eq!(map[&PeerAddress::new("a", 1)], "alice");
    }

    #[test]
    fn test_control_kind_standard_is_not_control() {
        assert!(!ControlPacketKind::Standard.is_control());
        assert!(ControlPacketKind::JoinRoom.is_control());
        assert!(ControlPacketKind::StartGame.is_control());
    }

    #[test]
    fn test_control_kind_display() {
        assert_eq!(ControlPacketKind::JoinRoomFail.to_string(), "join-room-fail");
        assert_eq!(ControlPacketKind::Standard.to_string(), "standard");
    }
}
