//! # Relaynet
//!
//! Small multiplayer sessions for games: one peer hosts, the others find
//! it through a NAT punchthrough server by room id, and everything a client
//! sends is relayed by the host to the rest.
//!
//! Two pieces:
//!
//! - [`NetworkConnection`]: the session orchestrator. Call
//!   [`receive`](NetworkConnection::receive) every tick, read
//!   [`status`](NetworkConnection::status), and [`send`](NetworkConnection::send)
//!   payloads once connected.
//! - [`Encoder`] / [`Decoder`]: a tag-dispatched binary format for those
//!   payloads.
//!
//! ## Quick Start
//!
//! ```rust
//! use relaynet::prelude::*;
//!
//! let net = MemoryNetwork::new();
//! let config = SessionConfig::new("127.0.0.1", 61111, 3, 0);
//!
//! let mut host = NetworkConnection::host(config.clone(), net.endpoint())?;
//! while host.room_id().is_none() {
//!     host.receive(|_| {});
//! }
//! let room = host.room_id().cloned().expect("assigned");
//!
//! let mut client = NetworkConnection::client(config, room, net.endpoint())?;
//! while client.status() == NetStatus::Pending {
//!     host.receive(|_| {});
//!     client.receive(|_| {});
//! }
//! assert_eq!(client.player_id(), Some(PlayerId(1)));
//!
//! let mut enc = Encoder::new();
//! enc.write("hello").write(&42u32);
//! client.send(enc.serialize());
//!
//! let mut dec: Decoder = Decoder::new();
//! host.receive(|bytes| dec.receive(bytes));
//! assert_eq!(dec.read()?.into_string()?, "hello");
//! assert_eq!(dec.read()?.into_u32()?, 42);
//! # Ok::<(), relaynet::RelaynetError>(())
//! ```
//!
//! ## Feature Flags
//!
//! - `json` (default): encode and decode `serde_json::Value` trees
//! - `memory` (default): [`MemoryNetwork`], an in-process rendezvous
//!   server and peer network

mod error;

pub use error::RelaynetError;

pub use relaynet_codec::{
    Decoder, Element, Encode, Encoder, MAX_TREE_DEPTH, ProtocolError, Tag, Tree, TreeKind,
    TreeValue, TypeMismatch, VECTOR_BASE, WireKind, WireValue,
};
pub use relaynet_session::{
    MAX_PLAYERS_LIMIT, NetStatus, NetworkConnection, PlayerId, PlayerSet, RoomId,
    SessionConfig, SessionError,
};
#[cfg(feature = "memory")]
pub use relaynet_transport::{MemoryNetwork, MemoryTransport};
pub use relaynet_transport::{
    ControlPacketKind, Packet, PeerAddress, PunchFailure, Transport, TransportError,
    TransportEvent,
};

/// Everything a game needs for a session, in one import.
pub mod prelude {
    pub use crate::{
        Decoder, Encoder, NetStatus, NetworkConnection, PlayerId, RelaynetError, RoomId,
        SessionConfig, Tree, WireValue,
    };
    #[cfg(feature = "memory")]
    pub use crate::{MemoryNetwork, MemoryTransport};
}
