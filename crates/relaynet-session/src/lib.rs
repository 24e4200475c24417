//! Host/client session orchestration for Relaynet.
//!
//! A session is a star: one host, up to 255 clients, all found through a
//! rendezvous (NAT punchthrough) server. This crate handles:
//!
//! 1. **Roles**: the host keeps a slot table, a client remembers its host
//!    and room ([`Role`])
//! 2. **Identity**: room ids from the rendezvous server, player ids handed
//!    out by the host ([`RoomId`], [`PlayerId`])
//! 3. **Status**: a state machine driven only by control packets seen
//!    while polling ([`NetStatus`])
//! 4. **Reconnection**: dropped clients keep their slot for a grace
//!    period and come back with the same id
//!
//! # How it fits in the stack
//!
//! ```text
//! Application (above)  ← calls send / receive / start_game every tick
//!     ↕
//! Session Layer (this crate)  ← roles, ids, status, relay
//!     ↕
//! Transport Layer (below)  ← rendezvous, punchthrough, framed links
//! ```

mod config;
mod connection;
mod control;
mod error;
mod players;
mod role;
mod status;

pub use config::{MAX_PLAYERS_LIMIT, SessionConfig};
pub use connection::NetworkConnection;
pub use control::{ControlMessage, Direction};
pub use error::SessionError;
pub use players::{PlayerId, PlayerSet, RoomId};
pub use role::{ClientPeer, HostPeers, ReconnectAttempt, Role, Slot};
pub use status::NetStatus;
