//! Error types for the session layer.

use relaynet_transport::{ControlPacketKind, TransportError};

/// Errors raised by the connection orchestrator.
///
/// Losing a room or finding it full is not an error: those outcomes are
/// reported through [`NetStatus`](crate::NetStatus). These variants cover
/// construction failures and calls the caller should not have made.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The configuration failed validation.
    #[error("invalid session config: {0}")]
    InvalidConfig(String),

    /// The transport refused an operation during construction.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A host-only operation was called on a client.
    #[error("operation is only valid on the host")]
    NotHost,

    /// The operation needs a `Connected` session.
    #[error("session is not connected")]
    NotConnected,

    /// `start_game` was already called.
    #[error("game already started")]
    AlreadyStarted,

    /// A control packet's payload could not be parsed.
    #[error("malformed {kind} control packet: {reason}")]
    MalformedControl {
        kind: ControlPacketKind,
        reason: &'static str,
    },
}
