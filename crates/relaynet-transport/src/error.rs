/// Errors that can occur in the transport layer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// There is no open link to the given peer.
    #[error("not connected to {0}")]
    NotConnected(crate::PeerAddress),

    /// The address does not name any reachable endpoint.
    #[error("unknown peer {0}")]
    UnknownPeer(crate::PeerAddress),

    /// The transport was shut down.
    #[error("transport shut down")]
    Shutdown,
}
