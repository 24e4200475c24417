//! Unified error type for Relaynet.

use relaynet_codec::{ProtocolError, TypeMismatch};
use relaynet_session::SessionError;
use relaynet_transport::TransportError;

/// Top-level error that wraps every crate-specific error.
///
/// `#[from]` on each variant lets `?` convert sub-crate errors directly.
#[derive(Debug, thiserror::Error)]
pub enum RelaynetError {
    /// Corrupt or incompatible wire bytes.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A decoded value was not of the requested type.
    #[error(transparent)]
    TypeMismatch(#[from] TypeMismatch),

    /// The transport refused an operation.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Invalid config or a misused session operation.
    #[error(transparent)]
    Session(#[from] SessionError),
}

#[cfg(test)]
mod tests {
    use relaynet_codec::WireKind;

    use super::*;

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::UnknownTag { tag: 0x42, offset: 3 };
        let relaynet_err: RelaynetError = err.into();
        assert!(matches!(relaynet_err, RelaynetError::Protocol(_)));
        assert!(relaynet_err.to_string().contains("0x42"));
    }

    #[test]
    fn test_from_type_mismatch() {
        let err = TypeMismatch {
            expected: WireKind::U32,
            found: WireKind::String,
        };
        let relaynet_err: RelaynetError = err.into();
        assert!(matches!(relaynet_err, RelaynetError::TypeMismatch(_)));
        assert_eq!(relaynet_err.to_string(), "type mismatch: expected u32, found string");
    }

    #[test]
    fn test_from_transport_error() {
        let relaynet_err: RelaynetError = TransportError::Shutdown.into();
        assert!(matches!(relaynet_err, RelaynetError::Transport(_)));
        assert_eq!(relaynet_err.to_string(), "transport shut down");
    }

    #[test]
    fn test_from_session_error() {
        let relaynet_err: RelaynetError = SessionError::NotHost.into();
        assert!(matches!(relaynet_err, RelaynetError::Session(_)));
    }
}
