//! Error types for the wire codec.
//!
//! The codec has two failure families and they never mix:
//!
//! - [`ProtocolError`]: the byte stream itself is bad (corrupt,
//!   truncated, or written by an incompatible version). The decoder
//!   discards its buffer when it returns one of these.
//! - [`TypeMismatch`]: the stream was fine, but the caller asked a
//!   decoded [`WireValue`](crate::WireValue) for the wrong type.

use crate::WireKind;

/// The byte stream could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// The byte at `offset` is not a known tag.
    #[error("unrecognized tag {tag:#04x} at offset {offset}")]
    UnknownTag { tag: u8, offset: usize },

    /// The buffer ended before a value was complete.
    #[error("truncated input at offset {offset}: needed {needed} more bytes")]
    Truncated { offset: usize, needed: usize },

    /// A length prefix was not encoded as a `U64` value.
    #[error("length field at offset {offset} is not a U64 (found {found})")]
    BadLength { offset: usize, found: WireKind },

    /// A length prefix claims more entries than the buffer could hold.
    #[error("length {len} at offset {offset} exceeds the remaining {remaining} bytes")]
    LengthOverflow {
        offset: usize,
        len: u64,
        remaining: usize,
    },

    /// String bytes were not valid UTF-8.
    #[error("invalid UTF-8 in string at offset {offset}")]
    InvalidUtf8 { offset: usize },

    /// A vector element carried a different tag than the vector declared.
    #[error("vector of {expected} contains {found} at offset {offset}")]
    UnexpectedElement {
        offset: usize,
        expected: WireKind,
        found: WireKind,
    },

    /// Tree values nested deeper than the decoder allows.
    #[error("tree nesting exceeds {limit} levels at offset {offset}")]
    TooDeep { offset: usize, limit: usize },
}

/// A decoded value was asked for a type it does not hold.
///
/// This is a caller bug, not data corruption: the message layout the
/// caller assumed doesn't match what the sender wrote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("type mismatch: expected {expected}, found {found}")]
pub struct TypeMismatch {
    pub expected: WireKind,
    pub found: WireKind,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_tag_display_shows_hex() {
        let err = ProtocolError::UnknownTag { tag: 0x2a, offset: 3 };
        assert_eq!(err.to_string(), "unrecognized tag 0x2a at offset 3");
    }

    #[test]
    fn test_type_mismatch_display_names_both_kinds() {
        let err = TypeMismatch {
            expected: WireKind::U32,
            found: WireKind::String,
        };
        assert_eq!(err.to_string(), "type mismatch: expected u32, found string");
    }
}
