//! Decoding side of the wire codec.
//!
//! Input is treated as untrusted: every length is checked against the
//! bytes actually remaining before anything is allocated, vector
//! elements must carry the tag their vector declared, and tree nesting
//! is capped at [`MAX_TREE_DEPTH`].

use std::marker::PhantomData;

use crate::{ProtocolError, Tag, Tree, TreeValue, WireKind, WireValue, VECTOR_BASE};

/// Deepest tree nesting the decoder accepts.
pub const MAX_TREE_DEPTH: usize = 64;

const VEC_BOOL: u8 = Tag::True.vector();
const VEC_F32: u8 = Tag::F32.vector();
const VEC_F64: u8 = Tag::F64.vector();
const VEC_U32: u8 = Tag::U32.vector();
const VEC_U64: u8 = Tag::U64.vector();
const VEC_I32: u8 = Tag::I32.vector();
const VEC_I64: u8 = Tag::I64.vector();
const VEC_STRING: u8 = Tag::String.vector();
const VEC_TREE: u8 = Tag::Tree.vector();

/// Reads values back out of a received message, in the order they
/// were written.
///
/// Once the cursor reaches the end, [`read`](Self::read) keeps
/// returning [`WireValue::Empty`]. A [`ProtocolError`] discards the
/// loaded buffer: a corrupt stream is never resumed.
///
/// ```rust
/// use relaynet_codec::{Decoder, Encoder, WireValue};
///
/// let mut enc = Encoder::new();
/// enc.write(&5i64).write("hello");
///
/// let mut dec: Decoder = Decoder::new();
/// dec.receive(enc.serialize());
/// assert_eq!(dec.read().unwrap(), WireValue::I64(5));
/// assert_eq!(dec.read().unwrap().into_string().unwrap(), "hello");
/// assert!(dec.read().unwrap().is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct Decoder<T = Tree> {
    data: Vec<u8>,
    pos: usize,
    _tree: PhantomData<fn() -> T>,
}

impl<T> Default for Decoder<T> {
    fn default() -> Self {
        Self {
            data: Vec::new(),
            pos: 0,
            _tree: PhantomData,
        }
    }
}

impl<T: TreeValue> Decoder<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a new message, replacing any previous one.
    pub fn receive(&mut self, bytes: &[u8]) {
        self.data.clear();
        self.data.extend_from_slice(bytes);
        self.pos = 0;
    }

    /// Decodes the next value.
    ///
    /// # Errors
    /// Returns a [`ProtocolError`] if the bytes at the cursor are not a
    /// valid encoding. The buffer is discarded in that case.
    pub fn read(&mut self) -> Result<WireValue<T>, ProtocolError> {
        if self.pos >= self.data.len() {
            return Ok(WireValue::Empty);
        }
        match self.read_value() {
            Ok(value) => Ok(value),
            Err(e) => {
                tracing::debug!(error = %e, "discarding corrupt wire buffer");
                self.reset();
                Err(e)
            }
        }
    }

    /// Clears the buffer and the cursor.
    pub fn reset(&mut self) {
        self.data.clear();
        self.pos = 0;
    }

    /// Bytes left after the cursor.
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    // -- cursor primitives ------------------------------------------------

    fn peek(&self) -> Result<u8, ProtocolError> {
        self.data
            .get(self.pos)
            .copied()
            .ok_or(ProtocolError::Truncated {
                offset: self.pos,
                needed: 1,
            })
    }

    fn next_byte(&mut self) -> Result<u8, ProtocolError> {
        let byte = self.peek()?;
        self.pos += 1;
        Ok(byte)
    }

    fn take(&mut self, n: usize) -> Result<&[u8], ProtocolError> {
        let remaining = self.remaining();
        if n > remaining {
            return Err(ProtocolError::Truncated {
                offset: self.pos,
                needed: n - remaining,
            });
        }
        let start = self.pos;
        self.pos += n;
        Ok(&self.data[start..self.pos])
    }

    fn read_fixed<const N: usize>(&mut self) -> Result<[u8; N], ProtocolError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    /// Consumes one tag byte and checks it is `expected`.
    fn expect_tag(&mut self, expected: Tag, kind: WireKind) -> Result<(), ProtocolError> {
        let offset = self.pos;
        let tag = self.next_byte()?;
        if tag == expected.byte() {
            return Ok(());
        }
        match WireKind::from_tag(tag) {
            Some(found) => Err(ProtocolError::UnexpectedElement {
                offset,
                expected: kind,
                found,
            }),
            None => Err(ProtocolError::UnknownTag { tag, offset }),
        }
    }

    /// Reads a `U64`-tagged length and checks it against the bytes left.
    ///
    /// Every entry takes at least one byte, so a length larger than the
    /// remainder can never be satisfied.
    fn read_len(&mut self) -> Result<usize, ProtocolError> {
        let offset = self.pos;
        let tag = self.next_byte()?;
        if tag != Tag::U64.byte() {
            return Err(match WireKind::from_tag(tag) {
                Some(found) => ProtocolError::BadLength { offset, found },
                None => ProtocolError::UnknownTag { tag, offset },
            });
        }
        let len = u64::from_be_bytes(self.read_fixed()?);
        let remaining = self.remaining();
        if len > remaining as u64 {
            return Err(ProtocolError::LengthOverflow {
                offset,
                len,
                remaining,
            });
        }
        Ok(len as usize)
    }

    // -- values -----------------------------------------------------------

    fn read_value(&mut self) -> Result<WireValue<T>, ProtocolError> {
        let offset = self.pos;
        let tag = self.next_byte()?;
        let value = match tag {
            0 => WireValue::Empty,
            1 => WireValue::Bool(true),
            2 => WireValue::Bool(false),
            3 => WireValue::F32(f32::from_be_bytes(self.read_fixed()?)),
            4 => WireValue::F64(f64::from_be_bytes(self.read_fixed()?)),
            5 => WireValue::U32(u32::from_be_bytes(self.read_fixed()?)),
            6 => WireValue::I32(i32::from_be_bytes(self.read_fixed()?)),
            7 => WireValue::U64(u64::from_be_bytes(self.read_fixed()?)),
            8 => WireValue::I64(i64::from_be_bytes(self.read_fixed()?)),
            9 => WireValue::String(self.read_string_body()?),
            10 => WireValue::Tree(self.read_tree_body(0)?),
            VEC_BOOL => WireValue::BoolVec(
                self.read_vec(WireKind::Bool, |v| v.into_bool().ok())?,
            ),
            VEC_F32 => WireValue::F32Vec(
                self.read_vec(WireKind::F32, |v| v.into_f32().ok())?,
            ),
            VEC_F64 => WireValue::F64Vec(
                self.read_vec(WireKind::F64, |v| v.into_f64().ok())?,
            ),
            VEC_U32 => WireValue::U32Vec(
                self.read_vec(WireKind::U32, |v| v.into_u32().ok())?,
            ),
            VEC_U64 => WireValue::U64Vec(
                self.read_vec(WireKind::U64, |v| v.into_u64().ok())?,
            ),
            VEC_I32 => WireValue::I32Vec(
                self.read_vec(WireKind::I32, |v| v.into_i32().ok())?,
            ),
            VEC_I64 => WireValue::I64Vec(
                self.read_vec(WireKind::I64, |v| v.into_i64().ok())?,
            ),
            VEC_STRING => WireValue::StringVec(
                self.read_vec(WireKind::String, |v| v.into_string().ok())?,
            ),
            VEC_TREE => WireValue::TreeVec(
                self.read_vec(WireKind::Tree, |v| v.into_tree().ok())?,
            ),
            tag => return Err(ProtocolError::UnknownTag { tag, offset }),
        };
        Ok(value)
    }

    fn read_string_body(&mut self) -> Result<String, ProtocolError> {
        let len = self.read_len()?;
        let offset = self.pos;
        let bytes = self.take(len)?.to_vec();
        String::from_utf8(bytes).map_err(|_| ProtocolError::InvalidUtf8 { offset })
    }

    /// Reads a length, then that many elements of kind `element`.
    ///
    /// Element tags are checked before decoding so a vector can never
    /// smuggle in a nested vector.
    fn read_vec<E>(
        &mut self,
        element: WireKind,
        extract: fn(WireValue<T>) -> Option<E>,
    ) -> Result<Vec<E>, ProtocolError> {
        let len = self.read_len()?;
        let mut out = Vec::with_capacity(len);
        for _ in 0..len {
            let offset = self.pos;
            let tag = self.peek()?;
            let found = WireKind::from_tag(tag)
                .ok_or(ProtocolError::UnknownTag { tag, offset })?;
            if found != element {
                return Err(ProtocolError::UnexpectedElement {
                    offset,
                    expected: element,
                    found,
                });
            }
            let value = self.read_value()?;
            let item = extract(value).ok_or(ProtocolError::UnexpectedElement {
                offset,
                expected: element,
                found,
            })?;
            out.push(item);
        }
        Ok(out)
    }

    /// Reads the part of a tree after its `Tree` tag.
    fn read_tree_body(&mut self, depth: usize) -> Result<T, ProtocolError> {
        let offset = self.pos;
        if depth > MAX_TREE_DEPTH {
            return Err(ProtocolError::TooDeep {
                offset,
                limit: MAX_TREE_DEPTH,
            });
        }
        let marker = self.next_byte()?;
        let tree = match marker {
            0 => T::null(),
            1 => T::from_bool(true),
            2 => T::from_bool(false),
            4 => T::from_number(f64::from_be_bytes(self.read_fixed()?)),
            9 => T::from_string(self.read_string_body()?),
            VECTOR_BASE => {
                let len = self.read_len()?;
                let mut elements = Vec::with_capacity(len);
                for _ in 0..len {
                    self.expect_tag(Tag::Tree, WireKind::Tree)?;
                    elements.push(self.read_tree_body(depth + 1)?);
                }
                T::from_elements(elements)
            }
            10 => {
                let len = self.read_len()?;
                let mut entries = Vec::with_capacity(len);
                for _ in 0..len {
                    self.expect_tag(Tag::String, WireKind::String)?;
                    let key = self.read_string_body()?;
                    self.expect_tag(Tag::Tree, WireKind::Tree)?;
                    entries.push((key, self.read_tree_body(depth + 1)?));
                }
                T::from_entries(entries)
            }
            tag => return Err(ProtocolError::UnknownTag { tag, offset }),
        };
        Ok(tree)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Encoder;

    fn decoder_for(bytes: &[u8]) -> Decoder {
        let mut dec = Decoder::new();
        dec.receive(bytes);
        dec
    }

    #[test]
    fn test_read_before_receive_returns_empty() {
        let mut dec: Decoder = Decoder::new();
        assert_eq!(dec.read(), Ok(WireValue::Empty));
    }

    #[test]
    fn test_read_past_end_keeps_returning_empty() {
        let mut dec = decoder_for(&[0x01]);
        assert_eq!(dec.read(), Ok(WireValue::Bool(true)));
        assert_eq!(dec.read(), Ok(WireValue::Empty));
        assert_eq!(dec.read(), Ok(WireValue::Empty));
    }

    #[test]
    fn test_read_unknown_tag_fails_and_discards_buffer() {
        let mut dec = decoder_for(&[0x01, 0x63, 0x01]);
        assert_eq!(dec.read(), Ok(WireValue::Bool(true)));
        assert_eq!(
            dec.read(),
            Err(ProtocolError::UnknownTag { tag: 0x63, offset: 1 })
        );
        assert_eq!(dec.remaining(), 0);
        assert_eq!(dec.read(), Ok(WireValue::Empty));
    }

    #[test]
    fn test_read_truncated_numeric_fails() {
        let mut dec = decoder_for(&[0x05, 0x00, 0x01]);
        assert_eq!(
            dec.read(),
            Err(ProtocolError::Truncated { offset: 1, needed: 2 })
        );
    }

    #[test]
    fn test_read_string_length_beyond_buffer_fails() {
        let mut dec = decoder_for(&[0x09, 0x07, 0, 0, 0, 0, 0, 0, 0, 9, b'x']);
        assert!(matches!(
            dec.read(),
            Err(ProtocolError::LengthOverflow { len: 9, remaining: 1, .. })
        ));
    }

    #[test]
    fn test_read_length_with_wrong_tag_fails() {
        let mut dec = decoder_for(&[0x09, 0x05, 0, 0, 0, 1, b'x']);
        assert_eq!(
            dec.read(),
            Err(ProtocolError::BadLength {
                offset: 1,
                found: WireKind::U32,
            })
        );
    }

    #[test]
    fn test_read_invalid_utf8_fails() {
        let mut dec = decoder_for(&[0x09, 0x07, 0, 0, 0, 0, 0, 0, 0, 1, 0xff]);
        assert_eq!(dec.read(), Err(ProtocolError::InvalidUtf8 { offset: 10 }));
    }

    #[test]
    fn test_read_vector_with_foreign_element_fails() {
        // vec<u32> of length 1 whose element is tagged i32
        let mut dec = decoder_for(&[132, 0x07, 0, 0, 0, 0, 0, 0, 0, 1, 0x06, 0, 0, 0, 7]);
        assert_eq!(
            dec.read(),
            Err(ProtocolError::UnexpectedElement {
                offset: 10,
                expected: WireKind::U32,
                found: WireKind::I32,
            })
        );
    }

    #[test]
    fn test_read_bool_vector_accepts_both_bool_tags() {
        let mut dec = decoder_for(&[128, 0x07, 0, 0, 0, 0, 0, 0, 0, 2, 0x02, 0x01]);
        assert_eq!(dec.read(), Ok(WireValue::BoolVec(vec![false, true])));
    }

    fn nested_arrays(levels: usize) -> Tree {
        let mut tree = Tree::Null;
        for _ in 0..levels {
            tree = Tree::Array(vec![tree]);
        }
        tree
    }

    #[test]
    fn test_read_tree_at_depth_limit_succeeds() {
        let tree = nested_arrays(MAX_TREE_DEPTH);
        let mut enc = Encoder::new();
        enc.write(&tree);
        let mut dec = decoder_for(enc.serialize());
        assert_eq!(dec.read(), Ok(WireValue::Tree(tree)));
    }

    #[test]
    fn test_read_tree_past_depth_limit_fails() {
        let mut enc = Encoder::new();
        enc.write(&nested_arrays(MAX_TREE_DEPTH + 1));
        let mut dec = decoder_for(enc.serialize());
        assert!(matches!(dec.read(), Err(ProtocolError::TooDeep { .. })));
        assert_eq!(dec.remaining(), 0);
    }

    #[test]
    fn test_read_tree_with_unknown_marker_fails() {
        let mut dec = decoder_for(&[10, 0x05, 0, 0, 0, 1]);
        assert_eq!(
            dec.read(),
            Err(ProtocolError::UnknownTag { tag: 0x05, offset: 1 })
        );
    }

    #[test]
    fn test_receive_replaces_previous_buffer() {
        let mut dec = decoder_for(&[0x01, 0x01]);
        assert_eq!(dec.read(), Ok(WireValue::Bool(true)));
        dec.receive(&[0x02]);
        assert_eq!(dec.read(), Ok(WireValue::Bool(false)));
        assert_eq!(dec.read(), Ok(WireValue::Empty));
    }
}
