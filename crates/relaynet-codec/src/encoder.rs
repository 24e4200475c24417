//! Encoding side of the wire codec.

use crate::{Tag, Tree, TreeKind, TreeValue, WireValue, VECTOR_BASE};

/// A value that can append its self-describing encoding to a buffer.
///
/// Implemented for `bool`, the six numeric types, strings, trees,
/// [`WireValue`], and slices/`Vec`s of any [`Element`] type.
pub trait Encode {
    fn encode(&self, buf: &mut Vec<u8>);
}

/// A type that may appear as a vector element.
///
/// `TAG` is the element tag the vector tag is derived from
/// (`127 + TAG`).
pub trait Element: Encode {
    const TAG: Tag;
}

impl Encode for bool {
    fn encode(&self, buf: &mut Vec<u8>) {
        let tag = if *self { Tag::True } else { Tag::False };
        buf.push(tag.byte());
    }
}

impl Element for bool {
    const TAG: Tag = Tag::True;
}

macro_rules! numeric {
    ($($ty:ty => $tag:ident),* $(,)?) => {$(
        impl Encode for $ty {
            fn encode(&self, buf: &mut Vec<u8>) {
                buf.push(Tag::$tag.byte());
                buf.extend_from_slice(&self.to_be_bytes());
            }
        }

        impl Element for $ty {
            const TAG: Tag = Tag::$tag;
        }
    )*};
}

numeric! {
    f32 => F32,
    f64 => F64,
    u32 => U32,
    i32 => I32,
    u64 => U64,
    i64 => I64,
}

/// Length prefixes are themselves full `U64` values.
fn encode_len(len: usize, buf: &mut Vec<u8>) {
    (len as u64).encode(buf);
}

impl Encode for str {
    fn encode(&self, buf: &mut Vec<u8>) {
        buf.push(Tag::String.byte());
        encode_len(self.len(), buf);
        buf.extend_from_slice(self.as_bytes());
    }
}

impl Encode for &str {
    fn encode(&self, buf: &mut Vec<u8>) {
        (**self).encode(buf);
    }
}

impl Element for &str {
    const TAG: Tag = Tag::String;
}

impl Encode for String {
    fn encode(&self, buf: &mut Vec<u8>) {
        self.as_str().encode(buf);
    }
}

impl Element for String {
    const TAG: Tag = Tag::String;
}

impl<S: Element> Encode for [S] {
    fn encode(&self, buf: &mut Vec<u8>) {
        buf.push(S::TAG.vector());
        encode_len(self.len(), buf);
        for item in self {
            item.encode(buf);
        }
    }
}

impl<S: Element> Encode for Vec<S> {
    fn encode(&self, buf: &mut Vec<u8>) {
        self.as_slice().encode(buf);
    }
}

/// Writes `tree` as a `Tree`-tagged value.
pub(crate) fn encode_tree<T: TreeValue>(tree: &T, buf: &mut Vec<u8>) {
    buf.push(Tag::Tree.byte());
    match tree.kind() {
        TreeKind::Null => buf.push(Tag::None.byte()),
        TreeKind::Bool => tree.as_bool().unwrap_or_default().encode(buf),
        TreeKind::Number => tree.as_number().unwrap_or_default().encode(buf),
        TreeKind::String => tree.as_str().unwrap_or_default().encode(buf),
        TreeKind::Array => {
            let elements = tree.elements();
            buf.push(VECTOR_BASE);
            encode_len(elements.len(), buf);
            for child in elements {
                encode_tree(child, buf);
            }
        }
        TreeKind::Object => {
            let entries = tree.entries();
            buf.push(Tag::Tree.byte());
            encode_len(entries.len(), buf);
            for (key, child) in entries {
                key.encode(buf);
                encode_tree(child, buf);
            }
        }
    }
}

impl Encode for Tree {
    fn encode(&self, buf: &mut Vec<u8>) {
        encode_tree(self, buf);
    }
}

impl Element for Tree {
    const TAG: Tag = Tag::Tree;
}

#[cfg(feature = "json")]
impl Encode for serde_json::Value {
    fn encode(&self, buf: &mut Vec<u8>) {
        encode_tree(self, buf);
    }
}

#[cfg(feature = "json")]
impl Element for serde_json::Value {
    const TAG: Tag = Tag::Tree;
}

/// Writes a slice of trees as a `vec<tree>`. Used for `WireValue::TreeVec`,
/// whose element type is only known to implement [`TreeValue`].
fn encode_tree_vec<T: TreeValue>(trees: &[T], buf: &mut Vec<u8>) {
    buf.push(Tag::Tree.vector());
    encode_len(trees.len(), buf);
    for tree in trees {
        encode_tree(tree, buf);
    }
}

impl<T: TreeValue> Encode for WireValue<T> {
    fn encode(&self, buf: &mut Vec<u8>) {
        match self {
            Self::Empty => buf.push(Tag::None.byte()),
            Self::Bool(v) => v.encode(buf),
            Self::F32(v) => v.encode(buf),
            Self::F64(v) => v.encode(buf),
            Self::U32(v) => v.encode(buf),
            Self::U64(v) => v.encode(buf),
            Self::I32(v) => v.encode(buf),
            Self::I64(v) => v.encode(buf),
            Self::String(v) => v.encode(buf),
            Self::Tree(v) => encode_tree(v, buf),
            Self::BoolVec(v) => v.encode(buf),
            Self::F32Vec(v) => v.encode(buf),
            Self::F64Vec(v) => v.encode(buf),
            Self::U32Vec(v) => v.encode(buf),
            Self::U64Vec(v) => v.encode(buf),
            Self::I32Vec(v) => v.encode(buf),
            Self::I64Vec(v) => v.encode(buf),
            Self::StringVec(v) => v.encode(buf),
            Self::TreeVec(v) => encode_tree_vec(v, buf),
        }
    }
}

/// Accumulates encoded values into one message.
///
/// Values pile up across [`write`](Self::write) calls until
/// [`reset`](Self::reset). `serialize` does not clear the buffer, so
/// reset before building the next independent message.
///
/// ```rust
/// use relaynet_codec::Encoder;
///
/// let mut enc = Encoder::new();
/// enc.write(&true).write("hi");
/// assert_eq!(enc.serialize()[0], 0x01);
/// enc.reset();
/// assert!(enc.is_empty());
/// ```
#[derive(Debug, Clone, Default)]
pub struct Encoder {
    data: Vec<u8>,
}

impl Encoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends the encoding of `value`.
    pub fn write<V: Encode + ?Sized>(&mut self, value: &V) -> &mut Self {
        value.encode(&mut self.data);
        self
    }

    /// Appends any [`TreeValue`] as a `Tree`-tagged value.
    pub fn write_tree<T: TreeValue>(&mut self, tree: &T) -> &mut Self {
        encode_tree(tree, &mut self.data);
        self
    }

    /// The bytes accumulated so far.
    pub fn serialize(&self) -> &[u8] {
        &self.data
    }

    /// Clears the buffer.
    pub fn reset(&mut self) {
        self.data.clear();
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
