//! The codec's value domain and its tag table.
//!
//! Every value on the wire starts with a one-byte tag:
//!
//! ```text
//! None=0  True=1  False=2  F32=3  F64=4  U32=5  I32=6  U64=7  I64=8
//! String=9  Tree=10            vector of T = 127 + tag(T)
//! ```
//!
//! Vectors of booleans use `127 + True`. Multi-byte numerics follow the
//! tag in big-endian order.

use std::fmt;

use crate::{Tree, TypeMismatch};

/// Base value added to an element tag to form a vector tag.
///
/// Also used unqualified as the array marker inside an encoded tree.
pub const VECTOR_BASE: u8 = 127;

/// Scalar tag bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Tag {
    None = 0,
    True = 1,
    False = 2,
    F32 = 3,
    F64 = 4,
    U32 = 5,
    I32 = 6,
    U64 = 7,
    I64 = 8,
    String = 9,
    Tree = 10,
}

impl Tag {
    /// The tag's byte on the wire.
    pub const fn byte(self) -> u8 {
        self as u8
    }

    /// The tag of a vector whose elements carry this tag.
    pub const fn vector(self) -> u8 {
        VECTOR_BASE + self as u8
    }

    /// Looks up a scalar tag by its byte.
    pub fn from_byte(byte: u8) -> Option<Self> {
        Some(match byte {
            0 => Self::None,
            1 => Self::True,
            2 => Self::False,
            3 => Self::F32,
            4 => Self::F64,
            5 => Self::U32,
            6 => Self::I32,
            7 => Self::U64,
            8 => Self::I64,
            9 => Self::String,
            10 => Self::Tree,
            _ => return None,
        })
    }
}

/// The kind of a [`WireValue`], used in error reporting and for
/// checking vector elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WireKind {
    Empty,
    Bool,
    F32,
    F64,
    U32,
    U64,
    I32,
    I64,
    String,
    Tree,
    BoolVec,
    F32Vec,
    F64Vec,
    U32Vec,
    U64Vec,
    I32Vec,
    I64Vec,
    StringVec,
    TreeVec,
}

impl WireKind {
    /// Every kind the codec supports.
    pub const ALL: [WireKind; 19] = [
        Self::Empty,
        Self::Bool,
        Self::F32,
        Self::F64,
        Self::U32,
        Self::U64,
        Self::I32,
        Self::I64,
        Self::String,
        Self::Tree,
        Self::BoolVec,
        Self::F32Vec,
        Self::F64Vec,
        Self::U32Vec,
        Self::U64Vec,
        Self::I32Vec,
        Self::I64Vec,
        Self::StringVec,
        Self::TreeVec,
    ];

    /// The tag bytes that introduce a value of this kind.
    ///
    /// Only `Bool` has two (`True` and `False`).
    pub fn tags(self) -> &'static [u8] {
        match self {
            Self::Empty => const { &[Tag::None.byte()] },
            Self::Bool => const { &[Tag::True.byte(), Tag::False.byte()] },
            Self::F32 => const { &[Tag::F32.byte()] },
            Self::F64 => const { &[Tag::F64.byte()] },
            Self::U32 => const { &[Tag::U32.byte()] },
            Self::U64 => const { &[Tag::U64.byte()] },
            Self::I32 => const { &[Tag::I32.byte()] },
            Self::I64 => const { &[Tag::I64.byte()] },
            Self::String => const { &[Tag::String.byte()] },
            Self::Tree => const { &[Tag::Tree.byte()] },
            Self::BoolVec => const { &[Tag::True.vector()] },
            Self::F32Vec => const { &[Tag::F32.vector()] },
            Self::F64Vec => const { &[Tag::F64.vector()] },
            Self::U32Vec => const { &[Tag::U32.vector()] },
            Self::U64Vec => const { &[Tag::U64.vector()] },
            Self::I32Vec => const { &[Tag::I32.vector()] },
            Self::I64Vec => const { &[Tag::I64.vector()] },
            Self::StringVec => const { &[Tag::String.vector()] },
            Self::TreeVec => const { &[Tag::Tree.vector()] },
        }
    }

    /// Maps a tag byte back to the kind it introduces.
    pub fn from_tag(byte: u8) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.tags().contains(&byte))
    }
}

impl fmt::Display for WireKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Empty => "empty",
            Self::Bool => "bool",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::U32 => "u32",
            Self::U64 => "u64",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::String => "string",
            Self::Tree => "tree",
            Self::BoolVec => "vec<bool>",
            Self::F32Vec => "vec<f32>",
            Self::F64Vec => "vec<f64>",
            Self::U32Vec => "vec<u32>",
            Self::U64Vec => "vec<u64>",
            Self::I32Vec => "vec<i32>",
            Self::I64Vec => "vec<i64>",
            Self::StringVec => "vec<string>",
            Self::TreeVec => "vec<tree>",
        };
        f.write_str(name)
    }
}

/// A single decoded value.
///
/// `T` is the recursive tree type produced for `Tree` values; it
/// defaults to the crate's own [`Tree`].
#[derive(Debug, Clone, PartialEq)]
pub enum WireValue<T = Tree> {
    /// Nothing left to read (or an explicit `None` tag).
    Empty,
    Bool(bool),
    F32(f32),
    F64(f64),
    U32(u32),
    U64(u64),
    I32(i32),
    I64(i64),
    String(String),
    Tree(T),
    BoolVec(Vec<bool>),
    F32Vec(Vec<f32>),
    F64Vec(Vec<f64>),
    U32Vec(Vec<u32>),
    U64Vec(Vec<u64>),
    I32Vec(Vec<i32>),
    I64Vec(Vec<i64>),
    StringVec(Vec<String>),
    TreeVec(Vec<T>),
}

impl<T> Default for WireValue<T> {
    fn default() -> Self {
        Self::Empty
    }
}

impl<T> WireValue<T> {
    /// Returns the kind of this value.
    pub fn kind(&self) -> WireKind {
        match self {
            Self::Empty => WireKind::Empty,
            Self::Bool(_) => WireKind::Bool,
            Self::F32(_) => WireKind::F32,
            Self::F64(_) => WireKind::F64,
            Self::U32(_) => WireKind::U32,
            Self::U64(_) => WireKind::U64,
            Self::I32(_) => WireKind::I32,
            Self::I64(_) => WireKind::I64,
            Self::String(_) => WireKind::String,
            Self::Tree(_) => WireKind::Tree,
            Self::BoolVec(_) => WireKind::BoolVec,
            Self::F32Vec(_) => WireKind::F32Vec,
            Self::F64Vec(_) => WireKind::F64Vec,
            Self::U32Vec(_) => WireKind::U32Vec,
            Self::U64Vec(_) => WireKind::U64Vec,
            Self::I32Vec(_) => WireKind::I32Vec,
            Self::I64Vec(_) => WireKind::I64Vec,
            Self::StringVec(_) => WireKind::StringVec,
            Self::TreeVec(_) => WireKind::TreeVec,
        }
    }

    /// `true` for [`WireValue::Empty`].
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Borrows the string payload.
    pub fn as_str(&self) -> Result<&str, TypeMismatch> {
        match self {
            Self::String(s) => Ok(s),
            other => Err(TypeMismatch {
                expected: WireKind::String,
                found: other.kind(),
            }),
        }
    }
}

macro_rules! into_accessors {
    ($($method:ident => $variant:ident: $ty:ty),* $(,)?) => {
        impl<T> WireValue<T> {
            $(
                #[doc = concat!("Extracts the `", stringify!($variant), "` payload or reports a [`TypeMismatch`].")]
                pub fn $method(self) -> Result<$ty, TypeMismatch> {
                    match self {
                        Self::$variant(v) => Ok(v),
                        other => Err(TypeMismatch {
                            expected: WireKind::$variant,
                            found: other.kind(),
                        }),
                    }
                }
            )*
        }
    };
}

into_accessors! {
    into_bool => Bool: bool,
    into_f32 => F32: f32,
    into_f64 => F64: f64,
    into_u32 => U32: u32,
    into_u64 => U64: u64,
    into_i32 => I32: i32,
    into_i64 => I64: i64,
    into_string => String: String,
    into_tree => Tree: T,
    into_bool_vec => BoolVec: Vec<bool>,
    into_f32_vec => F32Vec: Vec<f32>,
    into_f64_vec => F64Vec: Vec<f64>,
    into_u32_vec => U32Vec: Vec<u32>,
    into_u64_vec => U64Vec: Vec<u64>,
    into_i32_vec => I32Vec: Vec<i32>,
    into_i64_vec => I64Vec: Vec<i64>,
    into_string_vec => StringVec: Vec<String>,
    into_tree_vec => TreeVec: Vec<T>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_tag_adds_base() {
        assert_eq!(Tag::True.vector(), 128);
        assert_eq!(Tag::U32.vector(), 132);
        assert_eq!(Tag::Tree.vector(), 137);
    }

    #[test]
    fn test_from_byte_round_trips_every_tag() {
        for byte in 0..=10u8 {
            assert_eq!(Tag::from_byte(byte).map(Tag::byte), Some(byte));
        }
        assert_eq!(Tag::from_byte(11), None);
        assert_eq!(Tag::from_byte(VECTOR_BASE), None);
    }

    #[test]
    fn test_from_tag_maps_both_bool_tags() {
        assert_eq!(WireKind::from_tag(1), Some(WireKind::Bool));
        assert_eq!(WireKind::from_tag(2), Some(WireKind::Bool));
        assert_eq!(WireKind::from_tag(136), Some(WireKind::StringVec));
        assert_eq!(WireKind::from_tag(200), None);
    }

    #[test]
    fn test_tags_outlive_the_call() {
        let tags: Vec<&'static [u8]> = WireKind::ALL.into_iter().map(WireKind::tags).collect();
        assert_eq!(tags[0], &[0]);
        assert_eq!(WireKind::Bool.tags(), &[1, 2]);
        assert_eq!(WireKind::TreeVec.tags(), &[137]);
    }

    #[test]
    fn test_into_accessor_matching_kind_returns_payload() {
        let v: WireValue = WireValue::U32(7);
        assert_eq!(v.into_u32(), Ok(7));
    }

    #[test]
    fn test_into_accessor_wrong_kind_returns_mismatch() {
        let v: WireValue = WireValue::String("hi".into());
        assert_eq!(
            v.into_i64(),
            Err(TypeMismatch {
                expected: WireKind::I64,
                found: WireKind::String,
            })
        );
    }

    #[test]
    fn test_default_is_empty() {
        let v: WireValue = WireValue::default();
        assert!(v.is_empty());
        assert_eq!(v.kind(), WireKind::Empty);
    }
}
