//! Recursive JSON-like values.
//!
//! The codec never depends on a concrete JSON library. Anything that
//! implements [`TreeValue`] can be written and read back: the crate's
//! own [`Tree`], and `serde_json::Value` when the `json` feature is on.

/// The shape of a tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeKind {
    Null,
    Bool,
    Number,
    String,
    Array,
    Object,
}

/// The capability the codec needs from a recursive value type.
///
/// Inspection (`kind`, `as_*`, `elements`, `entries`) is used by the
/// encoder; construction (`null`, `from_*`) by the decoder.
/// Object entries must be yielded in a stable order, since that order
/// is what goes on the wire.
pub trait TreeValue: Sized {
    fn kind(&self) -> TreeKind;

    fn as_bool(&self) -> Option<bool>;
    fn as_number(&self) -> Option<f64>;
    fn as_str(&self) -> Option<&str>;

    /// Children of an array, in order. Empty for non-arrays.
    fn elements(&self) -> Vec<&Self>;

    /// Key/child pairs of an object, in order. Empty for non-objects.
    fn entries(&self) -> Vec<(&str, &Self)>;

    fn null() -> Self;
    fn from_bool(b: bool) -> Self;
    fn from_number(n: f64) -> Self;
    fn from_string(s: String) -> Self;
    fn from_elements(elements: Vec<Self>) -> Self;
    fn from_entries(entries: Vec<(String, Self)>) -> Self;

    fn is_null(&self) -> bool {
        self.kind() == TreeKind::Null
    }

    fn is_bool(&self) -> bool {
        self.kind() == TreeKind::Bool
    }

    fn is_number(&self) -> bool {
        self.kind() == TreeKind::Number
    }

    fn is_string(&self) -> bool {
        self.kind() == TreeKind::String
    }

    fn is_array(&self) -> bool {
        self.kind() == TreeKind::Array
    }

    fn is_object(&self) -> bool {
        self.kind() == TreeKind::Object
    }
}

/// The codec's built-in tree.
///
/// Objects keep their entries in insertion order (a `Vec`, not a map),
/// so re-encoding a decoded tree reproduces the same bytes.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Tree {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<Tree>),
    Object(Vec<(String, Tree)>),
}

impl Tree {
    /// Looks up an object entry by key. `None` for missing keys and
    /// non-objects.
    pub fn get(&self, key: &str) -> Option<&Tree> {
        match self {
            Self::Object(entries) => entries
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v),
            _ => None,
        }
    }
}

impl TreeValue for Tree {
    fn kind(&self) -> TreeKind {
        match self {
            Self::Null => TreeKind::Null,
            Self::Bool(_) => TreeKind::Bool,
            Self::Number(_) => TreeKind::Number,
            Self::String(_) => TreeKind::String,
            Self::Array(_) => TreeKind::Array,
            Self::Object(_) => TreeKind::Object,
        }
    }

    fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    fn elements(&self) -> Vec<&Self> {
        match self {
            Self::Array(items) => items.iter().collect(),
            _ => Vec::new(),
        }
    }

    fn entries(&self) -> Vec<(&str, &Self)> {
        match self {
            Self::Object(entries) => {
                entries.iter().map(|(k, v)| (k.as_str(), v)).collect()
            }
            _ => Vec::new(),
        }
    }

    fn null() -> Self {
        Self::Null
    }

    fn from_bool(b: bool) -> Self {
        Self::Bool(b)
    }

    fn from_number(n: f64) -> Self {
        Self::Number(n)
    }

    fn from_string(s: String) -> Self {
        Self::String(s)
    }

    fn from_elements(elements: Vec<Self>) -> Self {
        Self::Array(elements)
    }

    fn from_entries(entries: Vec<(String, Self)>) -> Self {
        Self::Object(entries)
    }
}

// ---------------------------------------------------------------------------
// serde_json interop
// ---------------------------------------------------------------------------

#[cfg(feature = "json")]
impl TreeValue for serde_json::Value {
    fn kind(&self) -> TreeKind {
        match self {
            Self::Null => TreeKind::Null,
            Self::Bool(_) => TreeKind::Bool,
            Self::Number(_) => TreeKind::Number,
            Self::String(_) => TreeKind::String,
            Self::Array(_) => TreeKind::Array,
            Self::Object(_) => TreeKind::Object,
        }
    }

    fn as_bool(&self) -> Option<bool> {
        serde_json::Value::as_bool(self)
    }

    fn as_number(&self) -> Option<f64> {
        self.as_f64()
    }

    fn as_str(&self) -> Option<&str> {
        serde_json::Value::as_str(self)
    }

    fn elements(&self) -> Vec<&Self> {
        match self {
            Self::Array(items) => items.iter().collect(),
            _ => Vec::new(),
        }
    }

    fn entries(&self) -> Vec<(&str, &Self)> {
        match self {
            Self::Object(map) => {
                map.iter().map(|(k, v)| (k.as_str(), v)).collect()
            }
            _ => Vec::new(),
        }
    }

    fn null() -> Self {
        Self::Null
    }

    fn from_bool(b: bool) -> Self {
        Self::Bool(b)
    }

    /// JSON has no NaN or infinity; those decode as `null`.
    fn from_number(n: f64) -> Self {
        serde_json::Number::from_f64(n)
            .map(Self::Number)
            .unwrap_or(Self::Null)
    }

    fn from_string(s: String) -> Self {
        Self::String(s)
    }

    fn from_elements(elements: Vec<Self>) -> Self {
        Self::Array(elements)
    }

    fn from_entries(entries: Vec<(String, Self)>) -> Self {
        Self::Object(entries.into_iter().collect())
    }
}

#[cfg(feature = "json")]
impl From<serde_json::Value> for Tree {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => {
                n.as_f64().map(Self::Number).unwrap_or(Self::Null)
            }
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => {
                Self::Array(items.into_iter().map(Tree::from).collect())
            }
            serde_json::Value::Object(map) => Self::Object(
                map.into_iter().map(|(k, v)| (k, Tree::from(v))).collect(),
            ),
        }
    }
}

#[cfg(feature = "json")]
impl From<Tree> for serde_json::Value {
    fn from(tree: Tree) -> Self {
        match tree {
            Tree::Null => Self::Null,
            Tree::Bool(b) => Self::Bool(b),
            Tree::Number(n) => <Self as TreeValue>::from_number(n),
            Tree::String(s) => Self::String(s),
            Tree::Array(items) => {
                Self::Array(items.into_iter().map(Self::from).collect())
            }
            Tree::Object(entries) => Self::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, Self::from(v)))
                    .collect(),
            ),
        }
    }
}
