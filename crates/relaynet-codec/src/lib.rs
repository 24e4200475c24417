//! Wire codec for Relaynet payloads.
//!
//! A self-describing binary format: every value is prefixed by a tag
//! byte naming its type, so a message can be decoded without a schema
//! as long as the reader consumes values in the order they were
//! written.
//!
//! - **Encoding** ([`Encoder`], [`Encode`]): append values to a buffer.
//! - **Decoding** ([`Decoder`]): read them back as [`WireValue`]s.
//! - **Trees** ([`TreeValue`], [`Tree`]): JSON-like recursive values,
//!   decoupled from any concrete JSON library.
//! - **Errors** ([`ProtocolError`], [`TypeMismatch`]).
//!
//! The codec knows nothing about connections or control packets; it
//! only frames the application payloads a session carries.
//!
//! # Feature Flags
//!
//! - `json` (default): [`TreeValue`] for `serde_json::Value`

mod decoder;
mod encoder;
mod error;
mod tree;
mod wire;

pub use decoder::{Decoder, MAX_TREE_DEPTH};
pub use encoder::{Element, Encode, Encoder};
pub use error::{ProtocolError, TypeMismatch};
pub use tree::{Tree, TreeKind, TreeValue};
pub use wire::{Tag, WireKind, WireValue, VECTOR_BASE};
