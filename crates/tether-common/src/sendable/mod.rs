//! The `Sendable` descriptor grammar.
//!
//! A [`Sendable`] describes a shape of data allowed to cross the channel
//! boundary. The grammar is closed: no descriptor may reference a type
//! outside this set. Descriptors are pure data, not code, and are exchanged
//! verbatim over the wire inside `publish` messages.
//!
//! # Example
//!
//! ```
//! use tether_common::sendable::{validate, KeyKind, Sendable};
//! use serde_json::json;
//!
//! // { [name: string]: number[] }
//! let descriptor = Sendable::VariableObject {
//!     key: KeyKind::String,
//!     elem: Box::new(Sendable::VariableArray {
//!         elem: Box::new(Sendable::Number),
//!     }),
//! };
//!
//! assert!(validate(&json!({"a": [1, 2], "b": []}), &descriptor));
//! assert!(!validate(&json!({"a": [1, "x"]}), &descriptor));
//! ```

mod validate;


pub use validate::validate;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// The kind of key a [`Sendable::VariableObject`] accepts.
///
/// Object keys travel as text; a `Number` key is a key whose text parses as
/// a number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyKind {
    /// Any textual key
    String,
    /// Keys whose text parses as a number
    Number,
}

/// A structural type descriptor.
///
/// One constructor per case of the closed grammar. Serialized as a tagged
/// JSON object (`{"kind": "number"}`, `{"kind": "union", "alternatives":
/// [...]}`), so the descriptor a peer publishes is exactly the descriptor
/// the other side validates against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Sendable {
    /// The explicit no-value marker (JSON `null`), not merely absence
    None,
    /// Any string
    String,
    /// Any number, integral or floating
    Number,
    /// `true` or `false`
    Boolean,
    /// A sequence of any length whose elements all match `elem`
    VariableArray {
        /// Element type
        elem: Box<Sendable>,
    },
    /// A mapping with keys of `key` kind and values all matching `elem`
    VariableObject {
        /// Key kind, restricted to string or number
        key: KeyKind,
        /// Value type
        elem: Box<Sendable>,
    },
    /// A value matching at least one of the alternatives, tried in order
    Union {
        /// Ordered alternatives
        alternatives: Vec<Sendable>,
    },
    /// A sequence of exactly `elems.len()` elements, matched positionally
    FixedArray {
        /// Per-position element types
        elems: Vec<Sendable>,
    },
    /// A mapping whose key set equals `fields`' key set exactly
    FixedObject {
        /// Field name to field type
        fields: BTreeMap<String, Sendable>,
    },
}
