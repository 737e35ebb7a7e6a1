//! Tether Common Types and Transport
//!
//! This crate provides the protocol definitions, the structural type
//! descriptor grammar, and the transport layer for tether channels.
//!
//! # Overview
//!
//! Tether lets two peers connected by a bidirectional message channel expose
//! named async functions to one another and call them remotely, with every
//! argument and return value checked at runtime against a structural type
//! descriptor exchanged between the peers. This crate contains the pieces
//! shared by both sides of a channel:
//!
//! - **Protocol Layer**: the five wire messages, error types
//! - **Sendable Layer**: the type descriptor grammar and its validator
//! - **Transport Layer**: the adapter contract plus TCP and in-memory adapters
//!
//! # Architecture
//!
//! The wire protocol is plain structured data:
//! - **Serialization**: JSON
//! - **Framing (TCP adapter)**: `[4-byte length prefix as u32 big-endian] + [JSON data]`
//! - **Max Frame Size**: 100 MB (prevents memory exhaustion)
//!
//! # Components
//!
//! - [`protocol`] - Wire messages ([`WireMessage`]) and errors
//! - [`sendable`] - The [`Sendable`] grammar and [`validate`](sendable::validate)
//! - [`transport`] - The [`Transport`](transport::Transport) contract and adapters
//!
//! # Example
//!
//! ```
//! use tether_common::protocol::WireMessage;
//! use tether_common::sendable::{validate, Sendable};
//! use serde_json::json;
//!
//! // A call crossing the wire
//! let msg = WireMessage::Call {
//!     nonce: 1,
//!     name: "add".into(),
//!     args: vec![json!(3), json!(5)],
//! };
//!
//! // The receiver checks each argument against its published types
//! assert!(validate(&json!(3), &Sendable::Number));
//! # let _ = msg;
//! ```

pub mod protocol;
pub mod sendable;
pub mod transport;

pub use protocol::*;
pub use sendable::Sendable;
