//! Tether Wire Messages
//!
//! This module defines the five messages exchanged between channel peers.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::sendable::Sendable;

/// Per-channel call correlation identifier.
///
/// Monotonically increasing, starting at 1, never reused within a channel's
/// lifetime. Each side numbers only the calls it originates.
pub type Nonce = u64;

/// A message crossing the channel boundary.
///
/// # Message Flow
///
/// 1. A peer announces a locally callable function with `Publish`
/// 2. The other peer invokes it with `Call`, tagged with a fresh nonce
/// 3. The serving peer completes the call with `Result` or `Error`
/// 4. `Expect` asks the peer to (re-)announce a function the sender wants
///    to call but has not yet seen a `Publish` for
///
/// Messages are externally tagged by a `type` discriminator:
///
/// ```text
/// {"type":"call","nonce":1,"name":"add","args":[3,5]}
/// ```
///
/// # Example
///
/// ```
/// use tether_common::protocol::WireMessage;
/// use tether_common::sendable::Sendable;
///
/// let announce = WireMessage::Publish {
///     name: "add".into(),
///     args: vec![Sendable::Number, Sendable::Number],
///     returns: Sendable::Number,
/// };
/// let encoded = serde_json::to_string(&announce).unwrap();
/// assert!(encoded.contains("\"type\":\"publish\""));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WireMessage {
    /// Announce a locally callable function to the peer.
    Publish {
        /// Function name, unique per channel side
        name: String,
        /// Declared argument types, positional
        args: Vec<Sendable>,
        /// Declared return type
        returns: Sendable,
    },
    /// Invoke a function the sender believes is published on the receiver.
    Call {
        /// Correlates this call with its eventual `Result`/`Error`
        nonce: Nonce,
        /// Name of the function to invoke
        name: String,
        /// Actual argument values, positional
        args: Vec<Value>,
    },
    /// Successful completion of a prior `Call`.
    Result {
        /// Nonce of the call being completed
        nonce: Nonce,
        /// The return value
        value: Value,
    },
    /// Failed completion of a prior `Call`, or rejection of an
    /// unpublished/invalid call.
    Error {
        /// Nonce of the call being failed
        nonce: Nonce,
        /// Failure text (the only error form that crosses the wire)
        message: String,
    },
    /// Ask the peer to (re-)announce a function the sender wants to call.
    Expect {
        /// Name of the desired function
        name: String,
    },
}

impl WireMessage {
    /// Returns the message's `type` discriminator, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            WireMessage::Publish { .. } => "publish",
            WireMessage::Call { .. } => "call",
            WireMessage::Result { .. } => "result",
            WireMessage::Error { .. } => "error",
            WireMessage::Expect { .. } => "expect",
        }
    }
}
