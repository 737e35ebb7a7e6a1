//! Tether Channel Engine
//!
//! This crate implements the channel engine: the state machine that turns a
//! bidirectional message transport into a pair of typed, named async
//! function surfaces.
//!
//! # Overview
//!
//! Each side of a channel can:
//!
//! - **publish** a locally implemented function, announcing its name and
//!   argument/return descriptors to the peer
//! - **call** a function by name on the peer, receiving a deferred result
//!
//! Calls are correlated with their completions by per-channel nonces. A call
//! to a name the peer has not announced yet sends an `expect` message and
//! queues until the matching `publish` arrives. Every incoming call's
//! arguments are validated against the published argument types, and every
//! result is validated on the calling side against the return type recorded
//! when the function was first announced.
//!
//! # Example
//!
//! ```
//! use tether_channel::{Channel, FunctionDef};
//! use tether_common::sendable::Sendable;
//! use tether_common::transport::memory;
//! use serde_json::{json, Value};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> anyhow::Result<()> {
//! let (left, right) = memory::pair();
//! let caller = Channel::open(left);
//! let server = Channel::open(right);
//!
//! server.publish(FunctionDef::new(
//!     "add",
//!     vec![Sendable::Number, Sendable::Number],
//!     Sendable::Number,
//!     |args: Vec<Value>| async move {
//!         let sum = args[0].as_f64().unwrap_or(0.0) + args[1].as_f64().unwrap_or(0.0);
//!         Ok(Some(json!(sum)))
//!     },
//! ))?;
//!
//! let sum = caller.call("add", vec![json!(3), json!(5)]).await?;
//! assert_eq!(sum, json!(8.0));
//! # Ok(())
//! # }
//! ```

mod channel;
mod definition;
mod engine;
mod state;

pub use channel::{Channel, RemoteFunction};
pub use definition::FunctionDef;

pub use tether_common::protocol::{CallError, TetherError};
pub use tether_common::sendable::{KeyKind, Sendable};
