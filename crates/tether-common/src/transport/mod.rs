//! Tether Transport Layer
//!
//! This module defines the adapter contract the channel engine consumes, and
//! provides reference adapters for the environments tether targets.
//!
//! # Architecture
//!
//! The engine never touches a concrete transport. It requires exactly three
//! primitives, supplied per transport by an implementation of [`Transport`]:
//! enqueue-outbound, a subscription to inbound messages, and a subscription
//! to the close notification. The engine assumes exactly-once,
//! order-preserving delivery per direction and never retries or buffers
//! beyond that.
//!
//! # Components
//!
//! - **[`Transport`]**: the three-operation adapter contract
//! - **[`JsonCodec`]**: encode/decode wire messages to JSON
//! - **[`memory::pair`]**: connected in-process adapters (worker threads,
//!   pipes, tests)
//! - **[`TcpTransport`]**: length-prefixed JSON frames over TCP
//!
//! # Wire Format (TCP)
//!
//! `[4-byte length prefix as u32 big-endian] + [JSON data]`, maximum frame
//! size 100 MB.

pub mod codec;
pub mod memory;
pub mod tcp;


pub use codec::JsonCodec;
pub use tcp::TcpTransport;

use tokio::sync::{mpsc, oneshot};

use crate::protocol::{Result, WireMessage};

/// Bindings from a concrete transport to the primitives the channel engine
/// requires.
///
/// The two `subscribe_*` operations are invoked exactly once, by the engine,
/// when a channel opens over the transport; invoking either twice is a
/// contract violation and may panic. `send` may be invoked from any task for
/// the lifetime of the channel.
pub trait Transport: Send + Sync + 'static {
    /// Queues `message` for delivery to the peer.
    ///
    /// Fire-and-forget: the engine assumes no delivery confirmation. An
    /// error means the transport is already unusable; the engine logs and
    /// otherwise ignores it.
    fn send(&self, message: WireMessage) -> Result<()>;

    /// The stream of inbound messages, yielded in arrival order.
    ///
    /// The stream ending (`None`) is equivalent to a close notification.
    fn subscribe_inbound(&mut self) -> mpsc::UnboundedReceiver<WireMessage>;

    /// Resolves at most once, when the transport becomes permanently
    /// unusable.
    fn subscribe_close(&mut self) -> oneshot::Receiver<()>;
}
