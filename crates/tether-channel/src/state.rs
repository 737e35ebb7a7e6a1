use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::oneshot;

use tether_common::protocol::{CallError, Nonce};
use tether_common::sendable::Sendable;

use crate::definition::{FunctionDef, RemoteHandle};

/// Completion slot of a pending outbound call.
pub(crate) type CallSlot = oneshot::Sender<Result<Value, CallError>>;

/// An outbound call awaiting its `result`/`error`.
pub(crate) struct InFlightCall {
    pub name: String,
    pub returns: Sendable,
    pub slot: CallSlot,
}

/// The per-channel state aggregate, owned exclusively by one engine for
/// exactly its lifetime. All mutation happens inside short critical
/// sections under the engine's lock, never across an await.
pub(crate) struct ChannelState {
    /// Cleared exactly once, at close; gates every call path and late
    /// result emission.
    pub open: bool,
    /// Locally published functions, by name. Names are never reused.
    pub published: HashMap<String, Arc<FunctionDef>>,
    /// Functions the peer has announced, by name.
    pub remotes: HashMap<String, RemoteHandle>,
    /// Outbound calls awaiting completion, by nonce.
    pub in_flight: HashMap<Nonce, InFlightCall>,
    /// Waiters for names requested before any `publish` was observed,
    /// released in queueing order the instant the `publish` arrives.
    pub expectations: HashMap<String, Vec<oneshot::Sender<()>>>,
    next_nonce: Nonce,
}

impl ChannelState {
    pub fn new() -> Self {
        Self {
            open: true,
            published: HashMap::new(),
            remotes: HashMap::new(),
            in_flight: HashMap::new(),
            expectations: HashMap::new(),
            next_nonce: 1,
        }
    }

    /// Takes the next outbound nonce. Never reused within the channel's
    /// lifetime.
    pub fn next_nonce(&mut self) -> Nonce {
        let nonce = self.next_nonce;
        self.next_nonce += 1;
        nonce
    }
}
