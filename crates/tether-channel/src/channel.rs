use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use tether_common::protocol::{CallError, TetherError, WireMessage};
use tether_common::transport::Transport;

use crate::definition::FunctionDef;
use crate::engine::{spawn_pump, Engine};
use crate::state::InFlightCall;

/// One end of a typed function channel.
///
/// Cheap to clone; all clones drive the same engine. A channel owns its
/// per-channel state exclusively — published functions, remote handles,
/// in-flight calls, expectation queues, nonce counter — from open to close.
///
/// # Example
///
/// ```no_run
/// use tether_channel::{Channel, FunctionDef, Sendable};
/// use tether_common::transport::TcpTransport;
/// use serde_json::{json, Value};
///
/// # #[tokio::main]
/// # async fn main() -> anyhow::Result<()> {
/// let transport = TcpTransport::connect("127.0.0.1:4870").await?;
/// let channel = Channel::open(transport);
///
/// channel.publish(FunctionDef::new(
///     "ping",
///     vec![],
///     Sendable::String,
///     |_args: Vec<Value>| async { Ok(Some(json!("pong"))) },
/// ))?;
///
/// let echoed = channel.call("echo", vec![json!("hi")]).await?;
/// println!("{}", echoed);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Channel {
    engine: Arc<Engine>,
    pump: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl Channel {
    /// Opens a channel over `transport`.
    ///
    /// Subscribes to the transport's inbound and close notifications and
    /// starts the event pump; must be called within a tokio runtime.
    pub fn open(mut transport: impl Transport) -> Self {
        let inbound = transport.subscribe_inbound();
        let closed = transport.subscribe_close();
        let engine = Arc::new(Engine::new(Box::new(transport)));
        let pump = spawn_pump(Arc::clone(&engine), inbound, closed);
        Self {
            engine,
            pump: Arc::new(Mutex::new(Some(pump))),
        }
    }

    /// Opens a channel and publishes `publications` before returning.
    ///
    /// # Errors
    ///
    /// Returns an error if two publications share a name; the channel is
    /// closed before the error is returned.
    pub fn open_with(
        transport: impl Transport,
        publications: Vec<FunctionDef>,
    ) -> Result<Self, TetherError> {
        let channel = Self::open(transport);
        for def in publications {
            if let Err(e) = channel.publish(def) {
                channel.close();
                return Err(e);
            }
        }
        Ok(channel)
    }

    /// Registers `def` as locally callable and immediately announces it to
    /// the peer.
    ///
    /// # Errors
    ///
    /// * [`TetherError::DuplicatePublication`] if the name is already
    ///   published on this side — publication names are never reused
    /// * [`TetherError::ChannelClosed`] if the channel has closed
    pub fn publish(&self, def: FunctionDef) -> Result<(), TetherError> {
        let mut state = self.engine.state();
        if !state.open {
            return Err(TetherError::ChannelClosed);
        }
        if state.published.contains_key(def.name()) {
            return Err(TetherError::DuplicatePublication(def.name().to_string()));
        }
        let message = def.publish_message();
        tracing::debug!("publishing {}", def.name());
        state.published.insert(def.name().to_string(), Arc::new(def));
        // Announce while the lock is held so the wire sees publications in
        // registration order.
        self.engine.enqueue(message);
        Ok(())
    }

    /// Calls `name` on the peer and suspends until the matching completion
    /// arrives or the channel closes.
    ///
    /// If the peer has not announced `name` yet, an `expect` message is
    /// emitted (once per unknown name) and the call queues until the
    /// peer's `publish` arrives; subsequent calls to the then-known name
    /// skip straight to the call itself.
    ///
    /// # Errors
    ///
    /// * [`CallError::Remote`] - the peer rejected or failed the call
    /// * [`CallError::InvalidReturn`] - the peer's value failed validation
    ///   against the recorded return type
    /// * [`CallError::Closed`] - the channel closed before completion, or
    ///   was already closed
    pub async fn call(&self, name: &str, args: Vec<Value>) -> Result<Value, CallError> {
        // Wait-for-publication phase, entered only while no remote handle
        // exists for the name.
        let waiter = {
            let mut state = self.engine.state();
            if !state.open {
                return Err(CallError::Closed);
            }
            if state.remotes.contains_key(name) {
                None
            } else {
                let (tx, rx) = oneshot::channel();
                let waiters = state.expectations.entry(name.to_string()).or_default();
                let first = waiters.is_empty();
                waiters.push(tx);
                if first {
                    self.engine.enqueue(WireMessage::Expect {
                        name: name.to_string(),
                    });
                }
                Some(rx)
            }
        };
        if let Some(rx) = waiter {
            // Dropped waiters mean the channel closed underneath us.
            rx.await.map_err(|_| CallError::Closed)?;
        }

        // Ordinary call phase.
        let rx = {
            let mut state = self.engine.state();
            if !state.open {
                return Err(CallError::Closed);
            }
            let returns = match state.remotes.get(name) {
                Some(handle) => handle.returns.clone(),
                // Waiters are only released once the handle exists, so a
                // missing handle here means teardown raced us.
                None => return Err(CallError::Closed),
            };
            let nonce = state.next_nonce();
            let (tx, rx) = oneshot::channel();
            state.in_flight.insert(
                nonce,
                InFlightCall {
                    name: name.to_string(),
                    returns,
                    slot: tx,
                },
            );
            self.engine.enqueue(WireMessage::Call {
                nonce,
                name: name.to_string(),
                args,
            });
            rx
        };
        rx.await.unwrap_or(Err(CallError::Closed))
    }

    /// Binds `name` to this channel as a reusable callable handle.
    pub fn remote(&self, name: impl Into<String>) -> RemoteFunction {
        RemoteFunction {
            channel: self.clone(),
            name: name.into(),
        }
    }

    /// Whether the channel is still open.
    pub fn is_open(&self) -> bool {
        self.engine.state().open
    }

    /// Closes the channel: stops the event pump, fails every pending call
    /// with `Connection Closed`, and makes every subsequent `publish`/`call`
    /// fail. Idempotent.
    pub fn close(&self) {
        if let Some(pump) = self
            .pump
            .lock()
            .expect("channel pump lock poisoned")
            .take()
        {
            pump.abort();
        }
        self.engine.shutdown();
    }
}

/// A named callable bound to a channel.
///
/// The explicit form of the by-name call surface: cheap to clone, valid for
/// the channel's lifetime, and usable before the peer has published the
/// name (the first invocation performs the `expect` negotiation).
#[derive(Clone)]
pub struct RemoteFunction {
    channel: Channel,
    name: String,
}

impl RemoteFunction {
    /// The remote function's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Calls the remote function. Equivalent to
    /// [`Channel::call`] with the bound name.
    pub async fn call(&self, args: Vec<Value>) -> Result<Value, CallError> {
        self.channel.call(&self.name, args).await
    }
}
