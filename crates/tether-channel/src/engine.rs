use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use tether_common::protocol::{CallError, Nonce, WireMessage};
use tether_common::sendable::{validate, Sendable};
use tether_common::transport::Transport;

use crate::definition::RemoteHandle;
use crate::state::ChannelState;

/// The engine behind a [`Channel`](crate::Channel): the transport's send
/// primitive plus the locked state aggregate.
pub(crate) struct Engine {
    transport: Box<dyn Transport>,
    state: Mutex<ChannelState>,
}

impl Engine {
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self {
            transport,
            state: Mutex::new(ChannelState::new()),
        }
    }

    pub fn state(&self) -> MutexGuard<'_, ChannelState> {
        self.state.lock().expect("channel state lock poisoned")
    }

    /// Queues an outbound message. Fire-and-forget: a dead transport is
    /// logged and otherwise ignored, the close notification settles
    /// everything that still matters.
    pub fn enqueue(&self, message: WireMessage) {
        let kind = message.kind();
        if let Err(e) = self.transport.send(message) {
            tracing::warn!("dropping outbound {}: {}", kind, e);
        }
    }

    /// Handles one inbound message. Messages are dispatched in arrival
    /// order; serving an incoming call is spawned so a suspended
    /// implementation never blocks dispatch.
    pub fn dispatch(self: &Arc<Self>, message: WireMessage) {
        tracing::trace!("inbound {}", message.kind());
        if !self.state().open {
            tracing::debug!("discarding inbound {} after close", message.kind());
            return;
        }
        match message {
            WireMessage::Call { nonce, name, args } => self.on_call(nonce, name, args),
            // Argument types from the peer's publish are deliberately not
            // retained: only the serving side validates arguments.
            WireMessage::Publish {
                name,
                args: _,
                returns,
            } => self.on_publish(name, returns),
            WireMessage::Expect { name } => self.on_expect(name),
            WireMessage::Result { nonce, value } => self.on_result(nonce, value),
            WireMessage::Error { nonce, message } => self.on_error(nonce, message),
        }
    }

    /// Serves an incoming call against the locally published table.
    fn on_call(self: &Arc<Self>, nonce: Nonce, name: String, args: Vec<Value>) {
        let Some(func) = self.state().published.get(&name).cloned() else {
            self.enqueue(WireMessage::Error {
                nonce,
                message: format!("Unpublished Function: {}", name),
            });
            return;
        };

        if !func.accepts(&args) {
            // The implementation is never invoked for invalid arguments.
            self.enqueue(WireMessage::Error {
                nonce,
                message: "Invalid Arguments".into(),
            });
            return;
        }

        let engine = Arc::clone(self);
        tokio::spawn(async move {
            let message = match func.invoke(args).await {
                Ok(value) => WireMessage::Result {
                    nonce,
                    // A void completion becomes the explicit no-value marker.
                    value: value.unwrap_or(Value::Null),
                },
                Err(e) => WireMessage::Error {
                    nonce,
                    message: format!("Exception: {}", e),
                },
            };
            if engine.state().open {
                engine.enqueue(message);
            } else {
                tracing::debug!("dropping completion of nonce {} after close", nonce);
            }
        });
    }

    /// Records the peer's announcement and releases queued waiters.
    fn on_publish(&self, name: String, returns: Sendable) {
        let waiters = {
            let mut state = self.state();
            if state.remotes.contains_key(&name) {
                // Publication is idempotent from the receiver's side.
                tracing::debug!("duplicate publish for {}, first wins", name);
                return;
            }
            state.remotes.insert(name.clone(), RemoteHandle { returns });
            state.expectations.remove(&name).unwrap_or_default()
        };
        tracing::debug!("remote function {} available", name);
        for waiter in waiters {
            let _ = waiter.send(());
        }
    }

    /// Re-announces a published function the peer asked for. An `expect`
    /// can race ahead of an earlier `publish`; re-emitting is harmless on
    /// the receiving side.
    fn on_expect(&self, name: String) {
        let message = self
            .state()
            .published
            .get(&name)
            .map(|func| func.publish_message());
        match message {
            Some(message) => self.enqueue(message),
            None => tracing::debug!("expect for unpublished {}, requester keeps waiting", name),
        }
    }

    /// Completes a pending call, validating the value against the return
    /// type recorded when the remote handle was created. A rejected value
    /// fails the caller only; the executing side is never informed.
    fn on_result(&self, nonce: Nonce, value: Value) {
        let Some(call) = self.state().in_flight.remove(&nonce) else {
            tracing::debug!("result for unknown nonce {}, discarding", nonce);
            return;
        };
        let outcome = if validate(&value, &call.returns) {
            Ok(value)
        } else {
            Err(CallError::InvalidReturn(call.name))
        };
        let _ = call.slot.send(outcome);
    }

    /// Fails a pending call with the peer's message.
    fn on_error(&self, nonce: Nonce, message: String) {
        let Some(call) = self.state().in_flight.remove(&nonce) else {
            tracing::debug!("error for unknown nonce {}, discarding", nonce);
            return;
        };
        let _ = call.slot.send(Err(CallError::Remote(message)));
    }

    /// Marks the channel not-open and settles all pending work: every
    /// in-flight call fails with `Connection Closed`, and dropping the
    /// expectation queues wakes their waiters, which then observe the
    /// closed channel. Idempotent.
    pub fn shutdown(&self) {
        let (in_flight, expectations) = {
            let mut state = self.state();
            if !state.open {
                return;
            }
            state.open = false;
            (
                std::mem::take(&mut state.in_flight),
                std::mem::take(&mut state.expectations),
            )
        };
        tracing::debug!("channel closed, failing {} pending calls", in_flight.len());
        for (_, call) in in_flight {
            let _ = call.slot.send(Err(CallError::Closed));
        }
        drop(expectations);
    }
}

/// Runs the event pump: inbound messages are dispatched in arrival order
/// until the transport's inbound stream ends or its close notification
/// resolves, then the channel shuts down.
pub(crate) fn spawn_pump(
    engine: Arc<Engine>,
    mut inbound: mpsc::UnboundedReceiver<WireMessage>,
    mut closed: oneshot::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                message = inbound.recv() => match message {
                    Some(message) => engine.dispatch(message),
                    None => break,
                },
                _ = &mut closed => break,
            }
        }
        engine.shutdown();
    })
}
