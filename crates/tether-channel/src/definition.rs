use std::fmt;
use std::future::Future;

use futures_util::future::BoxFuture;
use serde_json::Value;

use tether_common::protocol::WireMessage;
use tether_common::sendable::{validate, Sendable};

/// Boxed future returned by a function implementation.
///
/// `Ok(None)` is a void completion; the engine normalizes it to the explicit
/// no-value marker before it crosses the wire.
pub(crate) type HandlerFuture = BoxFuture<'static, anyhow::Result<Option<Value>>>;

type Handler = Box<dyn Fn(Vec<Value>) -> HandlerFuture + Send + Sync>;

/// A locally implemented function, ready to publish on a channel.
///
/// Created once, immutable thereafter, destroyed only with the channel. The
/// name must be unique per channel side and is never reused.
///
/// # Example
///
/// ```
/// use tether_channel::FunctionDef;
/// use tether_common::sendable::Sendable;
/// use serde_json::{json, Value};
///
/// let def = FunctionDef::new(
///     "greet",
///     vec![Sendable::String],
///     Sendable::String,
///     |args: Vec<Value>| async move {
///         let name = args[0].as_str().unwrap_or("world");
///         Ok(Some(json!(format!("hello {name}"))))
///     },
/// );
/// assert_eq!(def.name(), "greet");
/// ```
pub struct FunctionDef {
    name: String,
    arg_types: Vec<Sendable>,
    return_type: Sendable,
    handler: Handler,
}

impl FunctionDef {
    /// Creates a function definition.
    ///
    /// # Arguments
    ///
    /// * `name` - Name the function is published under
    /// * `arg_types` - Positional argument descriptors; incoming calls are
    ///   validated against these before the implementation runs
    /// * `return_type` - Return descriptor, advertised to the peer and used
    ///   by callers to validate results
    /// * `handler` - The implementation; `Ok(None)` means a void completion
    pub fn new<F, Fut>(
        name: impl Into<String>,
        arg_types: Vec<Sendable>,
        return_type: Sendable,
        handler: F,
    ) -> Self
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Option<Value>>> + Send + 'static,
    {
        Self {
            name: name.into(),
            arg_types,
            return_type,
            handler: Box::new(move |args| Box::pin(handler(args))),
        }
    }

    /// The name this function is published under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Checks actual call arguments against the declared argument types,
    /// count and element-wise.
    pub(crate) fn accepts(&self, args: &[Value]) -> bool {
        args.len() == self.arg_types.len()
            && args
                .iter()
                .zip(self.arg_types.iter())
                .all(|(arg, ty)| validate(arg, ty))
    }

    /// Invokes the implementation.
    pub(crate) fn invoke(&self, args: Vec<Value>) -> HandlerFuture {
        (self.handler)(args)
    }

    /// The `publish` wire message advertising this function. Also re-emitted
    /// when the peer sends `expect` for the name.
    pub(crate) fn publish_message(&self) -> WireMessage {
        WireMessage::Publish {
            name: self.name.clone(),
            args: self.arg_types.clone(),
            returns: self.return_type.clone(),
        }
    }
}

impl fmt::Debug for FunctionDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionDef")
            .field("name", &self.name)
            .field("arg_types", &self.arg_types)
            .field("return_type", &self.return_type)
            .finish_non_exhaustive()
    }
}

/// Record of a function the peer has announced.
///
/// Only the return type is retained: the caller does not self-validate
/// arguments. Argument validation is always performed by the receiver of a
/// `call` against its own published types.
#[derive(Debug, Clone)]
pub(crate) struct RemoteHandle {
    pub returns: Sendable,
}
