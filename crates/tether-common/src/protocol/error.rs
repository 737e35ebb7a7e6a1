use thiserror::Error;

/// Errors raised by the channel machinery itself, as opposed to failures of
/// individual calls (see [`CallError`]).
#[derive(Error, Debug)]
pub enum TetherError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Function already published: {0}")]
    DuplicatePublication(String),

    #[error("Connection Closed")]
    ChannelClosed,
}

/// Failure of a single deferred call.
///
/// Every recoverable call failure becomes exactly one of these, exactly once.
/// The `Display` text is the stable contract: `Remote` carries the peer's
/// message verbatim (`Unpublished Function: <name>`, `Invalid Arguments`,
/// `Exception: <cause>`), and the other variants render the fixed texts the
/// protocol defines.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CallError {
    /// The peer rejected or failed the call; only the textual form of the
    /// remote failure survives the boundary.
    #[error("{0}")]
    Remote(String),

    /// The peer's return value failed validation against the recorded return
    /// type. Detected purely on the calling side; the executing side is
    /// never informed.
    #[error("invalid return value from rpc {0}")]
    InvalidReturn(String),

    /// The channel closed while the call was pending, or the call was made
    /// after close.
    #[error("Connection Closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, TetherError>;
