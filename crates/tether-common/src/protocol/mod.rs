pub mod error;
pub mod messages;


pub use error::{CallError, Result, TetherError};
pub use messages::{Nonce, WireMessage};
