//! Errors surfaced by the socket and listener adapters.

use std::io;
use std::sync::Arc;
use thiserror::Error;

/// Failure of an adapter operation.
///
/// Cloneable so a terminal error can be handed to the pending operation and
/// to every later one.
#[derive(Debug, Clone, Error)]
pub enum AdapterError {
    /// The transport reported an I/O failure. Terminal for the resource.
    #[error("transport error: {0}")]
    Transport(Arc<io::Error>),
    /// A caller broke an adapter precondition, such as issuing a second
    /// read while one is outstanding.
    #[error("protocol violation: {0}")]
    ProtocolViolation(&'static str),
    /// The resource was closed locally.
    #[error("closed")]
    Closed,
}

impl AdapterError {
    /// The I/O error kind behind a transport failure.
    pub fn io_kind(&self) -> Option<io::ErrorKind> {
        match self {
            AdapterError::Transport(e) => Some(e.kind()),
            _ => None,
        }
    }
}

impl From<io::Error> for AdapterError {
    fn from(e: io::Error) -> Self {
        AdapterError::Transport(Arc::new(e))
    }
}
