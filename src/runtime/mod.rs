//! Adaptation layer from event-driven sockets to sequential I/O.
//!
//! Transports report data, end and error through callbacks. The adapters
//! here turn that into `accept`, `read` and `write` calls that suspend the
//! calling task:
//! - `ConnectionAdapter`: one pending read at a time, transport paused
//!   between reads
//! - `ListenerAdapter`: one pending accept at a time
//! - `DynamicBuffer` and `frame::cut`: incremental newline framing on top
//!
//! `tcp` provides the tokio-backed transports used by the server.

mod buffer;
mod connection;
mod error;
pub mod frame;
mod listener;
mod tcp;
mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub(crate) use buffer::DynamicBuffer;
pub(crate) use connection::ConnectionAdapter;
pub(crate) use error::AdapterError;
pub(crate) use listener::ListenerAdapter;
pub(crate) use tcp::TokioListener;
pub(crate) use transport::{EventListener, EventSocket};
