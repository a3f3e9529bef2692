//! Sequential adapter over an event-driven socket.
//!
//! Each connection keeps a single pending-read slot. `read()` fills it and
//! resumes the transport; whichever of data, end or error fires first
//! resolves it and the transport is paused again. Nothing is pulled off the
//! wire while no read is pending.

use super::error::AdapterError;
use super::transport::{EventSocket, SocketEvents};
use bytes::Bytes;
use parking_lot::Mutex;
use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{trace, warn};

/// Current state of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    /// Idle between operations, transport paused.
    Open,
    /// A read is pending and the transport is resumed.
    AwaitingData,
    /// The peer finished sending. Reads return empty; writes are still
    /// attempted.
    Ended,
    /// A terminal error was recorded. Every operation fails with it.
    Errored,
    /// Closed locally.
    Closed,
}

type ReadSlot = oneshot::Sender<Result<Bytes, AdapterError>>;

#[derive(Default)]
struct ConnectionState {
    /// Set once, never cleared.
    error: Option<AdapterError>,
    /// One-way false -> true.
    ended: bool,
    /// At most one outstanding read.
    reader: Option<ReadSlot>,
    closed: bool,
}

struct Inner<S> {
    socket: S,
    state: Mutex<ConnectionState>,
}

impl<S: EventSocket> Inner<S> {
    /// Record `err` as terminal unless one is already set, fail the pending
    /// read with it, and return the error now in effect.
    fn fail(&self, err: AdapterError) -> AdapterError {
        let (recorded, reader) = {
            let mut state = self.state.lock();
            let recorded = state.error.get_or_insert(err).clone();
            (recorded, state.reader.take())
        };

        if let Some(reader) = reader {
            let _ = reader.send(Err(recorded.clone()));
        }
        recorded
    }
}

impl<S: EventSocket> SocketEvents for Inner<S> {
    fn on_data(&self, chunk: Bytes) {
        let reader = self.state.lock().reader.take();

        match reader {
            Some(reader) => {
                self.socket.pause();
                trace!(len = chunk.len(), "Read resolved with data");
                let _ = reader.send(Ok(chunk));
            }
            None => {
                // The transport ignored pause(); the chunk has nowhere to go
                warn!(len = chunk.len(), "Data delivered with no pending read");
                self.socket.pause();
                self.fail(AdapterError::ProtocolViolation(
                    "data delivered with no pending read",
                ));
            }
        }
    }

    fn on_end(&self) {
        let reader = {
            let mut state = self.state.lock();
            state.ended = true;
            state.reader.take()
        };

        trace!("Read side ended");
        if let Some(reader) = reader {
            let _ = reader.send(Ok(Bytes::new()));
        }
    }

    fn on_error(&self, err: io::Error) {
        trace!(error = %err, "Transport error");
        self.fail(err.into());
    }
}

/// A connection driven by sequential `read`/`write` calls.
///
/// The transport is destroyed exactly once, by [`close`](Self::close) or on
/// drop, whichever comes first.
pub struct ConnectionAdapter<S: EventSocket> {
    inner: Arc<Inner<S>>,
}

impl<S: EventSocket> ConnectionAdapter<S> {
    /// Take ownership of `socket` and start listening to its events.
    pub fn new(socket: S) -> Self {
        let inner = Arc::new(Inner {
            socket,
            state: Mutex::new(ConnectionState::default()),
        });
        inner.socket.listen(inner.clone());

        Self { inner }
    }

    /// Remote address of the underlying socket.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.inner.socket.peer_addr()
    }

    /// Current state.
    pub fn state(&self) -> ConnState {
        let state = self.inner.state.lock();
        if state.closed {
            ConnState::Closed
        } else if state.error.is_some() {
            ConnState::Errored
        } else if state.ended {
            ConnState::Ended
        } else if state.reader.is_some() {
            ConnState::AwaitingData
        } else {
            ConnState::Open
        }
    }

    /// Read the next chunk.
    ///
    /// Returns an empty chunk at end of stream, and keeps returning one on
    /// later calls. Only one read may be outstanding; a second concurrent
    /// call fails with [`AdapterError::ProtocolViolation`] without touching
    /// the first.
    pub async fn read(&self) -> Result<Bytes, AdapterError> {
        let rx = {
            let mut state = self.inner.state.lock();
            if state.closed {
                return Err(AdapterError::Closed);
            }
            if let Some(err) = &state.error {
                return Err(err.clone());
            }
            if state.ended {
                return Ok(Bytes::new());
            }
            if state.reader.is_some() {
                return Err(AdapterError::ProtocolViolation(
                    "read issued while another read is pending",
                ));
            }

            let (tx, rx) = oneshot::channel();
            state.reader = Some(tx);
            rx
        };

        // Outside the lock: a transport may deliver synchronously on resume
        self.inner.socket.resume();

        rx.await.unwrap_or(Err(AdapterError::Closed))
    }

    /// Write `data` and wait for the transport to accept it.
    ///
    /// A transport failure is recorded as the connection's terminal error.
    pub async fn write(&self, data: Bytes) -> Result<(), AdapterError> {
        {
            let state = self.inner.state.lock();
            if state.closed {
                return Err(AdapterError::Closed);
            }
            if let Some(err) = &state.error {
                return Err(err.clone());
            }
        }
        if data.is_empty() {
            return Err(AdapterError::ProtocolViolation("empty write"));
        }

        let (tx, rx) = oneshot::channel();
        self.inner.socket.write(
            data,
            Box::new(move |result| {
                let _ = tx.send(result);
            }),
        );

        match rx.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(self.inner.fail(e.into())),
            Err(_) => Err(AdapterError::Closed),
        }
    }

    /// Destroy the transport. Later calls are no-ops.
    pub fn close(&self) {
        let reader = {
            let mut state = self.inner.state.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            state.reader.take()
        };

        // Dropping the slot fails any pending read with `Closed`
        drop(reader);
        self.inner.socket.destroy();
        trace!("Connection destroyed");
    }
}

impl<S: EventSocket> fmt::Debug for ConnectionAdapter<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionAdapter")
            .field("peer", &self.peer_addr())
            .field("state", &self.state())
            .finish()
    }
}

impl<S: EventSocket> Drop for ConnectionAdapter<S> {
    fn drop(&mut self) {
        self.close();
    }
}
