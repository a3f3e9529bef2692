//! Event-driven transport primitives.
//!
//! A transport pushes events into a sink instead of being polled. The
//! adapters in this module's siblings turn those events back into
//! sequential `read`/`write`/`accept` calls. Transports start paused and only
//! pull from the OS between `resume()` and the next `pause()`.

use bytes::Bytes;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

/// Completion callback for a transport write.
pub type WriteCallback = Box<dyn FnOnce(io::Result<()>) + Send>;

/// Receiver of byte-stream events.
///
/// Implementations must not block: they are called from the transport's
/// delivery path.
pub trait SocketEvents: Send + Sync {
    /// A chunk arrived. Chunks do not align with message boundaries.
    fn on_data(&self, chunk: Bytes);
    /// The peer finished sending.
    fn on_end(&self);
    /// The transport failed. No further events follow.
    fn on_error(&self, err: io::Error);
}

/// A connected byte-stream socket that reports through [`SocketEvents`].
pub trait EventSocket: Send + Sync + 'static {
    /// Start delivering events to `events`. The socket stays paused until
    /// the first `resume()`.
    fn listen(&self, events: Arc<dyn SocketEvents>);

    /// Stop pulling data off the wire.
    fn pause(&self);

    /// Pull data off the wire until the next `pause()`.
    fn resume(&self);

    /// Queue `data` for sending. `done` runs once the bytes are handed to the
    /// OS or the write fails.
    fn write(&self, data: Bytes, done: WriteCallback);

    /// Release the socket. Queued writes may still be flushed.
    fn destroy(&self);

    /// Remote address, if known.
    fn peer_addr(&self) -> Option<SocketAddr>;
}

/// Receiver of listener events.
pub trait ListenerEvents<S>: Send + Sync {
    /// A connection was accepted.
    fn on_connection(&self, socket: S);
    /// The listener failed. No further events follow.
    fn on_error(&self, err: io::Error);
}

/// A bound listener that reports through [`ListenerEvents`].
pub trait EventListener: Send + Sync + 'static {
    type Socket: EventSocket;

    /// Start delivering events to `events`. The listener stays paused until
    /// the first `resume()`.
    fn listen(&self, events: Arc<dyn ListenerEvents<Self::Socket>>);

    /// Stop accepting from the OS.
    fn pause(&self);

    /// Accept from the OS until the next `pause()`.
    fn resume(&self);

    /// Stop listening and release the socket.
    fn close(&self);

    /// Address the listener is bound to.
    fn local_addr(&self) -> SocketAddr;
}
