//! Sequential adapter over an event-driven listener.
//!
//! Same single-slot scheme as the connection adapter: `accept()` fills the
//! slot and resumes the listener, the next connection or error resolves it,
//! and the listener is paused again.

use super::connection::ConnectionAdapter;
use super::error::AdapterError;
use super::transport::{EventListener, EventSocket, ListenerEvents};
use parking_lot::Mutex;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{trace, warn};

type AcceptSlot<S> = oneshot::Sender<Result<S, AdapterError>>;

struct ListenerState<S> {
    /// Set once, never cleared.
    error: Option<AdapterError>,
    /// At most one outstanding accept.
    acceptor: Option<AcceptSlot<S>>,
    closed: bool,
}

struct Inner<L: EventListener> {
    listener: L,
    state: Mutex<ListenerState<L::Socket>>,
}

impl<L: EventListener> ListenerEvents<L::Socket> for Inner<L> {
    fn on_connection(&self, socket: L::Socket) {
        let acceptor = self.state.lock().acceptor.take();

        match acceptor {
            Some(acceptor) => {
                self.listener.pause();
                if let Err(Ok(socket)) = acceptor.send(Ok(socket)) {
                    // The accepting task went away
                    socket.destroy();
                }
            }
            None => {
                warn!(peer = ?socket.peer_addr(), "Connection delivered with no pending accept");
                self.listener.pause();
                socket.destroy();
            }
        }
    }

    fn on_error(&self, err: io::Error) {
        trace!(error = %err, "Listener error");
        let (recorded, acceptor) = {
            let mut state = self.state.lock();
            let recorded = state.error.get_or_insert(err.into()).clone();
            (recorded, state.acceptor.take())
        };

        if let Some(acceptor) = acceptor {
            let _ = acceptor.send(Err(recorded));
        }
    }
}

/// A listener driven by sequential `accept` calls.
pub struct ListenerAdapter<L: EventListener> {
    inner: Arc<Inner<L>>,
}

impl<L: EventListener> ListenerAdapter<L> {
    /// Take ownership of `listener` and start listening to its events.
    pub fn new(listener: L) -> Self {
        let inner = Arc::new(Inner {
            listener,
            state: Mutex::new(ListenerState {
                error: None,
                acceptor: None,
                closed: false,
            }),
        });
        inner.listener.listen(inner.clone());

        Self { inner }
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.inner.listener.local_addr()
    }

    /// Wait for the next connection.
    ///
    /// Fails with the recorded error once the listener has failed. Only one
    /// accept may be outstanding.
    pub async fn accept(&self) -> Result<ConnectionAdapter<L::Socket>, AdapterError> {
        let rx = {
            let mut state = self.inner.state.lock();
            if state.closed {
                return Err(AdapterError::Closed);
            }
            if let Some(err) = &state.error {
                return Err(err.clone());
            }
            if state.acceptor.is_some() {
                return Err(AdapterError::ProtocolViolation(
                    "accept issued while another accept is pending",
                ));
            }

            let (tx, rx) = oneshot::channel();
            state.acceptor = Some(tx);
            rx
        };

        self.inner.listener.resume();

        let socket = rx.await.unwrap_or(Err(AdapterError::Closed))?;
        Ok(ConnectionAdapter::new(socket))
    }

    /// Stop listening. Later calls are no-ops.
    pub fn close(&self) {
        let acceptor = {
            let mut state = self.inner.state.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            state.acceptor.take()
        };

        drop(acceptor);
        self.inner.listener.close();
    }
}

impl<L: EventListener> Drop for ListenerAdapter<L> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::testing::{MockListener, MockSocket};
    use tokio_test::{assert_pending, assert_ready, task};

    #[tokio::test]
    async fn test_accept_resumes_then_pauses() {
        let (listener, mock) = MockListener::new();
        let adapter = ListenerAdapter::new(listener);
        assert!(mock.is_paused());

        let mut accept = task::spawn(adapter.accept());
        assert_pending!(accept.poll());
        assert!(!mock.is_paused());

        let (socket, socket_mock) = MockSocket::new();
        mock.connect(socket);
        let conn = assert_ready!(accept.poll()).unwrap();
        assert!(mock.is_paused());

        // The accepted socket is wired to a fresh connection adapter
        assert!(socket_mock.is_listening());
        drop(conn);
        assert_eq!(socket_mock.destroy_count(), 1);
    }

    #[tokio::test]
    async fn test_scripted_connections_accepted_in_order() {
        let (first, first_mock) = MockSocket::new();
        let (second, second_mock) = MockSocket::new();
        let (listener, _mock) = MockListener::scripted([first, second]);
        let adapter = ListenerAdapter::new(listener);

        let a = adapter.accept().await.unwrap();
        assert!(first_mock.is_listening());
        assert!(!second_mock.is_listening());

        let b = adapter.accept().await.unwrap();
        assert!(second_mock.is_listening());
        drop((a, b));
    }

    #[tokio::test]
    async fn test_second_accept_is_rejected() {
        let (listener, _mock) = MockListener::new();
        let adapter = ListenerAdapter::new(listener);

        let mut first = task::spawn(adapter.accept());
        assert_pending!(first.poll());

        assert!(matches!(
            adapter.accept().await,
            Err(AdapterError::ProtocolViolation(_))
        ));
        assert_pending!(first.poll());
    }

    #[tokio::test]
    async fn test_listener_error_is_terminal() {
        let (listener, mock) = MockListener::new();
        let adapter = ListenerAdapter::new(listener);

        let mut accept = task::spawn(adapter.accept());
        assert_pending!(accept.poll());
        mock.fail(io::ErrorKind::Other);

        let err = assert_ready!(accept.poll()).err().unwrap();
        assert_eq!(err.io_kind(), Some(io::ErrorKind::Other));
        drop(accept);

        let err = adapter.accept().await.err().unwrap();
        assert_eq!(err.io_kind(), Some(io::ErrorKind::Other));
    }

    #[tokio::test]
    async fn test_unclaimed_connection_is_destroyed() {
        let (listener, mock) = MockListener::new();
        let _adapter = ListenerAdapter::new(listener);

        let (socket, socket_mock) = MockSocket::new();
        mock.connect(socket);
        assert_eq!(socket_mock.destroy_count(), 1);
    }

    #[tokio::test]
    async fn test_close_stops_accepting() {
        let (listener, mock) = MockListener::new();
        let adapter = ListenerAdapter::new(listener);

        adapter.close();
        assert!(mock.is_closed());
        assert!(matches!(adapter.accept().await, Err(AdapterError::Closed)));
    }
}
