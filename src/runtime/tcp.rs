//! Event-driven TCP transport on top of tokio.
//!
//! Each socket runs a read task and a write task. The read task waits on a
//! watch-channel gate and only issues a read while the gate is open, so a
//! paused socket leaves incoming bytes in the kernel. The write task drains
//! a queue in order and reports each completion through its callback.

use super::transport::{EventListener, EventSocket, ListenerEvents, SocketEvents, WriteCallback};
use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::trace;

/// Bytes requested from the kernel per read.
const READ_CHUNK_SIZE: usize = 16 * 1024;

/// Pending connections queued by the kernel.
const LISTEN_BACKLOG: i32 = 1024;

type PendingWrite = (Bytes, WriteCallback);

/// A TCP stream exposed as an [`EventSocket`].
///
/// Must be created inside a tokio runtime.
pub struct TokioSocket {
    peer: SocketAddr,
    demand: watch::Sender<bool>,
    read_half: Mutex<Option<OwnedReadHalf>>,
    read_task: Mutex<Option<JoinHandle<()>>>,
    writes: Mutex<Option<mpsc::UnboundedSender<PendingWrite>>>,
}

impl TokioSocket {
    pub fn new(stream: TcpStream, peer: SocketAddr) -> Self {
        let (read_half, write_half) = stream.into_split();
        let (writes, queue) = mpsc::unbounded_channel();
        tokio::spawn(write_loop(write_half, queue));

        Self {
            peer,
            demand: watch::channel(false).0,
            read_half: Mutex::new(Some(read_half)),
            read_task: Mutex::new(None),
            writes: Mutex::new(Some(writes)),
        }
    }
}

impl EventSocket for TokioSocket {
    fn listen(&self, events: Arc<dyn SocketEvents>) {
        let Some(read_half) = self.read_half.lock().take() else {
            return;
        };
        let demand = self.demand.subscribe();
        *self.read_task.lock() = Some(tokio::spawn(read_loop(read_half, demand, events)));
    }

    fn pause(&self) {
        self.demand.send_replace(false);
    }

    fn resume(&self) {
        self.demand.send_replace(true);
    }

    fn write(&self, data: Bytes, done: WriteCallback) {
        let writes = self.writes.lock();
        let rejected = match writes.as_ref() {
            Some(queue) => queue.send((data, done)).err().map(|e| e.0 .1),
            None => Some(done),
        };
        drop(writes);

        if let Some(done) = rejected {
            done(Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "socket is no longer writable",
            )));
        }
    }

    fn destroy(&self) {
        // Closing the queue lets the write task flush what is already queued
        // and then shut down the write side
        self.writes.lock().take();
        self.read_half.lock().take();
        if let Some(task) = self.read_task.lock().take() {
            task.abort();
        }
        trace!(peer = %self.peer, "Socket destroyed");
    }

    fn peer_addr(&self) -> Option<SocketAddr> {
        Some(self.peer)
    }
}

async fn read_loop(
    mut read_half: OwnedReadHalf,
    mut demand: watch::Receiver<bool>,
    events: Arc<dyn SocketEvents>,
) {
    let mut buffer = BytesMut::with_capacity(READ_CHUNK_SIZE);

    loop {
        if demand.wait_for(|wanted| *wanted).await.is_err() {
            return;
        }

        buffer.reserve(READ_CHUNK_SIZE);
        match read_half.read_buf(&mut buffer).await {
            Ok(0) => {
                events.on_end();
                return;
            }
            Ok(_) => events.on_data(buffer.split().freeze()),
            Err(e) => {
                events.on_error(e);
                return;
            }
        }
    }
}

async fn write_loop(
    mut write_half: OwnedWriteHalf,
    mut queue: mpsc::UnboundedReceiver<PendingWrite>,
) {
    while let Some((data, done)) = queue.recv().await {
        let result = write_half.write_all(&data).await;
        let failed = result.is_err();
        done(result);
        if failed {
            return;
        }
    }

    let _ = write_half.shutdown().await;
}

/// A TCP listener exposed as an [`EventListener`].
///
/// Must be created inside a tokio runtime.
pub struct TokioListener {
    local_addr: SocketAddr,
    demand: watch::Sender<bool>,
    listener: Mutex<Option<TcpListener>>,
    accept_task: Mutex<Option<JoinHandle<()>>>,
}

impl TokioListener {
    /// Bind to `addr` with `SO_REUSEADDR`.
    pub fn bind(addr: SocketAddr) -> io::Result<Self> {
        let listener = TcpListener::from_std(create_listener(addr)?)?;
        let local_addr = listener.local_addr()?;

        Ok(Self {
            local_addr,
            demand: watch::channel(false).0,
            listener: Mutex::new(Some(listener)),
            accept_task: Mutex::new(None),
        })
    }
}

impl EventListener for TokioListener {
    type Socket = TokioSocket;

    fn listen(&self, events: Arc<dyn ListenerEvents<TokioSocket>>) {
        let Some(listener) = self.listener.lock().take() else {
            return;
        };
        let demand = self.demand.subscribe();
        *self.accept_task.lock() = Some(tokio::spawn(accept_loop(listener, demand, events)));
    }

    fn pause(&self) {
        self.demand.send_replace(false);
    }

    fn resume(&self) {
        self.demand.send_replace(true);
    }

    fn close(&self) {
        self.listener.lock().take();
        if let Some(task) = self.accept_task.lock().take() {
            task.abort();
        }
    }

    fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

async fn accept_loop(
    listener: TcpListener,
    mut demand: watch::Receiver<bool>,
    events: Arc<dyn ListenerEvents<TokioSocket>>,
) {
    loop {
        if demand.wait_for(|wanted| *wanted).await.is_err() {
            return;
        }

        match listener.accept().await {
            Ok((stream, peer)) => events.on_connection(TokioSocket::new(stream, peer)),
            Err(e) => {
                events.on_error(e);
                return;
            }
        }
    }
}

fn create_listener(addr: SocketAddr) -> io::Result<std::net::TcpListener> {
    let socket = socket2::Socket::new(
        match addr {
            SocketAddr::V4(_) => socket2::Domain::IPV4,
            SocketAddr::V6(_) => socket2::Domain::IPV6,
        },
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;

    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(LISTEN_BACKLOG)?;

    Ok(socket.into())
}
