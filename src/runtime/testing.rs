//! Scripted in-memory transports for tests.
//!
//! A scripted transport delivers its next queued event synchronously from
//! `resume()`, which makes adapter behaviour deterministic without sockets.

use super::transport::{EventListener, EventSocket, ListenerEvents, SocketEvents, WriteCallback};
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

/// Flow-control call observed by a mock socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketCall {
    Pause,
    Resume,
}

/// Event a scripted socket delivers on resume.
#[derive(Debug)]
pub enum ScriptEvent {
    Data(Bytes),
    End,
    Error(io::ErrorKind),
}

#[derive(Default)]
struct SocketShared {
    events: Option<Arc<dyn SocketEvents>>,
    listening: bool,
    paused: bool,
    calls: Vec<SocketCall>,
    script: VecDeque<ScriptEvent>,
    written: Vec<u8>,
    hold_writes: bool,
    held: Vec<WriteCallback>,
    destroyed: usize,
}

/// Test handle onto a [`MockSocket`].
#[derive(Clone)]
pub struct MockSocketHandle {
    shared: Arc<Mutex<SocketShared>>,
}

/// In-memory [`EventSocket`].
pub struct MockSocket {
    shared: Arc<Mutex<SocketShared>>,
}

impl MockSocket {
    pub fn new() -> (Self, MockSocketHandle) {
        Self::scripted([])
    }

    pub fn scripted(script: impl IntoIterator<Item = ScriptEvent>) -> (Self, MockSocketHandle) {
        let shared = Arc::new(Mutex::new(SocketShared {
            paused: true,
            script: script.into_iter().collect(),
            ..Default::default()
        }));
        (
            Self {
                shared: shared.clone(),
            },
            MockSocketHandle { shared },
        )
    }

    pub fn data(bytes: &[u8]) -> ScriptEvent {
        ScriptEvent::Data(Bytes::copy_from_slice(bytes))
    }

    pub fn end() -> ScriptEvent {
        ScriptEvent::End
    }

    pub fn error(kind: io::ErrorKind) -> ScriptEvent {
        ScriptEvent::Error(kind)
    }
}

impl EventSocket for MockSocket {
    fn listen(&self, events: Arc<dyn SocketEvents>) {
        let mut shared = self.shared.lock();
        shared.events = Some(events);
        shared.listening = true;
    }

    fn pause(&self) {
        let mut shared = self.shared.lock();
        shared.paused = true;
        shared.calls.push(SocketCall::Pause);
    }

    fn resume(&self) {
        let next = {
            let mut shared = self.shared.lock();
            shared.paused = false;
            shared.calls.push(SocketCall::Resume);
            shared.script.pop_front()
        };

        if let Some(event) = next {
            MockSocketHandle {
                shared: self.shared.clone(),
            }
            .dispatch(event);
        }
    }

    fn write(&self, data: Bytes, done: WriteCallback) {
        let mut shared = self.shared.lock();
        shared.written.extend_from_slice(&data);
        if shared.hold_writes {
            shared.held.push(done);
        } else {
            drop(shared);
            done(Ok(()));
        }
    }

    fn destroy(&self) {
        let mut shared = self.shared.lock();
        shared.destroyed += 1;
        shared.events = None;
    }

    fn peer_addr(&self) -> Option<SocketAddr> {
        None
    }
}

impl MockSocketHandle {
    fn events(&self) -> Option<Arc<dyn SocketEvents>> {
        self.shared.lock().events.clone()
    }

    fn dispatch(&self, event: ScriptEvent) {
        let Some(events) = self.events() else {
            return;
        };
        match event {
            ScriptEvent::Data(bytes) => events.on_data(bytes),
            ScriptEvent::End => events.on_end(),
            ScriptEvent::Error(kind) => events.on_error(io::Error::from(kind)),
        }
    }

    /// Push a chunk regardless of flow control.
    pub fn deliver(&self, bytes: &[u8]) {
        self.dispatch(ScriptEvent::Data(Bytes::copy_from_slice(bytes)));
    }

    pub fn end(&self) {
        self.dispatch(ScriptEvent::End);
    }

    pub fn fail(&self, kind: io::ErrorKind) {
        self.dispatch(ScriptEvent::Error(kind));
    }

    pub fn is_paused(&self) -> bool {
        self.shared.lock().paused
    }

    pub fn is_listening(&self) -> bool {
        self.shared.lock().listening
    }

    pub fn calls(&self) -> Vec<SocketCall> {
        self.shared.lock().calls.clone()
    }

    pub fn remaining_script(&self) -> usize {
        self.shared.lock().script.len()
    }

    pub fn written(&self) -> Vec<u8> {
        self.shared.lock().written.clone()
    }

    pub fn destroy_count(&self) -> usize {
        self.shared.lock().destroyed
    }

    /// Keep write callbacks until [`ack_writes`](Self::ack_writes).
    pub fn hold_writes(&self) {
        self.shared.lock().hold_writes = true;
    }

    pub fn ack_writes(&self, result: Result<(), io::ErrorKind>) {
        let held = std::mem::take(&mut self.shared.lock().held);
        for done in held {
            done(result.map_err(io::Error::from));
        }
    }
}

struct ListenerShared<S> {
    events: Option<Arc<dyn ListenerEvents<S>>>,
    paused: bool,
    closed: bool,
    fail_when_exhausted: bool,
    script: VecDeque<S>,
}

/// Test handle onto a [`MockListener`].
pub struct MockListenerHandle {
    shared: Arc<Mutex<ListenerShared<MockSocket>>>,
}

/// In-memory [`EventListener`] yielding [`MockSocket`]s.
pub struct MockListener {
    shared: Arc<Mutex<ListenerShared<MockSocket>>>,
}

impl MockListener {
    pub fn new() -> (Self, MockListenerHandle) {
        Self::scripted([])
    }

    pub fn scripted(sockets: impl IntoIterator<Item = MockSocket>) -> (Self, MockListenerHandle) {
        let shared = Arc::new(Mutex::new(ListenerShared {
            events: None,
            paused: true,
            closed: false,
            fail_when_exhausted: false,
            script: sockets.into_iter().collect(),
        }));
        (
            Self {
                shared: shared.clone(),
            },
            MockListenerHandle { shared },
        )
    }
}

impl EventListener for MockListener {
    type Socket = MockSocket;

    fn listen(&self, events: Arc<dyn ListenerEvents<MockSocket>>) {
        self.shared.lock().events = Some(events);
    }

    fn pause(&self) {
        self.shared.lock().paused = true;
    }

    fn resume(&self) {
        let (next, events, fail) = {
            let mut shared = self.shared.lock();
            shared.paused = false;
            (
                shared.script.pop_front(),
                shared.events.clone(),
                shared.fail_when_exhausted,
            )
        };

        let Some(events) = events else {
            return;
        };
        match next {
            Some(socket) => events.on_connection(socket),
            None if fail => events.on_error(io::Error::from(io::ErrorKind::NotConnected)),
            None => {}
        }
    }

    fn close(&self) {
        let mut shared = self.shared.lock();
        shared.closed = true;
        shared.events = None;
    }

    fn local_addr(&self) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], 0))
    }
}

impl MockListenerHandle {
    /// Deliver a connection regardless of flow control.
    pub fn connect(&self, socket: MockSocket) {
        let events = self.shared.lock().events.clone();
        if let Some(events) = events {
            events.on_connection(socket);
        }
    }

    pub fn fail(&self, kind: io::ErrorKind) {
        let events = self.shared.lock().events.clone();
        if let Some(events) = events {
            events.on_error(io::Error::from(kind));
        }
    }

    /// Report a listener error once the scripted sockets run out.
    pub fn fail_when_exhausted(&self) {
        self.shared.lock().fail_when_exhausted = true;
    }

    pub fn is_paused(&self) -> bool {
        self.shared.lock().paused
    }

    pub fn is_closed(&self) -> bool {
        self.shared.lock().closed
    }
}
