//! Echo protocol control loop.

use super::parser::{self, Command};
use crate::runtime::{frame, AdapterError, ConnectionAdapter, DynamicBuffer, EventSocket};
use thiserror::Error;
use tracing::{debug, trace, warn};

/// Why a connection's loop stopped without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    /// The client sent `quit` and was acknowledged.
    Quit,
    /// The client stopped sending.
    EndOfStream,
}

/// Failure that ended a connection.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error(transparent)]
    Adapter(#[from] AdapterError),
    /// The client sent this many bytes without a newline.
    #[error("line exceeds {limit} bytes")]
    LineTooLong { limit: usize },
}

/// Handle an echo protocol connection.
///
/// Replies to each complete line in arrival order and only reads again once
/// every buffered line is answered. The transport is closed when this
/// returns, whatever the outcome.
pub async fn handle_connection<S: EventSocket>(
    conn: ConnectionAdapter<S>,
    max_line_length: usize,
) -> Result<Exit, ConnectionError> {
    let mut buffer = DynamicBuffer::new();
    let result = serve(&conn, &mut buffer, max_line_length).await;
    trace!(state = ?conn.state(), "Connection loop finished");
    conn.close();
    result
}

async fn serve<S: EventSocket>(
    conn: &ConnectionAdapter<S>,
    buffer: &mut DynamicBuffer,
    max_line_length: usize,
) -> Result<Exit, ConnectionError> {
    loop {
        if let Some(message) = frame::cut(buffer) {
            if message.len() > max_line_length {
                return Err(line_too_long(conn, message.len(), max_line_length));
            }
            match parser::parse(message) {
                Command::Quit => {
                    conn.write(parser::response_farewell()).await?;
                    debug!(peer = ?conn.peer_addr(), "Client quit");
                    return Ok(Exit::Quit);
                }
                Command::Echo(message) => {
                    trace!(len = message.len(), "Echoing line");
                    conn.write(parser::response_echo(&message)).await?;
                }
            }
            continue;
        }

        if buffer.len() >= max_line_length {
            return Err(line_too_long(conn, buffer.len(), max_line_length));
        }

        let chunk = conn.read().await?;
        if chunk.is_empty() {
            debug!(peer = ?conn.peer_addr(), "EOF");
            if !buffer.is_empty() {
                trace!(discarded = buffer.len(), "Dropping incomplete line");
            }
            return Ok(Exit::EndOfStream);
        }
        buffer.append(&chunk);
    }
}

fn line_too_long<S: EventSocket>(
    conn: &ConnectionAdapter<S>,
    buffered: usize,
    limit: usize,
) -> ConnectionError {
    warn!(
        peer = ?conn.peer_addr(),
        buffered,
        limit,
        "Line too long, closing connection"
    );
    ConnectionError::LineTooLong { limit }
}
