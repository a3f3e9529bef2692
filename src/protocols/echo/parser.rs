//! Echo protocol message classification and replies.

use bytes::{Bytes, BytesMut};

/// Message that ends the session, delimiter included.
pub const QUIT: &[u8] = b"quit\n";

/// Acknowledgement sent before closing on `QUIT`.
pub const FAREWELL: &[u8] = b"Bye.\n";

/// Prefix of every echo reply.
pub const ECHO_PREFIX: &[u8] = b"Echo: ";

/// Parsed echo command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Echo the message back, delimiter included.
    Echo(Bytes),
    /// Quit command.
    Quit,
}

/// Classify one framed message.
pub fn parse(message: Bytes) -> Command {
    if message == QUIT {
        Command::Quit
    } else {
        Command::Echo(message)
    }
}

/// Build the reply for an echoed message.
pub fn response_echo(message: &[u8]) -> Bytes {
    let mut reply = BytesMut::with_capacity(ECHO_PREFIX.len() + message.len());
    reply.extend_from_slice(ECHO_PREFIX);
    reply.extend_from_slice(message);
    reply.freeze()
}

/// The acknowledgement for `QUIT`.
pub fn response_farewell() -> Bytes {
    Bytes::from_static(FAREWELL)
}
