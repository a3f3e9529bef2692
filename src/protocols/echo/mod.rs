//! Echo protocol implementation.
//!
//! Line-oriented echo service:
//! - Client sends: `<text>\n`
//! - Server echoes: `Echo: <text>\n`
//!
//! ## Protocol Format
//!
//! ```text
//! Request:  hello\n
//! Response: Echo: hello\n
//!
//! Request:  quit\n
//! Response: Bye.\n   (then the server closes the connection)
//! ```
//!
//! Several lines may arrive in one read and a line may span several reads.
//! A line longer than the configured maximum closes the connection without a
//! reply, as does end of stream; a trailing partial line is discarded.

pub mod handler;
pub mod parser;

pub use handler::{handle_connection, ConnectionError};
