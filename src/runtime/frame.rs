//! Newline framing over a [`DynamicBuffer`].

use super::buffer::DynamicBuffer;
use bytes::Bytes;

/// Message delimiter.
pub const DELIMITER: u8 = b'\n';

/// Cut the first complete message off the front of `buffer`.
///
/// The returned message includes its trailing delimiter. Returns `None` when
/// the buffer holds no delimiter yet, leaving the partial data in place.
/// One read can carry several messages, so callers loop until `None`.
pub fn cut(buffer: &mut DynamicBuffer) -> Option<Bytes> {
    let end = find_delimiter(buffer.as_slice())? + 1;
    let message = Bytes::copy_from_slice(&buffer.as_slice()[..end]);
    buffer.consume_prefix(end);
    Some(message)
}

fn find_delimiter(data: &[u8]) -> Option<usize> {
    data.iter().position(|&b| b == DELIMITER)
}
