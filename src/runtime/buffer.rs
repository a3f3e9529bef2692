//! Growable per-connection byte buffer.
//!
//! Incoming chunks are appended at the tail and complete frames are consumed
//! from the head. Storage grows geometrically and never shrinks, so a
//! connection that has seen one large line keeps the room for the next.
//!
//! The valid region always starts at offset 0: consuming a prefix shifts the
//! remaining bytes down. Slices returned by [`DynamicBuffer::as_slice`] must
//! not be held across a call that mutates the buffer.

/// Smallest storage allocated once the buffer holds any data.
pub const MIN_CAPACITY: usize = 32;

/// A contiguous byte store with an explicit capacity/length pair.
#[derive(Debug, Default)]
pub struct DynamicBuffer {
    /// Backing storage. Only `storage[..len]` is ever read.
    storage: Box<[u8]>,
    /// Bytes currently valid.
    len: usize,
}

impl DynamicBuffer {
    /// Create an empty buffer without allocating.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of valid bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the buffer holds no valid bytes.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Size of the backing storage.
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// The valid region.
    pub fn as_slice(&self) -> &[u8] {
        &self.storage[..self.len]
    }

    /// Append `data` at the tail, growing storage if needed.
    pub fn append(&mut self, data: &[u8]) {
        let needed = self.len + data.len();
        if needed > self.capacity() {
            self.grow(needed);
        }

        self.storage[self.len..needed].copy_from_slice(data);
        self.len = needed;
    }

    /// Drop the first `n` valid bytes, shifting the rest to offset 0.
    ///
    /// # Panics
    /// Panics if `n` exceeds the valid length. Callers only consume what they
    /// have already located in the buffer, so this is a bug, not a runtime
    /// condition.
    pub fn consume_prefix(&mut self, n: usize) {
        assert!(
            n <= self.len,
            "consume_prefix({n}) past valid length {}",
            self.len
        );

        self.storage.copy_within(n..self.len, 0);
        self.len -= n;
    }

    /// Reallocate to the first doubling of the current capacity (from
    /// `MIN_CAPACITY`) that holds `needed` bytes.
    fn grow(&mut self, needed: usize) {
        let mut capacity = self.capacity().max(MIN_CAPACITY);
        while capacity < needed {
            capacity *= 2;
        }

        let mut storage = vec![0u8; capacity].into_boxed_slice();
        storage[..self.len].copy_from_slice(self.as_slice());
        self.storage = storage;
    }
}
