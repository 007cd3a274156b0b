//! Fixed-capacity byte ring buffer
//!
//! Sits between the backend's frame callback (writer) and the pull loop
//! (reader). One frame's worth of samples goes in, any number of samples comes
//! out.
//!
//! Cursors are logical offsets that only ever grow (wrapping at `usize::MAX`)
//! and are reduced with a power-of-two mask when indexing, so
//! `write_pos - read_pos` is always the number of unread bytes.
//!
//! All mutation goes through `&mut self`: the writer and reader never run at
//! the same time, they alternate inside nested calls on one thread. Sharing a
//! buffer across threads needs an external lock.

/// Returned when a write does not fit in the currently free space
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Insufficient ring buffer space: need {requested} bytes, {free} free")]
pub struct InsufficientSpace {
    pub requested: usize,
    pub free: usize,
}

/// Single-producer single-consumer byte ring buffer
#[derive(Debug)]
pub struct RingBuffer {
    data: Box<[u8]>,
    mask: usize,
    read_pos: usize,
    write_pos: usize,
}

impl RingBuffer {
    /// Create a ring buffer holding at least `capacity` bytes
    ///
    /// The capacity is rounded up to the next power of two.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1).next_power_of_two();
        Self {
            data: vec![0u8; capacity].into_boxed_slice(),
            mask: capacity - 1,
            read_pos: 0,
            write_pos: 0,
        }
    }

    /// Total capacity in bytes
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Bytes ready to be read
    pub fn available_read(&self) -> usize {
        self.write_pos.wrapping_sub(self.read_pos)
    }

    /// Bytes that can be written without overwriting unread data
    pub fn available_write(&self) -> usize {
        self.capacity() - self.available_read()
    }

    /// Append `bytes`, all or nothing
    ///
    /// A write larger than the free space fails and leaves the buffer as it
    /// was; a partial write would split an interleaved sample.
    pub fn write(&mut self, bytes: &[u8]) -> Result<(), InsufficientSpace> {
        let free = self.available_write();
        if bytes.len() > free {
            return Err(InsufficientSpace {
                requested: bytes.len(),
                free,
            });
        }

        let start = self.write_pos & self.mask;
        let first = bytes.len().min(self.capacity() - start);
        self.data[start..start + first].copy_from_slice(&bytes[..first]);
        self.data[..bytes.len() - first].copy_from_slice(&bytes[first..]);

        self.write_pos = self.write_pos.wrapping_add(bytes.len());
        Ok(())
    }

    /// Copy up to `dest.len()` bytes out, returning how many were copied
    pub fn read(&mut self, dest: &mut [u8]) -> usize {
        let n = dest.len().min(self.available_read());
        if n == 0 {
            return 0;
        }

        let start = self.read_pos & self.mask;
        let first = n.min(self.capacity() - start);
        dest[..first].copy_from_slice(&self.data[start..start + first]);
        dest[first..n].copy_from_slice(&self.data[..n - first]);

        self.read_pos = self.read_pos.wrapping_add(n);
        n
    }

    /// Discard everything buffered
    pub fn reset(&mut self) {
        self.read_pos = 0;
        self.write_pos = 0;
    }
}
