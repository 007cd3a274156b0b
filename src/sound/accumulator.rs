//! Encoded output accumulator
//!
//! Collects the bytes an encode backend hands to its write callback until the
//! caller drains them. No backpressure: the caller bounds memory by draining
//! after each `process_interleaved`.

use parking_lot::Mutex;

/// Append-only byte buffer drained in one step
#[derive(Debug, Default)]
pub struct OutputAccumulator {
    buf: Mutex<Vec<u8>>,
}

impl OutputAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes from the write callback
    pub fn push(&self, bytes: &[u8]) {
        self.buf.lock().extend_from_slice(bytes);
    }

    /// Remove and return everything pushed since the last drain
    pub fn drain(&self) -> Vec<u8> {
        std::mem::take(&mut *self.buf.lock())
    }

    /// Bytes currently held
    pub fn len(&self) -> usize {
        self.buf.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_push_and_drain() {
        let acc = OutputAccumulator::new();
        acc.push(b"fLaC");
        acc.push(&[1, 2]);
        assert_eq!(acc.len(), 6);

        assert_eq!(acc.drain(), b"fLaC\x01\x02".to_vec());
        assert!(acc.is_empty());
    }

    #[test]
    fn test_drain_empty() {
        let acc = OutputAccumulator::new();
        assert!(acc.drain().is_empty());
    }

    #[test]
    fn test_drain_only_returns_new_bytes() {
        let acc = OutputAccumulator::new();
        acc.push(&[1]);
        let _ = acc.drain();
        acc.push(&[2, 3]);
        assert_eq!(acc.drain(), vec![2, 3]);
    }

    #[test]
    fn test_concurrent_push_and_drain_loses_nothing() {
        let acc = Arc::new(OutputAccumulator::new());
        let producer = {
            let acc = Arc::clone(&acc);
            thread::spawn(move || {
                for i in 0..1000u32 {
                    acc.push(&i.to_le_bytes());
                }
            })
        };

        let mut collected = Vec::new();
        while !producer.is_finished() {
            collected.extend(acc.drain());
        }
        producer.join().unwrap();
        collected.extend(acc.drain());

        assert_eq!(collected.len(), 4000);
        for (i, chunk) in collected.chunks_exact(4).enumerate() {
            assert_eq!(u32::from_le_bytes(chunk.try_into().unwrap()), i as u32);
        }
    }
}
