//! Transaction identifier allocation
//!
//! One process-wide counter hands out MBAP transaction ids to concurrent
//! workers. Wrapping at 65536 is expected; response correlation relies on
//! exact equality only, so the allocator makes no uniqueness promise beyond
//! the 16-bit cycle.

use std::sync::atomic::{AtomicU16, Ordering};

/// Wrapping 16-bit transaction id allocator, safe under concurrent use.
#[derive(Debug)]
pub struct TransactionAllocator {
    counter: AtomicU16,
}

impl TransactionAllocator {
    /// Create an allocator starting at 1.
    pub fn new() -> Self {
        Self::with_seed(1)
    }

    /// Create an allocator starting at an arbitrary seed.
    pub fn with_seed(seed: u16) -> Self {
        Self {
            counter: AtomicU16::new(seed),
        }
    }

    /// Return the next transaction id. Wraps modulo 65536.
    pub fn next(&self) -> u16 {
        self.counter.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for TransactionAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_sequential_ids() {
        let allocator = TransactionAllocator::with_seed(10);
        assert_eq!(allocator.next(), 10);
        assert_eq!(allocator.next(), 11);
        assert_eq!(allocator.next(), 12);
    }

    #[test]
    fn test_wrap_around() {
        let allocator = TransactionAllocator::with_seed(0xFFFF);
        assert_eq!(allocator.next(), 0xFFFF);
        assert_eq!(allocator.next(), 0x0000);
        assert_eq!(allocator.next(), 0x0001);
    }

    #[test]
    fn test_concurrent_ids_are_distinct_within_cycle() {
        let allocator = Arc::new(TransactionAllocator::new());
        let mut handles = Vec::new();

        for _ in 0..8 {
            let allocator = Arc::clone(&allocator);
            handles.push(std::thread::spawn(move || {
                (0..500).map(|_| allocator.next()).collect::<Vec<_>>()
            }));
        }

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id), "duplicate transaction id {id}");
            }
        }
        assert_eq!(seen.len(), 8 * 500);
    }
}
