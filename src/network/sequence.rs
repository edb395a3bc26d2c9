//! Sequenced Delivery Buffer
//!
//! The relay guarantees every message arrives exactly once, but not in
//! order. This buffer holds early arrivals and releases them strictly by
//! sequence number, starting at 0 for each connection.

use std::collections::BTreeMap;

/// Reorders items by sequence number.
///
/// Every `push` returns the longest consecutive run that became deliverable,
/// in ascending order. A gap stalls delivery until the missing number shows
/// up; there is no timeout.
#[derive(Debug)]
pub struct SequencedDeliveryBuffer<T> {
    next_expected: u64,
    pending: BTreeMap<u64, T>,
}

impl<T> Default for SequencedDeliveryBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SequencedDeliveryBuffer<T> {
    /// Create an empty buffer expecting sequence 0.
    pub fn new() -> Self {
        Self {
            next_expected: 0,
            pending: BTreeMap::new(),
        }
    }

    /// Accept one arrival and drain whatever is now in order.
    ///
    /// Sequences already delivered are dropped. A sequence already waiting
    /// keeps its first copy.
    pub fn push(&mut self, sequence: u64, item: T) -> Vec<T> {
        if sequence < self.next_expected {
            return Vec::new();
        }
        self.pending.entry(sequence).or_insert(item);

        let mut ready = Vec::new();
        while let Some(item) = self.pending.remove(&self.next_expected) {
            ready.push(item);
            self.next_expected += 1;
        }
        ready
    }

    /// Next sequence number that will be released.
    pub fn next_expected(&self) -> u64 {
        self.next_expected
    }

    /// Number of arrivals waiting on a gap.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Lowest missing sequence blocking delivery, if anything is waiting.
    pub fn missing(&self) -> Option<u64> {
        (!self.pending.is_empty()).then_some(self.next_expected)
    }

    /// Start over for a new connection.
    pub fn reset(&mut self) {
        self.next_expected = 0;
        self.pending.clear();
    }
}

// =============================================================================
// TESTS
// =============================================================================
