//! Restores sequence order for results arriving from parallel workers.
//!
//! Workers finish events out of order. Each result carries the global
//! sequence number it was dispatched with, and [`ReorderBuffer`] holds
//! results in a min-heap until the next expected sequence number is present.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// A result released by the buffer in sequence order.
#[derive(Debug, Clone, PartialEq)]
pub enum Slot<T> {
    /// The event survived the chain.
    Emit(T),
    /// The chain dropped the event; the sequence advances silently.
    Dropped,
}

struct Pending<T> {
    seq: u64,
    item: Option<T>,
}

// Order by sequence (reverse for Min-Heap)
impl<T> PartialEq for Pending<T> {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
    }
}

impl<T> Eq for Pending<T> {}

impl<T> PartialOrd for Pending<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Pending<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        other.seq.cmp(&self.seq)
    }
}

/// Reorder buffer keyed by the next expected sequence number.
pub struct ReorderBuffer<T> {
    next: u64,
    pending: BinaryHeap<Pending<T>>,
}

impl<T> Default for ReorderBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ReorderBuffer<T> {
    /// Creates a buffer expecting sequence number 0.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next: 0,
            pending: BinaryHeap::new(),
        }
    }

    /// Next sequence number to be released.
    #[must_use]
    pub fn next_expected(&self) -> u64 {
        self.next
    }

    /// Number of results waiting for an earlier sequence number.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// True when nothing is waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Stores the result for `seq`; `None` marks a dropped event.
    ///
    /// Sequence numbers already released are ignored.
    pub fn push(&mut self, seq: u64, item: Option<T>) {
        if seq < self.next {
            log::warn!("sequence {seq} arrived after {} was released, ignored", self.next);
            return;
        }
        self.pending.push(Pending { seq, item });
    }

    /// Releases the result for the next expected sequence number, if present.
    pub fn pop_ready(&mut self) -> Option<Slot<T>> {
        if self.pending.peek()?.seq != self.next {
            return None;
        }
        let pending = self.pending.pop()?;
        self.next += 1;
        Some(pending.item.map_or(Slot::Dropped, Slot::Emit))
    }

    /// Releases every held result in ascending order, skipping gaps.
    ///
    /// Used when a run stops early and missing sequence numbers will never
    /// arrive.
    pub fn drain_all(&mut self) -> Vec<(u64, Slot<T>)> {
        let mut released = Vec::with_capacity(self.pending.len());
        while let Some(pending) = self.pending.pop() {
            self.next = pending.seq + 1;
            released.push((pending.seq, pending.item.map_or(Slot::Dropped, Slot::Emit)));
        }
        released
    }
}
