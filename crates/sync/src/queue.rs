//! Outbound queue of deferred sync operations.

use std::collections::VecDeque;

use crate::types::SyncOperation;

pub const DEFAULT_QUEUE_CAP: usize = 1000;

/// Bounded FIFO buffer for operations awaiting a flush.
///
/// Enqueueing past the capacity silently drops the oldest entries. A failed
/// flush restores its batch to the head with [`requeue_front`], which may
/// leave the queue transiently over capacity; the next enqueue evicts back
/// down. Not thread-safe on its own, callers wrap it in a lock.
///
/// [`requeue_front`]: OutboundQueue::requeue_front
#[derive(Debug)]
pub struct OutboundQueue {
    items: VecDeque<SyncOperation>,
    cap: usize,
    evicted_total: u64,
}

impl OutboundQueue {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_QUEUE_CAP)
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self {
            items: VecDeque::new(),
            cap: cap.max(1),
            evicted_total: 0,
        }
    }

    /// Append an operation, evicting from the head while over capacity.
    pub fn enqueue(&mut self, op: SyncOperation) {
        self.items.push_back(op);
        while self.items.len() > self.cap {
            self.items.pop_front();
            self.evicted_total += 1;
        }
    }

    /// Remove and return up to `max` operations from the head, oldest first.
    pub fn dequeue_batch(&mut self, max: usize) -> Vec<SyncOperation> {
        let n = max.min(self.items.len());
        self.items.drain(..n).collect()
    }

    /// Put a failed batch back at the head, preserving its internal order
    /// ahead of anything enqueued since. No eviction happens here.
    pub fn requeue_front(&mut self, batch: Vec<SyncOperation>) {
        for op in batch.into_iter().rev() {
            self.items.push_front(op);
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.cap
    }

    /// Operations dropped by capacity eviction since construction.
    pub fn evicted_total(&self) -> u64 {
        self.evicted_total
    }
}

impl Default for OutboundQueue {
    fn default() -> Self {
        Self::new()
    }
}
