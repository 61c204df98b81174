use crate::Priority;
use std::time::Instant;
use uuid::Uuid;

/// A payload wrapped with the scheduling metadata the queue orders on (§3).
///
/// `T` is whatever the caller wants delivered on dequeue — the dispatch
/// engine's root crate wraps a `RequestDescriptor` in one of these, but
/// this crate has no opinion on what `T` is.
#[derive(Debug, Clone)]
pub struct QueueEntry<T> {
    pub id: Uuid,
    pub priority: Priority,
    pub sequence: u64,
    pub attempt: u32,
    pub next_eligible_ts: Instant,
    pub expiry_ts: Instant,
    pub payload: T,
}

impl<T> QueueEntry<T> {
    pub fn new(id: Uuid, priority: Priority, next_eligible_ts: Instant, expiry_ts: Instant, payload: T) -> Self {
        Self {
            id,
            priority,
            sequence: 0,
            attempt: 1,
            next_eligible_ts,
            expiry_ts,
            payload,
        }
    }
}

/// Ordering key within a priority band: `(next_eligible_ts, sequence)`,
/// ties broken FIFO by sequence (§4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct HeapKey {
    pub(crate) next_eligible_ts: Instant,
    pub(crate) sequence: u64,
}

impl PartialOrd for HeapKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.next_eligible_ts
            .cmp(&other.next_eligible_ts)
            .then_with(|| self.sequence.cmp(&other.sequence))
    }
}
