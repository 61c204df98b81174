use crate::entry::{HeapKey, QueueEntry};
use crate::error::QueueError;
use crate::priority::Priority;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::{Condvar, Mutex};
use std::time::Instant;
use uuid::Uuid;

struct HeapItem<T> {
    key: HeapKey,
    entry: QueueEntry<T>,
}

impl<T> PartialEq for HeapItem<T> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}
impl<T> Eq for HeapItem<T> {}
impl<T> PartialOrd for HeapItem<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl<T> Ord for HeapItem<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.key.cmp(&other.key)
    }
}

struct State<T> {
    bands: [BinaryHeap<Reverse<HeapItem<T>>>; Priority::COUNT],
    size: usize,
    next_sequence: u64,
    shutdown: bool,
}

impl<T> State<T> {
    fn new() -> Self {
        Self {
            bands: Default::default(),
            size: 0,
            next_sequence: 0,
            shutdown: false,
        }
    }

    fn earliest_next_eligible(&self) -> Option<Instant> {
        self.bands
            .iter()
            .filter_map(|band| band.peek().map(|Reverse(item)| item.key.next_eligible_ts))
            .min()
    }

    fn try_pop_ready(&mut self, now: Instant) -> Option<QueueEntry<T>> {
        for band in self.bands.iter_mut() {
            let ready = matches!(band.peek(), Some(Reverse(item)) if item.key.next_eligible_ts <= now);
            if ready {
                let Reverse(item) = band.pop().expect("peeked Some above");
                self.size -= 1;
                return Some(item.entry);
            }
        }
        None
    }
}

/// A concurrent multi-band ordered collection (§4.1): one min-heap per
/// priority band, `(next_eligible_ts, sequence)` ordering within a band,
/// strict priority across bands — a full CRITICAL band starves lower ones
/// by design.
pub struct PriorityQueue<T> {
    state: Mutex<State<T>>,
    not_empty: Condvar,
    max_size: usize,
}

impl<T> PriorityQueue<T> {
    pub fn new(max_size: usize) -> Self {
        Self {
            state: Mutex::new(State::new()),
            not_empty: Condvar::new(),
            max_size,
        }
    }

    /// Admits an entry unless the queue is at `max_size`. Assigns the
    /// entry's sequence number and wakes one waiter.
    pub fn enqueue(
        &self,
        id: Uuid,
        priority: Priority,
        next_eligible_ts: Instant,
        expiry_ts: Instant,
        payload: T,
    ) -> Result<u64, QueueError> {
        let mut state = self.state.lock().expect("queue mutex poisoned");
        if state.size >= self.max_size {
            return Err(QueueError::Full);
        }
        let sequence = state.next_sequence;
        state.next_sequence += 1;
        let entry = QueueEntry {
            id,
            priority,
            sequence,
            attempt: 1,
            next_eligible_ts,
            expiry_ts,
            payload,
        };
        let key = HeapKey {
            next_eligible_ts,
            sequence,
        };
        state.bands[priority.band_index()].push(Reverse(HeapItem { key, entry }));
        state.size += 1;
        drop(state);
        self.not_empty.notify_one();
        Ok(sequence)
    }

    /// Re-inserts an already-attempted entry (e.g. after a retryable
    /// failure), preserving its id but updating attempt count and the
    /// next-eligible timestamp. Keeps the entry's original sequence so
    /// retried entries don't jump ahead of same-band arrivals queued
    /// after the original attempt.
    pub fn reinsert(&self, mut entry: QueueEntry<T>, next_eligible_ts: Instant) -> Result<(), QueueError> {
        let mut state = self.state.lock().expect("queue mutex poisoned");
        if state.size >= self.max_size {
            return Err(QueueError::Full);
        }
        entry.next_eligible_ts = next_eligible_ts;
        let key = HeapKey {
            next_eligible_ts,
            sequence: entry.sequence,
        };
        let priority = entry.priority;
        state.bands[priority.band_index()].push(Reverse(HeapItem { key, entry }));
        state.size += 1;
        drop(state);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Returns the minimum-ordered entry across bands whose
    /// `next_eligible_ts <= now`, blocking cooperatively if none is ready
    /// yet and the queue isn't empty. Returns `None` once the queue is
    /// empty and [`PriorityQueue::shutdown`] has been called.
    pub fn dequeue_ready(&self, now: Instant) -> Option<QueueEntry<T>> {
        let mut state = self.state.lock().expect("queue mutex poisoned");
        let mut current = now;
        loop {
            if let Some(entry) = state.try_pop_ready(current) {
                return Some(entry);
            }
            if state.shutdown && state.size == 0 {
                return None;
            }
            state = match state.earliest_next_eligible() {
                Some(wake_at) if wake_at > current => {
                    let wait_for = wake_at.saturating_duration_since(current);
                    let (guard, _timeout) = self
                        .not_empty
                        .wait_timeout(state, wait_for)
                        .expect("queue mutex poisoned");
                    guard
                }
                _ => self.not_empty.wait(state).expect("queue mutex poisoned"),
            };
            current = Instant::now();
        }
    }

    /// Removes and returns entries whose `expiry_ts <= now`.
    pub fn purge_expired(&self, now: Instant) -> Vec<QueueEntry<T>> {
        let mut state = self.state.lock().expect("queue mutex poisoned");
        let mut expired = Vec::new();
        for band in state.bands.iter_mut() {
            let retained: Vec<Reverse<HeapItem<T>>> = band.drain().collect();
            let mut fresh = BinaryHeap::new();
            for Reverse(item) in retained {
                if item.entry.expiry_ts <= now {
                    expired.push(item.entry);
                } else {
                    fresh.push(Reverse(item));
                }
            }
            *band = fresh;
        }
        state.size -= expired.len();
        expired
    }

    /// Wakes every blocked `dequeue_ready` caller and makes future calls
    /// return `None` once the queue drains, instead of blocking forever.
    pub fn shutdown(&self) {
        let mut state = self.state.lock().expect("queue mutex poisoned");
        state.shutdown = true;
        drop(state);
        self.not_empty.notify_all();
    }

    pub fn len(&self) -> usize {
        self.state.lock().expect("queue mutex poisoned").size
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every entry and returns them in no particular order, for
    /// snapshotting (§6). The queue is empty afterwards.
    pub fn drain_all(&self) -> Vec<QueueEntry<T>> {
        let mut state = self.state.lock().expect("queue mutex poisoned");
        let mut all = Vec::with_capacity(state.size);
        for band in state.bands.iter_mut() {
            all.extend(band.drain().map(|Reverse(item)| item.entry));
        }
        state.size = 0;
        all
    }

    /// Re-inserts entries restored from a snapshot, preserving their
    /// sequence numbers and bumping `next_sequence` past the highest one
    /// seen so freshly enqueued entries still sort after restored ones.
    pub fn restore_all(&self, entries: Vec<QueueEntry<T>>) -> Result<(), QueueError> {
        let mut state = self.state.lock().expect("queue mutex poisoned");
        if state.size + entries.len() > self.max_size {
            return Err(QueueError::Full);
        }
        for entry in entries {
            state.next_sequence = state.next_sequence.max(entry.sequence + 1);
            let key = HeapKey {
                next_eligible_ts: entry.next_eligible_ts,
                sequence: entry.sequence,
            };
            let priority = entry.priority;
            state.bands[priority.band_index()].push(Reverse(HeapItem { key, entry }));
            state.size += 1;
        }
        drop(state);
        self.not_empty.notify_all();
        Ok(())
    }
}
