//! The dead-letter sink (§4.7): a bounded FIFO of descriptors that
//! exhausted every recovery path.

use crate::descriptor::RequestDescriptor;
use crate::response::Outcome;
use std::collections::VecDeque;
use std::sync::Mutex;

/// A terminal record for one descriptor that could not be completed.
#[derive(Debug, Clone)]
pub struct DeadLetterEntry {
    pub descriptor: RequestDescriptor,
    pub outcome: Outcome,
    pub attempts: u32,
}

/// Bounded FIFO of dead-lettered descriptors. When full, the oldest entry
/// is dropped and `dropped_count` increments — the engine surfaces that as
/// a gauge rather than silently losing the count.
pub struct DeadLetterQueue {
    entries: Mutex<VecDeque<DeadLetterEntry>>,
    max_size: usize,
    dropped_count: std::sync::atomic::AtomicU64,
}

impl DeadLetterQueue {
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            max_size,
            dropped_count: std::sync::atomic::AtomicU64::new(0),
        }
    }

    pub fn push(&self, entry: DeadLetterEntry) {
        let mut entries = self.entries.lock().expect("dlq mutex poisoned");
        if entries.len() >= self.max_size {
            entries.pop_front();
            self.dropped_count.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        }
        entries.push_back(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("dlq mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped_count.load(std::sync::atomic::Ordering::Relaxed)
    }

    /// A snapshot of current entries, oldest first, for inspection via
    /// `Coordinator::dead_letters`.
    pub fn entries(&self) -> Vec<DeadLetterEntry> {
        self.entries.lock().expect("dlq mutex poisoned").iter().cloned().collect()
    }
}
