use std::fmt;

/// Failure modes for queue operations (§4.1, §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    /// `enqueue`/`reinsert` rejected because the queue is at `max_size`.
    Full,
    /// A snapshot blob failed to parse: bad magic, truncated record, or a
    /// priority byte outside 0..=3.
    Corrupt(&'static str),
}

impl fmt::Display for QueueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueError::Full => write!(f, "queue is at capacity"),
            QueueError::Corrupt(reason) => write!(f, "corrupt queue snapshot: {reason}"),
        }
    }
}

impl std::error::Error for QueueError {}
