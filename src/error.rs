//! Engine-level errors: the caller-facing failure modes of `Coordinator`
//! (§7's "user-visible" surface), distinct from the per-attempt `Outcome`
//! taxonomy in [`crate::response`].

use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EngineError {
    #[error("queue is at capacity")]
    QueueFull,

    #[error("request {0} is not known to this engine")]
    UnknownRequest(uuid::Uuid),

    #[error("snapshot I/O failed: {0}")]
    SnapshotIo(#[from] std::io::Error),

    #[error("queue snapshot is corrupt: {0}")]
    SnapshotCorrupt(&'static str),
}
