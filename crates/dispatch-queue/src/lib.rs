//! The pending-request priority queue (§4.1).
//!
//! One min-heap per [`Priority`] band, ordered within a band by
//! `(next_eligible_ts, sequence)`. Strict priority across bands means a full
//! `CRITICAL` band starves lower bands by design — see [`PriorityQueue`].
//!
//! This crate is generic over the payload `T` it carries; the dispatch
//! engine's root crate wraps a `RequestDescriptor` in a [`QueueEntry`] and
//! owns the byte-level snapshot wire format (§6), since that format's field
//! list is specific to `RequestDescriptor` and this crate has no opinion on
//! what `T` is.

mod entry;
mod error;
mod priority;
mod queue;

pub use entry::QueueEntry;
pub use error::QueueError;
pub use priority::Priority;
pub use queue::PriorityQueue;
