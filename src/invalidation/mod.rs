//! Invalidation Module
//!
//! Deferred tag/key purges queued inside the default adapter and applied at
//! a realignment point.

mod queue;
mod realign;
mod record;


pub use queue::{InvalidationQueue, InvalidationReport, MAX_QUEUE_ATTEMPTS, QUEUE_KEY};
pub use realign::{realign, RealignOutcome};
pub use record::{InvalidationRecord, InvalidationType};
