//! Realign Cache - pluggable cache adapters with deferred invalidation
//!
//! Resolves file or Redis adapters from configuration and queues tag/key
//! purges inside the cache itself, to be flushed at a realignment point.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod invalidation;
pub mod models;
pub mod tasks;

pub use api::AppState;
pub use cache::{is_tag_aware, AdapterKind, AdapterRegistry, CacheBackend, TagAware};
pub use config::Config;
pub use error::{CacheError, Result};
pub use invalidation::{realign, InvalidationQueue, InvalidationType};
pub use tasks::spawn_realign_task;
