//! Cache Module
//!
//! Backend contract plus the file and Redis adapters, and the registry that
//! lazily instantiates one handle per adapter kind.

mod entry;
mod file;
mod kind;
#[cfg(feature = "redis-backend")]
mod redis;
mod registry;

use async_trait::async_trait;

use crate::error::Result;

// Re-export public types
pub use entry::{StoredEntry, TagIndex};
pub use file::FileBackend;
pub use kind::AdapterKind;
#[cfg(feature = "redis-backend")]
pub use redis::RedisBackend;
pub use registry::AdapterRegistry;

// == Backend Contract ==
/// Storage operations every adapter provides.
///
/// Values are opaque strings; serialization is the caller's concern.
#[async_trait]
pub trait CacheBackend: Send + Sync + std::fmt::Debug {
    /// Which adapter this handle belongs to.
    fn kind(&self) -> AdapterKind;

    /// Returns the stored value, or `None` on a miss.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Stores a value, replacing any previous one.
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Removes the given keys. Missing keys are ignored.
    async fn delete_keys(&self, keys: &[String]) -> Result<()>;

    /// Removes every entry in this adapter's namespace.
    async fn clear(&self) -> Result<()>;

    /// Atomically replaces `key` when its current value equals `expected`
    /// (`None` meaning absent). A `new` of `None` deletes the key.
    ///
    /// Returns `false` without writing when the current value differs.
    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&str>,
        new: Option<&str>,
    ) -> Result<bool>;

    /// Tag capability, when this adapter has one.
    fn tag_aware(&self) -> Option<&dyn TagAware> {
        None
    }
}

/// Tag-based invalidation capability.
#[async_trait]
pub trait TagAware: Send + Sync {
    /// Stores a value labelled with `tags`.
    async fn set_tagged(&self, key: &str, value: &str, tags: &[String]) -> Result<()>;

    /// Removes every entry carrying any of `tags`.
    async fn invalidate_tags(&self, tags: &[String]) -> Result<()>;
}

/// Whether the handle supports tag invalidation.
pub fn is_tag_aware(backend: &dyn CacheBackend) -> bool {
    backend.tag_aware().is_some()
}
