//! Adapter Registry
//!
//! Resolves adapter names to handles. Owned by the composition root and
//! injected into consumers; each kind is built on first use and kept for
//! the registry's lifetime.

use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::info;

use crate::cache::{is_tag_aware, AdapterKind, CacheBackend, FileBackend};
use crate::config::Config;
use crate::error::Result;

// == Adapter Registry ==
#[derive(Debug)]
pub struct AdapterRegistry {
    config: Config,
    /// One slot per kind. A construction in progress only holds up callers
    /// asking for that same kind.
    file: OnceCell<Arc<dyn CacheBackend>>,
    redis: OnceCell<Arc<dyn CacheBackend>>,
}

impl AdapterRegistry {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            file: OnceCell::new(),
            redis: OnceCell::new(),
        }
    }

    /// Pre-seeds the handle for `kind`.
    pub fn with_adapter(mut self, kind: AdapterKind, handle: Arc<dyn CacheBackend>) -> Self {
        *self.slot_mut(kind) = OnceCell::new_with(Some(handle));
        self
    }

    fn slot(&self, kind: AdapterKind) -> &OnceCell<Arc<dyn CacheBackend>> {
        match kind {
            AdapterKind::File => &self.file,
            AdapterKind::Redis => &self.redis,
        }
    }

    fn slot_mut(&mut self, kind: AdapterKind) -> &mut OnceCell<Arc<dyn CacheBackend>> {
        match kind {
            AdapterKind::File => &mut self.file,
            AdapterKind::Redis => &mut self.redis,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn default_kind(&self) -> AdapterKind {
        self.config.default_adapter
    }

    // == Get Adapter ==
    /// Resolves an adapter by name, the default one when `name` is `None`.
    ///
    /// Fails with `UnknownAdapter` for names outside the supported set and
    /// with `Configuration` when the backend cannot be constructed.
    pub async fn get_adapter(&self, name: Option<&str>) -> Result<Arc<dyn CacheBackend>> {
        let kind = match name {
            Some(name) => name.parse()?,
            None => self.default_kind(),
        };
        self.adapter(kind).await
    }

    /// Typed variant of [`get_adapter`](Self::get_adapter).
    ///
    /// A failed construction leaves the slot empty, so the next call retries.
    pub async fn adapter(&self, kind: AdapterKind) -> Result<Arc<dyn CacheBackend>> {
        let handle = self.slot(kind).get_or_try_init(|| self.build(kind)).await?;
        Ok(Arc::clone(handle))
    }

    async fn build(&self, kind: AdapterKind) -> Result<Arc<dyn CacheBackend>> {
        let namespace = self.config.effective_namespace();

        let handle: Arc<dyn CacheBackend> = match kind {
            AdapterKind::File => {
                let directory = self.config.cache_directory();
                info!(
                    directory = %directory.display(),
                    namespace = %namespace,
                    tags = self.config.file_tags,
                    "Initializing file cache adapter"
                );
                Arc::new(FileBackend::open(&directory, &namespace, self.config.file_tags).await?)
            }
            #[cfg(feature = "redis-backend")]
            AdapterKind::Redis => {
                let url = self.config.redis_url.as_deref().ok_or_else(|| {
                    crate::error::CacheError::Configuration(
                        "Invalid Redis configuration: no REDIS_URL set".to_string(),
                    )
                })?;
                info!(namespace = %namespace, "Initializing Redis cache adapter");
                Arc::new(crate::cache::RedisBackend::connect(url, &namespace).await?)
            }
            #[cfg(not(feature = "redis-backend"))]
            AdapterKind::Redis => {
                return Err(crate::error::CacheError::Configuration(
                    "Redis support is not compiled in (enable the redis-backend feature)"
                        .to_string(),
                ));
            }
        };

        Ok(handle)
    }

    /// Whether the named adapter supports tag invalidation.
    pub async fn is_tag_aware(&self, name: Option<&str>) -> Result<bool> {
        let handle = self.get_adapter(name).await?;
        Ok(is_tag_aware(handle.as_ref()))
    }

    // == Clear ==
    /// Wipes every entry of the named adapter.
    pub async fn clear(&self, name: Option<&str>) -> Result<()> {
        let handle = self.get_adapter(name).await?;
        handle.clear().await?;
        info!(adapter = %handle.kind(), "Cache adapter cleared");
        Ok(())
    }
}
