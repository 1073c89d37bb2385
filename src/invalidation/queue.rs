//! Invalidation Queue
//!
//! The queue is a JSON object (identity key -> record) stored under
//! [`QUEUE_KEY`] in the default adapter. Every update goes through
//! `compare_and_swap`, so concurrent registrations never overwrite each
//! other and a flush never loses records registered while it runs.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::cache::{AdapterKind, AdapterRegistry, CacheBackend};
use crate::config::UntaggedPolicy;
use crate::error::{CacheError, Result};
use crate::invalidation::{InvalidationRecord, InvalidationType};

/// Reserved key holding the pending queue.
pub const QUEUE_KEY: &str = "cache.invalidations";

/// Compare-and-swap attempts before giving up on a contended update.
pub const MAX_QUEUE_ATTEMPTS: usize = 32;

/// Outcome of one flush.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct InvalidationReport {
    /// Records applied to their adapter
    pub processed: usize,
    /// Tag records skipped because the adapter has no tag support
    pub dropped: usize,
    /// Records whose backend call failed
    pub failed: usize,
}

enum Applied {
    Done,
    Dropped,
}

// == Invalidation Queue ==
#[derive(Debug, Clone)]
pub struct InvalidationQueue {
    registry: Arc<AdapterRegistry>,
}

impl InvalidationQueue {
    pub fn new(registry: Arc<AdapterRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<AdapterRegistry> {
        &self.registry
    }

    /// The adapter that stores the queue itself.
    async fn store(&self) -> Result<Arc<dyn CacheBackend>> {
        self.registry.adapter(self.registry.default_kind()).await
    }

    // == Register ==
    /// Queues an invalidation. Returns `false` when an identical instruction
    /// is already pending, in which case nothing is written.
    pub async fn register(
        &self,
        kind: InvalidationType,
        keys: Vec<String>,
        adapter: Option<AdapterKind>,
    ) -> Result<bool> {
        let store = self.store().await?;
        let record = InvalidationRecord::new(kind, keys, adapter);
        let identity = record.identity();

        for attempt in 1..=MAX_QUEUE_ATTEMPTS {
            let raw = store.get(QUEUE_KEY).await?;
            let mut queue = decode_queue(raw.as_deref())?;
            if queue.contains_key(&identity) {
                debug!(identity = %identity, "Invalidation already queued");
                return Ok(false);
            }

            queue.insert(identity.clone(), serde_json::to_value(&record)?);
            let encoded = serde_json::to_string(&Value::Object(queue))?;
            if store
                .compare_and_swap(QUEUE_KEY, raw.as_deref(), Some(encoded.as_str()))
                .await?
            {
                debug!(identity = %identity, attempt, "Invalidation queued");
                return Ok(true);
            }
            debug!(identity = %identity, attempt, "Queue changed concurrently, retrying");
        }

        Err(CacheError::QueueContention(MAX_QUEUE_ATTEMPTS))
    }

    pub async fn register_tags(
        &self,
        tags: Vec<String>,
        adapter: Option<AdapterKind>,
    ) -> Result<bool> {
        self.register(InvalidationType::Tag, tags, adapter).await
    }

    pub async fn register_keys(
        &self,
        keys: Vec<String>,
        adapter: Option<AdapterKind>,
    ) -> Result<bool> {
        self.register(InvalidationType::Keys, keys, adapter).await
    }

    /// Pending records in insertion order.
    pub async fn pending(&self) -> Result<Vec<InvalidationRecord>> {
        let store = self.store().await?;
        let raw = store.get(QUEUE_KEY).await?;
        decode_records(decode_queue(raw.as_deref())?)
    }

    // == Invalidate ==
    /// Takes the whole queue and applies each record to its adapter.
    ///
    /// The queue key is gone afterwards whatever happens to the individual
    /// records. Failing records are logged and skipped; if any failed the
    /// call returns `InvalidationFailed` once the rest have been applied.
    pub async fn invalidate(&self) -> Result<InvalidationReport> {
        let store = self.store().await?;
        let records = self.take(store.as_ref()).await?;
        let total = records.len();
        let policy = self.registry.config().untagged_policy;
        let mut report = InvalidationReport::default();

        for record in &records {
            match self.apply(record, policy).await {
                Ok(Applied::Done) => report.processed += 1,
                Ok(Applied::Dropped) => report.dropped += 1,
                Err(e) => {
                    warn!(
                        error = %e,
                        kind = %record.kind,
                        keys = ?record.keys,
                        "Invalidation record failed"
                    );
                    report.failed += 1;
                }
            }
        }

        if total > 0 {
            info!(
                total,
                processed = report.processed,
                dropped = report.dropped,
                failed = report.failed,
                "Invalidation queue flushed"
            );
        }

        if report.failed > 0 {
            return Err(CacheError::InvalidationFailed {
                failed: report.failed,
                total,
            });
        }
        Ok(report)
    }

    /// Discards every pending record without applying it.
    pub async fn discard(&self) -> Result<usize> {
        let store = self.store().await?;
        Ok(self.take(store.as_ref()).await?.len())
    }

    /// Atomically removes the queue entry and returns what it held. The entry
    /// is removed even when it turns out not to decode.
    async fn take(&self, store: &dyn CacheBackend) -> Result<Vec<InvalidationRecord>> {
        for _ in 0..MAX_QUEUE_ATTEMPTS {
            let Some(raw) = store.get(QUEUE_KEY).await? else {
                return Ok(Vec::new());
            };
            if store.compare_and_swap(QUEUE_KEY, Some(raw.as_str()), None).await? {
                return decode_records(decode_queue(Some(raw.as_str()))?);
            }
        }
        Err(CacheError::QueueContention(MAX_QUEUE_ATTEMPTS))
    }

    async fn apply(&self, record: &InvalidationRecord, policy: UntaggedPolicy) -> Result<Applied> {
        let kind = record.adapter.unwrap_or(self.registry.default_kind());
        let target = self.registry.adapter(kind).await?;

        match record.kind {
            InvalidationType::Tag => match target.tag_aware() {
                Some(tagged) => tagged.invalidate_tags(&record.keys).await?,
                None => match policy {
                    UntaggedPolicy::Drop => {
                        debug!(adapter = %kind, tags = ?record.keys, "Dropping tag invalidation");
                        return Ok(Applied::Dropped);
                    }
                    UntaggedPolicy::Fail => {
                        return Err(CacheError::TagsUnsupported(kind.to_string()));
                    }
                    UntaggedPolicy::Clear => {
                        info!(adapter = %kind, "No tag support, clearing adapter instead");
                        target.clear().await?;
                    }
                },
            },
            InvalidationType::Keys => target.delete_keys(&record.keys).await?,
        }
        Ok(Applied::Done)
    }
}

fn decode_queue(raw: Option<&str>) -> Result<Map<String, Value>> {
    let Some(raw) = raw else {
        return Ok(Map::new());
    };
    match serde_json::from_str(raw)? {
        Value::Object(map) => Ok(map),
        other => Err(CacheError::CorruptQueue(format!(
            "expected a mapping, found {}",
            json_type(&other)
        ))),
    }
}

fn decode_records(queue: Map<String, Value>) -> Result<Vec<InvalidationRecord>> {
    queue
        .into_iter()
        .map(|(_, record)| serde_json::from_value(record).map_err(CacheError::from))
        .collect()
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a mapping",
    }
}
