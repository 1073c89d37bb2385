//! Cache Entry Module
//!
//! On-disk records of the file adapter.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// == Stored Entry ==
/// A single value file, with the tags it was stored under.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredEntry {
    /// Original key, kept because file names are hashed
    pub key: String,
    /// The stored value
    pub value: String,
    /// Tags attached at write time
    #[serde(default)]
    pub tags: Vec<String>,
    /// Write timestamp
    pub created_at: DateTime<Utc>,
}

impl StoredEntry {
    // == Constructor ==
    /// Creates an entry stamped with the current time.
    pub fn new(key: impl Into<String>, value: impl Into<String>, tags: Vec<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            tags,
            created_at: Utc::now(),
        }
    }
}

// == Tag Index ==
/// Keys currently labelled with one tag.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TagIndex {
    pub tag: String,
    pub keys: Vec<String>,
}

impl TagIndex {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            keys: Vec::new(),
        }
    }

    /// Adds `key` unless already present.
    pub fn insert(&mut self, key: &str) {
        if !self.keys.iter().any(|k| k == key) {
            self.keys.push(key.to_string());
        }
    }

    pub fn remove(&mut self, key: &str) {
        self.keys.retain(|k| k != key);
    }
}
