//! Queued invalidation instructions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::cache::AdapterKind;
use crate::error::CacheError;

/// What the record's keys name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvalidationType {
    /// Keys are tag names
    Tag,
    /// Keys are cache keys
    Keys,
}

impl InvalidationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvalidationType::Tag => "tag",
            InvalidationType::Keys => "keys",
        }
    }
}

impl fmt::Display for InvalidationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InvalidationType {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tag" => Ok(InvalidationType::Tag),
            "keys" => Ok(InvalidationType::Keys),
            other => Err(CacheError::InvalidRequest(format!(
                "Unknown invalidation type: {other}"
            ))),
        }
    }
}

/// One pending purge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidationRecord {
    #[serde(rename = "type")]
    pub kind: InvalidationType,
    pub keys: Vec<String>,
    /// Target adapter; the default adapter when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adapter: Option<AdapterKind>,
}

impl InvalidationRecord {
    pub fn new(kind: InvalidationType, keys: Vec<String>, adapter: Option<AdapterKind>) -> Self {
        Self { kind, keys, adapter }
    }

    /// Deduplication key: type, JSON-encoded keys, then the adapter name if any.
    pub fn identity(&self) -> String {
        let keys = serde_json::to_string(&self.keys).unwrap_or_default();
        let adapter = self.adapter.map(|a| a.as_str()).unwrap_or("");
        format!("{}{}{}", self.kind, keys, adapter)
    }
}
