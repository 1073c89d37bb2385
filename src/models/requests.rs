//! Request DTOs for the cache service API
//!
//! Defines the structure of incoming HTTP request bodies and query strings.

use serde::Deserialize;

use crate::cache::AdapterKind;
use crate::error::{CacheError, Result};
use crate::invalidation::{InvalidationType, QUEUE_KEY};

/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 256;

/// Parses an optional adapter name.
fn parse_adapter(adapter: Option<&str>) -> Result<Option<AdapterKind>> {
    adapter.map(str::parse::<AdapterKind>).transpose()
}

/// Rejects empty, oversized and reserved keys.
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(CacheError::InvalidRequest("Key cannot be empty".to_string()));
    }
    if key.len() > MAX_KEY_LENGTH {
        return Err(CacheError::InvalidRequest(format!(
            "Key exceeds maximum length of {MAX_KEY_LENGTH} bytes"
        )));
    }
    if key == QUEUE_KEY {
        return Err(CacheError::InvalidRequest(format!("Key '{key}' is reserved")));
    }
    Ok(())
}

/// Request body for the SET operation (PUT /set)
#[derive(Debug, Clone, Deserialize)]
pub struct SetRequest {
    /// The cache key
    pub key: String,
    /// The value to store
    pub value: String,
    /// Tags to label the entry with; needs a tag-aware adapter
    #[serde(default)]
    pub tags: Vec<String>,
    /// Target adapter, default when absent
    #[serde(default)]
    pub adapter: Option<String>,
}

impl SetRequest {
    /// Validates the request and resolves the adapter name.
    pub fn validate(&self) -> Result<Option<AdapterKind>> {
        validate_key(&self.key)?;
        if self.tags.iter().any(|t| t.is_empty()) {
            return Err(CacheError::InvalidRequest("Tags cannot be empty".to_string()));
        }
        parse_adapter(self.adapter.as_deref())
    }
}

/// Request body for POST /invalidations
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    #[serde(rename = "type")]
    pub kind: InvalidationType,
    pub keys: Vec<String>,
    #[serde(default)]
    pub adapter: Option<String>,
}

impl RegisterRequest {
    pub fn validate(&self) -> Result<Option<AdapterKind>> {
        if self.keys.is_empty() {
            return Err(CacheError::InvalidRequest(
                "At least one key or tag is required".to_string(),
            ));
        }
        parse_adapter(self.adapter.as_deref())
    }
}

/// `?adapter=` query string accepted by the key endpoints
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdapterQuery {
    #[serde(default)]
    pub adapter: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_request_deserialize() {
        let json = r#"{"key": "test", "value": "hello"}"#;
        let req: SetRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.key, "test");
        assert_eq!(req.value, "hello");
        assert!(req.tags.is_empty());
        assert!(req.adapter.is_none());
        assert_eq!(req.validate().unwrap(), None);
    }

    #[test]
    fn test_set_request_with_tags_and_adapter() {
        let json = r#"{"key": "p1", "value": "x", "tags": ["products"], "adapter": "redis"}"#;
        let req: SetRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.tags, vec!["products"]);
        assert_eq!(req.validate().unwrap(), Some(AdapterKind::Redis));
    }

    #[test]
    fn test_validate_rejects_bad_keys() {
        for key in ["".to_string(), "x".repeat(MAX_KEY_LENGTH + 1), QUEUE_KEY.to_string()] {
            assert!(matches!(validate_key(&key), Err(CacheError::InvalidRequest(_))));
        }
        assert!(validate_key("valid_key").is_ok());
    }

    #[test]
    fn test_validate_unknown_adapter() {
        let req = SetRequest {
            key: "k".to_string(),
            value: "v".to_string(),
            tags: Vec::new(),
            adapter: Some("memcached".to_string()),
        };
        assert!(matches!(req.validate(), Err(CacheError::UnknownAdapter(_))));
    }

    #[test]
    fn test_register_request() {
        let json = r#"{"type": "tag", "keys": ["products"]}"#;
        let req: RegisterRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.kind, InvalidationType::Tag);
        assert_eq!(req.validate().unwrap(), None);

        let empty: RegisterRequest = serde_json::from_str(r#"{"type": "keys", "keys": []}"#).unwrap();
        assert!(matches!(empty.validate(), Err(CacheError::InvalidRequest(_))));
    }
}
