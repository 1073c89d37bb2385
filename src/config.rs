//! Configuration Module
//!
//! Handles loading cache settings from an optional versioned settings file
//! and from environment variables.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::cache::AdapterKind;
use crate::error::{CacheError, Result};

/// What `realign()` does at a synchronization point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RealignMode {
    /// Flush the queued invalidations.
    #[default]
    Invalidate,
    /// Legacy behaviour: wipe the default adapter.
    Clear,
}

impl FromStr for RealignMode {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "invalidate" => Ok(Self::Invalidate),
            "clear" => Ok(Self::Clear),
            other => Err(CacheError::InvalidRequest(format!(
                "Unknown realign mode: {other}"
            ))),
        }
    }
}

/// How a queued tag invalidation is handled when its adapter is not tag-aware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UntaggedPolicy {
    /// Skip the record.
    #[default]
    Drop,
    /// Count the record as failed.
    Fail,
    /// Clear the whole adapter instead.
    Clear,
}

impl FromStr for UntaggedPolicy {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "drop" => Ok(Self::Drop),
            "fail" => Ok(Self::Fail),
            "clear" => Ok(Self::Clear),
            other => Err(CacheError::InvalidRequest(format!(
                "Unknown untagged policy: {other}"
            ))),
        }
    }
}

/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Adapter used when a caller does not name one
    pub default_adapter: AdapterKind,
    /// Application namespace isolating our entries inside a shared backend
    pub namespace: Option<String>,
    /// Root directory of the file adapter
    pub directory: Option<PathBuf>,
    /// Whether the file adapter keeps tag indexes
    pub file_tags: bool,
    /// Connection URL of the remote store, `None` when no client is configured
    pub redis_url: Option<String>,
    /// Behaviour of the realign hook
    pub realign_mode: RealignMode,
    /// Handling of tag records on adapters without tag support
    pub untagged_policy: UntaggedPolicy,
    /// HTTP server port
    pub server_port: u16,
    /// Seconds between automatic realigns, 0 disables the task
    pub realign_interval: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_DEFAULT_ADAPTER` - `file` or `redis` (default: file)
    /// - `CACHE_NAMESPACE` - namespace suffix (default: none)
    /// - `CACHE_DIRECTORY` - file adapter root (default: system temp dir)
    /// - `CACHE_FILE_TAGS` - tag-aware file adapter (default: true)
    /// - `REDIS_URL` - remote store URL (default: none)
    /// - `CACHE_REALIGN_MODE` - `invalidate` or `clear` (default: invalidate)
    /// - `CACHE_UNTAGGED_POLICY` - `drop`, `fail` or `clear` (default: drop)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `REALIGN_INTERVAL` - seconds between automatic realigns (default: 0)
    pub fn from_env() -> Self {
        Self::default().with_overrides(|name| env::var(name).ok())
    }

    /// Loads the persisted settings document at `path`, migrating it first,
    /// then applies environment overrides on top.
    pub fn from_file_and_env(path: &Path) -> Result<Self> {
        let settings = load_settings(path)?;
        Ok(Self::default()
            .with_settings(settings)?
            .with_overrides(|name| env::var(name).ok()))
    }

    /// Applies a stored settings document.
    pub fn with_settings(mut self, settings: StoredSettings) -> Result<Self> {
        self.default_adapter = settings.default_adapter.parse()?;
        self.namespace = settings.namespace;
        self.directory = settings.directory;
        Ok(self)
    }

    /// Applies overrides from a variable lookup; unparseable values keep the
    /// current setting.
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(name) = lookup("CACHE_DEFAULT_ADAPTER") {
            match name.parse() {
                Ok(kind) => self.default_adapter = kind,
                Err(e) => warn!(error = %e, "Ignoring CACHE_DEFAULT_ADAPTER"),
            }
        }
        if let Some(ns) = lookup("CACHE_NAMESPACE") {
            self.namespace = Some(ns).filter(|ns| !ns.is_empty());
        }
        if let Some(dir) = lookup("CACHE_DIRECTORY") {
            self.directory = Some(PathBuf::from(dir));
        }
        if let Some(tags) = lookup("CACHE_FILE_TAGS").and_then(|v| v.parse().ok()) {
            self.file_tags = tags;
        }
        if let Some(url) = lookup("REDIS_URL") {
            self.redis_url = Some(url).filter(|url| !url.is_empty());
        }
        if let Some(mode) = lookup("CACHE_REALIGN_MODE") {
            match mode.parse() {
                Ok(mode) => self.realign_mode = mode,
                Err(e) => warn!(error = %e, "Ignoring CACHE_REALIGN_MODE"),
            }
        }
        if let Some(policy) = lookup("CACHE_UNTAGGED_POLICY") {
            match policy.parse() {
                Ok(policy) => self.untagged_policy = policy,
                Err(e) => warn!(error = %e, "Ignoring CACHE_UNTAGGED_POLICY"),
            }
        }
        if let Some(port) = lookup("SERVER_PORT").and_then(|v| v.parse().ok()) {
            self.server_port = port;
        }
        if let Some(interval) = lookup("REALIGN_INTERVAL").and_then(|v| v.parse().ok()) {
            self.realign_interval = interval;
        }
        self
    }

    /// Namespace actually used to prefix keys and name directories.
    pub fn effective_namespace(&self) -> String {
        format!("{}{}", NAMESPACE_PREFIX, self.namespace.as_deref().unwrap_or(""))
    }

    /// Root directory of the file adapter.
    pub fn cache_directory(&self) -> PathBuf {
        self.directory
            .clone()
            .unwrap_or_else(|| env::temp_dir().join("realign-cache"))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_adapter: AdapterKind::File,
            namespace: None,
            directory: None,
            file_tags: true,
            redis_url: None,
            realign_mode: RealignMode::Invalidate,
            untagged_policy: UntaggedPolicy::Drop,
            server_port: 3000,
            realign_interval: 0,
        }
    }
}

/// Prefix prepended to every namespace.
pub const NAMESPACE_PREFIX: &str = "appcache-";

// == Stored Settings ==
/// The persisted part of the configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSettings {
    pub default_adapter: String,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

/// One step of the settings document's upgrade path.
pub struct Migration {
    pub version: &'static str,
    pub apply: fn(Option<Value>) -> Value,
}

/// Ordered migrations for the settings document.
pub fn migrations() -> Vec<Migration> {
    vec![Migration {
        version: "0.3.0",
        apply: |existing| match existing {
            Some(settings) if !is_blank(&settings) => settings,
            _ => json!({
                "default_adapter": "file",
                "namespace": null,
            }),
        },
    }]
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

fn parse_version(version: &str) -> Vec<u32> {
    version
        .split('.')
        .map(|part| part.parse().unwrap_or(0))
        .collect()
}

/// Runs every migration newer than the document's recorded version.
///
/// The document shape is `{"version": "x.y.z", "cache": {...}}`; a missing
/// document starts at version 0.
pub fn migrate(document: Option<Value>) -> Value {
    let (mut version, mut settings) = match document {
        Some(Value::Object(mut doc)) => {
            let version = doc
                .get("version")
                .and_then(Value::as_str)
                .unwrap_or("0.0.0")
                .to_string();
            (version, doc.remove("cache"))
        }
        _ => ("0.0.0".to_string(), None),
    };

    for migration in migrations() {
        if parse_version(migration.version) > parse_version(&version) {
            settings = Some((migration.apply)(settings));
            version = migration.version.to_string();
        }
    }

    json!({
        "version": version,
        "cache": settings.unwrap_or(Value::Null),
    })
}

/// Reads, migrates and (when it changed) rewrites the settings document.
pub fn load_settings(path: &Path) -> Result<StoredSettings> {
    let existing: Option<Value> = match fs::read_to_string(path) {
        Ok(raw) => Some(serde_json::from_str(&raw)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => return Err(e.into()),
    };

    let migrated = migrate(existing.clone());
    if existing.as_ref() != Some(&migrated) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_vec_pretty(&migrated)?)?;
        info!(path = %path.display(), "Cache settings migrated");
    }

    let settings = migrated.get("cache").cloned().unwrap_or(Value::Null);
    serde_json::from_value(settings)
        .map_err(|e| CacheError::Configuration(format!("Invalid cache settings: {e}")))
}
