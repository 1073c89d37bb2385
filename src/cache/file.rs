//! File Adapter
//!
//! Stores each entry as a JSON file named by the SHA-256 of its key, under
//! `<directory>/<namespace>/entries`. The tag-aware variant also keeps one
//! index file per tag under `<directory>/<namespace>/tags`. An entry records
//! its own tags, and every write or delete takes the key out of the indexes
//! of tags it no longer carries.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::debug;

use crate::cache::{AdapterKind, CacheBackend, StoredEntry, TagAware, TagIndex};
use crate::error::Result;

const ENTRIES_DIR: &str = "entries";
const TAGS_DIR: &str = "tags";

// == File Backend ==
/// Filesystem-backed adapter.
///
/// Mutations are serialized through `write_lock`, which makes
/// `compare_and_swap` atomic for every handle in this process. Two processes
/// sharing one directory are not coordinated.
#[derive(Debug)]
pub struct FileBackend {
    /// Namespace root
    root: PathBuf,
    /// Tag-aware variant
    tags: bool,
    write_lock: Mutex<()>,
}

impl FileBackend {
    // == Constructor ==
    /// Opens (creating if needed) the namespace directory under `directory`.
    pub async fn open(directory: &Path, namespace: &str, tags: bool) -> Result<Self> {
        let root = directory.join(namespace);
        fs::create_dir_all(root.join(ENTRIES_DIR)).await?;
        if tags {
            fs::create_dir_all(root.join(TAGS_DIR)).await?;
        }

        debug!(root = %root.display(), tags, "File cache adapter opened");
        Ok(Self {
            root,
            tags,
            write_lock: Mutex::new(()),
        })
    }

    /// Namespace root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.root.join(ENTRIES_DIR).join(hashed_name(key))
    }

    fn tag_path(&self, tag: &str) -> PathBuf {
        self.root.join(TAGS_DIR).join(hashed_name(tag))
    }

    async fn read_entry(&self, key: &str) -> Result<Option<StoredEntry>> {
        read_json(&self.entry_path(key)).await
    }

    async fn write_entry(&self, key: &str, value: &str, tags: Vec<String>) -> Result<()> {
        let entry = StoredEntry::new(key, value, tags);
        write_json(&self.entry_path(key), &entry).await
    }

    async fn remove_entry(&self, key: &str) -> Result<()> {
        remove_if_exists(&self.entry_path(key)).await
    }

    /// Tags the stored entry for `key` currently carries.
    async fn stored_tags(&self, key: &str) -> Result<Vec<String>> {
        if !self.tags {
            return Ok(Vec::new());
        }
        Ok(self.read_entry(key).await?.map(|entry| entry.tags).unwrap_or_default())
    }

    /// Takes `key` out of the index of each tag in `tags`. Indexes left
    /// empty are deleted.
    async fn detach(&self, key: &str, tags: &[String]) -> Result<()> {
        for tag in tags {
            let path = self.tag_path(tag);
            let Some(mut index) = read_json::<TagIndex>(&path).await? else {
                continue;
            };
            index.remove(key);
            if index.keys.is_empty() {
                remove_if_exists(&path).await?;
            } else {
                write_json(&path, &index).await?;
            }
        }
        Ok(())
    }
}

fn hashed_name(name: &str) -> String {
    format!("{}.json", hex::encode(Sha256::digest(name.as_bytes())))
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match fs::read(path).await {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Writes through a temporary file and renames, so readers never see a
/// partial document.
async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, serde_json::to_vec(value)?).await?;
    fs::rename(&tmp, path).await?;
    Ok(())
}

async fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl CacheBackend for FileBackend {
    fn kind(&self) -> AdapterKind {
        AdapterKind::File
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_entry(key).await?.map(|entry| entry.value))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let previous = self.stored_tags(key).await?;
        self.detach(key, &previous).await?;
        self.write_entry(key, value, Vec::new()).await
    }

    async fn delete_keys(&self, keys: &[String]) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        for key in keys {
            let previous = self.stored_tags(key).await?;
            self.detach(key, &previous).await?;
            self.remove_entry(key).await?;
        }
        debug!(count = keys.len(), "Deleted keys from file cache");
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        match fs::remove_dir_all(&self.root).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        fs::create_dir_all(self.root.join(ENTRIES_DIR)).await?;
        if self.tags {
            fs::create_dir_all(self.root.join(TAGS_DIR)).await?;
        }
        debug!(root = %self.root.display(), "File cache cleared");
        Ok(())
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&str>,
        new: Option<&str>,
    ) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let current = self.read_entry(key).await?;
        if current.as_ref().map(|entry| entry.value.as_str()) != expected {
            return Ok(false);
        }
        if let Some(entry) = &current {
            self.detach(key, &entry.tags).await?;
        }

        match new {
            Some(value) => self.write_entry(key, value, Vec::new()).await?,
            None => self.remove_entry(key).await?,
        }
        Ok(true)
    }

    fn tag_aware(&self) -> Option<&dyn TagAware> {
        if self.tags {
            Some(self)
        } else {
            None
        }
    }
}

#[async_trait]
impl TagAware for FileBackend {
    async fn set_tagged(&self, key: &str, value: &str, tags: &[String]) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let stale: Vec<String> = self
            .stored_tags(key)
            .await?
            .into_iter()
            .filter(|tag| !tags.contains(tag))
            .collect();
        self.detach(key, &stale).await?;
        self.write_entry(key, value, tags.to_vec()).await?;

        for tag in tags {
            let path = self.tag_path(tag);
            let mut index = read_json::<TagIndex>(&path)
                .await?
                .unwrap_or_else(|| TagIndex::new(tag.as_str()));
            index.insert(key);
            write_json(&path, &index).await?;
        }
        Ok(())
    }

    async fn invalidate_tags(&self, tags: &[String]) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        for tag in tags {
            let path = self.tag_path(tag);
            let Some(index) = read_json::<TagIndex>(&path).await? else {
                continue;
            };
            let mut count = 0;
            for key in &index.keys {
                let Some(entry) = self.read_entry(key).await? else {
                    continue;
                };
                if !entry.tags.contains(tag) {
                    continue;
                }
                let others: Vec<String> =
                    entry.tags.into_iter().filter(|t| t != tag).collect();
                self.detach(key, &others).await?;
                self.remove_entry(key).await?;
                count += 1;
            }
            remove_if_exists(&path).await?;
            debug!(tag = %tag, count, "Invalidated tag in file cache");
        }
        Ok(())
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn open(tags: bool) -> (TempDir, FileBackend) {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::open(dir.path(), "appcache-test", tags)
            .await
            .unwrap();
        (dir, backend)
    }

    fn keys(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let (_dir, backend) = open(true).await;

        backend.set("key1", "value1").await.unwrap();
        assert_eq!(backend.get("key1").await.unwrap().as_deref(), Some("value1"));
        assert!(backend.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_overwrite() {
        let (_dir, backend) = open(true).await;

        backend.set("key1", "value1").await.unwrap();
        backend.set("key1", "value2").await.unwrap();
        assert_eq!(backend.get("key1").await.unwrap().as_deref(), Some("value2"));
    }

    #[tokio::test]
    async fn test_delete_keys_only_removes_named_keys() {
        let (_dir, backend) = open(true).await;

        for key in ["a", "b", "c"] {
            backend.set(key, "v").await.unwrap();
        }
        backend.delete_keys(&keys(&["a", "b", "nope"])).await.unwrap();

        assert!(backend.get("a").await.unwrap().is_none());
        assert!(backend.get("b").await.unwrap().is_none());
        assert!(backend.get("c").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_clear() {
        let (_dir, backend) = open(true).await;

        backend.set("a", "1").await.unwrap();
        backend.set("b", "2").await.unwrap();
        backend.clear().await.unwrap();

        assert!(backend.get("a").await.unwrap().is_none());
        assert!(backend.get("b").await.unwrap().is_none());

        // Still usable afterwards
        backend.set("a", "3").await.unwrap();
        assert_eq!(backend.get("a").await.unwrap().as_deref(), Some("3"));
    }

    #[tokio::test]
    async fn test_namespaces_are_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let one = FileBackend::open(dir.path(), "appcache-one", true).await.unwrap();
        let two = FileBackend::open(dir.path(), "appcache-two", true).await.unwrap();

        one.set("shared", "1").await.unwrap();
        assert!(two.get("shared").await.unwrap().is_none());

        two.clear().await.unwrap();
        assert!(one.get("shared").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_compare_and_swap() {
        let (_dir, backend) = open(true).await;

        // Absent -> value
        assert!(backend.compare_and_swap("k", None, Some("1")).await.unwrap());
        // Stale expectation is rejected
        assert!(!backend.compare_and_swap("k", None, Some("2")).await.unwrap());
        assert!(!backend.compare_and_swap("k", Some("0"), Some("2")).await.unwrap());
        assert_eq!(backend.get("k").await.unwrap().as_deref(), Some("1"));
        // Matching expectation wins
        assert!(backend.compare_and_swap("k", Some("1"), Some("2")).await.unwrap());
        // Delete
        assert!(backend.compare_and_swap("k", Some("2"), None).await.unwrap());
        assert!(backend.get("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_tag_invalidation() {
        let (_dir, backend) = open(true).await;
        let tagged = backend.tag_aware().expect("tag-aware variant");

        tagged.set_tagged("p1", "a", &keys(&["products"])).await.unwrap();
        tagged
            .set_tagged("p2", "b", &keys(&["products", "featured"]))
            .await
            .unwrap();
        tagged.set_tagged("u1", "c", &keys(&["users"])).await.unwrap();
        backend.set("plain", "d").await.unwrap();

        tagged.invalidate_tags(&keys(&["products"])).await.unwrap();

        assert!(backend.get("p1").await.unwrap().is_none());
        assert!(backend.get("p2").await.unwrap().is_none());
        assert!(backend.get("u1").await.unwrap().is_some());
        assert!(backend.get("plain").await.unwrap().is_some());

        // Unknown tags are a no-op
        tagged.invalidate_tags(&keys(&["nothing"])).await.unwrap();
    }

    #[tokio::test]
    async fn test_untagged_overwrite_leaves_old_tag() {
        let (_dir, backend) = open(true).await;
        let tagged = backend.tag_aware().unwrap();

        tagged.set_tagged("p1", "old", &keys(&["products"])).await.unwrap();
        backend.set("p1", "new-untagged").await.unwrap();
        tagged.invalidate_tags(&keys(&["products"])).await.unwrap();

        assert_eq!(backend.get("p1").await.unwrap().as_deref(), Some("new-untagged"));
        assert!(!backend.tag_path("products").exists());
    }

    #[tokio::test]
    async fn test_retagged_key_follows_new_tags() {
        let (_dir, backend) = open(true).await;
        let tagged = backend.tag_aware().unwrap();

        tagged.set_tagged("p1", "v1", &keys(&["a"])).await.unwrap();
        tagged.set_tagged("p1", "v2", &keys(&["b"])).await.unwrap();

        tagged.invalidate_tags(&keys(&["a"])).await.unwrap();
        assert_eq!(backend.get("p1").await.unwrap().as_deref(), Some("v2"));

        tagged.invalidate_tags(&keys(&["b"])).await.unwrap();
        assert!(backend.get("p1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_tag_indexes_shrink_on_delete_and_invalidation() {
        let (_dir, backend) = open(true).await;
        let tagged = backend.tag_aware().unwrap();

        tagged.set_tagged("p1", "v", &keys(&["a", "b"])).await.unwrap();
        tagged.set_tagged("p2", "v", &keys(&["b"])).await.unwrap();

        backend.delete_keys(&keys(&["p2"])).await.unwrap();
        let index: TagIndex = read_json(&backend.tag_path("b")).await.unwrap().unwrap();
        assert_eq!(index.keys, vec!["p1"]);

        // Invalidating one tag also drops the key from its other tags
        tagged.invalidate_tags(&keys(&["a"])).await.unwrap();
        assert!(backend.get("p1").await.unwrap().is_none());
        assert!(!backend.tag_path("a").exists());
        assert!(!backend.tag_path("b").exists());

        // A later entry under the same tag is unaffected by the old members
        tagged.set_tagged("p1", "again", &keys(&["c"])).await.unwrap();
        tagged.invalidate_tags(&keys(&["b"])).await.unwrap();
        assert_eq!(backend.get("p1").await.unwrap().as_deref(), Some("again"));
    }

    #[tokio::test]
    async fn test_plain_variant_is_not_tag_aware() {
        let (_dir, backend) = open(false).await;
        assert!(backend.tag_aware().is_none());
        assert!(!crate::cache::is_tag_aware(&backend));
    }
}
