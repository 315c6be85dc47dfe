//! Pluggable key-value persistence for the response cache.
//!
//! [`ResponseCache`](super::ResponseCache) never touches storage directly;
//! it goes through [`KeyValueStore`] so the same cache logic runs against
//! [`MemoryStore`] in tests and ephemeral sessions, and against
//! [`FileStore`] (or an application-provided encrypted store) in the app.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use moka::sync::Cache;

use crate::Result;

/// Durable string key-value store.
///
/// Implementations must be safe to share across tasks. Values are opaque
/// strings; the cache stores JSON.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Store name for logging/debugging.
    fn name(&self) -> &str;

    /// Read a value; `Ok(None)` when absent.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write (or overwrite) a value.
    async fn set(&self, key: &str, value: String) -> Result<()>;

    /// Remove a value. Removing an absent key is not an error.
    async fn remove(&self, key: &str) -> Result<()>;

    /// Every key starting with `prefix`, in no particular order.
    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>>;
}

// ============================================================================
// MemoryStore
// ============================================================================

/// In-memory store backed by a moka cache.
///
/// Unbounded by default; [`with_max_entries`](Self::with_max_entries) caps
/// it with LRU eviction for long-running sessions. Contents do not survive
/// the process.
pub struct MemoryStore {
    entries: Cache<String, String>,
}

impl MemoryStore {
    /// Create an unbounded store.
    pub fn new() -> Self {
        Self {
            entries: Cache::builder().build(),
        }
    }

    /// Create a store holding at most `max` entries.
    pub fn with_max_entries(max: u64) -> Self {
        Self {
            entries: Cache::new(max),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key))
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        self.entries.insert(key.to_owned(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.invalidate(key);
        Ok(())
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .entries
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.as_ref().clone())
            .collect())
    }
}

// ============================================================================
// FileStore
// ============================================================================

/// Directory-backed store: one file per key.
///
/// File names are the hex encoding of the key, so arbitrary keys are safe
/// on every filesystem. Writes go to a temporary file first and are moved
/// into place, so a crash never leaves a half-written value behind.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Create a store rooted at `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store under the default data directory.
    ///
    /// `$TESSERA_DATA_DIR/cache` if set, otherwise
    /// `<platform data dir>/tessera/cache`.
    pub fn with_default_dir() -> Self {
        Self::new(default_dir())
    }

    /// Root directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", hex::encode(key)))
    }
}

/// Default on-disk location for the file store.
pub fn default_dir() -> PathBuf {
    std::env::var("TESSERA_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from(".tessera"))
                .join("tessera")
        })
        .join("cache")
}

#[async_trait]
impl KeyValueStore for FileStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        match tokio::fs::read_to_string(self.path_for(key)).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, value).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let mut dir = match tokio::fs::read_dir(&self.dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut keys = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let file_name = entry.file_name();
            let Some(stem) = file_name
                .to_str()
                .and_then(|name| name.strip_suffix(".json"))
            else {
                continue;
            };
            // Foreign files in the directory are skipped, not errors.
            let Some(key) = hex::decode(stem)
                .ok()
                .and_then(|bytes| String::from_utf8(bytes).ok())
            else {
                continue;
            };
            if key.starts_with(prefix) {
                keys.push(key);
            }
        }
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names_are_hex_encoded() {
        let store = FileStore::new("/tmp/x");
        let path = store.path_for("a/b");
        assert_eq!(path.file_name().unwrap(), "612f62.json");
    }

    #[tokio::test]
    async fn memory_store_prefix_scan() {
        let store = MemoryStore::new();
        store.set("a:1", "x".into()).await.unwrap();
        store.set("a:2", "y".into()).await.unwrap();
        store.set("b:1", "z".into()).await.unwrap();
        let mut keys = store.keys_with_prefix("a:").await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["a:1", "a:2"]);
    }
}
