//! Persisted response cache with TTL and content-change invalidation.
//!
//! [`ResponseCache`] stores model output per feature so that re-opening a
//! reflection does not re-run the model. Entries live in a
//! [`KeyValueStore`] as JSON and carry their own `expires_at`, so expiry is
//! enforced across process restarts.
//!
//! # Keys
//!
//! [`compute_key`] hashes the normalised inputs with SHA-256: feature tag,
//! trimmed text, lower-cased emotional state, sub-feeling, value category
//! and frequency, and the sorted, de-duplicated protocol list. Every field is
//! length-prefixed, so adjacent fields cannot run into each other, and the
//! feature tag keeps one feature's answer from ever being served for
//! another.
//!
//! # Invalidation
//!
//! - **TTL**: an entry is never served past `expires_at`; expired entries
//!   are removed when read and by [`ResponseCache::clear_expired`].
//! - **Content change**: [`ResponseCache::invalidate_on_change`] flags text
//!   whose edit-distance ratio to the cached text exceeds the threshold.
//! - **Global context**: emotional state and active protocols apply to
//!   every entry; [`ResponseCache::sync_context`] drops all entries when
//!   either changes.
//! - **Corruption**: a record that fails to parse is deleted and treated
//!   as a miss.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use super::similarity::changed_beyond;
use super::store::KeyValueStore;
use crate::telemetry;
use crate::types::{Feature, ReflectionInput};
use crate::{Result, TesseraError};

/// Configuration for the response cache.
///
/// ```rust
/// # use tessera::cache::CacheConfig;
/// # use std::time::Duration;
/// let config = CacheConfig::new()
///     .ttl(Duration::from_secs(3600))
///     .similarity_threshold(0.3);
/// ```
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Time-to-live for cached entries. Default: 24 hours.
    pub ttl: Duration,
    /// Change ratio above which cached text counts as rewritten. Default: 0.2.
    pub similarity_threshold: f64,
    /// Namespace prepended to every store key. Default: `"tessera"`.
    pub namespace: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(24 * 3600),
            similarity_threshold: 0.2,
            namespace: "tessera".to_string(),
        }
    }
}

impl CacheConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the time-to-live for cached entries.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the content-change threshold.
    pub fn similarity_threshold(mut self, threshold: f64) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    /// Set the store key namespace.
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }
}

/// Inputs that identify a cached response.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheKeyInputs<'a> {
    pub text: &'a str,
    pub emotional_state: Option<&'a str>,
    pub sub_emotion: Option<&'a str>,
    pub value_category: Option<&'a str>,
    pub frequency: Option<&'a str>,
    pub active_protocols: &'a [String],
}

impl<'a> From<&'a ReflectionInput> for CacheKeyInputs<'a> {
    fn from(input: &'a ReflectionInput) -> Self {
        Self {
            text: &input.text,
            emotional_state: input.emotional_state.as_deref(),
            sub_emotion: input.sub_emotion.as_deref(),
            value_category: input.value_category.as_deref(),
            frequency: input.frequency.as_deref(),
            active_protocols: &input.active_protocols,
        }
    }
}

/// A stored response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    /// Named payload fields, e.g. `"analysis"`, `"goal"`.
    pub fields: BTreeMap<String, String>,
    /// Text the payload was produced for.
    pub source_text: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Payload field by name.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Whether the entry is past its expiry at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Compute a cache key for a feature and its inputs.
///
/// Deterministic across processes; equivalent inputs (case of context
/// fields, surrounding whitespace, protocol order or duplicates) hash
/// identically.
pub fn compute_key(feature: Feature, inputs: &CacheKeyInputs<'_>) -> String {
    let mut hasher = Sha256::new();
    write_field(&mut hasher, Some(feature.name()));
    write_field(&mut hasher, Some(inputs.text.trim()));
    write_field(&mut hasher, inputs.emotional_state.map(normalize).as_deref());
    write_field(&mut hasher, inputs.sub_emotion.map(normalize).as_deref());
    write_field(&mut hasher, inputs.value_category.map(normalize).as_deref());
    write_field(&mut hasher, inputs.frequency.map(normalize).as_deref());
    let protocols = normalized_protocols(inputs.active_protocols);
    hasher.update((protocols.len() as u64).to_le_bytes());
    for protocol in &protocols {
        write_field(&mut hasher, Some(protocol));
    }
    hex::encode(hasher.finalize())
}

fn write_field(hasher: &mut Sha256, value: Option<&str>) {
    match value {
        Some(v) => {
            hasher.update([1u8]);
            hasher.update((v.len() as u64).to_le_bytes());
            hasher.update(v.as_bytes());
        }
        None => hasher.update([0u8]),
    }
}

fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

fn normalized_protocols(protocols: &[String]) -> Vec<String> {
    let mut protocols: Vec<String> = protocols
        .iter()
        .map(|p| normalize(p))
        .filter(|p| !p.is_empty())
        .collect();
    protocols.sort_unstable();
    protocols.dedup();
    protocols
}

/// Persisted response cache.
pub struct ResponseCache {
    store: Arc<dyn KeyValueStore>,
    config: CacheConfig,
}

impl ResponseCache {
    /// Create a cache over `store`.
    pub fn new(store: Arc<dyn KeyValueStore>, config: CacheConfig) -> Self {
        Self { store, config }
    }

    /// Get the configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Compute a cache key; see [`compute_key`].
    pub fn compute_key(&self, feature: Feature, inputs: &CacheKeyInputs<'_>) -> String {
        compute_key(feature, inputs)
    }

    fn entry_prefix(&self) -> String {
        format!("{}:cache:", self.config.namespace)
    }

    fn store_key(&self, key: &str) -> String {
        format!("{}{key}", self.entry_prefix())
    }

    fn context_key(&self) -> String {
        format!("{}:context", self.config.namespace)
    }

    /// Look up an entry.
    ///
    /// Returns `None` on miss, on expiry (the record is removed) and on a
    /// malformed record (the record is deleted). Storage errors are logged
    /// and reported as a miss.
    pub async fn get(&self, key: &str) -> Option<CacheEntry> {
        let store_key = self.store_key(key);
        let raw = match self.store.get(&store_key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(store = self.store.name(), error = %e, "cache read failed");
                return None;
            }
        };
        let entry = match serde_json::from_str::<CacheEntry>(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "corrupt cache entry; deleting");
                self.evict(&store_key, "corrupt").await;
                return None;
            }
        };
        if entry.is_expired_at(Utc::now()) {
            debug!(key, "cache entry expired");
            self.evict(&store_key, "expired").await;
            return None;
        }
        Some(entry)
    }

    /// Look up one feature's payload, emitting hit/miss metrics.
    pub async fn lookup(&self, feature: Feature, key: &str) -> Option<String> {
        let hit = self
            .get(key)
            .await
            .and_then(|entry| entry.field(feature.field()).map(str::to_owned));
        if hit.is_some() {
            metrics::counter!(telemetry::CACHE_HITS_TOTAL, "function" => feature.name())
                .increment(1);
        } else {
            metrics::counter!(telemetry::CACHE_MISSES_TOTAL, "function" => feature.name())
                .increment(1);
        }
        hit
    }

    /// Write an entry; TTL starts now. Overwrites any prior entry.
    pub async fn set(
        &self,
        key: &str,
        fields: BTreeMap<String, String>,
        source_text: &str,
    ) -> Result<CacheEntry> {
        let ttl = chrono::Duration::from_std(self.config.ttl)
            .map_err(|e| TesseraError::Configuration(format!("cache ttl out of range: {e}")))?;
        let created_at = Utc::now();
        let entry = CacheEntry {
            key: key.to_owned(),
            fields,
            source_text: source_text.to_owned(),
            created_at,
            expires_at: created_at + ttl,
        };
        let raw = serde_json::to_string(&entry)?;
        self.store.set(&self.store_key(key), raw).await?;
        Ok(entry)
    }

    /// Store a single feature's payload.
    pub async fn store(
        &self,
        feature: Feature,
        key: &str,
        text: &str,
        source_text: &str,
    ) -> Result<CacheEntry> {
        let fields = BTreeMap::from([(feature.field().to_owned(), text.to_owned())]);
        self.set(key, fields, source_text).await
    }

    /// Remove one entry.
    pub async fn remove(&self, key: &str) -> Result<()> {
        self.store.remove(&self.store_key(key)).await
    }

    /// Whether `new` differs from `old` enough that a response for `old`
    /// is stale.
    pub fn invalidate_on_change(&self, old: &str, new: &str) -> bool {
        changed_beyond(old, new, self.config.similarity_threshold)
    }

    /// Remove the entry at `key` if `new_text` has substantially diverged
    /// from the text it was produced for. Returns whether it was removed.
    pub async fn invalidate_if_changed(&self, key: &str, new_text: &str) -> bool {
        let Some(entry) = self.get(key).await else {
            return false;
        };
        if !self.invalidate_on_change(&entry.source_text, new_text) {
            return false;
        }
        debug!(key, "cached text substantially changed; invalidating");
        self.evict(&self.store_key(key), "changed").await;
        true
    }

    /// Record the global context and drop every entry if it changed.
    ///
    /// The emotional state and active protocol set shape every response,
    /// so a change to either invalidates all entries. The first call on an
    /// empty store only records the context. Returns whether entries were
    /// invalidated.
    pub async fn sync_context(
        &self,
        emotional_state: Option<&str>,
        active_protocols: &[String],
    ) -> Result<bool> {
        let fingerprint = context_fingerprint(emotional_state, active_protocols);
        let context_key = self.context_key();
        let previous = self.store.get(&context_key).await?;
        if previous.as_deref() == Some(fingerprint.as_str()) {
            return Ok(false);
        }
        self.store.set(&context_key, fingerprint).await?;
        if previous.is_none() {
            return Ok(false);
        }
        let removed = self.invalidate_all().await?;
        debug!(removed, "global context changed; cache invalidated");
        metrics::counter!(telemetry::CACHE_EVICTIONS_TOTAL, "reason" => "context")
            .increment(removed as u64);
        Ok(true)
    }

    /// Remove every entry. Returns how many were removed.
    pub async fn invalidate_all(&self) -> Result<usize> {
        let keys = self.store.keys_with_prefix(&self.entry_prefix()).await?;
        for key in &keys {
            self.store.remove(key).await?;
        }
        Ok(keys.len())
    }

    /// Remove expired and corrupt entries only. Returns how many were removed.
    pub async fn clear_expired(&self) -> Result<usize> {
        let now = Utc::now();
        let mut removed = 0;
        for key in self.store.keys_with_prefix(&self.entry_prefix()).await? {
            let Some(raw) = self.store.get(&key).await? else {
                continue;
            };
            let reason = match serde_json::from_str::<CacheEntry>(&raw) {
                Ok(entry) if entry.is_expired_at(now) => "expired",
                Ok(_) => continue,
                Err(_) => "corrupt",
            };
            self.store.remove(&key).await?;
            metrics::counter!(telemetry::CACHE_EVICTIONS_TOTAL, "reason" => reason).increment(1);
            removed += 1;
        }
        if removed > 0 {
            debug!(removed, "swept stale cache entries");
        }
        Ok(removed)
    }

    /// Number of stored entries, including not-yet-swept expired ones.
    pub async fn len(&self) -> Result<usize> {
        Ok(self
            .store
            .keys_with_prefix(&self.entry_prefix())
            .await?
            .len())
    }

    /// Whether the store holds no entries.
    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    async fn evict(&self, store_key: &str, reason: &'static str) {
        metrics::counter!(telemetry::CACHE_EVICTIONS_TOTAL, "reason" => reason).increment(1);
        if let Err(e) = self.store.remove(store_key).await {
            warn!(store = self.store.name(), error = %e, "cache eviction failed");
        }
    }
}

fn context_fingerprint(emotional_state: Option<&str>, active_protocols: &[String]) -> String {
    let mut hasher = Sha256::new();
    write_field(&mut hasher, emotional_state.map(normalize).as_deref());
    for protocol in normalized_protocols(active_protocols) {
        write_field(&mut hasher, Some(&protocol));
    }
    hex::encode(hasher.finalize())
}
