//! Builder for configuring orchestrator instances

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use super::{Inner, Orchestrator};
use crate::cache::{CacheConfig, FileStore, KeyValueStore, MemoryStore, ResponseCache};
use crate::config::Config;
use crate::coordinator::RequestCoordinator;
use crate::fallback::FallbackTable;
use crate::model::{InferenceBackend, ModelManager, ModelManagerConfig};
use crate::monitor::{MonitorConfig, PerformanceMonitor};
use crate::safety::SafetyGate;
use crate::types::Feature;
use crate::{Result, TesseraError};

/// Main entry point for creating orchestrator instances.
pub struct Tessera;

impl Tessera {
    /// Create a new builder for configuring the orchestrator.
    pub fn builder() -> TesseraBuilder {
        TesseraBuilder::new()
    }
}

/// Builder for configuring orchestrator instances.
pub struct TesseraBuilder {
    backend: Option<Arc<dyn InferenceBackend>>,
    store: Option<Arc<dyn KeyValueStore>>,
    model_config: ModelManagerConfig,
    cache_config: CacheConfig,
    monitor_config: MonitorConfig,
    debounce_delay: Duration,
    gate: Option<SafetyGate>,
    extra_phrases: Vec<String>,
    fallback_overrides: HashMap<Feature, FallbackTable>,
}

impl Default for TesseraBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TesseraBuilder {
    pub fn new() -> Self {
        Self {
            backend: None,
            store: None,
            model_config: ModelManagerConfig::default(),
            cache_config: CacheConfig::default(),
            monitor_config: MonitorConfig::default(),
            debounce_delay: crate::coordinator::DEFAULT_DEBOUNCE_DELAY,
            gate: None,
            extra_phrases: Vec::new(),
            fallback_overrides: HashMap::new(),
        }
    }

    /// Apply every section of a loaded [`Config`].
    ///
    /// A `cache.dir` selects a [`FileStore`] there unless a store is set
    /// explicitly.
    pub fn config(mut self, config: &Config) -> Self {
        self.model_config = config.model_config();
        self.cache_config = config.cache_config();
        self.monitor_config = config.monitor_config();
        self.debounce_delay = config.debounce_delay();
        self.extra_phrases = config.safety.extra_phrases.clone();
        if self.store.is_none()
            && let Some(dir) = &config.cache.dir
        {
            self.store = Some(Arc::new(FileStore::new(dir.clone())));
        }
        self
    }

    /// Set the inference backend (required).
    pub fn backend(mut self, backend: Arc<dyn InferenceBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Set the cache store (default: in-memory).
    pub fn store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Persist the cache under the platform data directory.
    pub fn file_store(mut self) -> Self {
        self.store = Some(Arc::new(FileStore::with_default_dir()));
        self
    }

    /// Replace the candidate model list.
    pub fn candidates<I, S>(mut self, candidates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.model_config = self.model_config.candidates(candidates);
        self
    }

    /// Set model manager settings.
    pub fn model_config(mut self, config: ModelManagerConfig) -> Self {
        self.model_config = config;
        self
    }

    /// Set response cache settings.
    pub fn cache_config(mut self, config: CacheConfig) -> Self {
        self.cache_config = config;
        self
    }

    /// Set performance monitor settings.
    pub fn monitor_config(mut self, config: MonitorConfig) -> Self {
        self.monitor_config = config;
        self
    }

    /// Set the default debounce window.
    pub fn debounce_delay(mut self, delay: Duration) -> Self {
        self.debounce_delay = delay;
        self
    }

    /// Use a pre-built safety gate. Takes precedence over extra phrases.
    pub fn safety_gate(mut self, gate: SafetyGate) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Add a phrase to the safety gate's built-in list.
    pub fn crisis_phrase(mut self, phrase: impl Into<String>) -> Self {
        self.extra_phrases.push(phrase.into());
        self
    }

    /// Replace the built-in fallback content for one feature.
    pub fn fallback_table(mut self, feature: Feature, table: FallbackTable) -> Self {
        self.fallback_overrides.insert(feature, table.normalized());
        self
    }

    /// Build the orchestrator.
    pub fn build(self) -> Result<Orchestrator> {
        let backend = self.backend.ok_or(TesseraError::NoBackend)?;
        if self.model_config.candidates.is_empty() {
            return Err(TesseraError::NoCandidates);
        }

        let gate = match self.gate {
            Some(gate) => gate,
            None if self.extra_phrases.is_empty() => SafetyGate::new(),
            None => SafetyGate::with_extra_phrases(&self.extra_phrases)?,
        };
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryStore::new()));

        Ok(Orchestrator::from_inner(Inner {
            gate,
            manager: ModelManager::new(backend, self.model_config),
            cache: ResponseCache::new(store, self.cache_config),
            coordinator: RequestCoordinator::with_debounce_delay(self.debounce_delay),
            monitor: PerformanceMonitor::new(self.monitor_config),
            fallback_overrides: self.fallback_overrides,
        }))
    }
}
