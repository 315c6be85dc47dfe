//! Configuration loading.
//!
//! Configuration is loaded from a TOML file with the following resolution
//! order:
//! 1. Explicit path (CLI flag or caller)
//! 2. `$TESSERA_CONFIG`
//! 3. `<config dir>/tessera/config.toml` (e.g. `~/.config/tessera/config.toml`)
//!
//! If none exists, defaults apply. Every field is optional.
//!
//! ```toml
//! [model]
//! candidates = ["Qwen2.5-1.5B-Instruct-q4f16_1"]
//! load_timeout_secs = 120
//! generate_timeout_secs = 30
//!
//! [cache]
//! ttl_secs = 86400
//! similarity_threshold = 0.2
//!
//! [coordinator]
//! debounce_ms = 500
//!
//! [monitor]
//! capacity = 100
//! slow_threshold_ms = 3000
//!
//! [safety]
//! extra_phrases = ["no way out"]
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::cache::CacheConfig;
use crate::model::{DEFAULT_CANDIDATES, ModelManagerConfig};
use crate::monitor::MonitorConfig;
use crate::safety::SafetyGate;
use crate::{Result, TesseraError};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub model: ModelSection,
    #[serde(default)]
    pub cache: CacheSection,
    #[serde(default)]
    pub coordinator: CoordinatorSection,
    #[serde(default)]
    pub monitor: MonitorSection,
    #[serde(default)]
    pub safety: SafetySection,
}

/// Model loading.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelSection {
    /// Candidate model identifiers, most preferred first.
    #[serde(default = "default_candidates")]
    pub candidates: Vec<String>,
    /// Per-candidate load timeout in seconds (default: 120).
    #[serde(default = "default_load_timeout")]
    pub load_timeout_secs: u64,
    /// Generation timeout in seconds (default: 30).
    #[serde(default = "default_generate_timeout")]
    pub generate_timeout_secs: u64,
}

impl Default for ModelSection {
    fn default() -> Self {
        Self {
            candidates: default_candidates(),
            load_timeout_secs: default_load_timeout(),
            generate_timeout_secs: default_generate_timeout(),
        }
    }
}

fn default_candidates() -> Vec<String> {
    DEFAULT_CANDIDATES.iter().map(|c| c.to_string()).collect()
}

fn default_load_timeout() -> u64 {
    120
}

fn default_generate_timeout() -> u64 {
    30
}

/// Response cache.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSection {
    /// Entry lifetime in seconds (default: 86400).
    #[serde(default = "default_ttl")]
    pub ttl_secs: u64,
    /// Edit ratio above which cached text is stale (default: 0.2).
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
    /// Store key namespace (default: "tessera").
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Directory for the file store; the platform data dir when unset.
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl(),
            similarity_threshold: default_similarity_threshold(),
            namespace: default_namespace(),
            dir: None,
        }
    }
}

fn default_ttl() -> u64 {
    24 * 3600
}

fn default_similarity_threshold() -> f64 {
    0.2
}

fn default_namespace() -> String {
    "tessera".to_string()
}

/// Request coordinator.
#[derive(Debug, Clone, Deserialize)]
pub struct CoordinatorSection {
    /// Default debounce window in milliseconds (default: 500).
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

impl Default for CoordinatorSection {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
        }
    }
}

fn default_debounce_ms() -> u64 {
    500
}

/// Performance monitor.
#[derive(Debug, Clone, Deserialize)]
pub struct MonitorSection {
    /// Metrics retained (default: 100).
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    /// Slow-call threshold in milliseconds (default: 3000).
    #[serde(default = "default_slow_threshold_ms")]
    pub slow_threshold_ms: u64,
    /// Slow calls reported (default: 20).
    #[serde(default = "default_slow_call_limit")]
    pub slow_call_limit: usize,
}

impl Default for MonitorSection {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            slow_threshold_ms: default_slow_threshold_ms(),
            slow_call_limit: default_slow_call_limit(),
        }
    }
}

fn default_capacity() -> usize {
    100
}

fn default_slow_threshold_ms() -> u64 {
    3000
}

fn default_slow_call_limit() -> usize {
    20
}

/// Safety gate.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SafetySection {
    /// Phrases matched in addition to the built-in list.
    #[serde(default)]
    pub extra_phrases: Vec<String>,
}

impl Config {
    /// Load configuration from the standard locations, falling back to
    /// defaults when no file exists.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        match Self::resolve_config_path(explicit_path)? {
            Some(path) => Self::from_file(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load configuration from a specific file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            TesseraError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            TesseraError::Configuration(format!("Failed to parse config file {path:?}: {e}"))
        })
    }

    /// Parse configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Resolve the config file path, `None` if no file exists.
    fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(Some(path.to_path_buf()));
            }
            return Err(TesseraError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        if let Ok(path) = std::env::var("TESSERA_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Ok(Some(path));
            }
            return Err(TesseraError::Configuration(format!(
                "Config file from TESSERA_CONFIG not found: {path:?}"
            )));
        }

        let user_config = dirs::config_dir().map(|dir| dir.join("tessera").join("config.toml"));
        Ok(user_config.filter(|path| path.exists()))
    }

    /// Model manager settings.
    pub fn model_config(&self) -> ModelManagerConfig {
        ModelManagerConfig::new()
            .candidates(self.model.candidates.iter().cloned())
            .load_timeout(Duration::from_secs(self.model.load_timeout_secs))
            .generate_timeout(Duration::from_secs(self.model.generate_timeout_secs))
    }

    /// Response cache settings.
    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig::new()
            .ttl(Duration::from_secs(self.cache.ttl_secs))
            .similarity_threshold(self.cache.similarity_threshold)
            .namespace(self.cache.namespace.clone())
    }

    /// Performance monitor settings.
    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig::new()
            .capacity(self.monitor.capacity)
            .slow_threshold(Duration::from_millis(self.monitor.slow_threshold_ms))
            .slow_call_limit(self.monitor.slow_call_limit)
    }

    /// Default debounce window.
    pub fn debounce_delay(&self) -> Duration {
        Duration::from_millis(self.coordinator.debounce_ms)
    }

    /// Safety gate with any configured extra phrases.
    pub fn safety_gate(&self) -> Result<SafetyGate> {
        if self.safety.extra_phrases.is_empty() {
            return Ok(SafetyGate::new());
        }
        SafetyGate::with_extra_phrases(&self.safety.extra_phrases)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.cache.similarity_threshold) {
            return Err(TesseraError::Configuration(format!(
                "cache.similarity_threshold must be within 0.0..=1.0, got {}",
                self.cache.similarity_threshold
            )));
        }
        if self.cache.namespace.trim().is_empty() {
            return Err(TesseraError::Configuration(
                "cache.namespace must not be empty".to_string(),
            ));
        }
        if self.model.candidates.is_empty() {
            return Err(TesseraError::Configuration(
                "model.candidates must list at least one model".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_missing_path_is_an_error() {
        let err = Config::resolve_config_path(Some(Path::new("/nonexistent/tessera.toml")));
        assert!(matches!(err, Err(TesseraError::Configuration(_))));
    }
}
