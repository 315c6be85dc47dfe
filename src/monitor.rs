//! Performance monitor for feature calls.
//!
//! [`PerformanceMonitor`] keeps a bounded, append-only history of
//! [`PerformanceMetric`]s (oldest evicted first) and derives aggregates on
//! read: cache-hit ratio, per-function average duration and the list of
//! slow calls. It is strictly observational; nothing it records changes how
//! a call is handled.
//!
//! Every record is also forwarded to the `metrics` facade (see
//! [`telemetry`](crate::telemetry)), so deployments with a recorder get the
//! same data without polling the monitor.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::telemetry;

/// Configuration for the performance monitor.
///
/// ```rust
/// # use tessera::monitor::MonitorConfig;
/// # use std::time::Duration;
/// let config = MonitorConfig::new()
///     .capacity(500)
///     .slow_threshold(Duration::from_secs(2));
/// ```
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Number of metrics retained. Default: 100.
    pub capacity: usize,
    /// Calls at or above this duration are flagged as slow. Default: 3s.
    pub slow_threshold: Duration,
    /// Maximum number of slow calls returned by reads. Default: 20.
    pub slow_call_limit: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            capacity: 100,
            slow_threshold: Duration::from_secs(3),
            slow_call_limit: 20,
        }
    }
}

impl MonitorConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the history capacity.
    pub fn capacity(mut self, n: usize) -> Self {
        self.capacity = n;
        self
    }

    /// Set the slow-call threshold.
    pub fn slow_threshold(mut self, threshold: Duration) -> Self {
        self.slow_threshold = threshold;
        self
    }

    /// Set the maximum number of slow calls reported.
    pub fn slow_call_limit(mut self, n: usize) -> Self {
        self.slow_call_limit = n;
        self
    }
}

/// One recorded call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetric {
    pub function_name: String,
    pub duration: Duration,
    pub timestamp: DateTime<Utc>,
    pub cache_hit: bool,
    pub success: bool,
}

/// Aggregates derived from the current history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSummary {
    pub total_calls: usize,
    pub cache_hit_rate: f64,
    pub success_rate: f64,
    pub average_durations: BTreeMap<String, Duration>,
    pub slow_calls: Vec<PerformanceMetric>,
}

/// Bounded in-process call history.
pub struct PerformanceMonitor {
    history: Mutex<VecDeque<PerformanceMetric>>,
    config: MonitorConfig,
}

impl PerformanceMonitor {
    /// Create a monitor with the given configuration.
    pub fn new(config: MonitorConfig) -> Self {
        Self {
            history: Mutex::new(VecDeque::with_capacity(config.capacity)),
            config,
        }
    }

    /// Create a monitor with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(MonitorConfig::default())
    }

    /// Record one call. Evicts the oldest entry once at capacity.
    pub fn record(&self, function_name: &str, duration: Duration, cache_hit: bool, success: bool) {
        let status = if success { "ok" } else { "error" };
        metrics::counter!(telemetry::REQUESTS_TOTAL,
            "function" => function_name.to_owned(),
            "status" => status,
        )
        .increment(1);
        metrics::histogram!(telemetry::REQUEST_DURATION_SECONDS,
            "function" => function_name.to_owned(),
        )
        .record(duration.as_secs_f64());

        if self.is_slow(duration) {
            metrics::counter!(telemetry::SLOW_CALLS_TOTAL, "function" => function_name.to_owned())
                .increment(1);
            warn!(
                function = function_name,
                duration_ms = duration.as_millis() as u64,
                threshold_ms = self.config.slow_threshold.as_millis() as u64,
                "slow call"
            );
        }

        if self.config.capacity == 0 {
            return;
        }
        let mut history = self.lock();
        while history.len() >= self.config.capacity {
            history.pop_front();
        }
        history.push_back(PerformanceMetric {
            function_name: function_name.to_owned(),
            duration,
            timestamp: Utc::now(),
            cache_hit,
            success,
        });
    }

    /// Snapshot of the retained history, oldest first.
    pub fn metrics(&self) -> Vec<PerformanceMetric> {
        self.lock().iter().cloned().collect()
    }

    /// Number of retained metrics.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether nothing has been recorded (or everything was cleared).
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fraction of retained calls served from cache; `0.0` when empty.
    pub fn cache_hit_rate(&self) -> f64 {
        let history = self.lock();
        ratio(history.iter().filter(|m| m.cache_hit).count(), history.len())
    }

    /// Fraction of retained calls that succeeded; `0.0` when empty.
    pub fn success_rate(&self) -> f64 {
        let history = self.lock();
        ratio(history.iter().filter(|m| m.success).count(), history.len())
    }

    /// Average duration for one function, `None` if it has no records.
    pub fn average_duration(&self, function_name: &str) -> Option<Duration> {
        let history = self.lock();
        let durations: Vec<Duration> = history
            .iter()
            .filter(|m| m.function_name == function_name)
            .map(|m| m.duration)
            .collect();
        average(&durations)
    }

    /// Average duration for every function with at least one record.
    pub fn averages(&self) -> BTreeMap<String, Duration> {
        let history = self.lock();
        let mut grouped: BTreeMap<String, Vec<Duration>> = BTreeMap::new();
        for m in history.iter() {
            grouped
                .entry(m.function_name.clone())
                .or_default()
                .push(m.duration);
        }
        grouped
            .into_iter()
            .filter_map(|(name, durations)| average(&durations).map(|avg| (name, avg)))
            .collect()
    }

    /// Most recent calls at or above the slow threshold, newest first,
    /// bounded by `slow_call_limit`.
    pub fn slow_calls(&self) -> Vec<PerformanceMetric> {
        self.lock()
            .iter()
            .rev()
            .filter(|m| self.is_slow(m.duration))
            .take(self.config.slow_call_limit)
            .cloned()
            .collect()
    }

    /// All aggregates in one read.
    pub fn summary(&self) -> PerformanceSummary {
        PerformanceSummary {
            total_calls: self.len(),
            cache_hit_rate: self.cache_hit_rate(),
            success_rate: self.success_rate(),
            average_durations: self.averages(),
            slow_calls: self.slow_calls(),
        }
    }

    /// Drop all retained history.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Get the configuration.
    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    fn is_slow(&self, duration: Duration) -> bool {
        duration >= self.config.slow_threshold
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<PerformanceMetric>> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for PerformanceMonitor {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn ratio(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64
    }
}

fn average(durations: &[Duration]) -> Option<Duration> {
    if durations.is_empty() {
        return None;
    }
    let total: Duration = durations.iter().sum();
    Some(total / durations.len() as u32)
}
