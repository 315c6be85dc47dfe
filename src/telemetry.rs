//! Telemetry metric name constants.
//!
//! Centralised metric names for tessera operations. Consumers install
//! their own `metrics` recorder; without a recorder installed, all metric
//! calls are no-ops. The in-process [`PerformanceMonitor`](crate::monitor::PerformanceMonitor)
//! keeps its own bounded history regardless.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `tessera_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `function`: entry point name (e.g. "analyze_reflection")
//! - `status`: outcome: "ok" or "error"
//! - `candidate`: model candidate id

/// Total feature calls recorded by the performance monitor.
///
/// Labels: `function`, `status` ("ok" | "error").
pub const REQUESTS_TOTAL: &str = "tessera_requests_total";

/// Feature call duration in seconds.
///
/// Labels: `function`.
pub const REQUEST_DURATION_SECONDS: &str = "tessera_request_duration_seconds";

/// Total calls slower than the monitor's slow-call threshold.
///
/// Labels: `function`.
pub const SLOW_CALLS_TOTAL: &str = "tessera_slow_calls_total";

/// Total response cache hits.
///
/// Labels: `function`.
pub const CACHE_HITS_TOTAL: &str = "tessera_cache_hits_total";

/// Total response cache misses (including expired and corrupt entries).
///
/// Labels: `function`.
pub const CACHE_MISSES_TOTAL: &str = "tessera_cache_misses_total";

/// Total cache entries removed as stale (expiry, similarity or context change).
///
/// Labels: `reason` ("expired" | "changed" | "context" | "corrupt").
pub const CACHE_EVICTIONS_TOTAL: &str = "tessera_cache_evictions_total";

/// Total responses served from fallback tables.
///
/// Labels: `function`.
pub const FALLBACKS_TOTAL: &str = "tessera_fallbacks_total";

/// Total requests intercepted by the safety gate.
///
/// Labels: `function`.
pub const CRISIS_INTERCEPTS_TOTAL: &str = "tessera_crisis_intercepts_total";

/// Total model candidate load attempts.
///
/// Labels: `candidate`, `status` ("ok" | "error").
pub const MODEL_LOADS_TOTAL: &str = "tessera_model_loads_total";

/// Requests that joined an already pending call instead of starting one.
pub const DEDUPLICATED_TOTAL: &str = "tessera_deduplicated_total";
