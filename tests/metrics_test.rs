//! Tests for metrics integration.
//!
//! Uses `metrics_util::debugging::DebuggingRecorder` to capture and assert
//! on emitted metrics without needing a real exporter.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use metrics_util::MetricKind;
use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};

use tessera::telemetry;
use tessera::{
    CancellationToken, GenerateParams, InferenceBackend, MonitorConfig, ModelHandle,
    PerformanceMonitor, ProgressFn, ReflectionInput, Result, Tessera, TesseraError,
};

// ============================================================================
// Mock backends
// ============================================================================

struct EchoBackend;

#[async_trait]
impl InferenceBackend for EchoBackend {
    fn name(&self) -> &str {
        "echo"
    }

    async fn load(&self, candidate: &str, _on_progress: ProgressFn) -> Result<ModelHandle> {
        Ok(ModelHandle::new(candidate, ()))
    }

    async fn generate(
        &self,
        _handle: &ModelHandle,
        _prompt: &str,
        _params: &GenerateParams,
        _cancel: CancellationToken,
    ) -> Result<String> {
        Ok("a steady answer".to_string())
    }
}

struct BrokenBackend;

#[async_trait]
impl InferenceBackend for BrokenBackend {
    fn name(&self) -> &str {
        "broken"
    }

    async fn load(&self, _candidate: &str, _on_progress: ProgressFn) -> Result<ModelHandle> {
        Err(TesseraError::Generation("corrupt weights".into()))
    }

    async fn generate(
        &self,
        _handle: &ModelHandle,
        _prompt: &str,
        _params: &GenerateParams,
        _cancel: CancellationToken,
    ) -> Result<String> {
        Err(TesseraError::Generation("unreachable".into()))
    }
}

// ============================================================================
// Snapshot type alias for readability
// ============================================================================

type SnapshotVec = Vec<(
    metrics_util::CompositeKey,
    Option<metrics::Unit>,
    Option<metrics::SharedString>,
    DebugValue,
)>;

// ============================================================================
// Helpers
// ============================================================================

/// Sum all counter values matching a given metric name.
fn counter_total(snapshot: &SnapshotVec, name: &str) -> u64 {
    snapshot
        .iter()
        .filter(|(key, _, _, _)| key.kind() == MetricKind::Counter && key.key().name() == name)
        .map(|(_, _, _, value)| match value {
            DebugValue::Counter(v) => *v,
            _ => 0,
        })
        .sum()
}

/// Sum counter values for `name` carrying the label `label = value`.
fn counter_with_label(snapshot: &SnapshotVec, name: &str, label: &str, value: &str) -> u64 {
    snapshot
        .iter()
        .filter(|(key, _, _, _)| {
            key.kind() == MetricKind::Counter
                && key.key().name() == name
                && key
                    .key()
                    .labels()
                    .any(|l| l.key() == label && l.value() == value)
        })
        .map(|(_, _, _, value)| match value {
            DebugValue::Counter(v) => *v,
            _ => 0,
        })
        .sum()
}

/// Check if any histogram entries exist for a given metric name.
fn has_histogram(snapshot: &SnapshotVec, name: &str) -> bool {
    snapshot
        .iter()
        .any(|(key, _, _, _)| key.kind() == MetricKind::Histogram && key.key().name() == name)
}

/// Runs async code within a local recorder scope on the multi-thread runtime.
///
/// `block_in_place` ensures the sync `with_local_recorder` closure stays
/// on the current thread while `block_on` drives the inner async work.
fn recorded<F: Future>(fut: F) -> (F::Output, Snapshotter) {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    let output = metrics::with_local_recorder(&recorder, || {
        tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(fut))
    });
    (output, snapshotter)
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn model_response_then_cache_hit() {
    let (_, snapshotter) = recorded(async {
        let orch = Tessera::builder()
            .backend(Arc::new(EchoBackend))
            .candidates(["tiny"])
            .build()
            .unwrap();
        let input = ReflectionInput::new("Slept well for once.");
        orch.analyze_reflection(&input).await.unwrap();
        orch.analyze_reflection(&input).await.unwrap();
    });

    let snapshot = snapshotter.snapshot().into_vec();
    assert_eq!(counter_total(&snapshot, telemetry::REQUESTS_TOTAL), 2);
    assert_eq!(
        counter_with_label(&snapshot, telemetry::CACHE_HITS_TOTAL, "function", "analyze_reflection"),
        1
    );
    assert_eq!(counter_total(&snapshot, telemetry::CACHE_MISSES_TOTAL), 1);
    assert_eq!(
        counter_with_label(&snapshot, telemetry::MODEL_LOADS_TOTAL, "status", "ok"),
        1
    );
    assert_eq!(counter_total(&snapshot, telemetry::FALLBACKS_TOTAL), 0);
    assert!(has_histogram(&snapshot, telemetry::REQUEST_DURATION_SECONDS));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn load_failure_records_fallback_and_error_status() {
    let (_, snapshotter) = recorded(async {
        let orch = Tessera::builder()
            .backend(Arc::new(BrokenBackend))
            .candidates(["a", "b"])
            .build()
            .unwrap();
        orch.suggest_goal(&ReflectionInput::new("Not sure what's next."))
            .await
            .unwrap();
    });

    let snapshot = snapshotter.snapshot().into_vec();
    assert_eq!(
        counter_with_label(&snapshot, telemetry::MODEL_LOADS_TOTAL, "status", "error"),
        2
    );
    assert_eq!(
        counter_with_label(&snapshot, telemetry::FALLBACKS_TOTAL, "function", "suggest_goal"),
        1
    );
    assert_eq!(
        counter_with_label(&snapshot, telemetry::REQUESTS_TOTAL, "status", "error"),
        1
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn crisis_intercept_is_counted() {
    let (_, snapshotter) = recorded(async {
        let orch = Tessera::builder()
            .backend(Arc::new(EchoBackend))
            .build()
            .unwrap();
        orch.generate_mantra(&ReflectionInput::new("I can't go on like this"))
            .await
            .unwrap();
    });

    let snapshot = snapshotter.snapshot().into_vec();
    assert_eq!(
        counter_with_label(
            &snapshot,
            telemetry::CRISIS_INTERCEPTS_TOTAL,
            "function",
            "generate_mantra"
        ),
        1
    );
    assert_eq!(counter_total(&snapshot, telemetry::MODEL_LOADS_TOTAL), 0);
    assert_eq!(
        counter_with_label(&snapshot, telemetry::REQUESTS_TOTAL, "status", "ok"),
        1
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn slow_calls_are_counted() {
    let (_, snapshotter) = recorded(async {
        let monitor =
            PerformanceMonitor::new(MonitorConfig::new().slow_threshold(Duration::from_millis(100)));
        monitor.record("generate_mantra", Duration::from_millis(50), false, true);
        monitor.record("generate_mantra", Duration::from_millis(250), false, true);
    });

    let snapshot = snapshotter.snapshot().into_vec();
    assert_eq!(counter_total(&snapshot, telemetry::REQUESTS_TOTAL), 2);
    assert_eq!(counter_total(&snapshot, telemetry::SLOW_CALLS_TOTAL), 1);
}

#[tokio::test]
async fn metrics_are_noop_without_recorder() {
    // Verify no panics when no recorder is installed.
    let orch = Tessera::builder()
        .backend(Arc::new(EchoBackend))
        .candidates(["tiny"])
        .build()
        .unwrap();
    orch.analyze_reflection(&ReflectionInput::new("hello"))
        .await
        .unwrap();
}
