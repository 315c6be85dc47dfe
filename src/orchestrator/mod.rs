//! Orchestration entry points.
//!
//! [`Orchestrator`] composes the safety gate, response cache, request
//! coordinator, model manager, fallback tables and performance monitor
//! into the six consumer features. Every call follows the same path:
//!
//! 1. **Safety gate.** A crisis match returns [`FeatureOutcome::Crisis`]
//!    at once. Nothing reaches the model or the cache.
//! 2. **Cache.** Global context is synced, an edited reflection's earlier
//!    entry is kept or dropped depending on how much changed, and a fresh
//!    entry is served if present.
//! 3. **Coordinate.** Identical in-flight calls are merged; calls with a
//!    debounce key wait out the burst first, then merge the same way.
//! 4. **Generate** on the model, then write the result to the cache.
//! 5. **Fall back** to static content on any failure other than
//!    cancellation.
//!
//! The only error a feature call returns is [`TesseraError::Cancelled`].

mod builder;
pub mod prompts;

pub use builder::{Tessera, TesseraBuilder};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::cache::{CacheKeyInputs, ResponseCache, compute_key};
use crate::coordinator::RequestCoordinator;
use crate::fallback::{self, FallbackContext, FallbackTable};
use crate::model::{ModelManager, ModelState, ModelStatus, ProgressFn};
use crate::monitor::{PerformanceMonitor, PerformanceSummary};
use crate::safety::SafetyGate;
use crate::telemetry;
use crate::types::{
    Feature, FeatureOutcome, FeatureResponse, InferenceOutcome, InferenceRequest,
    ReflectionInput, ResponseSource,
};
use crate::{Result, TesseraError};

/// Per-call options for [`Orchestrator::run_feature`].
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    /// Collapse bursts of calls sharing this key into the last one.
    pub debounce_key: Option<String>,
    /// Debounce window; the coordinator default when unset.
    pub debounce_delay: Option<Duration>,
    /// Abandon the call when this token is cancelled. Merged callers waiting
    /// on the same call are cancelled with it.
    pub cancel: Option<CancellationToken>,
    /// Skip the cache lookup. A fresh result still overwrites the entry.
    pub bypass_cache: bool,
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Debounce on `key`.
    pub fn debounce(mut self, key: impl Into<String>) -> Self {
        self.debounce_key = Some(key.into());
        self
    }

    /// Override the debounce window.
    pub fn debounce_delay(mut self, delay: Duration) -> Self {
        self.debounce_delay = Some(delay);
        self
    }

    /// Attach a cancellation token.
    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Skip the cache lookup.
    pub fn bypass_cache(mut self) -> Self {
        self.bypass_cache = true;
        self
    }
}

pub(crate) struct Inner {
    pub(crate) gate: SafetyGate,
    pub(crate) manager: ModelManager,
    pub(crate) cache: ResponseCache,
    pub(crate) coordinator: RequestCoordinator<String>,
    pub(crate) monitor: PerformanceMonitor,
    pub(crate) fallback_overrides: HashMap<Feature, FallbackTable>,
}

/// Entry point for every AI feature.
///
/// Cheap to clone; clones share the model, cache and history.
///
/// ```rust,no_run
/// # use std::sync::Arc;
/// # use tessera::{Tessera, ReflectionInput, InferenceBackend};
/// # async fn example(backend: Arc<dyn InferenceBackend>) -> tessera::Result<()> {
/// let orchestrator = Tessera::builder().backend(backend).build()?;
///
/// let input = ReflectionInput::new("Long week, but I finished the project.")
///     .emotional_state("drained")
///     .sub_emotion("exhausted");
/// let outcome = orchestrator.analyze_reflection(&input).await?;
/// println!("{:?}", outcome.text());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl Orchestrator {
    pub(crate) fn from_inner(inner: Inner) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Reflect on a journal entry.
    pub async fn analyze_reflection(&self, input: &ReflectionInput) -> Result<FeatureOutcome> {
        self.run_feature(Feature::AnalyzeReflection, input, CallOptions::default())
            .await
    }

    /// Suggest one small goal.
    pub async fn suggest_goal(&self, input: &ReflectionInput) -> Result<FeatureOutcome> {
        self.run_feature(Feature::SuggestGoal, input, CallOptions::default())
            .await
    }

    /// Offer encouragement.
    pub async fn generate_encouragement(&self, input: &ReflectionInput) -> Result<FeatureOutcome> {
        self.run_feature(Feature::GenerateEncouragement, input, CallOptions::default())
            .await
    }

    /// Produce a short mantra.
    pub async fn generate_mantra(&self, input: &ReflectionInput) -> Result<FeatureOutcome> {
        self.run_feature(Feature::GenerateMantra, input, CallOptions::default())
            .await
    }

    /// Offer a perspective to hold in mind.
    pub async fn generate_focus_lens(&self, input: &ReflectionInput) -> Result<FeatureOutcome> {
        self.run_feature(Feature::GenerateFocusLens, input, CallOptions::default())
            .await
    }

    /// Offer supportive guidance.
    pub async fn counseling_guidance(&self, input: &ReflectionInput) -> Result<FeatureOutcome> {
        self.run_feature(Feature::CounselingGuidance, input, CallOptions::default())
            .await
    }

    /// Run any feature with explicit call options.
    ///
    /// Returns `Ok` with a crisis, model, cache or fallback outcome, or
    /// `Err(TesseraError::Cancelled)` if the call was cancelled. Every call
    /// is recorded in the performance monitor exactly once.
    #[instrument(name = "feature", skip(self, input, options), fields(feature = %feature))]
    pub async fn run_feature(
        &self,
        feature: Feature,
        input: &ReflectionInput,
        options: CallOptions,
    ) -> Result<FeatureOutcome> {
        let started = Instant::now();
        let name = feature.name();

        if let Some(crisis) = self.inner.gate.scan(&input.text) {
            metrics::counter!(telemetry::CRISIS_INTERCEPTS_TOTAL, "function" => name)
                .increment(1);
            self.inner
                .monitor
                .record(name, started.elapsed(), false, true);
            return Ok(FeatureOutcome::Crisis(crisis));
        }

        let cancel = options.cancel.clone().unwrap_or_default();
        if cancel.is_cancelled() {
            self.inner
                .monitor
                .record(name, started.elapsed(), false, false);
            return Err(TesseraError::Cancelled);
        }

        let inputs = CacheKeyInputs::from(input);
        let key = compute_key(feature, &inputs);

        if !options.bypass_cache
            && let Some(text) = self.cached(feature, input, &inputs, &key).await
        {
            self.inner
                .monitor
                .record(name, started.elapsed(), true, true);
            return Ok(respond(feature, text, ResponseSource::Cache));
        }

        if self.inner.manager.status() == ModelStatus::Error {
            let err = TesseraError::ModelUnavailable(
                "model failed to load; call retry_model to try again".to_string(),
            );
            return Ok(self.fall_back(feature, input, started, &err));
        }

        let request = InferenceRequest::new(format!("{name}:{key}"), prompts::build(feature, input))
            .params(prompts::params(feature));
        let dedup_key = request.key.clone();
        let this = self.clone();
        let source_text = input.text.clone();
        let work = move |token: CancellationToken| async move {
            this.generate_and_store(feature, &key, request, &source_text, token)
                .await
        };

        let coordinator = &self.inner.coordinator;
        let coordination_key = options.debounce_key.as_deref().unwrap_or(&dedup_key);
        let coordinated = async {
            match options.debounce_key.as_deref() {
                Some(debounce_key) => {
                    let delay = options
                        .debounce_delay
                        .unwrap_or_else(|| coordinator.debounce_delay());
                    coordinator
                        .debounce_into(debounce_key, &dedup_key, delay, work)
                        .await
                }
                None => coordinator.coordinate(&dedup_key, work).await,
            }
        };
        // The caller's token cancels the shared call it is waiting on.
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                coordinator.cancel(coordination_key);
                Err(TesseraError::Cancelled)
            }
            result = coordinated => result,
        };

        match result {
            Ok(text) => {
                self.inner
                    .monitor
                    .record(name, started.elapsed(), false, true);
                Ok(respond(feature, text, ResponseSource::Model))
            }
            Err(e) if e.is_cancelled() => {
                debug!(feature = name, "call cancelled");
                self.inner
                    .monitor
                    .record(name, started.elapsed(), false, false);
                Err(TesseraError::Cancelled)
            }
            Err(e) => Ok(self.fall_back(feature, input, started, &e)),
        }
    }

    /// Run a raw prompt on the model, merged with any identical in-flight
    /// request sharing `request.key`. No cache or fallback.
    ///
    /// The prompt passes the safety gate first; a match returns
    /// [`InferenceOutcome::Crisis`] and the model is never called.
    /// Cancelling `cancel` cancels the shared call for every caller.
    #[instrument(name = "infer", skip(self, request, cancel), fields(key = %request.key))]
    pub async fn infer(
        &self,
        request: InferenceRequest,
        cancel: Option<CancellationToken>,
    ) -> Result<InferenceOutcome> {
        if let Some(crisis) = self.inner.gate.scan(&request.prompt) {
            metrics::counter!(telemetry::CRISIS_INTERCEPTS_TOTAL, "function" => "infer")
                .increment(1);
            return Ok(InferenceOutcome::Crisis(crisis));
        }

        let manager = self.inner.manager.clone();
        let key = request.key.clone();
        let coordinated = self.inner.coordinator.coordinate(&key, move |token| async move {
            manager
                .generate(&request.prompt, &request.params, &token)
                .await
        });
        let cancel = cancel.unwrap_or_default();
        let text = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                self.inner.coordinator.cancel(&key);
                return Err(TesseraError::Cancelled);
            }
            result = coordinated => result?,
        };
        Ok(InferenceOutcome::Text(text))
    }

    /// Cancel an in-flight or debounced call by key.
    ///
    /// Keys are the debounce key a caller supplied, or an
    /// [`InferenceRequest`] key passed to [`infer`](Self::infer).
    pub fn cancel(&self, key: &str) -> bool {
        self.inner.coordinator.cancel(key)
    }

    /// Cancel every in-flight and debounced call.
    pub fn clear(&self) {
        self.inner.coordinator.clear();
    }

    /// Load the model ahead of the first call.
    pub async fn preload(&self, on_progress: Option<ProgressFn>) -> bool {
        self.inner.manager.ensure_ready(on_progress).await
    }

    /// Retry loading after the model ended in the error state.
    pub async fn retry_model(&self) -> bool {
        self.inner.manager.retry().await
    }

    /// Unload the model and return to idle.
    pub async fn reset_model(&self) {
        self.inner.manager.reset().await;
    }

    /// Snapshot of the model lifecycle.
    pub fn model_state(&self) -> ModelState {
        self.inner.manager.state()
    }

    /// Aggregates over recent calls.
    pub fn performance(&self) -> PerformanceSummary {
        self.inner.monitor.summary()
    }

    /// The performance monitor.
    pub fn monitor(&self) -> &PerformanceMonitor {
        &self.inner.monitor
    }

    /// The response cache.
    pub fn cache(&self) -> &ResponseCache {
        &self.inner.cache
    }

    /// The model manager.
    pub fn model(&self) -> &ModelManager {
        &self.inner.manager
    }

    /// The safety gate.
    pub fn gate(&self) -> &SafetyGate {
        &self.inner.gate
    }

    /// Look up a fresh cached response, applying context and edit
    /// invalidation first.
    async fn cached(
        &self,
        feature: Feature,
        input: &ReflectionInput,
        inputs: &CacheKeyInputs<'_>,
        key: &str,
    ) -> Option<String> {
        let cache = &self.inner.cache;
        if let Err(e) = cache
            .sync_context(input.emotional_state.as_deref(), &input.active_protocols)
            .await
        {
            warn!(error = %e, "cache context sync failed");
        }

        if let Some(text) = cache.lookup(feature, key).await {
            return Some(text);
        }

        // A light edit keeps the earlier version's response.
        let previous = input
            .previous_text
            .as_deref()
            .filter(|previous| previous.trim() != input.text.trim())?;
        let previous_key = compute_key(
            feature,
            &CacheKeyInputs {
                text: previous,
                ..*inputs
            },
        );
        if cache.invalidate_if_changed(&previous_key, &input.text).await {
            return None;
        }
        cache.lookup(feature, &previous_key).await
    }

    async fn generate_and_store(
        &self,
        feature: Feature,
        key: &str,
        request: InferenceRequest,
        source_text: &str,
        cancel: CancellationToken,
    ) -> Result<String> {
        let raw = self
            .inner
            .manager
            .generate(&request.prompt, &request.params, &cancel)
            .await?;
        let text = prompts::clean(feature, &raw);
        if text.is_empty() {
            return Err(TesseraError::EmptyResponse);
        }
        if let Err(e) = self
            .inner
            .cache
            .store(feature, key, &text, source_text)
            .await
        {
            warn!(error = %e, "cache write failed");
        }
        Ok(text)
    }

    fn fall_back(
        &self,
        feature: Feature,
        input: &ReflectionInput,
        started: Instant,
        reason: &TesseraError,
    ) -> FeatureOutcome {
        let name = feature.name();
        warn!(feature = name, reason = %reason, "serving fallback response");
        metrics::counter!(telemetry::FALLBACKS_TOTAL, "function" => name).increment(1);
        let table = self
            .inner
            .fallback_overrides
            .get(&feature)
            .unwrap_or_else(|| fallback::content::table(feature));
        let text = fallback::resolve(
            table,
            &FallbackContext::from(input),
            fallback::content::GENERIC_FALLBACK,
        );
        self.inner
            .monitor
            .record(name, started.elapsed(), false, false);
        respond(feature, text, ResponseSource::Fallback)
    }
}

fn respond(feature: Feature, text: String, source: ResponseSource) -> FeatureOutcome {
    FeatureOutcome::Response(FeatureResponse {
        feature,
        text,
        source,
    })
}
