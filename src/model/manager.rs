//! Model lifecycle manager.
//!
//! Owns the on-device model's state machine:
//!
//! ```text
//! Idle ──► Loading ──► Ready
//!             │  ▲
//!             ▼  │ (retry)
//!            Error
//! ```
//!
//! Loading walks an ordered candidate list and keeps the first model that
//! loads. Concurrent callers share a single in-flight load; every caller's
//! progress callback is registered as a listener on it. The load runs on
//! its own task, so it completes even if every caller gives up waiting.
//! `reset()` returns to `Idle` from any state and discards the result of a
//! load that was still running.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::backend::{InferenceBackend, ModelHandle, ProgressFn};
use crate::telemetry;
use crate::types::GenerateParams;
use crate::{Result, TesseraError};

/// Candidate models tried in order when none are configured.
pub const DEFAULT_CANDIDATES: &[&str] = &[
    "Qwen2.5-1.5B-Instruct-q4f16_1",
    "Llama-3.2-1B-Instruct-q4f16_1",
    "SmolLM2-360M-Instruct-q4f16_1",
];

/// Configuration for the model manager.
#[derive(Debug, Clone)]
pub struct ModelManagerConfig {
    /// Candidate model identifiers, most preferred first.
    pub candidates: Vec<String>,

    /// Upper bound on loading a single candidate. Default: 120s.
    pub load_timeout: Duration,

    /// Upper bound on a single generation. Default: 30s.
    pub generate_timeout: Duration,
}

impl Default for ModelManagerConfig {
    fn default() -> Self {
        Self {
            candidates: DEFAULT_CANDIDATES.iter().map(|c| c.to_string()).collect(),
            load_timeout: Duration::from_secs(120),
            generate_timeout: Duration::from_secs(30),
        }
    }
}

impl ModelManagerConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the candidate list.
    pub fn candidates<I, S>(mut self, candidates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.candidates = candidates.into_iter().map(Into::into).collect();
        self
    }

    /// Set the per-candidate load timeout.
    pub fn load_timeout(mut self, timeout: Duration) -> Self {
        self.load_timeout = timeout;
        self
    }

    /// Set the generation timeout.
    pub fn generate_timeout(mut self, timeout: Duration) -> Self {
        self.generate_timeout = timeout;
        self
    }
}

/// Lifecycle status of the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelStatus {
    Idle,
    Loading,
    Ready,
    Error,
}

/// Point-in-time snapshot of the manager.
#[derive(Debug, Clone)]
pub struct ModelState {
    pub status: ModelStatus,
    /// Index into the candidate list of the candidate being loaded or loaded.
    pub candidate_index: Option<usize>,
    /// Identifier of that candidate.
    pub active_candidate: Option<String>,
    /// Load progress in `0..=100`.
    pub progress: u8,
    /// Present only when `status == Ready`.
    pub handle: Option<ModelHandle>,
    /// Most recent candidate failure, if any.
    pub last_error: Option<TesseraError>,
}

type LoadFuture = Shared<BoxFuture<'static, Result<ModelHandle>>>;

struct State {
    status: ModelStatus,
    candidate_index: Option<usize>,
    active_candidate: Option<String>,
    progress: u8,
    handle: Option<ModelHandle>,
    last_error: Option<TesseraError>,
    in_flight: Option<LoadFuture>,
    listeners: Vec<ProgressFn>,
    /// Bumped by `reset()`; a load only commits if the epoch it started in
    /// is still current.
    epoch: u64,
}

impl State {
    fn idle() -> Self {
        Self {
            status: ModelStatus::Idle,
            candidate_index: None,
            active_candidate: None,
            progress: 0,
            handle: None,
            last_error: None,
            in_flight: None,
            listeners: Vec::new(),
            epoch: 0,
        }
    }
}

struct Inner {
    backend: Arc<dyn InferenceBackend>,
    config: ModelManagerConfig,
    state: Mutex<State>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Loads and owns the on-device model.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct ModelManager {
    inner: Arc<Inner>,
}

impl ModelManager {
    /// Create a manager over `backend`. Nothing is loaded until first use.
    pub fn new(backend: Arc<dyn InferenceBackend>, config: ModelManagerConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                backend,
                config,
                state: Mutex::new(State::idle()),
            }),
        }
    }

    /// Create a manager with default configuration.
    pub fn with_defaults(backend: Arc<dyn InferenceBackend>) -> Self {
        Self::new(backend, ModelManagerConfig::default())
    }

    /// Get the configuration.
    pub fn config(&self) -> &ModelManagerConfig {
        &self.inner.config
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> ModelState {
        let st = self.inner.lock();
        ModelState {
            status: st.status,
            candidate_index: st.candidate_index,
            active_candidate: st.active_candidate.clone(),
            progress: st.progress,
            handle: st.handle.clone(),
            last_error: st.last_error.clone(),
        }
    }

    /// Current status.
    pub fn status(&self) -> ModelStatus {
        self.inner.lock().status
    }

    /// Whether a model is loaded.
    pub fn is_ready(&self) -> bool {
        self.status() == ModelStatus::Ready
    }

    /// Make sure a model is loaded; `true` once `Ready`.
    ///
    /// `Ready` returns immediately, `Loading` joins the running load and
    /// `Idle`/`Error` start a new one. Load failures are reported as
    /// `false`; see [`state`](Self::state) for the last error.
    pub async fn ensure_ready(&self, on_progress: Option<ProgressFn>) -> bool {
        self.ensure_loaded(on_progress).await.is_ok()
    }

    /// Explicit retry after a failed load. Same as `ensure_ready(None)`.
    pub async fn retry(&self) -> bool {
        self.ensure_ready(None).await
    }

    /// Load (or join the load of) a model and return its handle.
    pub async fn ensure_loaded(&self, on_progress: Option<ProgressFn>) -> Result<ModelHandle> {
        let load = {
            let mut st = self.inner.lock();
            if let (ModelStatus::Ready, Some(handle)) = (st.status, &st.handle) {
                let handle = handle.clone();
                drop(st);
                if let Some(on_progress) = on_progress {
                    on_progress(100);
                }
                return Ok(handle);
            }
            if let Some(on_progress) = on_progress {
                st.listeners.push(on_progress);
            }
            match &st.in_flight {
                Some(load) => {
                    debug!("joining in-flight model load");
                    load.clone()
                }
                None => {
                    st.status = ModelStatus::Loading;
                    st.progress = 0;
                    st.last_error = None;
                    let load = spawn_load(Arc::clone(&self.inner), st.epoch);
                    st.in_flight = Some(load.clone());
                    load
                }
            }
        };
        load.await
    }

    /// Generate text for `prompt`, loading a model first if needed.
    ///
    /// Cancellation via `cancel` yields [`TesseraError::Cancelled`]; a
    /// blank model output yields [`TesseraError::EmptyResponse`].
    pub async fn generate(
        &self,
        prompt: &str,
        params: &GenerateParams,
        cancel: &CancellationToken,
    ) -> Result<String> {
        if cancel.is_cancelled() {
            return Err(TesseraError::Cancelled);
        }
        let handle = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(TesseraError::Cancelled),
            loaded = self.ensure_loaded(None) => loaded?,
        };

        let after = self.inner.config.generate_timeout;
        let call = self
            .inner
            .backend
            .generate(&handle, prompt, params, cancel.clone());
        let text = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(TesseraError::Cancelled),
            result = tokio::time::timeout(after, call) => match result {
                Ok(text) => text?,
                Err(_) => {
                    return Err(TesseraError::Timeout {
                        operation: "generate",
                        after,
                    });
                }
            },
        };

        let text = text.trim();
        if text.is_empty() {
            return Err(TesseraError::EmptyResponse);
        }
        Ok(text.to_owned())
    }

    /// Return to `Idle`, unloading any loaded model.
    ///
    /// A load still in flight runs to completion, but its result is
    /// discarded and the loaded model unloaded.
    pub async fn reset(&self) {
        let handle = {
            let mut st = self.inner.lock();
            let epoch = st.epoch.wrapping_add(1);
            let handle = st.handle.take();
            *st = State::idle();
            st.epoch = epoch;
            handle
        };
        if let Some(handle) = handle {
            let candidate = handle.candidate().to_owned();
            if let Err(e) = self.inner.backend.unload(handle).await {
                warn!(candidate, error = %e, "model unload failed");
            }
        }
        info!("model manager reset");
    }
}

/// Start `load_candidates` on its own task and share its outcome.
///
/// The load keeps running when every caller awaiting it has gone away.
fn spawn_load(inner: Arc<Inner>, epoch: u64) -> LoadFuture {
    let task = tokio::spawn(load_candidates(Arc::clone(&inner), epoch));
    async move {
        match task.await {
            Ok(result) => result,
            Err(e) => {
                let err = TesseraError::ModelUnavailable(format!("model load task failed: {e}"));
                fail(&inner, epoch, err.clone());
                Err(err)
            }
        }
    }
    .boxed()
    .shared()
}

/// Progress callback for one load attempt: records progress and fans it
/// out to every registered listener.
fn progress_fn(inner: &Arc<Inner>, epoch: u64) -> ProgressFn {
    let inner = Arc::downgrade(inner);
    Arc::new(move |pct: u8| {
        let Some(inner) = inner.upgrade() else {
            return;
        };
        let pct = pct.min(100);
        let listeners = {
            let mut st = inner.lock();
            if st.epoch != epoch {
                return;
            }
            st.progress = pct;
            st.listeners.clone()
        };
        for listener in listeners {
            listener(pct);
        }
    })
}

#[instrument(name = "model_load", skip(inner))]
async fn load_candidates(inner: Arc<Inner>, epoch: u64) -> Result<ModelHandle> {
    let candidates = inner.config.candidates.clone();
    if candidates.is_empty() {
        warn!("no model candidates configured");
        fail(&inner, epoch, TesseraError::NoCandidates);
        return Err(TesseraError::NoCandidates);
    }

    for (index, candidate) in candidates.iter().enumerate() {
        {
            let mut st = inner.lock();
            if st.epoch != epoch {
                return Err(TesseraError::Cancelled);
            }
            st.candidate_index = Some(index);
            st.active_candidate = Some(candidate.clone());
            st.progress = 0;
        }

        let after = inner.config.load_timeout;
        let attempt = inner.backend.load(candidate, progress_fn(&inner, epoch));
        let result = match tokio::time::timeout(after, attempt).await {
            Ok(result) => result,
            Err(_) => Err(TesseraError::Timeout {
                operation: "model load",
                after,
            }),
        };

        match result {
            Ok(handle) => {
                metrics::counter!(telemetry::MODEL_LOADS_TOTAL,
                    "candidate" => candidate.clone(),
                    "status" => "ok",
                )
                .increment(1);
                let listeners = {
                    let mut st = inner.lock();
                    if st.epoch == epoch {
                        st.status = ModelStatus::Ready;
                        st.progress = 100;
                        st.handle = Some(handle.clone());
                        st.in_flight = None;
                        Some(std::mem::take(&mut st.listeners))
                    } else {
                        None
                    }
                };
                let Some(listeners) = listeners else {
                    debug!(candidate, "load finished after reset; discarding");
                    if let Err(e) = inner.backend.unload(handle).await {
                        warn!(candidate, error = %e, "model unload failed");
                    }
                    return Err(TesseraError::Cancelled);
                };
                info!(candidate, index, "model ready");
                for listener in listeners {
                    listener(100);
                }
                return Ok(handle);
            }
            Err(e) => {
                metrics::counter!(telemetry::MODEL_LOADS_TOTAL,
                    "candidate" => candidate.clone(),
                    "status" => "error",
                )
                .increment(1);
                warn!(candidate, index, error = %e, "model candidate failed to load");
                let mut st = inner.lock();
                if st.epoch != epoch {
                    return Err(TesseraError::Cancelled);
                }
                st.last_error = Some(TesseraError::LoadFailed {
                    candidate: candidate.clone(),
                    message: e.to_string(),
                });
            }
        }
    }

    let last_error = inner
        .lock()
        .last_error
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_default();
    let err = TesseraError::AllCandidatesFailed {
        attempted: candidates.len(),
        last_error,
    };
    warn!(attempted = candidates.len(), "all model candidates failed");
    fail(&inner, epoch, err.clone());
    Err(err)
}

/// Move to `Error` unless a reset happened in the meantime.
fn fail(inner: &Inner, epoch: u64, err: TesseraError) {
    let mut st = inner.lock();
    if st.epoch != epoch {
        return;
    }
    st.status = ModelStatus::Error;
    st.in_flight = None;
    st.listeners.clear();
    if st.last_error.is_none() {
        st.last_error = Some(err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = ModelManagerConfig::default();
        assert_eq!(config.candidates.len(), DEFAULT_CANDIDATES.len());
        assert_eq!(config.load_timeout, Duration::from_secs(120));
        assert_eq!(config.generate_timeout, Duration::from_secs(30));
    }

    #[test]
    fn config_candidates_builder() {
        let config = ModelManagerConfig::new().candidates(["a", "b"]);
        assert_eq!(config.candidates, vec!["a".to_string(), "b".to_string()]);
    }
}
