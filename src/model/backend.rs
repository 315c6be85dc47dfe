//! The inference backend seam.
//!
//! The on-device model runtime is an external collaborator. Tessera only
//! needs to load a candidate model, run a prompt against it and optionally
//! release it; everything else (weights, tokenisation, device selection)
//! is the backend's business.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::Result;
use crate::types::GenerateParams;

/// Load progress callback, called with a percentage in `0..=100`.
pub type ProgressFn = Arc<dyn Fn(u8) + Send + Sync>;

/// Opaque handle to a loaded model.
///
/// Cheap to clone; the backend decides what lives inside and recovers it
/// with [`downcast_ref`](Self::downcast_ref).
#[derive(Clone)]
pub struct ModelHandle {
    candidate: String,
    inner: Arc<dyn Any + Send + Sync>,
}

impl ModelHandle {
    /// Wrap a backend-specific model for `candidate`.
    pub fn new<T: Any + Send + Sync>(candidate: impl Into<String>, model: T) -> Self {
        Self {
            candidate: candidate.into(),
            inner: Arc::new(model),
        }
    }

    /// Candidate identifier this handle was loaded from.
    pub fn candidate(&self) -> &str {
        &self.candidate
    }

    /// Borrow the backend-specific model.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }
}

impl fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelHandle")
            .field("candidate", &self.candidate)
            .finish_non_exhaustive()
    }
}

/// On-device model runtime.
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// Backend name for logging/debugging.
    fn name(&self) -> &str;

    /// Load one candidate model, reporting progress as it goes.
    async fn load(&self, candidate: &str, on_progress: ProgressFn) -> Result<ModelHandle>;

    /// Run a prompt. Implementations should observe `cancel` and return
    /// [`TesseraError::Cancelled`](crate::TesseraError::Cancelled) promptly.
    async fn generate(
        &self,
        handle: &ModelHandle,
        prompt: &str,
        params: &GenerateParams,
        cancel: CancellationToken,
    ) -> Result<String>;

    /// Release a loaded model. Default: drop the handle.
    async fn unload(&self, handle: ModelHandle) -> Result<()> {
        drop(handle);
        Ok(())
    }
}
