//! Tessera - on-device inference orchestration for reflective journaling
//!
//! This crate sits between a journaling app's AI features and a small
//! on-device language model. For every call it decides whether to
//! short-circuit on crisis language, serve a cached answer, merge the call
//! with an identical one already in flight, run the model, or answer from
//! static fallback content, so the caller always gets usable text quickly.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tessera::{FeatureOutcome, InferenceBackend, ReflectionInput, Tessera};
//!
//! # async fn example(backend: Arc<dyn InferenceBackend>) -> tessera::Result<()> {
//! let orchestrator = Tessera::builder()
//!     .backend(backend)
//!     .file_store()
//!     .build()?;
//!
//! let input = ReflectionInput::new("I finally said no to the extra shift.")
//!     .emotional_state("hopeful")
//!     .value_category("Career");
//!
//! match orchestrator.suggest_goal(&input).await? {
//!     FeatureOutcome::Response(response) => println!("{}", response.text),
//!     FeatureOutcome::Crisis(crisis) => println!("{}", crisis.message),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Components
//!
//! - [`safety`]: crisis phrase gate, runs first and overrides everything
//! - [`fallback`]: hierarchical static responses
//! - [`monitor`]: bounded call history and slow-call detection
//! - [`cache`]: persisted response cache with TTL and change invalidation
//! - [`model`]: multi-candidate model loading state machine
//! - [`coordinator`]: keyed deduplication and debouncing
//! - [`orchestrator`]: the feature entry points composing all of the above

pub mod cache;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod fallback;
pub mod model;
pub mod monitor;
pub mod orchestrator;
pub mod safety;
pub mod telemetry;
pub mod types;

// Re-export main types at crate root
pub use cache::{CacheConfig, FileStore, KeyValueStore, MemoryStore, ResponseCache};
pub use config::Config;
pub use coordinator::RequestCoordinator;
pub use error::{Result, TesseraError};
pub use fallback::{FallbackContext, FallbackTable};
pub use model::{
    InferenceBackend, ModelHandle, ModelManager, ModelManagerConfig, ModelState, ModelStatus,
    ProgressFn,
};
pub use monitor::{MonitorConfig, PerformanceMetric, PerformanceMonitor, PerformanceSummary};
pub use orchestrator::{CallOptions, Orchestrator, Tessera, TesseraBuilder};
pub use safety::SafetyGate;

// Re-export all types
pub use types::{
    ContactMethod, CrisisResource, CrisisResult, Feature, FeatureOutcome, FeatureResponse,
    GenerateParams, InferenceOutcome, InferenceRequest, ReflectionInput, ResponseSource,
};

// Re-export the cancellation token used throughout the API
pub use tokio_util::sync::CancellationToken;
