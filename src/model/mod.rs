//! Model lifecycle: the backend seam and the loading state machine.

pub mod backend;
pub mod manager;

pub use backend::{InferenceBackend, ModelHandle, ProgressFn};
pub use manager::{
    DEFAULT_CANDIDATES, ModelManager, ModelManagerConfig, ModelState, ModelStatus,
};
