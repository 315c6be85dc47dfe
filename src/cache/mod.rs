//! Caching subsystem.
//!
//! - [`ResponseCache`]: persisted per-feature model output with TTL,
//!   content-change and global-context invalidation. See the [`response`]
//!   module docs for keying and invalidation rules.
//!
//! - [`KeyValueStore`]: the persistence seam. [`MemoryStore`] (moka) for
//!   tests and ephemeral sessions, [`FileStore`] for on-disk persistence.
//!
//! - [`similarity`]: edit-distance helpers behind content-change
//!   invalidation.

pub mod response;
pub mod similarity;
pub mod store;

pub use response::{CacheConfig, CacheEntry, CacheKeyInputs, ResponseCache, compute_key};
pub use store::{FileStore, KeyValueStore, MemoryStore};
