//! Generic in-memory query cache.
//!
//! This module provides a backend-agnostic caching mechanism that:
//! - Keys entries by a typed [`QueryKey`] carrying its own freshness policy
//! - Serves fresh values without a request and deduplicates concurrent requests per key
//! - Keeps the last good value alongside the latest error (offline mode)
//! - Supports explicit invalidation after mutations

mod layer;
mod traits;

pub use layer::QueryCache;
pub use traits::{CacheResult, CacheSource, QueryKey, QueryPolicy, SharedError};
