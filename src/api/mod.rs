//! Backend REST API: typed client, cache keys, and response types.

mod cached_client;
mod client;
mod error;
mod keys;
pub mod types;

pub use cached_client::{ApiCache, CachedApiClient, Freshness};
pub use client::ApiClient;
pub use error::ApiError;
pub use keys::ApiQueryKey;
