//! Core traits and types for the caching system.

use chrono::{DateTime, Utc};
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use crate::api::ApiError;

/// Identity of a cached resource.
///
/// Every parameter that changes the response must be part of the key, so two
/// requests differing only in e.g. page size land in different entries.
pub trait QueryKey: Clone + Debug + Eq + Hash + Send + Sync + 'static {
  /// Staleness and polling policy for this resource
  fn policy(&self) -> QueryPolicy;

  /// Human-readable description for logs
  fn description(&self) -> String;
}

/// Per-resource freshness rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryPolicy {
  /// How long after a fetch the cached value is served without a request
  pub stale_time: Duration,
  /// Background refetch period while a consumer is alive; `None` disables polling
  pub poll_interval: Option<Duration>,
}

impl QueryPolicy {
  pub const fn new(stale_ms: u64, poll_ms: Option<u64>) -> Self {
    let poll_interval = match poll_ms {
      Some(ms) => Some(Duration::from_millis(ms)),
      None => None,
    };
    Self {
      stale_time: Duration::from_millis(stale_ms),
      poll_interval,
    }
  }

  /// Never fresh, never polled: every read revalidates.
  pub const fn always_revalidate() -> Self {
    Self::new(0, None)
  }
}

/// Shared error handed to every caller joined on the same request
pub type SharedError = Arc<ApiError>;

/// Result from a cache operation, including data and metadata about the source.
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
  /// The actual data
  pub data: Arc<T>,
  /// Where the data came from
  pub source: CacheSource,
  /// When the data was fetched
  pub fetched_at: DateTime<Utc>,
  /// Error of the latest attempt, when serving last-known-good data
  pub error: Option<SharedError>,
}

impl<T> CacheResult<T> {
  /// Create a new cache result from fresh network data.
  pub fn from_network(data: Arc<T>, fetched_at: DateTime<Utc>) -> Self {
    Self {
      data,
      source: CacheSource::Network,
      fetched_at,
      error: None,
    }
  }

  /// Create a new cache result from cached data.
  pub fn from_cache(data: Arc<T>, fetched_at: DateTime<Utc>) -> Self {
    Self {
      data,
      source: CacheSource::CacheFresh,
      fetched_at,
      error: None,
    }
  }

  /// Network failed; serve the last good value with the error attached.
  pub fn offline(data: Arc<T>, fetched_at: DateTime<Utc>, error: SharedError) -> Self {
    Self {
      data,
      source: CacheSource::Offline,
      fetched_at,
      error: Some(error),
    }
  }
}

/// Indicates where cached data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Fresh data from network
  Network,
  /// Data from cache, still within its staleness window
  CacheFresh,
  /// Network unavailable or failing, serving last-known-good data
  Offline,
}
