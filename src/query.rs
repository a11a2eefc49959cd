//! Async query abstraction for view-side data fetching.
//!
//! A `Query<T>` is a live consumer of one cache key. It runs requests on the
//! tokio runtime, hands results back to the UI thread through a channel, and
//! decides on every `poll()` whether the key needs another request: because
//! it was invalidated, or because its poll interval elapsed.
//!
//! # Example
//!
//! ```ignore
//! let api = cached_client.clone();
//! let mut query = Query::new(api.cache().clone(), ApiQueryKey::Health, move |freshness| {
//!     let api = api.clone();
//!     async move { api.health(freshness).await }
//! });
//!
//! query.fetch();
//!
//! // In event loop tick
//! if query.poll() {
//!     // State changed, trigger re-render
//! }
//! ```

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::api::{ApiCache, ApiError, ApiQueryKey, Freshness};
use crate::cache::{CacheResult, CacheSource, QueryKey, SharedError};

type Outcome<T> = Result<CacheResult<T>, SharedError>;

/// A factory that issues one read of the query's key
type LoaderFn<T> = Box<dyn Fn(Freshness) -> BoxFuture<'static, Outcome<T>> + Send + Sync>;

/// Live query over one cache key.
///
/// Holds the last successfully fetched value together with the error of the
/// latest failed attempt, so a view can keep rendering stale data while
/// flagging that the backend is unreachable.
pub struct Query<T> {
  key: ApiQueryKey,
  cache: ApiCache,
  loader: LoaderFn<T>,
  receiver: Option<mpsc::UnboundedReceiver<Outcome<T>>>,
  data: Option<Arc<T>>,
  error: Option<SharedError>,
  source: Option<CacheSource>,
  fetched_at: Option<DateTime<Utc>>,
  poll_interval: Option<Duration>,
  /// When the last request settled, successful or not
  settled_at: Option<Instant>,
  /// Cache generation the current data belongs to
  generation: u64,
}

impl<T: Send + Sync + 'static> Query<T> {
  /// Create a query for `key`, polling on the key's own interval.
  ///
  /// The loader is called each time a request is needed, with the freshness
  /// the query wants for that request.
  pub fn new<F, Fut>(cache: ApiCache, key: ApiQueryKey, loader: F) -> Self
  where
    F: Fn(Freshness) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Outcome<T>> + Send + 'static,
  {
    let poll_interval = key.policy().poll_interval;
    Self {
      key,
      cache,
      loader: Box::new(move |freshness| loader(freshness).boxed()),
      receiver: None,
      data: None,
      error: None,
      source: None,
      fetched_at: None,
      poll_interval,
      settled_at: None,
      generation: 0,
    }
  }

  #[cfg(test)]
  /// Override the background refetch period. `None` disables polling.
  pub fn with_poll_interval(mut self, interval: Option<Duration>) -> Self {
    self.poll_interval = interval;
    self
  }

  #[cfg(test)]
  pub fn key(&self) -> &ApiQueryKey {
    &self.key
  }

  /// Last successfully fetched value
  pub fn data(&self) -> Option<&T> {
    self.data.as_deref()
  }

  /// Error of the latest attempt, if it failed
  pub fn error(&self) -> Option<&SharedError> {
    self.error.as_ref()
  }

  /// Where the current value came from
  pub fn source(&self) -> Option<CacheSource> {
    self.source
  }

  pub fn fetched_at(&self) -> Option<DateTime<Utc>> {
    self.fetched_at
  }

  pub fn is_loading(&self) -> bool {
    self.receiver.is_some()
  }

  /// Latest attempt failed but an older value is still shown
  pub fn is_stale_with_error(&self) -> bool {
    self.data.is_some() && self.error.is_some()
  }

  /// Start a request unless one is already pending. Serves a fresh cached value if present.
  pub fn fetch(&mut self) {
    if self.is_loading() {
      return;
    }
    self.start(Freshness::Cached);
  }

  /// Force a network request, abandoning any pending result.
  pub fn refetch(&mut self) {
    self.receiver = None;
    self.start(Freshness::Revalidate);
  }

  /// Point the query at a different key.
  ///
  /// A result still pending for the old key is dropped unseen. The previous
  /// value stays visible until the new key's first result arrives.
  pub fn set_key<F, Fut>(&mut self, key: ApiQueryKey, loader: F)
  where
    F: Fn(Freshness) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Outcome<T>> + Send + 'static,
  {
    if key == self.key {
      return;
    }
    debug!(from = %self.key.description(), to = %key.description(), "Query key changed");
    self.poll_interval = key.policy().poll_interval;
    self.key = key;
    self.loader = Box::new(move |freshness| loader(freshness).boxed());
    self.receiver = None;
    self.settled_at = None;
    self.start(Freshness::Cached);
  }

  /// Drain a pending result and schedule the next request if one is due.
  ///
  /// Returns `true` if the visible state changed. Call this in your event
  /// loop tick handler.
  pub fn poll(&mut self) -> bool {
    let changed = self.receive();
    if !self.is_loading() {
      self.schedule();
    }
    changed
  }

  fn receive(&mut self) -> bool {
    let receiver = match &mut self.receiver {
      Some(rx) => rx,
      None => return false,
    };

    match receiver.try_recv() {
      Ok(Ok(result)) => {
        self.data = Some(result.data);
        self.error = result.error;
        self.source = Some(result.source);
        self.fetched_at = Some(result.fetched_at);
        self.finish();
        true
      }
      Ok(Err(error)) => {
        self.error = Some(error);
        self.finish();
        true
      }
      Err(mpsc::error::TryRecvError::Empty) => false,
      Err(mpsc::error::TryRecvError::Disconnected) => {
        // Only happens if the request task panicked
        warn!(key = %self.key.description(), "Query task ended without a result");
        self.finish();
        true
      }
    }
  }

  fn finish(&mut self) {
    self.receiver = None;
    self.settled_at = Some(Instant::now());
  }

  fn schedule(&mut self) {
    let Some(settled_at) = self.settled_at else {
      return;
    };

    if self.cache.generation(&self.key) != self.generation {
      debug!(key = %self.key.description(), "Refetching invalidated query");
      // Another consumer may already have refilled the entry
      self.start(Freshness::Cached);
    } else if self
      .poll_interval
      .is_some_and(|interval| settled_at.elapsed() >= interval)
    {
      debug!(key = %self.key.description(), "Polling");
      self.start(Freshness::Revalidate);
    }
  }

  fn start(&mut self, freshness: Freshness) {
    let (tx, rx) = mpsc::unbounded_channel();
    self.receiver = Some(rx);
    self.generation = self.cache.generation(&self.key);

    let future = (self.loader)(freshness);
    tokio::spawn(async move {
      // Receiver is gone when the query was refetched or re-keyed meanwhile
      let _ = tx.send(future.await);
    });
  }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Query<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Query")
      .field("key", &self.key)
      .field("data", &self.data)
      .field("error", &self.error)
      .field("fetched_at", &self.fetched_at)
      .field("poll_interval", &self.poll_interval)
      .finish_non_exhaustive()
  }
}

/// One-shot backend action whose outcome is picked up on tick.
///
/// At most one run is pending at a time; starting while pending is ignored.
pub struct Mutation<T> {
  receiver: Option<mpsc::UnboundedReceiver<Result<T, ApiError>>>,
}

impl<T: Send + 'static> Mutation<T> {
  pub fn new() -> Self {
    Self { receiver: None }
  }

  pub fn is_pending(&self) -> bool {
    self.receiver.is_some()
  }

  /// Spawn the action. Returns false if a previous run is still pending.
  pub fn start<Fut>(&mut self, action: Fut) -> bool
  where
    Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
  {
    if self.is_pending() {
      return false;
    }
    let (tx, rx) = mpsc::unbounded_channel();
    self.receiver = Some(rx);
    tokio::spawn(async move {
      let _ = tx.send(action.await);
    });
    true
  }

  /// Outcome of the pending run, once it has settled
  pub fn poll(&mut self) -> Option<Result<T, ApiError>> {
    let receiver = self.receiver.as_mut()?;
    match receiver.try_recv() {
      Ok(outcome) => {
        self.receiver = None;
        Some(outcome)
      }
      Err(mpsc::error::TryRecvError::Empty) => None,
      Err(mpsc::error::TryRecvError::Disconnected) => {
        self.receiver = None;
        None
      }
    }
  }
}

impl<T: Send + 'static> Default for Mutation<T> {
  fn default() -> Self {
    Self::new()
  }
}
