//! Keyed in-memory query cache with request deduplication.

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tracing::{debug, info, warn};

use super::traits::{CacheResult, QueryKey, SharedError};
use crate::api::ApiError;

type AnyValue = Arc<dyn Any + Send + Sync>;

/// What every caller joined on a request receives
type Settled = Result<(AnyValue, DateTime<Utc>), SharedError>;

type InFlight = Shared<BoxFuture<'static, Settled>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchMode {
  /// Serve a fresh cached value if there is one
  IfStale,
  /// Always go to the network (polling, manual refresh)
  Always,
}

struct StoredValue {
  data: AnyValue,
  fetched_at: DateTime<Utc>,
  stored_at: Instant,
}

#[derive(Default)]
struct Entry {
  value: Option<StoredValue>,
  error: Option<SharedError>,
  invalidated: bool,
  /// Bumped on invalidation; a request settles only into the generation it started in
  generation: u64,
  in_flight: Option<InFlight>,
}

/// Process-wide keyed store of the latest response per resource.
///
/// Entries are created on the first request for a key, marked stale by
/// [`QueryCache::invalidate`], and dropped only with the cache itself or by
/// [`QueryCache::clear`]. Clones share the same store.
///
/// At most one request per key is outstanding: callers arriving while a
/// request is in flight await the same shared future.
pub struct QueryCache<K: QueryKey> {
  entries: Arc<Mutex<HashMap<K, Entry>>>,
}

impl<K: QueryKey> QueryCache<K> {
  pub fn new() -> Self {
    Self {
      entries: Arc::new(Mutex::new(HashMap::new())),
    }
  }

  /// Fetch with cache-first strategy.
  ///
  /// 1. Fresh cached value (inside the key's staleness window, not invalidated) is returned
  /// 2. A request already in flight for the key is joined
  /// 3. Otherwise the fetcher is called and its result stored
  ///
  /// On network failure the last good value is returned with the error
  /// attached; with nothing cached the error itself is returned.
  pub async fn fetch<T, F, Fut>(&self, key: &K, fetcher: F) -> Result<CacheResult<T>, SharedError>
  where
    T: Send + Sync + 'static,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
  {
    self.run(key, fetcher, FetchMode::IfStale).await
  }

  /// Like [`fetch`](Self::fetch) but ignores freshness. Still joins an in-flight request.
  pub async fn refetch<T, F, Fut>(
    &self,
    key: &K,
    fetcher: F,
  ) -> Result<CacheResult<T>, SharedError>
  where
    T: Send + Sync + 'static,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
  {
    self.run(key, fetcher, FetchMode::Always).await
  }

  async fn run<T, F, Fut>(
    &self,
    key: &K,
    fetcher: F,
    mode: FetchMode,
  ) -> Result<CacheResult<T>, SharedError>
  where
    T: Send + Sync + 'static,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
  {
    let request = {
      let mut entries = self.lock();
      let entry = entries.entry(key.clone()).or_default();

      if mode == FetchMode::IfStale {
        if let Some(hit) = fresh_value::<T>(entry, key) {
          debug!(key = %key.description(), "Cache hit");
          return Ok(hit);
        }
      }

      match &entry.in_flight {
        Some(request) => {
          debug!(key = %key.description(), "Joining in-flight request");
          request.clone()
        }
        None => {
          let request = self.start_request(key, entry.generation, fetcher());
          entry.in_flight = Some(request.clone());
          request
        }
      }
    };

    match request.await {
      Ok((data, fetched_at)) => {
        let data = downcast::<T>(data, key)?;
        Ok(CacheResult::from_network(data, fetched_at))
      }
      Err(error) => match self.peek::<T>(key) {
        Some(last_good) => Ok(CacheResult::offline(
          last_good.data,
          last_good.fetched_at,
          error,
        )),
        None => Err(error),
      },
    }
  }

  /// Wrap a request so that whichever caller drives it records the outcome once.
  fn start_request<T, Fut>(&self, key: &K, generation: u64, request: Fut) -> InFlight
  where
    T: Send + Sync + 'static,
    Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
  {
    debug!(key = %key.description(), generation, "Starting request");
    let entries = Arc::clone(&self.entries);
    let key = key.clone();

    async move {
      let settled: Settled = request
        .await
        .map(|data| (Arc::new(data) as AnyValue, Utc::now()))
        .map_err(Arc::new);
      settle(&entries, &key, generation, &settled);
      settled
    }
    .boxed()
    .shared()
  }

  /// Last stored value for a key, regardless of freshness, with the latest error.
  pub fn peek<T: Send + Sync + 'static>(&self, key: &K) -> Option<CacheResult<T>> {
    let entries = self.lock();
    let entry = entries.get(key)?;
    let value = entry.value.as_ref()?;
    let data = Arc::clone(&value.data).downcast::<T>().ok()?;
    Some(match &entry.error {
      Some(error) => CacheResult::offline(data, value.fetched_at, Arc::clone(error)),
      None => CacheResult::from_cache(data, value.fetched_at),
    })
  }

  #[cfg(test)]
  /// Latest error recorded for a key, if the last request failed.
  pub fn last_error(&self, key: &K) -> Option<SharedError> {
    self.lock().get(key).and_then(|e| e.error.clone())
  }

  /// Mark a key stale and eligible for immediate refetch.
  ///
  /// The last value stays readable. A request in flight at this point is
  /// detached: its result still reaches its callers but is not stored.
  /// Returns false when nothing was cached under the key.
  pub fn invalidate(&self, key: &K) -> bool {
    let mut entries = self.lock();
    match entries.get_mut(key) {
      Some(entry) => {
        mark_invalidated(entry);
        info!(key = %key.description(), generation = entry.generation, "Invalidated");
        true
      }
      None => false,
    }
  }

  /// Invalidate every key matching the predicate; returns how many matched.
  pub fn invalidate_where(&self, mut predicate: impl FnMut(&K) -> bool) -> usize {
    let mut entries = self.lock();
    let mut count = 0;
    for (key, entry) in entries.iter_mut() {
      if predicate(key) {
        mark_invalidated(entry);
        info!(key = %key.description(), generation = entry.generation, "Invalidated");
        count += 1;
      }
    }
    count
  }

  #[cfg(test)]
  /// Whether a key has been invalidated since its last successful fetch
  pub fn is_invalidated(&self, key: &K) -> bool {
    self.lock().get(key).is_some_and(|e| e.invalidated)
  }

  /// Invalidation counter for a key; 0 for unknown keys
  pub fn generation(&self, key: &K) -> u64 {
    self.lock().get(key).map_or(0, |e| e.generation)
  }

  #[cfg(test)]
  /// Whether a request for the key is outstanding
  pub fn is_fetching(&self, key: &K) -> bool {
    self.lock().get(key).is_some_and(|e| e.in_flight.is_some())
  }

  #[cfg(test)]
  /// Drop every entry
  pub fn clear(&self) {
    self.lock().clear();
  }

  #[cfg(test)]
  pub fn len(&self) -> usize {
    self.lock().len()
  }

  #[cfg(test)]
  pub fn is_empty(&self) -> bool {
    self.lock().is_empty()
  }

  fn lock(&self) -> MutexGuard<'_, HashMap<K, Entry>> {
    lock_entries(&self.entries)
  }
}

impl<K: QueryKey> Default for QueryCache<K> {
  fn default() -> Self {
    Self::new()
  }
}

impl<K: QueryKey> Clone for QueryCache<K> {
  fn clone(&self) -> Self {
    Self {
      entries: Arc::clone(&self.entries),
    }
  }
}

// The map holds plain data, so a panic mid-update leaves nothing half-written
fn lock_entries<K>(entries: &Mutex<HashMap<K, Entry>>) -> MutexGuard<'_, HashMap<K, Entry>> {
  entries.lock().unwrap_or_else(PoisonError::into_inner)
}

fn mark_invalidated(entry: &mut Entry) {
  entry.invalidated = true;
  entry.generation += 1;
  entry.in_flight = None;
}

fn fresh_value<T: Send + Sync + 'static>(
  entry: &Entry,
  key: &impl QueryKey,
) -> Option<CacheResult<T>> {
  if entry.invalidated {
    return None;
  }
  let value = entry.value.as_ref()?;
  if value.stored_at.elapsed() >= key.policy().stale_time {
    return None;
  }
  let data = Arc::clone(&value.data).downcast::<T>().ok()?;
  Some(CacheResult::from_cache(data, value.fetched_at))
}

fn settle<K: QueryKey>(
  entries: &Mutex<HashMap<K, Entry>>,
  key: &K,
  generation: u64,
  settled: &Settled,
) {
  let mut entries = lock_entries(entries);
  let Some(entry) = entries.get_mut(key) else {
    return;
  };
  if entry.generation != generation {
    debug!(key = %key.description(), generation, "Discarding superseded response");
    return;
  }

  entry.in_flight = None;
  match settled {
    Ok((data, fetched_at)) => {
      entry.value = Some(StoredValue {
        data: Arc::clone(data),
        fetched_at: *fetched_at,
        stored_at: Instant::now(),
      });
      entry.error = None;
      entry.invalidated = false;
    }
    Err(error) => {
      warn!(key = %key.description(), "Request failed: {}", error);
      entry.error = Some(Arc::clone(error));
    }
  }
}

fn downcast<T: Send + Sync + 'static>(data: AnyValue, key: &impl QueryKey) -> Result<Arc<T>, SharedError> {
  data.downcast::<T>().map_err(|_| {
    Arc::new(ApiError::CacheMismatch {
      key: key.description(),
    })
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{CacheSource, QueryPolicy};
  use std::sync::atomic::{AtomicU32, Ordering};
  use std::time::Duration;

  #[derive(Debug, Clone, PartialEq, Eq, Hash)]
  enum TestKey {
    Fresh(&'static str),
    Volatile,
  }

  impl QueryKey for TestKey {
    fn policy(&self) -> QueryPolicy {
      match self {
        TestKey::Fresh(_) => QueryPolicy::new(60_000, None),
        TestKey::Volatile => QueryPolicy::always_revalidate(),
      }
    }

    fn description(&self) -> String {
      format!("{:?}", self)
    }
  }

  fn unavailable() -> ApiError {
    ApiError::Status {
      status: 503,
      url: "http://test/".to_string(),
      message: "unavailable".to_string(),
    }
  }

  fn counting_fetcher(
    counter: &Arc<AtomicU32>,
    delay: Duration,
  ) -> impl FnOnce() -> BoxFuture<'static, Result<u32, ApiError>> {
    let counter = Arc::clone(counter);
    move || {
      async move {
        tokio::time::sleep(delay).await;
        Ok(counter.fetch_add(1, Ordering::SeqCst) + 1)
      }
      .boxed()
    }
  }

  #[tokio::test]
  async fn test_fresh_value_served_without_request() {
    let cache = QueryCache::new();
    let calls = Arc::new(AtomicU32::new(0));
    let key = TestKey::Fresh("a");

    let first = cache
      .fetch(&key, counting_fetcher(&calls, Duration::ZERO))
      .await
      .unwrap();
    assert_eq!(first.source, CacheSource::Network);
    assert_eq!(*first.data, 1);

    let second = cache
      .fetch(&key, counting_fetcher(&calls, Duration::ZERO))
      .await
      .unwrap();
    assert_eq!(second.source, CacheSource::CacheFresh);
    assert_eq!(*second.data, 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_concurrent_same_key_requests_are_deduplicated() {
    let cache = QueryCache::new();
    let calls = Arc::new(AtomicU32::new(0));
    let key = TestKey::Fresh("a");

    let (a, b) = futures::join!(
      cache.fetch(&key, counting_fetcher(&calls, Duration::from_millis(50))),
      cache.fetch(&key, counting_fetcher(&calls, Duration::from_millis(50))),
    );

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(*a.unwrap().data, 1);
    assert_eq!(*b.unwrap().data, 1);
    assert!(!cache.is_fetching(&key));
  }

  #[tokio::test]
  async fn test_refetch_joins_in_flight_request() {
    let cache = QueryCache::new();
    let calls = Arc::new(AtomicU32::new(0));
    let key = TestKey::Volatile;

    let (a, b) = futures::join!(
      cache.refetch(&key, counting_fetcher(&calls, Duration::from_millis(50))),
      cache.refetch(&key, counting_fetcher(&calls, Duration::from_millis(50))),
    );

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(*a.unwrap().data, *b.unwrap().data);
  }

  #[tokio::test]
  async fn test_different_keys_fetch_independently() {
    let cache = QueryCache::new();
    let calls = Arc::new(AtomicU32::new(0));

    let (a, b) = futures::join!(
      cache.fetch(
        &TestKey::Fresh("a"),
        counting_fetcher(&calls, Duration::from_millis(20))
      ),
      cache.fetch(
        &TestKey::Fresh("b"),
        counting_fetcher(&calls, Duration::from_millis(20))
      ),
    );

    assert!(a.is_ok() && b.is_ok());
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(cache.len(), 2);
  }

  #[tokio::test]
  async fn test_zero_stale_time_always_revalidates() {
    let cache = QueryCache::new();
    let calls = Arc::new(AtomicU32::new(0));

    for expected in 1..=3 {
      let result = cache
        .fetch(&TestKey::Volatile, counting_fetcher(&calls, Duration::ZERO))
        .await
        .unwrap();
      assert_eq!(*result.data, expected);
      assert_eq!(result.source, CacheSource::Network);
    }
  }

  #[tokio::test]
  async fn test_failure_serves_last_good_value_with_error() {
    let cache = QueryCache::new();
    let key = TestKey::Volatile;

    cache
      .fetch(&key, || async { Ok::<_, ApiError>(42u32) })
      .await
      .unwrap();

    let result = cache
      .fetch(&key, || async { Err::<u32, _>(unavailable()) })
      .await
      .unwrap();
    assert_eq!(result.source, CacheSource::Offline);
    assert_eq!(*result.data, 42);
    assert_eq!(result.error.unwrap().status(), Some(503));

    let peeked = cache.peek::<u32>(&key).unwrap();
    assert_eq!(*peeked.data, 42);
    assert!(peeked.error.is_some());
    assert!(cache.last_error(&key).is_some());
  }

  #[tokio::test]
  async fn test_failure_without_cached_value_is_error() {
    let cache = QueryCache::new();
    let err = cache
      .fetch(&TestKey::Volatile, || async { Err::<u32, _>(unavailable()) })
      .await
      .unwrap_err();
    assert_eq!(err.status(), Some(503));
  }

  #[tokio::test]
  async fn test_success_clears_previous_error() {
    let cache = QueryCache::new();
    let key = TestKey::Volatile;

    let _ = cache
      .fetch(&key, || async { Err::<u32, _>(unavailable()) })
      .await;
    assert!(cache.last_error(&key).is_some());

    cache
      .fetch(&key, || async { Ok::<_, ApiError>(1u32) })
      .await
      .unwrap();
    assert!(cache.last_error(&key).is_none());
  }

  #[tokio::test]
  async fn test_invalidate_forces_refetch() {
    let cache = QueryCache::new();
    let calls = Arc::new(AtomicU32::new(0));
    let key = TestKey::Fresh("a");

    cache
      .fetch(&key, counting_fetcher(&calls, Duration::ZERO))
      .await
      .unwrap();
    assert!(cache.invalidate(&key));
    assert!(cache.is_invalidated(&key));
    assert_eq!(cache.generation(&key), 1);

    // Value stays readable while stale
    assert_eq!(*cache.peek::<u32>(&key).unwrap().data, 1);

    let result = cache
      .fetch(&key, counting_fetcher(&calls, Duration::ZERO))
      .await
      .unwrap();
    assert_eq!(*result.data, 2);
    assert!(!cache.is_invalidated(&key));
  }

  #[tokio::test]
  async fn test_invalidate_unknown_key_is_noop() {
    let cache: QueryCache<TestKey> = QueryCache::new();
    assert!(!cache.invalidate(&TestKey::Volatile));
    assert!(cache.is_empty());
  }

  #[tokio::test]
  async fn test_invalidate_where_matches_predicate() {
    let cache = QueryCache::new();
    for key in [TestKey::Fresh("a"), TestKey::Fresh("b"), TestKey::Volatile] {
      cache
        .fetch(&key, || async { Ok::<_, ApiError>(0u32) })
        .await
        .unwrap();
    }

    let count = cache.invalidate_where(|k| matches!(k, TestKey::Fresh(_)));
    assert_eq!(count, 2);
    assert!(cache.is_invalidated(&TestKey::Fresh("a")));
    assert!(cache.is_invalidated(&TestKey::Fresh("b")));
    assert!(!cache.is_invalidated(&TestKey::Volatile));
  }

  #[tokio::test]
  async fn test_response_superseded_by_invalidation_is_not_stored() {
    let cache = QueryCache::new();
    let key = TestKey::Fresh("a");

    let slow = {
      let cache = cache.clone();
      let key = key.clone();
      tokio::spawn(async move {
        cache
          .fetch(&key, || async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok::<_, ApiError>("old")
          })
          .await
      })
    };

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(cache.invalidate(&key));

    let fresh = cache
      .fetch(&key, || async { Ok::<_, ApiError>("new") })
      .await
      .unwrap();
    assert_eq!(*fresh.data, "new");

    // The detached request still answers its caller but does not overwrite
    let old = slow.await.unwrap().unwrap();
    assert_eq!(*old.data, "old");
    assert_eq!(*cache.peek::<&str>(&key).unwrap().data, "new");
  }

  #[tokio::test]
  async fn test_type_mismatch_is_error() {
    let cache = QueryCache::new();
    let key = TestKey::Volatile;
    cache
      .fetch(&key, || async { Ok::<_, ApiError>(1u32) })
      .await
      .unwrap();

    assert!(cache.peek::<String>(&key).is_none());
  }

  #[tokio::test]
  async fn test_clear_drops_entries() {
    let cache = QueryCache::new();
    cache
      .fetch(&TestKey::Volatile, || async { Ok::<_, ApiError>(1u32) })
      .await
      .unwrap();
    assert_eq!(cache.len(), 1);
    cache.clear();
    assert!(cache.is_empty());
  }
}
