//! API client with transparent query caching.

use crate::cache::{CacheResult, QueryCache, SharedError};

use super::client::ApiClient;
use super::error::ApiError;
use super::keys::ApiQueryKey;
use super::types::{
  DatasetPage, DatasetQuery, HealthStatus, ResourceCacheEntry, SummaryView, TelemetrySnapshot,
  TrendSample,
};
use std::future::Future;

/// Cache shared by every consumer of the backend API
pub type ApiCache = QueryCache<ApiQueryKey>;

/// How a read may use the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
  /// Serve a value inside its staleness window without a request
  Cached,
  /// Always issue a request (still joins one already in flight)
  Revalidate,
}

/// API client with transparent caching support.
///
/// This wraps the underlying ApiClient and exposes its read endpoints keyed
/// by [`ApiQueryKey`]. Mutations live in [`crate::refresh::RefreshTrigger`].
#[derive(Clone)]
pub struct CachedApiClient {
  inner: ApiClient,
  cache: ApiCache,
}

impl CachedApiClient {
  pub fn new(inner: ApiClient, cache: ApiCache) -> Self {
    Self { inner, cache }
  }

  pub fn inner(&self) -> &ApiClient {
    &self.inner
  }

  pub fn cache(&self) -> &ApiCache {
    &self.cache
  }

  pub async fn health(
    &self,
    freshness: Freshness,
  ) -> Result<CacheResult<HealthStatus>, SharedError> {
    let inner = self.inner.clone();
    self
      .load(&ApiQueryKey::Health, freshness, move || async move {
        inner.health().await
      })
      .await
  }

  pub async fn last_telemetry(
    &self,
    freshness: Freshness,
  ) -> Result<CacheResult<TelemetrySnapshot>, SharedError> {
    let inner = self.inner.clone();
    self
      .load(&ApiQueryKey::LastTelemetry, freshness, move || async move {
        inner.last_telemetry().await
      })
      .await
  }

  pub async fn trend(&self, freshness: Freshness) -> Result<CacheResult<TrendSample>, SharedError> {
    let inner = self.inner.clone();
    self
      .load(&ApiQueryKey::Trend, freshness, move || async move {
        inner.trend().await
      })
      .await
  }

  pub async fn datasets(
    &self,
    query: DatasetQuery,
    freshness: Freshness,
  ) -> Result<CacheResult<DatasetPage>, SharedError> {
    let inner = self.inner.clone();
    self
      .load(
        &ApiQueryKey::DatasetList(query),
        freshness,
        move || async move { inner.list_datasets(&query).await },
      )
      .await
  }

  pub async fn resource_cache(
    &self,
    source: &str,
    freshness: Freshness,
  ) -> Result<CacheResult<ResourceCacheEntry>, SharedError> {
    let inner = self.inner.clone();
    let owned = source.to_string();
    self
      .load(
        &ApiQueryKey::resource_cache(source),
        freshness,
        move || async move { inner.resource_cache(&owned).await },
      )
      .await
  }

  pub async fn summary(&self, freshness: Freshness) -> Result<CacheResult<SummaryView>, SharedError> {
    let inner = self.inner.clone();
    self
      .load(&ApiQueryKey::Summary, freshness, move || async move {
        inner.summary().await
      })
      .await
  }

  async fn load<T, F, Fut>(
    &self,
    key: &ApiQueryKey,
    freshness: Freshness,
    fetcher: F,
  ) -> Result<CacheResult<T>, SharedError>
  where
    T: Send + Sync + 'static,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
  {
    match freshness {
      Freshness::Cached => self.cache.fetch(key, fetcher).await,
      Freshness::Revalidate => self.cache.refetch(key, fetcher).await,
    }
  }
}
