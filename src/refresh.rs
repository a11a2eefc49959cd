//! Backend mutations and the cache entries each one makes stale.

use tracing::{info, warn};

use crate::api::types::{RefreshResult, SyncResult, TelemetrySnapshot};
use crate::api::{ApiCache, ApiClient, ApiError, ApiQueryKey, CachedApiClient};

/// Runs mutations against the backend and invalidates dependent cache keys
/// once they succeed. A failed mutation invalidates nothing.
#[derive(Clone)]
pub struct RefreshTrigger {
  client: ApiClient,
  cache: ApiCache,
}

impl RefreshTrigger {
  pub fn new(api: &CachedApiClient) -> Self {
    Self {
      client: api.inner().clone(),
      cache: api.cache().clone(),
    }
  }

  /// Ask the backend to re-pull the named upstream sources.
  ///
  /// Summary and the ISS entries are derived from several sources, so they
  /// are invalidated whichever sources were named.
  pub async fn refresh(&self, sources: &[String]) -> Result<RefreshResult, ApiError> {
    let result = self
      .client
      .refresh_sources(sources)
      .await
      .inspect_err(|e| warn!(?sources, "Source refresh failed: {}", e))?;

    info!(refreshed = ?result.refreshed, "Sources refreshed");
    for key in ApiQueryKey::refresh_dependents(sources) {
      self.cache.invalidate(&key);
    }
    Ok(result)
  }

  /// Have the backend take a new ISS reading now.
  pub async fn fetch_telemetry_now(&self) -> Result<TelemetrySnapshot, ApiError> {
    let snapshot = self
      .client
      .trigger_telemetry_fetch()
      .await
      .inspect_err(|e| warn!("Telemetry fetch failed: {}", e))?;

    info!(id = snapshot.id, "Telemetry fetched");
    self.cache.invalidate(&ApiQueryKey::LastTelemetry);
    self.cache.invalidate(&ApiQueryKey::Trend);
    Ok(snapshot)
  }

  /// Re-import the OSDR catalog. Every dataset page and the dataset count go stale.
  pub async fn sync_catalog(&self) -> Result<SyncResult, ApiError> {
    let result = self
      .client
      .sync_dataset_catalog()
      .await
      .inspect_err(|e| warn!("Catalog sync failed: {}", e))?;

    info!(written = result.written, "Catalog synced");
    let pages = self
      .cache
      .invalidate_where(|key| matches!(key, ApiQueryKey::DatasetList(_)));
    self.cache.invalidate(&ApiQueryKey::Summary);
    info!(pages, "Dataset pages invalidated");
    Ok(result)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::types::DatasetQuery;
  use crate::api::Freshness;
  use crate::config::ApiConfig;
  use wiremock::matchers::{method, path, query_param};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  fn api(server: &MockServer) -> CachedApiClient {
    let config = ApiConfig {
      base_url: server.uri(),
      retry_delay_ms: 0,
      ..ApiConfig::default()
    };
    CachedApiClient::new(ApiClient::new(&config).unwrap(), ApiCache::new())
  }

  async fn mount_reads(server: &MockServer) {
    let bodies = [
      ("/space/summary", r#"{"osdr_count":1}"#),
      ("/last", r#"{"id":1,"payload":{}}"#),
      ("/iss/trend", r#"{"movement":false,"delta_km":0,"dt_sec":10}"#),
      ("/space/iss/latest", r#"{"source":"iss","payload":{}}"#),
      ("/space/apod/latest", r#"{"source":"apod","payload":{}}"#),
      ("/osdr/list", r#"{"items":[]}"#),
    ];
    for (route, body) in bodies {
      Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
    }
  }

  /// Populate every entry the tests look at
  async fn warm(api: &CachedApiClient) {
    api.summary(Freshness::Cached).await.unwrap();
    api.last_telemetry(Freshness::Cached).await.unwrap();
    api.trend(Freshness::Cached).await.unwrap();
    api.resource_cache("iss", Freshness::Cached).await.unwrap();
    api.resource_cache("apod", Freshness::Cached).await.unwrap();
    api
      .datasets(DatasetQuery::with_limit(10), Freshness::Cached)
      .await
      .unwrap();
    api
      .datasets(DatasetQuery::with_limit(50), Freshness::Cached)
      .await
      .unwrap();
  }

  #[tokio::test]
  async fn test_refresh_invalidates_derived_entries() {
    let server = MockServer::start().await;
    mount_reads(&server).await;
    Mock::given(method("GET"))
      .and(path("/space/refresh"))
      .and(query_param("src", "iss"))
      .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"refreshed":["iss"]}"#))
      .expect(1)
      .mount(&server)
      .await;

    let api = api(&server);
    warm(&api).await;
    let trigger = RefreshTrigger::new(&api);

    let result = trigger.refresh(&["iss".to_string()]).await.unwrap();
    assert_eq!(result.refreshed, vec!["iss".to_string()]);

    let cache = api.cache();
    assert!(cache.is_invalidated(&ApiQueryKey::resource_cache("iss")));
    assert!(cache.is_invalidated(&ApiQueryKey::LastTelemetry));
    assert!(cache.is_invalidated(&ApiQueryKey::Trend));
    assert!(cache.is_invalidated(&ApiQueryKey::Summary));

    assert!(!cache.is_invalidated(&ApiQueryKey::resource_cache("apod")));
    assert!(!cache.is_invalidated(&ApiQueryKey::DatasetList(DatasetQuery::with_limit(10))));
  }

  #[tokio::test]
  async fn test_failed_refresh_invalidates_nothing() {
    let server = MockServer::start().await;
    mount_reads(&server).await;
    Mock::given(method("GET"))
      .and(path("/space/refresh"))
      .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
      .mount(&server)
      .await;

    let api = api(&server);
    warm(&api).await;
    let trigger = RefreshTrigger::new(&api);

    let err = trigger.refresh(&["iss".to_string()]).await.unwrap_err();
    assert_eq!(err.status(), Some(500));

    let cache = api.cache();
    for key in ApiQueryKey::refresh_dependents(&["iss".to_string()]) {
      assert!(!cache.is_invalidated(&key), "{:?}", key);
    }

    // Still served from cache
    let summary = api.summary(Freshness::Cached).await.unwrap();
    assert_eq!(summary.source, crate::cache::CacheSource::CacheFresh);
  }

  #[tokio::test]
  async fn test_fetch_now_invalidates_iss_entries() {
    let server = MockServer::start().await;
    mount_reads(&server).await;
    Mock::given(method("GET"))
      .and(path("/fetch"))
      .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"id":2,"payload":{}}"#))
      .mount(&server)
      .await;

    let api = api(&server);
    warm(&api).await;
    let trigger = RefreshTrigger::new(&api);

    let snapshot = trigger.fetch_telemetry_now().await.unwrap();
    assert_eq!(snapshot.id, 2);

    let cache = api.cache();
    assert!(cache.is_invalidated(&ApiQueryKey::LastTelemetry));
    assert!(cache.is_invalidated(&ApiQueryKey::Trend));
    assert!(!cache.is_invalidated(&ApiQueryKey::Summary));
  }

  #[tokio::test]
  async fn test_sync_invalidates_every_dataset_page() {
    let server = MockServer::start().await;
    mount_reads(&server).await;
    Mock::given(method("GET"))
      .and(path("/osdr/sync"))
      .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"written":12}"#))
      .mount(&server)
      .await;

    let api = api(&server);
    warm(&api).await;
    let trigger = RefreshTrigger::new(&api);

    assert_eq!(trigger.sync_catalog().await.unwrap().written, 12);

    let cache = api.cache();
    assert!(cache.is_invalidated(&ApiQueryKey::DatasetList(DatasetQuery::with_limit(10))));
    assert!(cache.is_invalidated(&ApiQueryKey::DatasetList(DatasetQuery::with_limit(50))));
    assert!(cache.is_invalidated(&ApiQueryKey::Summary));
    assert!(!cache.is_invalidated(&ApiQueryKey::Trend));
  }

  #[tokio::test]
  async fn test_refetch_after_refresh_hits_network() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/space/summary"))
      .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"osdr_count":1}"#))
      .expect(2)
      .mount(&server)
      .await;
    Mock::given(method("GET"))
      .and(path("/space/refresh"))
      .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"refreshed":["neo"]}"#))
      .mount(&server)
      .await;

    let api = api(&server);
    api.summary(Freshness::Cached).await.unwrap();
    RefreshTrigger::new(&api)
      .refresh(&["neo".to_string()])
      .await
      .unwrap();

    let summary = api.summary(Freshness::Cached).await.unwrap();
    assert_eq!(summary.source, crate::cache::CacheSource::Network);
    assert!(!api.cache().is_invalidated(&ApiQueryKey::Summary));
  }
}
