use crate::api::error::ApiError;
use crate::api::types::{
  DatasetPage, DatasetQuery, HealthStatus, RefreshResult, ResourceCacheEntry, SummaryView,
  SyncResult, TelemetrySnapshot, TrendSample,
};
use crate::config::ApiConfig;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Longest backend error body carried into an error message
const MAX_ERROR_BODY: usize = 200;

/// Upper bound for a single retry wait
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Backend REST API client
#[derive(Clone)]
pub struct ApiClient {
  http: reqwest::Client,
  base: Url,
  timeout: Duration,
  max_retries: u32,
  retry_delay: Duration,
}

impl ApiClient {
  pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
    let base = Url::parse(&config.base_url)
      .map_err(|e| ApiError::InvalidUrl(format!("{}: {}", config.base_url, e)))?;
    if base.cannot_be_a_base() {
      return Err(ApiError::InvalidUrl(config.base_url.clone()));
    }

    let timeout = config.timeout();
    let http = reqwest::Client::builder()
      .timeout(timeout)
      .build()
      .map_err(ApiError::HttpClient)?;

    Ok(Self {
      http,
      base,
      timeout,
      max_retries: config.max_retries,
      retry_delay: config.retry_delay(),
    })
  }

  /// Base URL requests are issued against
  pub fn base_url(&self) -> &Url {
    &self.base
  }

  /// Backend liveness
  pub async fn health(&self) -> Result<HealthStatus, ApiError> {
    self.get(self.endpoint(&["health"])?).await
  }

  /// Most recent stored ISS reading
  pub async fn last_telemetry(&self) -> Result<TelemetrySnapshot, ApiError> {
    self.get(self.endpoint(&["last"])?).await
  }

  /// Ask the backend to poll the tracker now; returns the new reading
  pub async fn trigger_telemetry_fetch(&self) -> Result<TelemetrySnapshot, ApiError> {
    self.get(self.endpoint(&["fetch"])?).await
  }

  /// Movement between the two latest readings
  pub async fn trend(&self) -> Result<TrendSample, ApiError> {
    self.get(self.endpoint(&["iss", "trend"])?).await
  }

  /// Pull the OSDR catalog into the backend store
  pub async fn sync_dataset_catalog(&self) -> Result<SyncResult, ApiError> {
    self.get(self.endpoint(&["osdr", "sync"])?).await
  }

  /// One page of the OSDR catalog
  pub async fn list_datasets(&self, query: &DatasetQuery) -> Result<DatasetPage, ApiError> {
    let mut url = self.endpoint(&["osdr", "list"])?;
    {
      let mut pairs = url.query_pairs_mut();
      for (name, value) in query.query_pairs() {
        pairs.append_pair(name, &value);
      }
    }
    self.get(url).await
  }

  /// Latest cached response for a named upstream source
  pub async fn resource_cache(&self, source: &str) -> Result<ResourceCacheEntry, ApiError> {
    self.get(self.endpoint(&["space", source, "latest"])?).await
  }

  /// Refresh the named upstream sources on the backend
  pub async fn refresh_sources(&self, sources: &[String]) -> Result<RefreshResult, ApiError> {
    let mut url = self.endpoint(&["space", "refresh"])?;
    url
      .query_pairs_mut()
      .append_pair("src", &sources.join(","));
    self.get(url).await
  }

  /// Latest entry per source plus the dataset count
  pub async fn summary(&self) -> Result<SummaryView, ApiError> {
    self.get(self.endpoint(&["space", "summary"])?).await
  }

  /// Build an endpoint URL below the base path.
  /// Each segment is percent-encoded, so user input cannot add path levels.
  fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
    let mut url = self.base.clone();
    url
      .path_segments_mut()
      .map_err(|_| ApiError::InvalidUrl(self.base.to_string()))?
      .pop_if_empty()
      .extend(segments);
    Ok(url)
  }

  /// GET with retries on transport failures
  async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, ApiError> {
    let mut attempt = 0u32;
    loop {
      match self.get_once(&url).await {
        Err(e) if e.is_transport() && attempt < self.max_retries => {
          let backoff = backoff(self.retry_delay, attempt);
          attempt += 1;
          warn!(
            url = %url,
            attempt,
            max_retries = self.max_retries,
            backoff_ms = backoff.as_millis() as u64,
            "Transport error, retrying: {}",
            e
          );
          tokio::time::sleep(backoff).await;
        }
        Ok(value) => {
          if attempt > 0 {
            debug!(url = %url, attempt, "Request succeeded after retry");
          }
          return Ok(value);
        }
        Err(e) => return Err(e),
      }
    }
  }

  async fn get_once<T: DeserializeOwned>(&self, url: &Url) -> Result<T, ApiError> {
    debug!(url = %url, "GET");

    let response = self
      .http
      .get(url.clone())
      .send()
      .await
      .map_err(|e| self.transport_error(url, e))?;

    let status = response.status();
    let body = response
      .text()
      .await
      .map_err(|e| self.transport_error(url, e))?;

    if !status.is_success() {
      return Err(ApiError::Status {
        status: status.as_u16(),
        url: url.to_string(),
        message: error_message(&body, status),
      });
    }

    serde_json::from_str(&body).map_err(|source| ApiError::Decode {
      url: url.to_string(),
      source,
    })
  }

  fn transport_error(&self, url: &Url, source: reqwest::Error) -> ApiError {
    if source.is_timeout() {
      ApiError::Timeout {
        url: url.to_string(),
        timeout: self.timeout,
      }
    } else {
      ApiError::Transport {
        url: url.to_string(),
        source,
      }
    }
  }
}

/// Backend errors come back as plain text; fall back to the status reason
fn error_message(body: &str, status: reqwest::StatusCode) -> String {
  let body = body.trim();
  if body.is_empty() {
    return status
      .canonical_reason()
      .unwrap_or("unknown error")
      .to_string();
  }
  match body.char_indices().nth(MAX_ERROR_BODY) {
    Some((idx, _)) => format!("{}...", &body[..idx]),
    None => body.to_string(),
  }
}

/// `base * 2^attempt`, saturating and capped at `MAX_BACKOFF`
fn backoff(base: Duration, attempt: u32) -> Duration {
  base
    .saturating_mul(2u32.saturating_pow(attempt))
    .min(MAX_BACKOFF)
}
