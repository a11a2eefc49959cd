//! Error types for the backend API client.

use std::time::Duration;
use thiserror::Error;

/// Errors returned by [`super::ApiClient`].
///
/// Missing fields in an otherwise valid payload are not errors; they are
/// handled by the view-model defaults.
#[derive(Error, Debug)]
pub enum ApiError {
  /// Base URL could not be parsed or cannot carry path segments.
  #[error("Invalid base URL: {0}")]
  InvalidUrl(String),

  /// The HTTP client itself could not be constructed.
  #[error("Failed to build HTTP client: {0}")]
  HttpClient(#[source] reqwest::Error),

  /// Request did not complete within the configured timeout.
  #[error("Request to {url} timed out after {timeout:?}")]
  Timeout { url: String, timeout: Duration },

  /// Connection, DNS, TLS or body transfer failure.
  #[error("Transport error for {url}: {source}")]
  Transport {
    url: String,
    #[source]
    source: reqwest::Error,
  },

  /// Backend answered with a non-2xx status.
  #[error("API error ({status}) at {url}: {message}")]
  Status {
    status: u16,
    url: String,
    message: String,
  },

  /// Body was not the JSON shape we expected.
  #[error("Invalid response from {url}: {source}")]
  Decode {
    url: String,
    #[source]
    source: serde_json::Error,
  },

  /// A cache entry was read back as a different type than it was stored with.
  #[error("Cached value for {key} has an unexpected type")]
  CacheMismatch { key: String },
}

impl ApiError {
  /// Transport-level failures are retried; backend and decode errors are not.
  pub fn is_transport(&self) -> bool {
    matches!(self, Self::Timeout { .. } | Self::Transport { .. })
  }

  /// HTTP status for backend errors.
  pub fn status(&self) -> Option<u16> {
    match self {
      Self::Status { status, .. } => Some(*status),
      _ => None,
    }
  }
}
