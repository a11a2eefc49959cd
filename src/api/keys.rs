//! Cache keys and freshness policy for backend resources.

use crate::cache::{QueryKey, QueryPolicy};

use super::types::DatasetQuery;

/// Logical resources of the backend API.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ApiQueryKey {
  Health,
  LastTelemetry,
  Trend,
  /// Page parameters are part of the identity
  DatasetList(DatasetQuery),
  /// Latest cached response of a named upstream source
  ResourceCache(String),
  Summary,
}

impl ApiQueryKey {
  pub fn resource_cache(source: impl Into<String>) -> Self {
    Self::ResourceCache(source.into())
  }

  /// Keys a source refresh makes stale: the sources themselves plus every
  /// view derived from more than one source.
  pub fn refresh_dependents(sources: &[String]) -> Vec<ApiQueryKey> {
    let mut keys: Vec<ApiQueryKey> = sources
      .iter()
      .map(|s| ApiQueryKey::ResourceCache(s.clone()))
      .collect();
    keys.extend([
      ApiQueryKey::Summary,
      ApiQueryKey::LastTelemetry,
      ApiQueryKey::Trend,
    ]);
    keys
  }
}

impl QueryKey for ApiQueryKey {
  fn policy(&self) -> QueryPolicy {
    match self {
      Self::Health => QueryPolicy::new(15_000, Some(30_000)),
      Self::LastTelemetry => QueryPolicy::new(5_000, Some(10_000)),
      Self::Trend => QueryPolicy::new(7_000, Some(15_000)),
      Self::DatasetList(_) => QueryPolicy::new(60_000, None),
      Self::Summary => QueryPolicy::new(30_000, Some(60_000)),
      Self::ResourceCache(_) => QueryPolicy::always_revalidate(),
    }
  }

  fn description(&self) -> String {
    match self {
      Self::Health => "health".to_string(),
      Self::LastTelemetry => "iss last".to_string(),
      Self::Trend => "iss trend".to_string(),
      Self::DatasetList(query) => {
        let mut desc = format!("osdr list limit={}", query.limit);
        if let Some(sort_by) = query.sort_by {
          desc.push_str(&format!(" sort_by={}", sort_by.as_str()));
        }
        if let Some(order) = query.order {
          desc.push_str(&format!(" order={}", order.as_str()));
        }
        desc
      }
      Self::ResourceCache(source) => format!("space {}", source),
      Self::Summary => "space summary".to_string(),
    }
  }
}
