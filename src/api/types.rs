//! Serde-deserializable types matching backend responses.
//!
//! Every optional field defaults when missing so that sparse payloads decode
//! instead of failing; display-side fallbacks live in `view_model`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// `GET /health`
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct HealthStatus {
  #[serde(default)]
  pub status: String,
  #[serde(default)]
  pub now: String,
}

/// One fetched reading of the ISS position
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct TelemetrySnapshot {
  pub id: i64,
  #[serde(default)]
  pub fetched_at: Option<String>,
  #[serde(default)]
  pub source_url: Option<String>,
  #[serde(default)]
  pub payload: TelemetryPayload,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct TelemetryPayload {
  #[serde(default)]
  pub latitude: Option<f64>,
  #[serde(default)]
  pub longitude: Option<f64>,
  #[serde(default)]
  pub altitude: Option<f64>,
  #[serde(default)]
  pub velocity: Option<f64>,
  // Upstream passes through whatever the tracker API returned
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

/// Comparison between the two most recent snapshots.
///
/// The optional group is only present when two samples were available to diff.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct TrendSample {
  #[serde(default)]
  pub movement: bool,
  #[serde(default)]
  pub delta_km: f64,
  #[serde(default)]
  pub dt_sec: f64,
  #[serde(default)]
  pub velocity_kmh: Option<f64>,
  #[serde(default)]
  pub from_time: Option<String>,
  #[serde(default)]
  pub to_time: Option<String>,
  #[serde(default)]
  pub from_lat: Option<f64>,
  #[serde(default)]
  pub from_lon: Option<f64>,
  #[serde(default)]
  pub to_lat: Option<f64>,
  #[serde(default)]
  pub to_lon: Option<f64>,
}

/// `GET /osdr/sync`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct SyncResult {
  #[serde(default)]
  pub written: u64,
}

/// One OSDR catalog entry
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct DatasetRecord {
  pub id: i64,
  #[serde(default)]
  pub dataset_id: Option<String>,
  #[serde(default)]
  pub title: Option<String>,
  #[serde(default)]
  pub status: Option<String>,
  #[serde(default)]
  pub updated_at: Option<String>,
  #[serde(default)]
  pub inserted_at: Option<String>,
  #[serde(default)]
  pub raw: Value,
}

/// `GET /osdr/list`
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct DatasetPage {
  #[serde(default)]
  pub items: Vec<DatasetRecord>,
}

/// Latest cached upstream response for a named source
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ResourceCacheEntry {
  #[serde(default)]
  pub source: String,
  #[serde(default)]
  pub fetched_at: Option<String>,
  #[serde(default)]
  pub payload: Value,
}

/// `GET /space/refresh`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct RefreshResult {
  #[serde(default)]
  pub refreshed: Vec<String>,
}

/// Latest entry of a single source inside the summary
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct SourceSlot {
  #[serde(default)]
  pub at: Option<String>,
  #[serde(default)]
  pub payload: Option<Value>,
}

/// `GET /space/summary`
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct SummaryView {
  #[serde(default)]
  pub apod: SourceSlot,
  #[serde(default)]
  pub neo: SourceSlot,
  #[serde(default)]
  pub flr: SourceSlot,
  #[serde(default)]
  pub cme: SourceSlot,
  #[serde(default)]
  pub spacex: SourceSlot,
  #[serde(default)]
  pub iss: SourceSlot,
  #[serde(default)]
  pub osdr_count: u64,
}

// ============================================================================
// Dataset list parameters
// ============================================================================

/// Columns the backend accepts for `sort_by`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
  Id,
  DatasetId,
  Title,
  Status,
  UpdatedAt,
  InsertedAt,
}

impl SortField {
  pub fn as_str(&self) -> &'static str {
    match self {
      SortField::Id => "id",
      SortField::DatasetId => "dataset_id",
      SortField::Title => "title",
      SortField::Status => "status",
      SortField::UpdatedAt => "updated_at",
      SortField::InsertedAt => "inserted_at",
    }
  }

  pub fn label(&self) -> &'static str {
    match self {
      SortField::Id => "Record ID",
      SortField::DatasetId => "Dataset ID",
      SortField::Title => "Title",
      SortField::Status => "Status",
      SortField::UpdatedAt => "Updated",
      SortField::InsertedAt => "Inserted",
    }
  }

  pub fn all() -> &'static [SortField] {
    &[
      SortField::InsertedAt,
      SortField::UpdatedAt,
      SortField::DatasetId,
      SortField::Title,
      SortField::Status,
      SortField::Id,
    ]
  }

  /// Next field in display order, wrapping around
  pub fn next(&self) -> SortField {
    let all = Self::all();
    let idx = all.iter().position(|f| f == self).unwrap_or(0);
    all[(idx + 1) % all.len()]
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
  Asc,
  Desc,
}

impl SortOrder {
  pub fn as_str(&self) -> &'static str {
    match self {
      SortOrder::Asc => "asc",
      SortOrder::Desc => "desc",
    }
  }

  pub fn toggled(&self) -> SortOrder {
    match self {
      SortOrder::Asc => SortOrder::Desc,
      SortOrder::Desc => SortOrder::Asc,
    }
  }
}

/// Parameters of `GET /osdr/list`. Part of the dataset list cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct DatasetQuery {
  pub limit: u32,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub sort_by: Option<SortField>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub order: Option<SortOrder>,
}

impl DatasetQuery {
  pub const DEFAULT_LIMIT: u32 = 20;

  pub fn with_limit(limit: u32) -> Self {
    Self {
      limit,
      ..Self::default()
    }
  }

  pub fn sorted(mut self, sort_by: SortField, order: SortOrder) -> Self {
    self.sort_by = Some(sort_by);
    self.order = Some(order);
    self
  }

  /// Query-string pairs, omitting unset parameters
  pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
    let mut pairs = vec![("limit", self.limit.to_string())];
    if let Some(sort_by) = self.sort_by {
      pairs.push(("sort_by", sort_by.as_str().to_string()));
    }
    if let Some(order) = self.order {
      pairs.push(("order", order.as_str().to_string()));
    }
    pairs
  }
}

impl Default for DatasetQuery {
  fn default() -> Self {
    Self {
      limit: Self::DEFAULT_LIMIT,
      sort_by: None,
      order: None,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_empty_summary_decodes_to_defaults() {
    let summary: SummaryView = serde_json::from_str("{}").unwrap();
    assert_eq!(summary, SummaryView::default());
    assert_eq!(summary.osdr_count, 0);
    assert!(summary.iss.payload.is_none());
  }

  #[test]
  fn test_sparse_dataset_record_decodes() {
    let json = r#"{"id":7,"dataset_id":null,"title":null,"inserted_at":"2024-01-01T00:00:00Z","raw":{}}"#;
    let record: DatasetRecord = serde_json::from_str(json).unwrap();
    assert_eq!(record.id, 7);
    assert!(record.dataset_id.is_none());
    assert!(record.status.is_none());
    assert_eq!(record.inserted_at.as_deref(), Some("2024-01-01T00:00:00Z"));
  }

  #[test]
  fn test_trend_without_velocity_group() {
    let trend: TrendSample =
      serde_json::from_str(r#"{"movement":false,"delta_km":0,"dt_sec":10}"#).unwrap();
    assert!(!trend.movement);
    assert_eq!(trend.dt_sec, 10.0);
    assert!(trend.velocity_kmh.is_none());
    assert!(trend.from_time.is_none());
  }

  #[test]
  fn test_telemetry_payload_keeps_open_fields() {
    let json = r#"{"id":1,"fetched_at":"2024-05-01T10:00:00Z","source_url":"x",
      "payload":{"latitude":51.5,"visibility":"daylight"}}"#;
    let snapshot: TelemetrySnapshot = serde_json::from_str(json).unwrap();
    assert_eq!(snapshot.payload.latitude, Some(51.5));
    assert!(snapshot.payload.altitude.is_none());
    assert_eq!(
      snapshot.payload.extra.get("visibility"),
      Some(&Value::String("daylight".to_string()))
    );
  }

  #[test]
  fn test_dataset_query_pairs_omit_unset() {
    assert_eq!(
      DatasetQuery::with_limit(5).query_pairs(),
      vec![("limit", "5".to_string())]
    );

    let sorted = DatasetQuery::default().sorted(SortField::DatasetId, SortOrder::Asc);
    assert_eq!(
      sorted.query_pairs(),
      vec![
        ("limit", "20".to_string()),
        ("sort_by", "dataset_id".to_string()),
        ("order", "asc".to_string()),
      ]
    );
  }

  #[test]
  fn test_sort_field_cycles() {
    let mut field = SortField::InsertedAt;
    for _ in 0..SortField::all().len() {
      field = field.next();
    }
    assert_eq!(field, SortField::InsertedAt);
  }
}
