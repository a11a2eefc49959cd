//! Display-ready fields derived from backend payloads.
//!
//! Every extractor here is total: missing or mistyped fields fall back to a
//! per-field default and nothing can fail.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;

use crate::api::types::{DatasetRecord, SourceSlot, SummaryView, TelemetrySnapshot, TrendSample};

/// Shown wherever a value is absent
pub const PLACEHOLDER: &str = "—";

const NO_DATA: &str = "No data";
const UNTITLED: &str = "Untitled";
const UNKNOWN_STATUS: &str = "unknown";

static NULL: Value = Value::Null;

/// Walk a dotted path (`"payload.items.0.name"`) through objects and arrays.
///
/// Returns `None` when any step is missing, has the wrong shape, or the
/// final value is `null`.
pub fn safe_get<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
  let mut current = value;
  for segment in path.split('.').filter(|s| !s.is_empty()) {
    current = match current {
      Value::Object(map) => map.get(segment)?,
      Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
      _ => return None,
    };
  }
  (!current.is_null()).then_some(current)
}

pub fn str_at(value: &Value, path: &str) -> Option<String> {
  safe_get(value, path)
    .and_then(Value::as_str)
    .map(str::to_string)
}

pub fn str_or(value: &Value, path: &str, default: &str) -> String {
  str_at(value, path).unwrap_or_else(|| default.to_string())
}

pub fn f64_or(value: &Value, path: &str, default: f64) -> f64 {
  safe_get(value, path)
    .and_then(Value::as_f64)
    .unwrap_or(default)
}

pub fn u64_or(value: &Value, path: &str, default: u64) -> u64 {
  safe_get(value, path)
    .and_then(|v| {
      v.as_u64()
        .or_else(|| v.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
    })
    .unwrap_or(default)
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
  let raw = raw.trim();
  DateTime::parse_from_rfc3339(raw)
    .map(|dt| dt.with_timezone(&Utc))
    .ok()
    .or_else(|| {
      // Backend rows without an offset are UTC
      NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
    })
}

fn format_timestamp(raw: Option<&str>, format: &str) -> String {
  raw
    .and_then(parse_timestamp)
    .map(|dt| dt.format(format).to_string())
    .unwrap_or_else(|| PLACEHOLDER.to_string())
}

/// `2024-01-01`, or the placeholder when absent or unparsable
pub fn format_date(raw: Option<&str>) -> String {
  format_timestamp(raw, "%Y-%m-%d")
}

/// `2024-01-01 12:00:00 UTC`, or the placeholder when absent or unparsable
pub fn format_datetime(raw: Option<&str>) -> String {
  format_timestamp(raw, "%Y-%m-%d %H:%M:%S UTC")
}

/// `12:00:00`, or the placeholder when absent or unparsable
pub fn format_time(raw: Option<&str>) -> String {
  format_timestamp(raw, "%H:%M:%S")
}

fn fixed(value: Option<f64>, decimals: usize) -> String {
  match value {
    Some(v) => format!("{:.*}", decimals, v),
    None => PLACEHOLDER.to_string(),
  }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
  value.map(str::trim).filter(|v| !v.is_empty())
}

// ============================================================================
// Summary
// ============================================================================

/// Space summary card
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryDisplay {
  pub apod_title: Option<String>,
  pub apod_url: Option<String>,
  pub apod_thumbnail_url: Option<String>,
  pub neo_count: u64,
  pub flare_count: usize,
  pub cme_count: usize,
  pub spacex_name: String,
  pub spacex_date: Option<String>,
  /// km
  pub iss_altitude: f64,
  /// km/h
  pub iss_velocity: f64,
  pub osdr_count: u64,
  /// Time of the latest ISS entry
  pub updated: String,
}

impl SummaryDisplay {
  pub fn from_summary(summary: &SummaryView) -> Self {
    let apod = slot_payload(&summary.apod);
    let spacex = slot_payload(&summary.spacex);
    let iss = slot_payload(&summary.iss);

    Self {
      apod_title: str_at(apod, "title"),
      apod_url: str_at(apod, "url"),
      apod_thumbnail_url: str_at(apod, "thumbnail_url"),
      neo_count: u64_or(slot_payload(&summary.neo), "element_count", 0),
      flare_count: event_count(&summary.flr),
      cme_count: event_count(&summary.cme),
      spacex_name: str_or(spacex, "name", NO_DATA),
      spacex_date: str_at(spacex, "date_utc"),
      iss_altitude: f64_or(iss, "altitude", 0.0),
      iss_velocity: f64_or(iss, "velocity", 0.0),
      osdr_count: summary.osdr_count,
      updated: format_time(summary.iss.at.as_deref()),
    }
  }
}

fn slot_payload(slot: &SourceSlot) -> &Value {
  slot.payload.as_ref().unwrap_or(&NULL)
}

/// Sources report either a list of events or a single event object
fn event_count(slot: &SourceSlot) -> usize {
  match &slot.payload {
    Some(Value::Array(events)) => events.len(),
    Some(Value::Null) | None => 0,
    Some(_) => 1,
  }
}

// ============================================================================
// Datasets
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusTone {
  Complete,
  Error,
  Other,
}

impl StatusTone {
  fn of(status: &str) -> Self {
    let status = status.to_lowercase();
    if status.contains("complete") {
      StatusTone::Complete
    } else if status.contains("error") {
      StatusTone::Error
    } else {
      StatusTone::Other
    }
  }
}

/// One row of the dataset table
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetRow {
  /// `dataset_id`, or `#<id>` when the catalog has none
  pub key: String,
  pub title: String,
  pub status: String,
  pub tone: StatusTone,
  pub updated: String,
  pub inserted: String,
  pub rest_url: Option<String>,
}

impl DatasetRow {
  pub fn from_record(record: &DatasetRecord) -> Self {
    let key = match non_blank(record.dataset_id.as_deref()) {
      Some(id) => id.to_string(),
      None => format!("#{}", record.id),
    };
    let status = non_blank(record.status.as_deref())
      .unwrap_or(UNKNOWN_STATUS)
      .to_string();

    Self {
      key,
      title: non_blank(record.title.as_deref())
        .unwrap_or(UNTITLED)
        .to_string(),
      tone: StatusTone::of(&status),
      status,
      updated: format_date(record.updated_at.as_deref()),
      inserted: format_date(record.inserted_at.as_deref()),
      rest_url: rest_url(record).map(str::to_string),
    }
  }
}

/// Upstream REST link carried in the raw catalog blob
pub fn rest_url(record: &DatasetRecord) -> Option<&str> {
  safe_get(&record.raw, "REST_URL").and_then(Value::as_str)
}

// ============================================================================
// ISS
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryDisplay {
  pub latitude: String,
  pub longitude: String,
  pub altitude: String,
  pub velocity: String,
  pub fetched_at: String,
}

impl TelemetryDisplay {
  pub fn from_snapshot(snapshot: &TelemetrySnapshot) -> Self {
    let payload = &snapshot.payload;
    Self {
      latitude: fixed(payload.latitude, 4),
      longitude: fixed(payload.longitude, 4),
      altitude: fixed(payload.altitude, 1),
      velocity: fixed(payload.velocity, 0),
      fetched_at: format_datetime(snapshot.fetched_at.as_deref()),
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VelocityDisplay {
  pub kmh: String,
  pub ms: String,
  /// 0..=100
  pub gauge_percent: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrendDisplay {
  pub moving: bool,
  pub movement: &'static str,
  pub delta_km: String,
  pub dt_sec: String,
  /// Present only when two samples were available to diff
  pub velocity: Option<VelocityDisplay>,
}

impl TrendDisplay {
  pub fn from_sample(trend: &TrendSample) -> Self {
    let velocity = trend.velocity_kmh.map(|kmh| VelocityDisplay {
      kmh: format!("{:.0}", kmh),
      ms: format!("{:.1}", kmh / 3.6),
      gauge_percent: (kmh / 30.0).clamp(0.0, 100.0),
    });

    Self {
      moving: trend.movement,
      movement: if trend.movement { "MOVING" } else { "STATIONARY" },
      delta_km: format!("{:.3}", trend.delta_km),
      dt_sec: format!("{:.1}", trend.dt_sec),
      velocity,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_safe_get_paths() {
    let value = json!({
      "payload": { "items": [{ "name": "first" }], "empty": null, "n": 3 }
    });
    assert_eq!(
      safe_get(&value, "payload.items.0.name"),
      Some(&json!("first"))
    );
    assert_eq!(safe_get(&value, "payload.items.1.name"), None);
    assert_eq!(safe_get(&value, "payload.items.x"), None);
    assert_eq!(safe_get(&value, "payload.empty"), None);
    assert_eq!(safe_get(&value, "payload.n.deeper"), None);
    assert_eq!(safe_get(&Value::Null, "a.b"), None);

    assert_eq!(str_or(&value, "payload.n", "none"), "none");
    assert_eq!(f64_or(&value, "payload.n", 0.0), 3.0);
    assert_eq!(u64_or(&value, "payload.missing", 9), 9);
  }

  #[test]
  fn test_empty_summary_uses_defaults() {
    let summary: SummaryView = serde_json::from_str("{}").unwrap();
    let display = SummaryDisplay::from_summary(&summary);

    assert_eq!(display.apod_title, None);
    assert_eq!(display.apod_url, None);
    assert_eq!(display.apod_thumbnail_url, None);
    assert_eq!(display.neo_count, 0);
    assert_eq!(display.flare_count, 0);
    assert_eq!(display.cme_count, 0);
    assert_eq!(display.spacex_name, "No data");
    assert_eq!(display.spacex_date, None);
    assert_eq!(display.iss_altitude, 0.0);
    assert_eq!(display.iss_velocity, 0.0);
    assert_eq!(display.osdr_count, 0);
    assert_eq!(display.updated, PLACEHOLDER);
  }

  #[test]
  fn test_populated_summary() {
    let summary: SummaryView = serde_json::from_value(json!({
      "apod": { "at": "2024-05-01T10:00:00Z", "payload": { "title": "M31", "url": "https://apod/m31.jpg" } },
      "neo": { "payload": { "element_count": 14 } },
      "flr": { "payload": [{ "classType": "M1" }, { "classType": "X2" }] },
      "cme": { "payload": { "activityID": "CME-1" } },
      "spacex": { "payload": { "name": "Starlink 6-1", "date_utc": "2024-05-02T00:00:00Z" } },
      "iss": { "at": "2024-05-01T10:15:30Z", "payload": { "altitude": 418.2, "velocity": 27600 } },
      "osdr_count": 512
    }))
    .unwrap();
    let display = SummaryDisplay::from_summary(&summary);

    assert_eq!(display.apod_title.as_deref(), Some("M31"));
    assert_eq!(display.neo_count, 14);
    assert_eq!(display.flare_count, 2);
    assert_eq!(display.cme_count, 1);
    assert_eq!(display.spacex_name, "Starlink 6-1");
    assert_eq!(display.spacex_date.as_deref(), Some("2024-05-02T00:00:00Z"));
    assert_eq!(display.iss_altitude, 418.2);
    assert_eq!(display.iss_velocity, 27600.0);
    assert_eq!(display.osdr_count, 512);
    assert_eq!(display.updated, "10:15:30");
  }

  #[test]
  fn test_mistyped_summary_fields_fall_back() {
    let summary: SummaryView = serde_json::from_value(json!({
      "neo": { "payload": "not an object" },
      "spacex": { "payload": { "name": 42 } },
      "iss": { "at": "yesterday", "payload": { "altitude": "high" } }
    }))
    .unwrap();
    let display = SummaryDisplay::from_summary(&summary);

    assert_eq!(display.neo_count, 0);
    assert_eq!(display.spacex_name, "No data");
    assert_eq!(display.iss_altitude, 0.0);
    assert_eq!(display.updated, PLACEHOLDER);
  }

  #[test]
  fn test_sparse_record_row() {
    let record: DatasetRecord = serde_json::from_str(
      r#"{"id":7,"dataset_id":null,"title":null,"inserted_at":"2024-01-01T00:00:00Z","raw":{}}"#,
    )
    .unwrap();
    let row = DatasetRow::from_record(&record);

    assert_eq!(row.key, "#7");
    assert_eq!(row.title, "Untitled");
    assert_eq!(row.status, "unknown");
    assert_eq!(row.tone, StatusTone::Other);
    assert_eq!(row.updated, PLACEHOLDER);
    assert_eq!(row.inserted, "2024-01-01");
    assert_eq!(row.rest_url, None);
  }

  #[test]
  fn test_full_record_row() {
    let record = DatasetRecord {
      id: 3,
      dataset_id: Some("OSD-379".to_string()),
      title: Some("Rodent Research".to_string()),
      status: Some("Processing Complete".to_string()),
      updated_at: Some("2024-03-05T08:00:00".to_string()),
      inserted_at: Some("not a date".to_string()),
      raw: json!({ "REST_URL": "https://osdr.nasa.gov/OSD-379" }),
    };
    let row = DatasetRow::from_record(&record);

    assert_eq!(row.key, "OSD-379");
    assert_eq!(row.tone, StatusTone::Complete);
    assert_eq!(row.updated, "2024-03-05");
    assert_eq!(row.inserted, PLACEHOLDER);
    assert_eq!(row.rest_url.as_deref(), Some("https://osdr.nasa.gov/OSD-379"));
  }

  #[test]
  fn test_status_tones() {
    assert_eq!(StatusTone::of("COMPLETE"), StatusTone::Complete);
    assert_eq!(StatusTone::of("ingest error"), StatusTone::Error);
    assert_eq!(StatusTone::of("public"), StatusTone::Other);
  }

  #[test]
  fn test_telemetry_formatting() {
    let snapshot: TelemetrySnapshot = serde_json::from_str(
      r#"{"id":1,"fetched_at":"2024-05-01T10:00:00Z","payload":{"latitude":51.50123,"longitude":-0.12,"velocity":27612.6}}"#,
    )
    .unwrap();
    let display = TelemetryDisplay::from_snapshot(&snapshot);

    assert_eq!(display.latitude, "51.5012");
    assert_eq!(display.longitude, "-0.1200");
    assert_eq!(display.altitude, PLACEHOLDER);
    assert_eq!(display.velocity, "27613");
    assert_eq!(display.fetched_at, "2024-05-01 10:00:00 UTC");
  }

  #[test]
  fn test_trend_without_velocity_has_no_section() {
    let trend: TrendSample =
      serde_json::from_str(r#"{"movement":false,"delta_km":0,"dt_sec":10}"#).unwrap();
    let display = TrendDisplay::from_sample(&trend);

    assert_eq!(display.movement, "STATIONARY");
    assert_eq!(display.delta_km, "0.000");
    assert_eq!(display.dt_sec, "10.0");
    assert!(display.velocity.is_none());
  }

  #[test]
  fn test_trend_velocity_section() {
    let trend = TrendSample {
      movement: true,
      delta_km: 76.55,
      dt_sec: 10.0,
      velocity_kmh: Some(27_558.0),
      ..TrendSample::default()
    };
    let display = TrendDisplay::from_sample(&trend);
    let velocity = display.velocity.unwrap();

    assert_eq!(display.movement, "MOVING");
    assert_eq!(velocity.kmh, "27558");
    assert_eq!(velocity.ms, "7655.0");
    assert_eq!(velocity.gauge_percent, 100.0);

    let slow = TrendDisplay::from_sample(&TrendSample {
      velocity_kmh: Some(1500.0),
      ..TrendSample::default()
    });
    assert_eq!(slow.velocity.unwrap().gauge_percent, 50.0);
  }
}
