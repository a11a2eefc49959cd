use crate::cache::CacheSource;
use crate::view_model::StatusTone;
use chrono::{DateTime, Utc};
use ratatui::prelude::Color;

/// Truncate to at most `max_len` characters, ending in "..." when cut
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    return s.to_string();
  }
  let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
  format!("{}...", kept)
}

/// Display color for a dataset status
pub fn tone_color(tone: StatusTone) -> Color {
  match tone {
    StatusTone::Complete => Color::Green,
    StatusTone::Error => Color::Red,
    StatusTone::Other => Color::Gray,
  }
}

/// Display color for the backend health badge
pub fn health_color(status: &str) -> Color {
  match status.to_lowercase().as_str() {
    "ok" | "healthy" | "up" => Color::Green,
    "" => Color::DarkGray,
    _ => Color::Yellow,
  }
}

/// Short tag describing where a displayed value came from
pub fn source_label(source: Option<CacheSource>) -> &'static str {
  match source {
    Some(CacheSource::Network) => "live",
    Some(CacheSource::CacheFresh) => "cached",
    Some(CacheSource::Offline) => "stale",
    None => "",
  }
}

/// Title tag for a query's value: origin plus fetch time, e.g. "live 10:04:05".
///
/// A failed latest attempt marks the value stale whatever its origin.
pub fn freshness_tag(
  source: Option<CacheSource>,
  stale_with_error: bool,
  fetched_at: Option<DateTime<Utc>>,
) -> String {
  let label = if stale_with_error {
    source_label(Some(CacheSource::Offline))
  } else {
    source_label(source)
  };
  match fetched_at {
    Some(at) if !label.is_empty() => format!("{} {}", label, at.format("%H:%M:%S")),
    _ => label.to_string(),
  }
}
