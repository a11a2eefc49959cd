//! Client-side search over the fetched dataset page.

use crate::api::types::DatasetRecord;
use crate::view_model::rest_url;

/// Field a dataset search matches against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DatasetField {
  /// dataset_id, title, or REST URL
  #[default]
  All,
  DatasetId,
  Title,
}

impl DatasetField {
  pub fn label(&self) -> &'static str {
    match self {
      DatasetField::All => "All fields",
      DatasetField::DatasetId => "Dataset ID",
      DatasetField::Title => "Title",
    }
  }

  pub fn all() -> &'static [DatasetField] {
    &[DatasetField::All, DatasetField::DatasetId, DatasetField::Title]
  }

  /// Whether any selected field of the record contains `needle` (already lower-cased)
  fn matches(&self, record: &DatasetRecord, needle: &str) -> bool {
    let contains = |value: Option<&str>| {
      value
        .map(|v| v.to_lowercase().contains(needle))
        .unwrap_or(false)
    };

    match self {
      DatasetField::DatasetId => contains(record.dataset_id.as_deref()),
      DatasetField::Title => contains(record.title.as_deref()),
      DatasetField::All => {
        contains(record.dataset_id.as_deref())
          || contains(record.title.as_deref())
          || contains(rest_url(record))
      }
    }
  }
}

/// Records whose selected field contains `query`, case-insensitively, in original order.
///
/// A blank query returns every record.
pub fn filter_datasets<'a>(
  items: &'a [DatasetRecord],
  query: &str,
  field: DatasetField,
) -> Vec<&'a DatasetRecord> {
  let needle = query.trim().to_lowercase();
  if needle.is_empty() {
    return items.iter().collect();
  }

  items
    .iter()
    .filter(|record| field.matches(record, &needle))
    .collect()
}
