use crate::api::types::DatasetRecord;
use crate::ui::renderfns::tone_color;
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crate::view_model::{format_datetime, DatasetRow, PLACEHOLDER};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};

/// One catalog entry with its raw upstream document
pub struct DatasetDetailView {
  record: DatasetRecord,
  row: DatasetRow,
  raw: String,
  scroll: u16,
}

impl DatasetDetailView {
  pub fn new(record: DatasetRecord) -> Self {
    let raw = serde_json::to_string_pretty(&record.raw).unwrap_or_else(|_| record.raw.to_string());
    Self {
      row: DatasetRow::from_record(&record),
      record,
      raw,
      scroll: 0,
    }
  }

  fn render_fields(&self, frame: &mut Frame, area: Rect) {
    let label = Style::default().fg(Color::DarkGray);
    let field = |name: &'static str, value: String| {
      Line::from(vec![Span::styled(format!("{:<11}", name), label), Span::raw(value)])
    };

    let lines = vec![
      field("Dataset", self.row.key.clone()),
      field("Title", self.row.title.clone()),
      Line::from(vec![
        Span::styled(format!("{:<11}", "Status"), label),
        Span::styled(self.row.status.clone(), Style::default().fg(tone_color(self.row.tone))),
      ]),
      field("Updated", format_datetime(self.record.updated_at.as_deref())),
      field("Inserted", format_datetime(self.record.inserted_at.as_deref())),
      field(
        "REST URL",
        self.row.rest_url.clone().unwrap_or_else(|| PLACEHOLDER.to_string()),
      ),
    ];

    let block = Block::default()
      .title(format!(" {} ", self.row.key))
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));
    frame.render_widget(Paragraph::new(lines).block(block).wrap(Wrap { trim: true }), area);
  }

  fn render_raw(&self, frame: &mut Frame, area: Rect) {
    let block = Block::default()
      .title(" Raw ")
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::DarkGray));
    let paragraph = Paragraph::new(self.raw.as_str())
      .block(block)
      .scroll((self.scroll, 0));
    frame.render_widget(paragraph, area);
  }

  fn max_scroll(&self) -> u16 {
    self.raw.lines().count().saturating_sub(1).min(u16::MAX as usize) as u16
  }
}

impl View for DatasetDetailView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Char('j') | KeyCode::Down => {
        self.scroll = self.scroll.saturating_add(1).min(self.max_scroll());
      }
      KeyCode::Char('k') | KeyCode::Up => {
        self.scroll = self.scroll.saturating_sub(1);
      }
      KeyCode::Char('g') => self.scroll = 0,
      KeyCode::Char('G') => self.scroll = self.max_scroll(),
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([Constraint::Length(8), Constraint::Min(0)])
      .split(area);

    self.render_fields(frame, chunks[0]);
    self.render_raw(frame, chunks[1]);
  }

  fn breadcrumb_label(&self) -> String {
    self.row.key.clone()
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new("j/k", "scroll").with_priority(20),
      ShortcutInfo::new("q", "back").with_priority(90),
    ]
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crossterm::event::KeyModifiers;
  use serde_json::json;

  fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  fn record() -> DatasetRecord {
    DatasetRecord {
      id: 3,
      dataset_id: Some("OSD-3".to_string()),
      raw: json!({"REST_URL": "https://osdr.example/OSD-3", "files": [1, 2]}),
      ..DatasetRecord::default()
    }
  }

  #[test]
  fn test_scroll_is_bounded_by_raw_document() {
    let mut view = DatasetDetailView::new(record());
    let max = view.max_scroll();
    assert!(max > 0);

    view.handle_key(key(KeyCode::Char('k')));
    assert_eq!(view.scroll, 0);

    for _ in 0..100 {
      view.handle_key(key(KeyCode::Char('j')));
    }
    assert_eq!(view.scroll, max);
  }

  #[test]
  fn test_breadcrumb_and_pop() {
    let mut view = DatasetDetailView::new(record());
    assert_eq!(view.breadcrumb_label(), "OSD-3");
    assert!(matches!(view.handle_key(key(KeyCode::Esc)), ViewAction::Pop));
  }
}
