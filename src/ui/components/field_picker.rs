use super::KeyResult;
use crate::filter::DatasetField;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState};

/// Events emitted by the field picker that parent needs to handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldPickerEvent {
  Selected(DatasetField),
  Cancelled,
}

/// Popup choosing which dataset field the search matches against
#[derive(Debug, Clone, Default)]
pub struct FieldPicker {
  active: bool,
  selected: usize,
}

impl FieldPicker {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn is_active(&self) -> bool {
    self.active
  }

  /// Show the picker with `current` highlighted
  pub fn show(&mut self, current: DatasetField) {
    self.active = true;
    self.selected = DatasetField::all()
      .iter()
      .position(|f| *f == current)
      .unwrap_or(0);
  }

  pub fn hide(&mut self) {
    self.active = false;
  }

  pub fn handle_key(&mut self, key: KeyEvent) -> KeyResult<FieldPickerEvent> {
    if !self.active {
      return KeyResult::NotHandled;
    }

    let fields = DatasetField::all();
    match key.code {
      KeyCode::Esc | KeyCode::Char('q') => {
        self.hide();
        KeyResult::Event(FieldPickerEvent::Cancelled)
      }
      KeyCode::Enter => {
        self.hide();
        match fields.get(self.selected) {
          Some(&field) => KeyResult::Event(FieldPickerEvent::Selected(field)),
          None => KeyResult::Event(FieldPickerEvent::Cancelled),
        }
      }
      KeyCode::Char('j') | KeyCode::Down => {
        self.selected = (self.selected + 1) % fields.len();
        KeyResult::Handled
      }
      KeyCode::Char('k') | KeyCode::Up => {
        self.selected = (self.selected + fields.len() - 1) % fields.len();
        KeyResult::Handled
      }
      _ => KeyResult::Handled,
    }
  }

  pub fn render_overlay(&self, frame: &mut Frame, area: Rect) {
    if !self.active {
      return;
    }

    let fields = DatasetField::all();
    let longest = fields.iter().map(|f| f.label().len()).max().unwrap_or(10) as u16;
    let width = (longest + 6).max(20).min(area.width);
    let height = (fields.len() as u16 + 2).min(area.height);

    let x = area.x + area.width.saturating_sub(width) / 2;
    let y = area.y + area.height.saturating_sub(height) / 2;
    let overlay_area = Rect::new(x, y, width, height);

    frame.render_widget(Clear, overlay_area);

    let block = Block::default()
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Yellow))
      .title(" Search In ");

    let inner = block.inner(overlay_area);
    frame.render_widget(block, overlay_area);

    if inner.height == 0 {
      return;
    }

    let items: Vec<ListItem> = fields
      .iter()
      .map(|field| ListItem::new(Span::styled(field.label(), Style::default().fg(Color::Cyan))))
      .collect();

    let list =
      List::new(items).highlight_style(Style::default().bg(Color::DarkGray).fg(Color::White));

    let mut state = ListState::default();
    state.select(Some(self.selected));

    frame.render_stateful_widget(list, inner, &mut state);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crossterm::event::KeyModifiers;

  fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  #[test]
  fn test_inactive_passes_keys_through() {
    let mut picker = FieldPicker::new();
    assert_eq!(picker.handle_key(key(KeyCode::Enter)), KeyResult::NotHandled);
  }

  #[test]
  fn test_select_next_field() {
    let mut picker = FieldPicker::new();
    picker.show(DatasetField::All);
    picker.handle_key(key(KeyCode::Down));
    assert_eq!(
      picker.handle_key(key(KeyCode::Enter)),
      KeyResult::Event(FieldPickerEvent::Selected(DatasetField::DatasetId))
    );
    assert!(!picker.is_active());
  }

  #[test]
  fn test_opens_on_current_and_wraps() {
    let mut picker = FieldPicker::new();
    picker.show(DatasetField::Title);
    picker.handle_key(key(KeyCode::Char('j')));
    assert_eq!(
      picker.handle_key(key(KeyCode::Enter)),
      KeyResult::Event(FieldPickerEvent::Selected(DatasetField::All))
    );
  }

  #[test]
  fn test_escape_cancels() {
    let mut picker = FieldPicker::new();
    picker.show(DatasetField::All);
    assert_eq!(
      picker.handle_key(key(KeyCode::Esc)),
      KeyResult::Event(FieldPickerEvent::Cancelled)
    );
  }
}
