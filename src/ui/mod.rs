pub mod components;
pub mod renderfns;
pub mod view;
pub mod views;

use components::CommandInput;
use ratatui::prelude::*;
use ratatui::widgets::TableState;
use renderfns::{draw_footer, draw_header};
use view::View;

/// Main draw function. The last view on the stack is the visible one.
pub fn draw(
  frame: &mut Frame,
  title: &str,
  views: &mut [Box<dyn View>],
  command: &CommandInput,
  notice: Option<&str>,
) {
  let chunks = Layout::default()
    .direction(Direction::Vertical)
    .constraints([
      Constraint::Length(1), // Header
      Constraint::Min(1),    // Main content
      Constraint::Length(1), // Breadcrumb + status
    ])
    .split(frame.area());

  let breadcrumb: Vec<String> = views.iter().map(|v| v.breadcrumb_label()).collect();

  let Some(current) = views.last_mut() else {
    return;
  };

  draw_header(frame, chunks[0], title, &current.shortcuts());
  current.render(frame, chunks[1]);

  let status = notice.map(str::to_string).or_else(|| current.status());
  draw_footer(frame, chunks[2], &breadcrumb, status.as_deref());

  command.render_overlay(frame, chunks[1]);
}

/// Keep the table selection inside `len` rows, selecting the first row when
/// there is data but nothing selected.
pub fn ensure_valid_selection(state: &mut TableState, len: usize) {
  if len == 0 {
    state.select(None);
    return;
  }
  match state.selected() {
    Some(idx) if idx >= len => state.select(Some(len - 1)),
    None => state.select(Some(0)),
    _ => {}
  }
}
