use crate::api::types::{DatasetPage, DatasetQuery, DatasetRecord, SortField, SortOrder, SyncResult};
use crate::api::{ApiQueryKey, CachedApiClient, Freshness};
use crate::cache::{CacheResult, SharedError};
use crate::filter::{filter_datasets, DatasetField};
use crate::query::{Mutation, Query};
use crate::refresh::RefreshTrigger;
use crate::ui::components::{FieldPicker, FieldPickerEvent, KeyResult, SearchEvent, SearchInput};
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::{freshness_tag, tone_color, truncate};
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crate::ui::views::DatasetDetailView;
use crate::view_model::DatasetRow;
use crossterm::event::{KeyCode, KeyEvent};
use futures::future::{BoxFuture, FutureExt};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState};

/// Page sizes offered by `l`
const LIMITS: [u32; 4] = [10, 20, 50, 100];

/// Next page size after `current`, wrapping to the smallest
fn next_limit(current: u32) -> u32 {
  LIMITS
    .iter()
    .copied()
    .find(|&limit| limit > current)
    .unwrap_or(LIMITS[0])
}

/// `None` starts at the first field; the last field wraps back to unsorted
fn next_sort(current: Option<SortField>) -> Option<SortField> {
  let all = SortField::all();
  match current {
    None => all.first().copied(),
    Some(field) if Some(&field) == all.last() => None,
    Some(field) => Some(field.next()),
  }
}

fn toggle_order(current: Option<SortOrder>) -> Option<SortOrder> {
  Some(current.map_or(SortOrder::Desc, |order| order.toggled()))
}

fn page_loader(
  api: &CachedApiClient,
  params: DatasetQuery,
) -> impl Fn(Freshness) -> BoxFuture<'static, Result<CacheResult<DatasetPage>, SharedError>>
     + Send
     + Sync
     + 'static {
  let api = api.clone();
  move |freshness| {
    let api = api.clone();
    async move { api.datasets(params, freshness).await }.boxed()
  }
}

/// OSDR dataset catalog
pub struct DatasetListView {
  api: CachedApiClient,
  trigger: RefreshTrigger,
  params: DatasetQuery,
  /// Page size restored by reset
  default_limit: u32,
  // Data
  query: Query<DatasetPage>,
  sync: Mutation<SyncResult>,
  notice: Option<Result<String, String>>,
  // UI state
  table_state: TableState,
  field: DatasetField,
  // Components
  search: SearchInput,
  picker: FieldPicker,
}

impl DatasetListView {
  pub fn new(api: CachedApiClient, limit: u32) -> Self {
    let params = DatasetQuery::with_limit(limit);
    let mut query = Query::new(
      api.cache().clone(),
      ApiQueryKey::DatasetList(params),
      page_loader(&api, params),
    );
    query.fetch();

    Self {
      trigger: RefreshTrigger::new(&api),
      api,
      params,
      default_limit: limit,
      query,
      sync: Mutation::new(),
      notice: None,
      table_state: TableState::default(),
      field: DatasetField::default(),
      search: SearchInput::new(),
      picker: FieldPicker::new(),
    }
  }

  fn items(&self) -> &[DatasetRecord] {
    self.query.data().map(|page| page.items.as_slice()).unwrap_or(&[])
  }

  fn visible(&self) -> Vec<&DatasetRecord> {
    filter_datasets(self.items(), self.search.query(), self.field)
  }

  fn set_params(&mut self, params: DatasetQuery) {
    if params == self.params {
      return;
    }
    self.params = params;
    self
      .query
      .set_key(ApiQueryKey::DatasetList(params), page_loader(&self.api, params));
    self.table_state.select(Some(0));
  }

  /// Back to the configured page size, server-default sort, and no search
  fn reset(&mut self) {
    self.set_params(DatasetQuery::with_limit(self.default_limit));
    self.search.clear();
    self.field = DatasetField::default();
    self.table_state.select(Some(0));
  }

  fn start_sync(&mut self) {
    let trigger = self.trigger.clone();
    if self
      .sync
      .start(async move { trigger.sync_catalog().await })
    {
      self.notice = None;
    }
  }

  fn params_label(&self) -> String {
    let sort = match (self.params.sort_by, self.params.order) {
      (Some(field), Some(order)) => format!("{} {}", field.label(), order.as_str()),
      (Some(field), None) => field.label().to_string(),
      (None, Some(order)) => format!("default {}", order.as_str()),
      (None, None) => "default".to_string(),
    };
    format!("limit {} | sort {}", self.params.limit, sort)
  }

  fn render_table(&mut self, frame: &mut Frame, area: Rect) {
    let rows: Vec<DatasetRow> = self.visible().into_iter().map(DatasetRow::from_record).collect();
    ensure_valid_selection(&mut self.table_state, rows.len());

    let mut title = format!(" OSDR datasets ({}/{}) ", rows.len(), self.items().len());
    if self.query.is_loading() || self.sync.is_pending() {
      title.push_str("(loading...) ");
    } else if let Some(error) = self.query.error() {
      title.push_str(&format!("(error: {}) ", error));
    }

    let mut block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue))
      .title_bottom(Line::from(format!(
        " {} {} ",
        self.params_label(),
        freshness_tag(
          self.query.source(),
          self.query.is_stale_with_error(),
          self.query.fetched_at(),
        )
      )));
    if !self.search.query().is_empty() {
      block = block.title_bottom(
        Line::from(format!(" /{} in {} ", self.search.query(), self.field.label())).right_aligned(),
      );
    }

    if rows.is_empty() && !self.query.is_loading() {
      let content = if self.query.error().is_some() {
        "Failed to load datasets. Press 'R' to retry."
      } else if self.items().is_empty() {
        "Catalog is empty. Press 'r' to sync from OSDR."
      } else {
        "No datasets match the search."
      };
      let paragraph = Paragraph::new(content)
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    }

    let title_width = area.width.saturating_sub(60).max(10) as usize;
    let table_rows: Vec<Row> = rows
      .iter()
      .map(|row| {
        Row::new(vec![
          Cell::from(truncate(&row.key, 16)).style(Style::default().fg(Color::Cyan)),
          Cell::from(truncate(&row.title, title_width)),
          Cell::from(truncate(&row.status, 12)).style(Style::default().fg(tone_color(row.tone))),
          Cell::from(row.updated.clone()),
          Cell::from(row.inserted.clone()),
        ])
      })
      .collect();

    let header = Row::new(["Dataset", "Title", "Status", "Updated", "Inserted"])
      .style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD));

    let table = Table::new(
      table_rows,
      [
        Constraint::Length(16),
        Constraint::Min(10),
        Constraint::Length(12),
        Constraint::Length(10),
        Constraint::Length(10),
      ],
    )
    .header(header)
    .block(block)
    .row_highlight_style(
      Style::default()
        .bg(Color::DarkGray)
        .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("> ");

    frame.render_stateful_widget(table, area, &mut self.table_state);
  }
}

impl View for DatasetListView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match self.picker.handle_key(key) {
      KeyResult::Event(FieldPickerEvent::Selected(field)) => {
        self.field = field;
        return ViewAction::None;
      }
      KeyResult::Event(FieldPickerEvent::Cancelled) | KeyResult::Handled => return ViewAction::None,
      KeyResult::NotHandled => {}
    }

    match self.search.handle_key(key) {
      KeyResult::Event(SearchEvent::Changed(_)) => {
        self.table_state.select(Some(0));
        return ViewAction::None;
      }
      KeyResult::Event(SearchEvent::Submitted) | KeyResult::Handled => return ViewAction::None,
      KeyResult::NotHandled => {}
    }

    match key.code {
      KeyCode::Char('j') | KeyCode::Down => self.table_state.select_next(),
      KeyCode::Char('k') | KeyCode::Up => self.table_state.select_previous(),
      KeyCode::Char('s') => {
        let params = DatasetQuery {
          sort_by: next_sort(self.params.sort_by),
          ..self.params
        };
        self.set_params(params);
      }
      KeyCode::Char('o') => {
        let params = DatasetQuery {
          order: toggle_order(self.params.order),
          ..self.params
        };
        self.set_params(params);
      }
      KeyCode::Char('l') => {
        let params = DatasetQuery {
          limit: next_limit(self.params.limit),
          ..self.params
        };
        self.set_params(params);
      }
      KeyCode::Char('f') => self.picker.show(self.field),
      KeyCode::Char('x') => self.reset(),
      KeyCode::Char('r') => self.start_sync(),
      KeyCode::Char('R') => self.query.refetch(),
      KeyCode::Enter => {
        let selected = self
          .table_state
          .selected()
          .and_then(|idx| self.visible().get(idx).map(|record| (*record).clone()));
        if let Some(record) = selected {
          return ViewAction::Push(Box::new(DatasetDetailView::new(record)));
        }
      }
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let chunks = match &self.notice {
      Some(_) => Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(1)])
        .split(area),
      None => Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0)])
        .split(area),
    };

    self.render_table(frame, chunks[0]);

    if let (Some(notice), Some(area)) = (&self.notice, chunks.get(1)) {
      let line = match notice {
        Ok(message) => Line::styled(message.clone(), Style::default().fg(Color::Green)),
        Err(message) => Line::styled(message.clone(), Style::default().fg(Color::Red)),
      };
      frame.render_widget(Paragraph::new(line), *area);
    }

    self.search.render_overlay(frame, area, self.field.label());
    self.picker.render_overlay(frame, area);
  }

  fn breadcrumb_label(&self) -> String {
    "OSDR".to_string()
  }

  fn captures_input(&self) -> bool {
    self.search.is_active() || self.picker.is_active()
  }

  fn status(&self) -> Option<String> {
    self.query.error().map(|e| e.to_string())
  }

  fn tick(&mut self) {
    self.query.poll();

    if let Some(outcome) = self.sync.poll() {
      self.notice = Some(
        outcome
          .map(|r| format!("Synced {} datasets", r.written))
          .map_err(|e| format!("Sync failed: {}", e)),
      );
    }
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("/", "search").with_priority(20),
      ShortcutInfo::new("f", "field").with_priority(30),
      ShortcutInfo::new("s", "sort").with_priority(40),
      ShortcutInfo::new("o", "order").with_priority(41),
      ShortcutInfo::new("l", "limit").with_priority(42),
      ShortcutInfo::new("x", "reset").with_priority(43),
      ShortcutInfo::new("r", "sync").with_priority(50),
      ShortcutInfo::new("R", "reload").with_priority(60),
      ShortcutInfo::new("q", "quit").with_priority(90),
    ]
  }
}
