use crate::api::types::{HealthStatus, RefreshResult, SummaryView, TelemetrySnapshot, TrendSample};
use crate::api::{ApiQueryKey, CachedApiClient};
use crate::query::{Mutation, Query};
use crate::refresh::RefreshTrigger;
use crate::ui::renderfns::{freshness_tag, health_color, truncate};
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crate::view_model::{
  format_datetime, SummaryDisplay, TelemetryDisplay, TrendDisplay, PLACEHOLDER,
};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Gauge, Paragraph, Wrap};

/// Sources refreshed by `r`
const ISS_SOURCES: &[&str] = &["iss"];

/// ISS position, movement trend, and the cross-source summary
pub struct SpaceView {
  trigger: RefreshTrigger,
  health: Query<HealthStatus>,
  telemetry: Query<TelemetrySnapshot>,
  trend: Query<TrendSample>,
  summary: Query<SummaryView>,
  refresh: Mutation<RefreshResult>,
  fetch_now: Mutation<TelemetrySnapshot>,
  /// Outcome of the last user-triggered action
  notice: Option<Result<String, String>>,
}

impl SpaceView {
  pub fn new(api: CachedApiClient) -> Self {
    let cache = api.cache().clone();

    let health_api = api.clone();
    let mut health = Query::new(cache.clone(), ApiQueryKey::Health, move |freshness| {
      let api = health_api.clone();
      async move { api.health(freshness).await }
    });

    let telemetry_api = api.clone();
    let mut telemetry = Query::new(cache.clone(), ApiQueryKey::LastTelemetry, move |freshness| {
      let api = telemetry_api.clone();
      async move { api.last_telemetry(freshness).await }
    });

    let trend_api = api.clone();
    let mut trend = Query::new(cache.clone(), ApiQueryKey::Trend, move |freshness| {
      let api = trend_api.clone();
      async move { api.trend(freshness).await }
    });

    let summary_api = api.clone();
    let mut summary = Query::new(cache, ApiQueryKey::Summary, move |freshness| {
      let api = summary_api.clone();
      async move { api.summary(freshness).await }
    });

    health.fetch();
    telemetry.fetch();
    trend.fetch();
    summary.fetch();

    Self {
      trigger: RefreshTrigger::new(&api),
      health,
      telemetry,
      trend,
      summary,
      refresh: Mutation::new(),
      fetch_now: Mutation::new(),
      notice: None,
    }
  }

  fn start_refresh(&mut self) {
    let trigger = self.trigger.clone();
    let sources: Vec<String> = ISS_SOURCES.iter().map(|s| s.to_string()).collect();
    if self
      .refresh
      .start(async move { trigger.refresh(&sources).await })
    {
      self.notice = None;
    }
  }

  fn start_fetch_now(&mut self) {
    let trigger = self.trigger.clone();
    if self
      .fetch_now
      .start(async move { trigger.fetch_telemetry_now().await })
    {
      self.notice = None;
    }
  }

  fn is_busy(&self) -> bool {
    self.refresh.is_pending() || self.fetch_now.is_pending()
  }

  fn render_health(&self, frame: &mut Frame, area: Rect) {
    let line = match (self.health.data(), self.health.error()) {
      (Some(health), error) => {
        let mut spans = vec![
          Span::raw(" Backend "),
          Span::styled(
            format!(" {} ", health.status.to_uppercase()),
            Style::default()
              .fg(Color::Black)
              .bg(health_color(&health.status))
              .bold(),
          ),
          Span::styled(
            format!("  server time {}", format_datetime(Some(health.now.as_str()))),
            Style::default().fg(Color::DarkGray),
          ),
        ];
        if error.is_some() {
          spans.push(Span::styled("  (unreachable, last known)", Style::default().fg(Color::Red)));
        }
        Line::from(spans)
      }
      (None, Some(error)) => Line::from(vec![
        Span::raw(" Backend "),
        Span::styled(" DOWN ", Style::default().fg(Color::Black).bg(Color::Red).bold()),
        Span::styled(format!("  {}", error), Style::default().fg(Color::Red)),
      ]),
      (None, None) => Line::from(Span::styled(
        " Checking backend...",
        Style::default().fg(Color::DarkGray),
      )),
    };

    let block = Block::default()
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));
    frame.render_widget(Paragraph::new(line).block(block), area);
  }

  fn render_iss(&self, frame: &mut Frame, area: Rect) {
    let loading = self.telemetry.is_loading() || self.trend.is_loading() || self.is_busy();
    let title = format!(
      " ISS {}{} ",
      freshness_tag(
        self.telemetry.source(),
        self.telemetry.is_stale_with_error(),
        self.telemetry.fetched_at(),
      ),
      if loading { " (loading...)" } else { "" }
    );
    let block = Block::default()
      .title(title)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let (Some(snapshot), Some(trend)) = (self.telemetry.data(), self.trend.data()) else {
      let message = match self.telemetry.error().or(self.trend.error()) {
        Some(error) => format!("No data: {}", error),
        None => "Loading...".to_string(),
      };
      frame.render_widget(
        Paragraph::new(message)
          .style(Style::default().fg(Color::DarkGray))
          .wrap(Wrap { trim: true }),
        inner,
      );
      return;
    };

    let position = TelemetryDisplay::from_snapshot(snapshot);
    let movement = TrendDisplay::from_sample(trend);

    let label = Style::default().fg(Color::DarkGray);
    let value = Style::default().fg(Color::White).bold();
    let mut lines = vec![
      Line::from(vec![
        Span::styled("Latitude   ", label),
        Span::styled(format!("{:<12}", position.latitude), value),
        Span::styled("Longitude  ", label),
        Span::styled(position.longitude, value),
      ]),
      Line::from(vec![
        Span::styled("Altitude   ", label),
        Span::styled(format!("{:<12}", format!("{} km", position.altitude)), value),
        Span::styled("Velocity   ", label),
        Span::styled(format!("{} km/h", position.velocity), value),
      ]),
      Line::from(vec![
        Span::styled("Fetched    ", label),
        Span::raw(position.fetched_at),
      ]),
      Line::raw(""),
      Line::from(vec![
        Span::styled("Trend      ", label),
        Span::styled(
          format!(" {} ", movement.movement),
          Style::default()
            .fg(Color::Black)
            .bg(if movement.moving { Color::Green } else { Color::Gray }),
        ),
      ]),
      Line::from(vec![
        Span::styled("Moved      ", label),
        Span::raw(format!("{} km in {} s", movement.delta_km, movement.dt_sec)),
      ]),
    ];

    if let Some(velocity) = &movement.velocity {
      lines.push(Line::from(vec![
        Span::styled("Speed      ", label),
        Span::raw(format!("{} km/h  ({} m/s)", velocity.kmh, velocity.ms)),
      ]));
    }

    if let Some(notice) = &self.notice {
      lines.push(Line::raw(""));
      lines.push(match notice {
        Ok(message) => Line::styled(message.clone(), Style::default().fg(Color::Green)),
        Err(message) => Line::styled(message.clone(), Style::default().fg(Color::Red)),
      });
    }

    let gauge_height = if movement.velocity.is_some() { 1 } else { 0 };
    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([Constraint::Min(0), Constraint::Length(gauge_height)])
      .split(inner);

    frame.render_widget(Paragraph::new(lines), chunks[0]);

    if let Some(velocity) = &movement.velocity {
      let gauge = Gauge::default()
        .gauge_style(Style::default().fg(Color::Cyan).bg(Color::Black))
        .ratio(velocity.gauge_percent / 100.0)
        .label(format!("{:.0}%", velocity.gauge_percent));
      frame.render_widget(gauge, chunks[1]);
    }
  }

  fn render_summary(&self, frame: &mut Frame, area: Rect) {
    let title = format!(
      " Space summary {}{} ",
      freshness_tag(
        self.summary.source(),
        self.summary.is_stale_with_error(),
        self.summary.fetched_at(),
      ),
      if self.summary.is_loading() { " (loading...)" } else { "" }
    );
    let block = Block::default()
      .title(title)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    let Some(summary) = self.summary.data() else {
      let message = match self.summary.error() {
        Some(error) => format!("No data: {}", error),
        None => "Loading...".to_string(),
      };
      frame.render_widget(
        Paragraph::new(message)
          .block(block)
          .style(Style::default().fg(Color::DarkGray))
          .wrap(Wrap { trim: true }),
        area,
      );
      return;
    };

    let display = SummaryDisplay::from_summary(summary);
    let width = area.width.saturating_sub(16) as usize;
    let label = Style::default().fg(Color::DarkGray);
    let row = |name: &'static str, value: String| {
      Line::from(vec![
        Span::styled(format!("{:<14}", name), label),
        Span::raw(truncate(&value, width)),
      ])
    };
    let or_placeholder = |value: Option<String>| value.unwrap_or_else(|| PLACEHOLDER.to_string());

    let lines = vec![
      row("APOD", or_placeholder(display.apod_title)),
      row("", or_placeholder(display.apod_url.or(display.apod_thumbnail_url))),
      row("Near-Earth", format!("{} objects", display.neo_count)),
      row("Solar flares", display.flare_count.to_string()),
      row("CMEs", display.cme_count.to_string()),
      row("SpaceX", display.spacex_name),
      row("", format_datetime(display.spacex_date.as_deref())),
      row(
        "ISS",
        format!(
          "{:.1} km  {:.0} km/h",
          display.iss_altitude, display.iss_velocity
        ),
      ),
      row("OSDR", format!("{} datasets", display.osdr_count)),
      row("Updated", display.updated),
    ];

    frame.render_widget(Paragraph::new(lines).block(block), area);
  }
}

impl View for SpaceView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Char('r') => self.start_refresh(),
      KeyCode::Char('f') => self.start_fetch_now(),
      KeyCode::Char('R') => {
        self.health.refetch();
        self.telemetry.refetch();
        self.trend.refetch();
        self.summary.refetch();
      }
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let rows = Layout::default()
      .direction(Direction::Vertical)
      .constraints([Constraint::Length(3), Constraint::Min(0)])
      .split(area);
    let columns = Layout::default()
      .direction(Direction::Horizontal)
      .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
      .split(rows[1]);

    self.render_health(frame, rows[0]);
    self.render_iss(frame, columns[0]);
    self.render_summary(frame, columns[1]);
  }

  fn breadcrumb_label(&self) -> String {
    "Space".to_string()
  }

  fn status(&self) -> Option<String> {
    self
      .telemetry
      .error()
      .or(self.trend.error())
      .or(self.summary.error())
      .map(|e| e.to_string())
  }

  fn tick(&mut self) {
    self.health.poll();
    self.telemetry.poll();
    self.trend.poll();
    self.summary.poll();

    if let Some(outcome) = self.refresh.poll() {
      self.notice = Some(
        outcome
          .map(|r| format!("Refreshed: {}", r.refreshed.join(", ")))
          .map_err(|e| format!("Refresh failed: {}", e)),
      );
    }
    if let Some(outcome) = self.fetch_now.poll() {
      self.notice = Some(
        outcome
          .map(|s| format!("New reading #{}", s.id))
          .map_err(|e| format!("Fetch failed: {}", e)),
      );
    }
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("r", "refresh iss").with_priority(20),
      ShortcutInfo::new("f", "fetch now").with_priority(30),
      ShortcutInfo::new("R", "reload").with_priority(40),
      ShortcutInfo::new("q", "quit").with_priority(90),
    ]
  }
}
