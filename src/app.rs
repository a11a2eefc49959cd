use crate::api::{ApiCache, ApiClient, CachedApiClient};
use crate::commands::{Command, CommandKind};
use crate::config::Config;
use crate::event::{Event, EventHandler};
use crate::ui;
use crate::ui::components::{CommandEvent, CommandInput, KeyResult};
use crate::ui::view::{View, ViewAction};
use crate::ui::views::{DatasetListView, SpaceView};
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use std::io::stdout;
use std::time::Duration;
use tracing::{debug, info};

const TICK_RATE: Duration = Duration::from_millis(250);

/// Main application state
pub struct App {
  /// Navigation stack - root is always at index 0
  view_stack: Vec<Box<dyn View>>,

  /// `:` command palette
  command: CommandInput,

  /// Shared client; every view reads through the same cache
  api: CachedApiClient,

  config: Config,

  /// One-off message shown in the footer until the next key press
  notice: Option<String>,

  should_quit: bool,
}

impl App {
  pub fn new(config: Config) -> Result<Self> {
    let client = ApiClient::new(&config.api)?;
    let api = CachedApiClient::new(client, ApiCache::new());
    info!("Using backend {}", api.inner().base_url());

    let root: Box<dyn View> = Box::new(SpaceView::new(api.clone()));
    Ok(Self {
      view_stack: vec![root],
      command: CommandInput::new(),
      api,
      config,
      notice: None,
      should_quit: false,
    })
  }

  pub async fn run(&mut self) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let result = self.event_loop().await;

    // Restore the terminal even when the loop failed
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
  }

  async fn event_loop(&mut self) -> Result<()> {
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;
    let mut events = EventHandler::new(TICK_RATE);
    let title = self.config.display_title();

    while !self.should_quit {
      terminal.draw(|frame| {
        ui::draw(
          frame,
          &title,
          &mut self.view_stack,
          &self.command,
          self.notice.as_deref(),
        )
      })?;

      match events.next().await {
        Some(Event::Key(key)) => self.handle_key(key),
        Some(Event::Tick) => self.tick(),
        Some(Event::Resize) => {}
        None => break,
      }
    }

    Ok(())
  }

  /// Every view on the stack keeps its queries moving, not only the visible one
  fn tick(&mut self) {
    for view in self.view_stack.iter_mut() {
      view.tick();
    }
  }

  fn handle_key(&mut self, key: KeyEvent) {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
      self.should_quit = true;
      return;
    }
    self.notice = None;

    // The palette only opens when the view isn't typing into something
    let view_captures = self
      .view_stack
      .last()
      .is_some_and(|view| view.captures_input());
    if self.command.is_active() || !view_captures {
      match self.command.handle_key(key) {
        KeyResult::Event(CommandEvent::Run(command)) => {
          self.run_command(command);
          return;
        }
        KeyResult::Event(CommandEvent::Unknown(text)) => {
          if !text.is_empty() {
            self.notice = Some(format!("Unknown command: {}", text));
          }
          return;
        }
        KeyResult::Event(CommandEvent::Cancelled) | KeyResult::Handled => return,
        KeyResult::NotHandled => {}
      }
    }

    let action = match self.view_stack.last_mut() {
      Some(view) => view.handle_key(key),
      None => return,
    };
    self.apply(action);
  }

  fn apply(&mut self, action: ViewAction) {
    match action {
      ViewAction::None => {}
      ViewAction::Push(view) => {
        debug!("Push view {}", view.breadcrumb_label());
        self.view_stack.push(view);
      }
      ViewAction::Pop => {
        if self.view_stack.len() > 1 {
          self.view_stack.pop();
        } else {
          self.should_quit = true;
        }
      }
    }
  }

  /// Root commands replace the whole stack
  fn run_command(&mut self, command: &Command) {
    debug!("Command {}", command.name);
    let root: Box<dyn View> = match command.kind {
      CommandKind::Space => Box::new(SpaceView::new(self.api.clone())),
      CommandKind::Osdr => Box::new(DatasetListView::new(
        self.api.clone(),
        self.config.datasets.limit,
      )),
      CommandKind::Quit => {
        self.should_quit = true;
        return;
      }
    };
    self.view_stack.clear();
    self.view_stack.push(root);
  }
}
