mod api;
mod app;
mod cache;
mod commands;
mod config;
mod event;
mod filter;
mod logging;
mod query;
mod refresh;
mod ui;
mod view_model;

use clap::Parser;
use color_eyre::Result;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "orbitdash")]
#[command(about = "A terminal dashboard for ISS telemetry and NASA open science data")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/orbitdash/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Backend base URL, e.g. http://localhost:8080/api
  #[arg(short, long, env = config::BASE_URL_ENV)]
  base_url: Option<String>,

  /// Directory for log files (default: $XDG_DATA_HOME/orbitdash)
  #[arg(long)]
  log_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let config = config::Config::load(args.config.as_deref())?.with_base_url(args.base_url);
  config.validate()?;

  // Logs go to a file; the terminal belongs to the UI
  let _guard = logging::init(args.log_dir)?;

  // Initialize and run the app
  let mut app = app::App::new(config)?;
  app.run().await?;

  Ok(())
}
