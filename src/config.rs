use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding `api.base_url`
pub const BASE_URL_ENV: &str = "ORBITDASH_API_BASE";

/// Highest accepted `api.max_retries`
const MAX_RETRIES_LIMIT: u32 = 10;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub api: ApiConfig,
  #[serde(default)]
  pub datasets: DatasetsConfig,
  /// Custom title for header (defaults to the backend host if not set)
  pub title: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
  /// Base URL every endpoint path is appended to
  pub base_url: String,
  pub timeout_secs: u64,
  /// Automatic retries on transport failure
  pub max_retries: u32,
  /// First retry delay; doubles on each further retry
  pub retry_delay_ms: u64,
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      base_url: "http://localhost:8080/api".to_string(),
      timeout_secs: 10,
      max_retries: 2,
      retry_delay_ms: 500,
    }
  }
}

impl ApiConfig {
  pub fn timeout(&self) -> Duration {
    Duration::from_secs(self.timeout_secs)
  }

  pub fn retry_delay(&self) -> Duration {
    Duration::from_millis(self.retry_delay_ms)
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatasetsConfig {
  /// Initial page size of the OSDR list
  pub limit: u32,
}

impl Default for DatasetsConfig {
  fn default() -> Self {
    Self { limit: 20 }
  }
}

impl Config {
  /// Load configuration from file, falling back to defaults.
  ///
  /// Search order:
  /// 1. Explicit path if provided (must exist)
  /// 2. ./orbitdash.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/orbitdash/config.yaml
  /// 4. Built-in defaults
  ///
  /// `ORBITDASH_API_BASE` then overrides the base URL.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    let config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => Config::default(),
    };

    let config = config.with_base_url(std::env::var(BASE_URL_ENV).ok());
    config.validate()?;
    Ok(config)
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("orbitdash.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("orbitdash").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents).map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self> {
    // An empty file is valid and means "all defaults"
    if contents.trim().is_empty() {
      return Ok(Config::default());
    }
    Ok(serde_yaml::from_str(contents)?)
  }

  /// Replace the base URL when an override is given. Blank overrides are ignored.
  pub fn with_base_url(mut self, base_url: Option<String>) -> Self {
    if let Some(url) = base_url.map(|u| u.trim().to_string()) {
      if !url.is_empty() {
        self.api.base_url = url;
      }
    }
    self
  }

  pub fn validate(&self) -> Result<()> {
    if self.api.timeout_secs == 0 {
      return Err(eyre!("api.timeout_secs must be greater than zero"));
    }
    if self.datasets.limit == 0 {
      return Err(eyre!("datasets.limit must be greater than zero"));
    }
    if self.api.max_retries > MAX_RETRIES_LIMIT {
      return Err(eyre!(
        "api.max_retries must be at most {} (got {})",
        MAX_RETRIES_LIMIT,
        self.api.max_retries
      ));
    }
    Ok(())
  }

  /// Header label
  pub fn display_title(&self) -> String {
    if let Some(title) = &self.title {
      return title.clone();
    }
    url::Url::parse(&self.api.base_url)
      .ok()
      .and_then(|u| {
        u.host_str().map(|h| match u.port() {
          Some(port) => format!("{}:{}", h, port),
          None => h.to_string(),
        })
      })
      .unwrap_or_else(|| self.api.base_url.clone())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_defaults() {
    let config = Config::default();
    assert_eq!(config.api.base_url, "http://localhost:8080/api");
    assert_eq!(config.api.timeout(), Duration::from_secs(10));
    assert_eq!(config.api.max_retries, 2);
    assert_eq!(config.datasets.limit, 20);
  }

  #[test]
  fn test_parse_partial_yaml() {
    let config = Config::parse(
      "api:\n  base_url: https://space.example.com/api\n  timeout_secs: 5\ntitle: Mission control\n",
    )
    .unwrap();
    assert_eq!(config.api.base_url, "https://space.example.com/api");
    assert_eq!(config.api.timeout_secs, 5);
    assert_eq!(config.api.max_retries, 2);
    assert_eq!(config.datasets.limit, 20);
    assert_eq!(config.display_title(), "Mission control");
  }

  #[test]
  fn test_parse_empty_file() {
    let config = Config::parse("  \n").unwrap();
    assert_eq!(config.api.base_url, ApiConfig::default().base_url);
  }

  #[test]
  fn test_parse_rejects_bad_types() {
    assert!(Config::parse("api:\n  timeout_secs: soon\n").is_err());
  }

  #[test]
  fn test_base_url_override() {
    let config = Config::default()
      .with_base_url(Some("http://10.0.0.5:3000/api".to_string()));
    assert_eq!(config.api.base_url, "http://10.0.0.5:3000/api");
    assert_eq!(config.display_title(), "10.0.0.5:3000");

    let config = Config::default().with_base_url(Some("  ".to_string()));
    assert_eq!(config.api.base_url, ApiConfig::default().base_url);

    let config = Config::default().with_base_url(None);
    assert_eq!(config.display_title(), "localhost:8080");
  }

  #[test]
  fn test_zero_timeout_rejected() {
    let mut config = Config::default();
    assert!(config.validate().is_ok());
    config.api.timeout_secs = 0;
    assert!(config.validate().is_err());
  }

  #[test]
  fn test_max_retries_bounded() {
    let mut config = Config::default();
    config.api.max_retries = MAX_RETRIES_LIMIT;
    assert!(config.validate().is_ok());
    config.api.max_retries = 40;
    assert!(config.validate().is_err());
  }

  #[test]
  fn test_missing_explicit_path_is_error() {
    let result = Config::load(Some(Path::new("/nonexistent/orbitdash.yaml")));
    assert!(result.is_err());
  }
}
