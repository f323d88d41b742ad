use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::resource::ResourceType;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub server: ServerConfig,
  #[serde(default)]
  pub github: GithubConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
  /// Socket address to bind
  pub listen: String,
  /// Accept `Authorization: Bearer <github token>` in addition to the
  /// session cookie
  pub allow_bearer: bool,
  /// Seconds a login (or a resolved bearer token) stays valid
  pub session_ttl: u64,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      listen: "127.0.0.1:5000".to_string(),
      allow_bearer: false,
      session_ttl: 3600,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GithubConfig {
  pub api_url: String,
  pub user_agent: String,
  /// Page size requested from GitHub (max 100)
  pub per_page: u32,
  pub request_timeout_secs: u64,
  /// Refuse a full fetch when fewer core requests than this remain
  pub min_rate_limit_remaining: u64,
  /// How many pull requests get line and commit counts from the detail
  /// endpoint
  pub pull_request_detail_limit: usize,
  pub max_items: MaxItems,
}

impl Default for GithubConfig {
  fn default() -> Self {
    Self {
      api_url: "https://api.github.com".to_string(),
      user_agent: concat!("ghlist/", env!("CARGO_PKG_VERSION")).to_string(),
      per_page: 100,
      request_timeout_secs: 30,
      min_rate_limit_remaining: 100,
      pull_request_detail_limit: 100,
      max_items: MaxItems::default(),
    }
  }
}

/// Upper bound on items fetched per resource type
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct MaxItems {
  pub repositories: usize,
  pub gists: usize,
  pub followers: usize,
  pub pull_requests: usize,
}

impl Default for MaxItems {
  fn default() -> Self {
    Self {
      repositories: 2000,
      gists: 1000,
      followers: 2000,
      pull_requests: 1000,
    }
  }
}

impl MaxItems {
  pub fn for_type(&self, resource_type: ResourceType) -> usize {
    match resource_type {
      ResourceType::Repositories => self.repositories,
      ResourceType::Gists => self.gists,
      ResourceType::Followers => self.followers,
      ResourceType::PullRequests => self.pull_requests,
    }
  }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
  /// In-process map, lost on restart
  #[default]
  Memory,
  /// SQLite file, survives restarts
  Sqlite,
  /// Caching disabled: every request goes upstream
  None,
}

impl std::str::FromStr for CacheBackend {
  type Err = String;

  fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
    match s.trim().to_lowercase().as_str() {
      "memory" | "simple" => Ok(Self::Memory),
      "sqlite" => Ok(Self::Sqlite),
      "none" | "null" => Ok(Self::None),
      other => Err(format!("unknown cache backend: {other}")),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  pub backend: CacheBackend,
  /// SQLite file (default: $XDG_DATA_HOME/ghlist/cache.db)
  pub path: Option<PathBuf>,
  /// Seconds. Rate-limit probe
  pub timeout_short: u64,
  /// Seconds. Repositories, gists, pull requests
  pub timeout_medium: u64,
  /// Seconds. Followers
  pub timeout_long: u64,
  /// Seconds an expired entry is kept for serving when a refresh fails
  pub stale_retention: u64,
  /// Seconds between sweeps of entries past their retention
  pub purge_interval: u64,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      backend: CacheBackend::Memory,
      path: None,
      timeout_short: 60,
      timeout_medium: 3600,
      timeout_long: 3600,
      stale_retention: 86400,
      purge_interval: 600,
    }
  }
}

impl CacheConfig {
  /// Freshness window of a resource type's dataset.
  pub fn ttl_for(&self, resource_type: ResourceType) -> Duration {
    let secs = match resource_type {
      ResourceType::Followers => self.timeout_long,
      ResourceType::Repositories | ResourceType::Gists | ResourceType::PullRequests => {
        self.timeout_medium
      }
    };
    Duration::from_secs(secs)
  }

  pub fn short_ttl(&self) -> Duration {
    Duration::from_secs(self.timeout_short)
  }

  pub fn medium_ttl(&self) -> Duration {
    Duration::from_secs(self.timeout_medium)
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
  /// Default filter when RUST_LOG is unset
  pub level: String,
  /// Also write daily-rotated log files here
  pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
  fn default() -> Self {
    Self {
      level: "info".to_string(),
      directory: None,
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./ghlist.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/ghlist/config.yaml
  ///
  /// Without any file the defaults are used. Environment overrides are
  /// applied last.
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

    let mut config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => Config::default(),
    };
    config.apply_env(|name| std::env::var(name).ok())?;
    config.validate()?;

    Ok(config)
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("ghlist.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("ghlist").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::from_yaml(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn from_yaml(contents: &str) -> std::result::Result<Self, serde_yaml::Error> {
    // An empty file is a valid, all-default config
    if contents.trim().is_empty() {
      return Ok(Config::default());
    }
    serde_yaml::from_str(contents)
  }

  /// Apply `GHLIST_LISTEN`, `GHLIST_CACHE_BACKEND` and `GITHUB_API_URL`.
  fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
    if let Some(listen) = var("GHLIST_LISTEN") {
      self.server.listen = listen;
    }
    if let Some(backend) = var("GHLIST_CACHE_BACKEND") {
      self.cache.backend = backend
        .parse()
        .map_err(|e| eyre!("Invalid GHLIST_CACHE_BACKEND: {}", e))?;
    }
    if let Some(api_url) = var("GITHUB_API_URL") {
      self.github.api_url = api_url;
    }
    Ok(())
  }

  fn validate(&self) -> Result<()> {
    url::Url::parse(&self.github.api_url)
      .map_err(|e| eyre!("Invalid github.api_url {}: {}", self.github.api_url, e))?;

    if self.github.per_page == 0 || self.github.per_page > 100 {
      return Err(eyre!(
        "github.per_page must be between 1 and 100, got {}",
        self.github.per_page
      ));
    }

    if self.server.session_ttl == 0 {
      return Err(eyre!("server.session_ttl must be greater than zero"));
    }

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::HashMap;

  #[test]
  fn test_partial_yaml_keeps_defaults() {
    let config = Config::from_yaml(
      r#"
server:
  listen: "0.0.0.0:8080"
cache:
  backend: sqlite
  timeout_long: 7200
"#,
    )
    .unwrap();

    assert_eq!(config.server.listen, "0.0.0.0:8080");
    assert!(!config.server.allow_bearer);
    assert_eq!(config.cache.backend, CacheBackend::Sqlite);
    assert_eq!(config.cache.timeout_medium, 3600);
    assert_eq!(
      config.cache.ttl_for(ResourceType::Followers),
      Duration::from_secs(7200)
    );
    assert_eq!(config.github.per_page, 100);
    assert_eq!(config.github.max_items.gists, 1000);
  }

  #[test]
  fn test_empty_file_is_default() {
    let config = Config::from_yaml("\n").unwrap();
    assert_eq!(config.cache.backend, CacheBackend::Memory);
    assert_eq!(config.cache.short_ttl(), Duration::from_secs(60));
  }

  #[test]
  fn test_env_overrides() {
    let env: HashMap<&str, &str> = [
      ("GHLIST_LISTEN", "127.0.0.1:9999"),
      ("GHLIST_CACHE_BACKEND", "none"),
      ("GITHUB_API_URL", "http://localhost:3000"),
    ]
    .into_iter()
    .collect();

    let mut config = Config::default();
    config
      .apply_env(|name| env.get(name).map(|v| v.to_string()))
      .unwrap();

    assert_eq!(config.server.listen, "127.0.0.1:9999");
    assert_eq!(config.cache.backend, CacheBackend::None);
    assert_eq!(config.github.api_url, "http://localhost:3000");
  }

  #[test]
  fn test_invalid_backend_env_is_rejected() {
    let mut config = Config::default();
    let result = config.apply_env(|name| (name == "GHLIST_CACHE_BACKEND").then(|| "redis".into()));
    assert!(result.is_err());
  }

  #[test]
  fn test_validate_per_page() {
    let mut config = Config::default();
    assert!(config.validate().is_ok());
    config.github.per_page = 500;
    assert!(config.validate().is_err());
  }

  #[test]
  fn test_validate_session_ttl() {
    let mut config = Config::default();
    assert_eq!(config.server.session_ttl, 3600);
    config.server.session_ttl = 0;
    assert!(config.validate().is_err());
  }

  #[test]
  fn test_missing_explicit_file_is_an_error() {
    let result = Config::load(Some(Path::new("/nonexistent/ghlist.yaml")));
    assert!(result.is_err());
  }
}
