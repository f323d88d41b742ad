//! Typed failures shared by the fetcher, the cache manager and the HTTP layer.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Failure talking to the GitHub API.
///
/// None of these are retried internally; the cache manager decides whether a
/// stale copy can be served instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UpstreamError {
  #[error("GitHub rate limit exceeded{}", reset_suffix(.reset_at))]
  RateLimited { reset_at: Option<DateTime<Utc>> },

  #[error("GitHub rejected the credentials")]
  Unauthorized,

  #[error("GitHub denied access: {0}")]
  Forbidden(String),

  #[error("not found on GitHub: {0}")]
  NotFound(String),

  #[error("GitHub request failed: {0}")]
  Transient(String),
}

impl UpstreamError {
  /// Errors that make every further request with the same credentials
  /// pointless, so a partially finished fetch must stop immediately.
  pub fn is_fatal(&self) -> bool {
    matches!(self, Self::RateLimited { .. } | Self::Unauthorized)
  }
}

fn reset_suffix(reset_at: &Option<DateTime<Utc>>) -> String {
  match reset_at {
    Some(at) => format!(", resets at {}", at.to_rfc3339()),
    None => String::new(),
  }
}

impl From<reqwest::Error> for UpstreamError {
  fn from(err: reqwest::Error) -> Self {
    if err.is_timeout() {
      Self::Transient(format!("request timed out: {err}"))
    } else if err.is_decode() {
      Self::Transient(format!("unexpected response body: {err}"))
    } else {
      Self::Transient(err.to_string())
    }
  }
}

/// Failure inside a cache backend. Never shown to API clients: the cache
/// manager downgrades it to a miss.
#[derive(Error, Debug)]
pub enum StoreError {
  #[error("SQLite error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("serialization error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),

  #[error("cache lock poisoned")]
  Poisoned,
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;

  #[test]
  fn test_rate_limited_message_includes_reset() {
    let reset_at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    let err = UpstreamError::RateLimited {
      reset_at: Some(reset_at),
    };
    assert_eq!(
      err.to_string(),
      "GitHub rate limit exceeded, resets at 2024-05-01T12:00:00+00:00"
    );

    let err = UpstreamError::RateLimited { reset_at: None };
    assert_eq!(err.to_string(), "GitHub rate limit exceeded");
  }

  #[test]
  fn test_fatal_errors() {
    assert!(UpstreamError::Unauthorized.is_fatal());
    assert!(UpstreamError::RateLimited { reset_at: None }.is_fatal());
    assert!(!UpstreamError::Transient("boom".into()).is_fatal());
    assert!(!UpstreamError::NotFound("x".into()).is_fatal());
  }
}
