//! GitHub rate-limit headers and response status classification.
//!
//! Reads `X-RateLimit-Remaining` / `X-RateLimit-Reset` (or the standardised
//! `RateLimit-Remaining` / `RateLimit-Reset`) and `Retry-After` to tell a
//! rate-limit rejection apart from a plain permission failure.

use chrono::{DateTime, TimeZone, Utc};
use reqwest::header::HeaderMap;
use reqwest::StatusCode;

use crate::error::UpstreamError;

/// Rate-limit information carried by one response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateLimitHeaders {
  pub remaining: Option<u64>,
  pub reset_at: Option<DateTime<Utc>>,
  pub retry_after_secs: Option<u64>,
}

impl RateLimitHeaders {
  pub fn from_headers(headers: &HeaderMap) -> Self {
    let number = |primary: &str, fallback: &str| {
      headers
        .get(primary)
        .or_else(|| headers.get(fallback))
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
    };

    let reset_at = number("X-RateLimit-Reset", "RateLimit-Reset")
      .and_then(|secs| i64::try_from(secs).ok())
      .and_then(|secs| Utc.timestamp_opt(secs, 0).single());

    Self {
      remaining: number("X-RateLimit-Remaining", "RateLimit-Remaining"),
      reset_at,
      retry_after_secs: number("Retry-After", "Retry-After"),
    }
  }

  /// Reset time, falling back to now + `Retry-After`.
  fn effective_reset(&self) -> Option<DateTime<Utc>> {
    self.reset_at.or_else(|| {
      self
        .retry_after_secs
        .and_then(|secs| i64::try_from(secs).ok())
        .map(|secs| Utc::now() + chrono::Duration::seconds(secs))
    })
  }

  /// GitHub signals both the primary and the secondary rate limit with a
  /// 403, distinguishable only by these headers.
  fn is_exhausted(&self) -> bool {
    self.remaining == Some(0) || self.retry_after_secs.is_some()
  }
}

/// Map a non-success response to a typed error. `what` names the requested
/// resource for the message.
pub fn classify_status(status: StatusCode, headers: &HeaderMap, what: &str) -> UpstreamError {
  let limits = RateLimitHeaders::from_headers(headers);

  match status {
    StatusCode::UNAUTHORIZED => UpstreamError::Unauthorized,
    StatusCode::TOO_MANY_REQUESTS => UpstreamError::RateLimited {
      reset_at: limits.effective_reset(),
    },
    StatusCode::FORBIDDEN if limits.is_exhausted() => UpstreamError::RateLimited {
      reset_at: limits.effective_reset(),
    },
    StatusCode::FORBIDDEN => UpstreamError::Forbidden(what.to_string()),
    StatusCode::NOT_FOUND => UpstreamError::NotFound(what.to_string()),
    other => UpstreamError::Transient(format!("{} returned HTTP {}", what, other.as_u16())),
  }
}
