//! Login sessions.
//!
//! A session binds a browser cookie to a GitHub token and the user it
//! belongs to. The user's id is the owner id of every cache entry.

use axum::http::{header, HeaderMap, HeaderValue};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use crate::github::types::{Credentials, Viewer};

use super::error::ApiError;
use super::AppState;

pub const SESSION_COOKIE: &str = "ghlist_session";

#[derive(Debug, Clone)]
pub struct Session {
  pub id: String,
  pub owner_id: String,
  pub viewer: Viewer,
  pub credentials: Credentials,
  pub created_at: DateTime<Utc>,
}

impl Session {
  /// Sessions expire a fixed time after creation.
  fn is_expired(&self, ttl: Duration) -> bool {
    Utc::now()
      .signed_duration_since(self.created_at)
      .to_std()
      .unwrap_or(Duration::ZERO)
      >= ttl
  }
}

/// In-process session table. Bearer-token callers get an entry keyed by the
/// token fingerprint so their user is resolved only once.
pub struct SessionStore {
  sessions: RwLock<HashMap<String, Session>>,
  bearer: RwLock<HashMap<String, Session>>,
  ttl: Duration,
}

impl SessionStore {
  pub fn new(ttl: Duration) -> Self {
    Self {
      sessions: RwLock::new(HashMap::new()),
      bearer: RwLock::new(HashMap::new()),
      ttl,
    }
  }

  pub fn create(&self, viewer: Viewer, credentials: Credentials) -> Session {
    let session = new_session(viewer, credentials);
    self
      .sessions
      .write()
      .unwrap_or_else(PoisonError::into_inner)
      .insert(session.id.clone(), session.clone());
    info!(
      login = %session.viewer.login,
      owner_id = %session.owner_id,
      active = self.len(),
      "session created"
    );
    session
  }

  pub fn get(&self, id: &str) -> Option<Session> {
    let session = self
      .sessions
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .get(id)
      .cloned()?;
    if session.is_expired(self.ttl) {
      debug!(login = %session.viewer.login, "session expired");
      self.remove(id);
      return None;
    }
    Some(session)
  }

  pub fn remove(&self, id: &str) -> Option<Session> {
    self
      .sessions
      .write()
      .unwrap_or_else(PoisonError::into_inner)
      .remove(id)
  }

  fn bearer(&self, credentials: &Credentials) -> Option<Session> {
    let key = credentials.fingerprint();
    let session = self
      .bearer
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .get(&key)
      .cloned()?;
    if session.is_expired(self.ttl) {
      self
        .bearer
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .remove(&key);
      return None;
    }
    Some(session)
  }

  fn remember_bearer(&self, viewer: Viewer, credentials: Credentials) -> Session {
    let key = credentials.fingerprint();
    let session = new_session(viewer, credentials);
    self
      .bearer
      .write()
      .unwrap_or_else(PoisonError::into_inner)
      .insert(key, session.clone());
    session
  }

  /// Forget every bearer entry of an owner.
  pub fn forget_owner_tokens(&self, owner_id: &str) {
    self
      .bearer
      .write()
      .unwrap_or_else(PoisonError::into_inner)
      .retain(|_, s| s.owner_id != owner_id);
  }

  /// Drop expired sessions and bearer entries. Returns how many were removed.
  pub fn purge_expired(&self) -> usize {
    let ttl = self.ttl;
    let mut removed = 0;
    for table in [&self.sessions, &self.bearer] {
      let mut table = table.write().unwrap_or_else(PoisonError::into_inner);
      let before = table.len();
      table.retain(|_, s| !s.is_expired(ttl));
      removed += before - table.len();
    }
    removed
  }

  pub fn len(&self) -> usize {
    self
      .sessions
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .len()
  }
}

fn new_session(viewer: Viewer, credentials: Credentials) -> Session {
  Session {
    id: Uuid::new_v4().to_string(),
    owner_id: viewer.id.to_string(),
    viewer,
    credentials,
    created_at: Utc::now(),
  }
}

/// Value of the session cookie, if the request carries one.
pub fn session_id(headers: &HeaderMap) -> Option<String> {
  headers
    .get_all(header::COOKIE)
    .iter()
    .filter_map(|v| v.to_str().ok())
    .flat_map(|v| v.split(';'))
    .filter_map(|pair| pair.trim().split_once('='))
    .find(|(name, _)| *name == SESSION_COOKIE)
    .map(|(_, value)| value.to_string())
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
  headers
    .get(header::AUTHORIZATION)?
    .to_str()
    .ok()?
    .strip_prefix("Bearer ")
    .map(str::trim)
    .filter(|t| !t.is_empty())
}

pub fn set_cookie(session_id: &str) -> Result<HeaderValue, ApiError> {
  HeaderValue::from_str(&format!(
    "{}={}; Path=/; HttpOnly; SameSite=Lax",
    SESSION_COOKIE, session_id
  ))
  .map_err(|e| ApiError::BadRequest(format!("invalid session id: {e}")))
}

pub fn clear_cookie() -> HeaderValue {
  HeaderValue::from_static("ghlist_session=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

/// Resolve the caller from the session cookie or, when enabled, a bearer
/// token.
pub async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<Session, ApiError> {
  if let Some(session) = session_id(headers).and_then(|id| state.sessions.get(&id)) {
    return Ok(session);
  }

  if !state.config.server.allow_bearer {
    return Err(ApiError::Unauthenticated);
  }
  let Some(token) = bearer_token(headers) else {
    return Err(ApiError::Unauthenticated);
  };

  let credentials = Credentials::new(token);
  if let Some(session) = state.sessions.bearer(&credentials) {
    return Ok(session);
  }

  let viewer = state.github.viewer(&credentials).await?;
  debug!(login = %viewer.login, "bearer token resolved");
  Ok(state.sessions.remember_bearer(viewer, credentials))
}
