//! Axum router and request handlers.
//!
//! Routes:
//! - `GET  /api/repositories`            - Repositories of the session user
//! - `GET  /api/gists`                   - Gists
//! - `GET  /api/followers`               - Followers
//! - `GET  /api/pull_requests`           - Pull requests (also `/api/pullrequests`)
//! - `GET  /api/cache/status`            - Cache backend, TTLs and hit counters
//! - `POST /api/cache/clear`             - Drop the caller's cache (one type or all)
//! - `POST /api/cache/clear-all`         - Drop every cache entry
//! - `POST /api/login`                   - Start a session from a GitHub token
//! - `GET  /api/user`                    - Session user
//! - `GET  /api/profile`                 - Extended profile of the session user
//! - `POST /api/logout`                  - End the session and drop the user's cache
//! - `GET  /api/debug/rate-limit`        - Core and search API quotas
//! - `GET  /api/health`, `GET /api/config`

use std::sync::Arc;
use std::time::Instant;

use axum::{
  body::Bytes,
  extract::{Query, State},
  http::{header, HeaderMap, StatusCode},
  response::{IntoResponse, Response},
  routing::{get, post},
  Json, Router,
};
use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::json;
use tracing::{debug, info, instrument};

use crate::cache::CacheSource;
use crate::github::types::{Follower, Gist, Profile, PullRequest, Repository};
use crate::github::Resource;
use crate::resource::ResourceType;
use crate::view::{self, SortField, ViewResult};

use super::error::ApiError;
use super::params::ListParams;
use super::session::{self, authenticate};
use super::AppState;

// ============================================================================
// Router
// ============================================================================

/// Build the axum [`Router`] with all API routes and shared state.
pub fn create_router(state: Arc<AppState>) -> Router {
  Router::new()
    // Listings
    .route("/api/repositories", get(list_resource::<Repository>))
    .route("/api/gists", get(list_resource::<Gist>))
    .route("/api/followers", get(list_resource::<Follower>))
    .route("/api/pull_requests", get(list_resource::<PullRequest>))
    .route("/api/pullrequests", get(list_resource::<PullRequest>))
    // Cache administration
    .route("/api/cache/status", get(handle_cache_status))
    .route("/api/cache/clear", post(handle_cache_clear))
    .route("/api/cache/clear-all", post(handle_cache_clear_all))
    // Session
    .route("/api/login", post(handle_login))
    .route("/api/user", get(handle_user))
    .route("/api/logout", post(handle_logout))
    .route("/api/profile", get(handle_profile))
    // Service info
    .route("/api/health", get(handle_health))
    .route("/api/config", get(handle_config))
    .route("/api/debug/rate-limit", get(handle_debug_rate_limit))
    .with_state(state)
}

// ============================================================================
// Listings
// ============================================================================

#[derive(Debug, Serialize)]
struct DebugInfo {
  cache_source: CacheSource,
  cached_at: Option<DateTime<Utc>>,
  processing_time_ms: f64,
  items_total: usize,
  items_returned: usize,
  single_cache_strategy: bool,
  table_sort_applied: bool,
}

/// List envelope. The items sit under the resource's own key
/// (`"repositories": [...]`), so serialization is written out by hand.
struct ListResponse<T> {
  resource_type: ResourceType,
  view: ViewResult<T>,
  search_query: String,
  table_sort: Option<&'static str>,
  table_sort_direction: &'static str,
  debug_info: DebugInfo,
}

impl<T: Serialize> Serialize for ListResponse<T> {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(12))?;
    map.serialize_entry(self.resource_type.as_str(), &self.view.items)?;
    map.serialize_entry("page", &self.view.page)?;
    map.serialize_entry("per_page", &self.view.page_size)?;
    map.serialize_entry("total_count", &self.view.total_count)?;
    map.serialize_entry("total_pages", &self.view.total_pages)?;
    map.serialize_entry("has_next", &self.view.has_next)?;
    map.serialize_entry("has_prev", &self.view.has_prev)?;
    map.serialize_entry("search_query", &self.search_query)?;
    map.serialize_entry("table_sort", &self.table_sort)?;
    map.serialize_entry("table_sort_direction", self.table_sort_direction)?;
    map.serialize_entry("debug_info", &self.debug_info)?;
    map.end()
  }
}

/// `GET /api/{resource}?page&per_page&search&sort&table_sort&table_sort_direction`
///
/// Loads the user's complete dataset (one cache entry) and derives the
/// requested page from it.
async fn list_resource<T: Resource>(
  State(state): State<Arc<AppState>>,
  headers: HeaderMap,
  Query(params): Query<ListParams>,
) -> Result<Json<ListResponse<T>>, ApiError> {
  let started = Instant::now();
  let user = authenticate(&state, &headers).await?;

  let result = state
    .github
    .load::<T>(&user.owner_id, &user.credentials)
    .await?;

  let request = params.view_request::<T::Field>();
  let table_sort_applied = params.table_sort::<T::Field>().is_some();
  let view = view::apply(&result.data, &request);

  let debug_info = DebugInfo {
    cache_source: result.source,
    cached_at: result.cached_at,
    processing_time_ms: started.elapsed().as_secs_f64() * 1000.0,
    items_total: result.data.items.len(),
    items_returned: view.items.len(),
    single_cache_strategy: true,
    table_sort_applied,
  };
  debug!(
    resource = %T::TYPE,
    owner_id = %user.owner_id,
    source = ?result.source,
    total = view.total_count,
    returned = view.items.len(),
    "list served"
  );

  Ok(Json(ListResponse {
    resource_type: T::TYPE,
    search_query: params.search(),
    // Echo the ordering actually applied, including a legacy `sort`
    table_sort: request.sort.map(|sort| sort.field.name()),
    table_sort_direction: request
      .sort
      .map_or_else(|| params.table_sort_direction(), |sort| sort.direction)
      .as_str(),
    view,
    debug_info,
  }))
}

// ============================================================================
// Cache administration
// ============================================================================

/// `GET /api/cache/status`
async fn handle_cache_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  let cache = &state.config.cache;
  Json(json!({
    "cache_type": state.github.cache().backend_kind(),
    "cache_timeout_short": cache.timeout_short,
    "cache_timeout_medium": cache.timeout_medium,
    "cache_timeout_long": cache.timeout_long,
    "redis_configured": false,
    "stats": state.stats.snapshot(),
  }))
}

#[derive(Debug, Default, Deserialize)]
struct ClearRequest {
  cache_type: Option<String>,
}

/// `POST /api/cache/clear` with optional `{"cache_type": "<resource>"}`.
///
/// An absent, unparsable or unknown `cache_type` clears all of the caller's
/// entries.
#[instrument(skip_all)]
async fn handle_cache_clear(
  State(state): State<Arc<AppState>>,
  headers: HeaderMap,
  body: Bytes,
) -> Result<Json<serde_json::Value>, ApiError> {
  let user = authenticate(&state, &headers).await?;
  let request: ClearRequest = serde_json::from_slice(&body).unwrap_or_default();
  let cache = state.github.cache();

  let message = match request
    .cache_type
    .as_deref()
    .and_then(|t| t.parse::<ResourceType>().ok())
  {
    Some(resource_type) => {
      cache.invalidate(&user.owner_id, resource_type);
      format!("{} cache cleared", resource_type.label())
    }
    None => {
      cache.invalidate_all(&user.owner_id);
      "All caches cleared".to_string()
    }
  };

  Ok(Json(json!({ "message": message })))
}

/// `POST /api/cache/clear-all`
#[instrument(skip_all)]
async fn handle_cache_clear_all(
  State(state): State<Arc<AppState>>,
  headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
  let user = authenticate(&state, &headers).await?;
  info!(requested_by = %user.viewer.login, "clearing entire cache");
  state.github.cache().invalidate_everything();
  Ok(Json(json!({ "message": "Entire cache cleared" })))
}

// ============================================================================
// Session
// ============================================================================

#[derive(Debug, Deserialize)]
struct LoginRequest {
  token: String,
}

/// `POST /api/login` with `{"token": "<github token>"}`
#[instrument(skip_all)]
async fn handle_login(
  State(state): State<Arc<AppState>>,
  Json(request): Json<LoginRequest>,
) -> Result<Response, ApiError> {
  let token = request.token.trim();
  if token.is_empty() {
    return Err(ApiError::BadRequest("token must not be empty".to_string()));
  }

  let credentials = crate::github::types::Credentials::new(token);
  let viewer = state.github.viewer(&credentials).await?;
  let session = state.sessions.create(viewer, credentials);
  let cookie = session::set_cookie(&session.id)?;

  Ok(
    (
      [(header::SET_COOKIE, cookie)],
      Json(json!({ "authenticated": true, "user": session.viewer })),
    )
      .into_response(),
  )
}

/// `GET /api/user`
async fn handle_user(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
  match authenticate(&state, &headers).await {
    Ok(session) => Json(json!({
      "authenticated": true,
      "user": session.viewer,
      "session_started_at": session.created_at,
    }))
    .into_response(),
    Err(_) => (
      StatusCode::UNAUTHORIZED,
      Json(json!({ "authenticated": false })),
    )
      .into_response(),
  }
}

/// `POST /api/logout`: drops the session and every cache entry of its user.
#[instrument(skip_all)]
async fn handle_logout(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
  if let Some(session) = session::session_id(&headers).and_then(|id| state.sessions.remove(&id)) {
    state.github.cache().invalidate_all(&session.owner_id);
    state.sessions.forget_owner_tokens(&session.owner_id);
    info!(login = %session.viewer.login, "logged out");
  }

  (
    [(header::SET_COOKIE, session::clear_cookie())],
    Json(json!({ "message": "Logged out" })),
  )
    .into_response()
}

/// `GET /api/profile`
async fn handle_profile(
  State(state): State<Arc<AppState>>,
  headers: HeaderMap,
) -> Result<Json<Profile>, ApiError> {
  let user = authenticate(&state, &headers).await?;
  let result = state
    .github
    .profile(&user.owner_id, &user.credentials)
    .await?;
  Ok(Json(result.data))
}

// ============================================================================
// Service info
// ============================================================================

/// `GET /api/health`
async fn handle_health() -> impl IntoResponse {
  Json(json!({ "status": "ok" }))
}

/// `GET /api/config`
async fn handle_config(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  let port = state
    .config
    .server
    .listen
    .rsplit_once(':')
    .and_then(|(_, port)| port.parse::<u16>().ok());

  Json(json!({
    "cache_type": state.github.cache().backend_kind(),
    "backend_port": port,
    "api_url": state.config.github.api_url,
  }))
}

/// `GET /api/debug/rate-limit`
async fn handle_debug_rate_limit(
  State(state): State<Arc<AppState>>,
  headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
  let user = authenticate(&state, &headers).await?;
  let result = state
    .github
    .rate_limit_report(&user.owner_id, &user.credentials)
    .await?;

  Ok(Json(json!({
    "core": result.data.core,
    "search": result.data.search,
    "cached": result.source != CacheSource::Network,
  })))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{CacheStats, DatasetCache, MemoryStore};
  use crate::config::Config;
  use crate::error::UpstreamError;
  use crate::github::fake::FakeGithub;
  use crate::github::CachedGithub;
  use crate::http::SessionStore;
  use axum::body::Body;
  use std::sync::atomic::Ordering;
  use std::time::Duration;
  use axum::http::Request;
  use serde_json::Value;
  use tower::ServiceExt;

  struct Harness {
    app: Router,
    fake: Arc<FakeGithub>,
  }

  fn harness_with(config: Config) -> Harness {
    let fake = Arc::new(FakeGithub::new());
    let stats = Arc::new(CacheStats::new());
    let cache = DatasetCache::new(Arc::new(MemoryStore::new()), stats.clone());
    let github = CachedGithub::new(
      fake.clone(),
      cache,
      config.cache.clone(),
      config.github.min_rate_limit_remaining,
    );
    let sessions = SessionStore::new(Duration::from_secs(config.server.session_ttl));
    let state = Arc::new(AppState {
      config,
      github,
      stats,
      sessions,
    });
    Harness {
      app: create_router(state),
      fake,
    }
  }

  fn harness() -> Harness {
    harness_with(Config::default())
  }

  async fn send(app: &Router, request: Request<Body>) -> (StatusCode, HeaderMap, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
      .await
      .unwrap();
    let body = if bytes.is_empty() {
      Value::Null
    } else {
      serde_json::from_slice(&bytes).unwrap()
    };
    (status, headers, body)
  }

  async fn login(app: &Router, token: &str) -> String {
    let request = Request::post("/api/login")
      .header("content-type", "application/json")
      .body(Body::from(json!({ "token": token }).to_string()))
      .unwrap();
    let (status, headers, _) = send(app, request).await;
    assert_eq!(status, StatusCode::OK);
    let cookie = headers[header::SET_COOKIE].to_str().unwrap();
    cookie.split(';').next().unwrap().to_string()
  }

  fn get_with(uri: &str, cookie: &str) -> Request<Body> {
    Request::get(uri)
      .header(header::COOKIE, cookie)
      .body(Body::empty())
      .unwrap()
  }

  fn post_with(uri: &str, cookie: &str, body: Value) -> Request<Body> {
    Request::post(uri)
      .header(header::COOKIE, cookie)
      .header("content-type", "application/json")
      .body(Body::from(body.to_string()))
      .unwrap()
  }

  fn ids(body: &Value, key: &str) -> Vec<u64> {
    body[key]
      .as_array()
      .unwrap()
      .iter()
      .map(|item| item["id"].as_u64().unwrap())
      .collect()
  }

  #[tokio::test]
  async fn test_list_requires_session() {
    let h = harness();
    let request = Request::get("/api/repositories").body(Body::empty()).unwrap();

    let (status, _, body) = send(&h.app, request).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Not authenticated");
    assert_eq!(h.fake.fetch_count(ResourceType::Repositories), 0);
  }

  #[tokio::test]
  async fn test_repository_page_envelope() {
    let h = harness();
    let cookie = login(&h.app, "good").await;

    let (status, _, body) = send(
      &h.app,
      get_with("/api/repositories?page=2&per_page=20", &cookie),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&body, "repositories"), (21..=40).collect::<Vec<u64>>());
    assert_eq!(body["page"], 2);
    assert_eq!(body["per_page"], 20);
    assert_eq!(body["total_count"], 45);
    assert_eq!(body["total_pages"], 3);
    assert_eq!(body["has_next"], true);
    assert_eq!(body["has_prev"], true);
    assert_eq!(body["search_query"], "");
    assert_eq!(body["table_sort"], Value::Null);
    assert_eq!(body["table_sort_direction"], "asc");
    assert_eq!(body["debug_info"]["cache_source"], "network");
    assert_eq!(body["debug_info"]["items_total"], 45);
    assert_eq!(body["debug_info"]["items_returned"], 20);
    assert_eq!(body["debug_info"]["single_cache_strategy"], true);
  }

  #[tokio::test]
  async fn test_different_views_share_one_fetch() {
    let h = harness();
    let cookie = login(&h.app, "good").await;

    for uri in [
      "/api/repositories",
      "/api/repositories?page=3&per_page=10",
      "/api/repositories?search=repo-4",
      "/api/repositories?table_sort=name&table_sort_direction=desc",
      "/api/repositories?sort=updated",
    ] {
      let (status, _, _) = send(&h.app, get_with(uri, &cookie)).await;
      assert_eq!(status, StatusCode::OK, "{}", uri);
    }

    let (_, _, body) = send(&h.app, get_with("/api/repositories?per_page=10", &cookie)).await;
    assert_eq!(body["debug_info"]["cache_source"], "cache");
    assert!(body["debug_info"]["cached_at"].is_string());
    assert_eq!(h.fake.fetch_count(ResourceType::Repositories), 1);
  }

  #[tokio::test]
  async fn test_pull_request_sort_and_search() {
    let h = harness();
    let cookie = login(&h.app, "good").await;

    let (_, _, body) = send(
      &h.app,
      get_with("/api/pull_requests?table_sort=number&table_sort_direction=asc", &cookie),
    )
    .await;
    let numbers: Vec<u64> = body["pull_requests"]
      .as_array()
      .unwrap()
      .iter()
      .map(|pr| pr["number"].as_u64().unwrap())
      .collect();
    assert_eq!(numbers, vec![2, 5, 8]);
    assert_eq!(body["table_sort"], "number");
    assert_eq!(body["debug_info"]["table_sort_applied"], true);

    let (_, _, body) = send(&h.app, get_with("/api/pullrequests?search=fix", &cookie)).await;
    assert_eq!(body["total_count"], 1);
    assert_eq!(body["pull_requests"][0]["number"], 5);
    assert_eq!(body["search_query"], "fix");
    assert_eq!(h.fake.fetch_count(ResourceType::PullRequests), 1);
  }

  #[tokio::test]
  async fn test_legacy_sort_is_echoed_as_applied() {
    let h = harness();
    let cookie = login(&h.app, "good").await;

    let (_, _, body) = send(&h.app, get_with("/api/pull_requests?sort=number", &cookie)).await;
    let numbers: Vec<u64> = body["pull_requests"]
      .as_array()
      .unwrap()
      .iter()
      .map(|pr| pr["number"].as_u64().unwrap())
      .collect();
    assert_eq!(numbers, vec![8, 5, 2]);
    assert_eq!(body["table_sort"], "number");
    assert_eq!(body["table_sort_direction"], "desc");
    assert_eq!(body["debug_info"]["table_sort_applied"], false);

    // Without any sort the default direction is echoed
    let (_, _, body) = send(&h.app, get_with("/api/pull_requests", &cookie)).await;
    assert_eq!(body["table_sort"], Value::Null);
    assert_eq!(body["table_sort_direction"], "asc");
  }

  #[tokio::test]
  async fn test_invalid_params_are_corrected() {
    let h = harness();
    let cookie = login(&h.app, "good").await;

    let (status, _, body) = send(
      &h.app,
      get_with("/api/repositories?page=abc&per_page=7&table_sort=bogus", &cookie),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["page"], 1);
    assert_eq!(body["per_page"], 30);
    assert_eq!(body["table_sort"], Value::Null);
    assert_eq!(body["debug_info"]["table_sort_applied"], false);
  }

  #[tokio::test]
  async fn test_page_past_end() {
    let h = harness();
    let cookie = login(&h.app, "good").await;

    let (_, _, body) = send(
      &h.app,
      get_with("/api/repositories?page=99&per_page=20", &cookie),
    )
    .await;

    assert!(body["repositories"].as_array().unwrap().is_empty());
    assert_eq!(body["page"], 99);
    assert_eq!(body["has_next"], false);
  }

  #[tokio::test]
  async fn test_rate_limited_without_cache() {
    let h = harness();
    let cookie = login(&h.app, "good").await;
    h.fake.fail_with(Some(UpstreamError::RateLimited { reset_at: None }));

    let (status, _, body) = send(&h.app, get_with("/api/followers", &cookie)).await;

    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert!(body["error"].as_str().unwrap().contains("rate limit"));
  }

  #[tokio::test]
  async fn test_rate_limited_refresh_serves_stale() {
    let mut config = Config::default();
    config.cache.timeout_long = 0;
    let h = harness_with(config);
    let cookie = login(&h.app, "good").await;

    send(&h.app, get_with("/api/followers", &cookie)).await;
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    h.fake.fail_with(Some(UpstreamError::RateLimited { reset_at: None }));

    let (status, _, body) = send(&h.app, get_with("/api/followers", &cookie)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_count"], 2);
    assert_eq!(body["debug_info"]["cache_source"], "stale");
  }

  #[tokio::test]
  async fn test_forbidden_maps_to_403() {
    let h = harness();
    let cookie = login(&h.app, "good").await;
    h.fake.fail_with(Some(UpstreamError::Forbidden("/gists".into())));

    let (status, _, _) = send(&h.app, get_with("/api/gists", &cookie)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
  }

  #[tokio::test]
  async fn test_clear_single_cache_type() {
    let h = harness();
    let cookie = login(&h.app, "good").await;
    send(&h.app, get_with("/api/repositories", &cookie)).await;
    send(&h.app, get_with("/api/followers", &cookie)).await;

    let (status, _, body) = send(
      &h.app,
      post_with("/api/cache/clear", &cookie, json!({ "cache_type": "repos" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Repositories cache cleared");

    send(&h.app, get_with("/api/repositories", &cookie)).await;
    send(&h.app, get_with("/api/followers", &cookie)).await;
    assert_eq!(h.fake.fetch_count(ResourceType::Repositories), 2);
    assert_eq!(h.fake.fetch_count(ResourceType::Followers), 1);
  }

  #[tokio::test]
  async fn test_clear_without_body_clears_everything_of_user() {
    let h = harness();
    let cookie = login(&h.app, "good").await;
    send(&h.app, get_with("/api/gists", &cookie)).await;

    let request = Request::post("/api/cache/clear")
      .header(header::COOKIE, &cookie)
      .body(Body::empty())
      .unwrap();
    let (_, _, body) = send(&h.app, request).await;
    assert_eq!(body["message"], "All caches cleared");

    send(&h.app, get_with("/api/gists", &cookie)).await;
    assert_eq!(h.fake.fetch_count(ResourceType::Gists), 2);
  }

  #[tokio::test]
  async fn test_clear_all_requires_session() {
    let h = harness();
    let request = Request::post("/api/cache/clear-all").body(Body::empty()).unwrap();
    let (status, _, _) = send(&h.app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
  }

  #[tokio::test]
  async fn test_logout_drops_session_and_cache() {
    let h = harness();
    let cookie = login(&h.app, "good").await;
    send(&h.app, get_with("/api/repositories", &cookie)).await;

    let (status, headers, _) = send(&h.app, post_with("/api/logout", &cookie, json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(headers[header::SET_COOKIE].to_str().unwrap().contains("Max-Age=0"));

    let (status, _, body) = send(&h.app, get_with("/api/user", &cookie)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["authenticated"], false);

    let cookie = login(&h.app, "good").await;
    let (_, _, body) = send(&h.app, get_with("/api/repositories", &cookie)).await;
    assert_eq!(body["debug_info"]["cache_source"], "network");
    assert_eq!(h.fake.fetch_count(ResourceType::Repositories), 2);
  }

  #[tokio::test]
  async fn test_users_do_not_share_cache() {
    let h = harness();
    let octocat = login(&h.app, "good").await;
    let hubot = login(&h.app, "other").await;

    send(&h.app, get_with("/api/followers", &octocat)).await;
    let (_, _, body) = send(&h.app, get_with("/api/followers", &hubot)).await;

    assert_eq!(body["debug_info"]["cache_source"], "network");
    assert_eq!(h.fake.fetch_count(ResourceType::Followers), 2);
  }

  #[tokio::test]
  async fn test_login_and_user() {
    let h = harness();

    let request = Request::post("/api/login")
      .header("content-type", "application/json")
      .body(Body::from(json!({ "token": "wrong" }).to_string()))
      .unwrap();
    let (status, _, _) = send(&h.app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let request = Request::post("/api/login")
      .header("content-type", "application/json")
      .body(Body::from(json!({ "token": "  " }).to_string()))
      .unwrap();
    let (status, _, _) = send(&h.app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let cookie = login(&h.app, "good").await;
    let (status, _, body) = send(&h.app, get_with("/api/user", &cookie)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["authenticated"], true);
    assert_eq!(body["user"]["login"], "octocat");
  }

  #[tokio::test]
  async fn test_expired_session_is_rejected() {
    let mut config = Config::default();
    config.server.session_ttl = 0;
    let h = harness_with(config);

    let cookie = login(&h.app, "good").await;
    let (status, _, body) = send(&h.app, get_with("/api/repositories", &cookie)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Not authenticated");

    let (status, _, _) = send(&h.app, get_with("/api/user", &cookie)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(h.fake.fetch_count(ResourceType::Repositories), 0);
  }

  #[tokio::test]
  async fn test_profile_is_cached_and_cleared_on_logout() {
    let h = harness();
    let request = Request::get("/api/profile").body(Body::empty()).unwrap();
    let (status, _, _) = send(&h.app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let cookie = login(&h.app, "good").await;
    let (status, _, body) = send(&h.app, get_with("/api/profile", &cookie)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["login"], "octocat");
    assert_eq!(body["public_repos"], 45);
    assert_eq!(body["company"], "GitHub");

    send(&h.app, get_with("/api/profile", &cookie)).await;
    assert_eq!(h.fake.profile_requests.load(Ordering::SeqCst), 1);

    send(&h.app, post_with("/api/logout", &cookie, json!({}))).await;
    let cookie = login(&h.app, "good").await;
    send(&h.app, get_with("/api/profile", &cookie)).await;
    assert_eq!(h.fake.profile_requests.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_debug_rate_limit() {
    let h = harness();
    let cookie = login(&h.app, "good").await;
    // Fills the quota check entry, which is kept apart
    send(&h.app, get_with("/api/repositories", &cookie)).await;

    let (status, _, body) = send(&h.app, get_with("/api/debug/rate-limit", &cookie)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cached"], false);
    assert_eq!(body["core"]["limit"], 5000);
    assert_eq!(body["core"]["remaining"], 5000);
    assert_eq!(body["core"]["used"], 0);
    assert!(body["core"]["reset"].is_string());
    assert_eq!(body["search"]["limit"], 30);

    let (_, _, body) = send(&h.app, get_with("/api/debug/rate-limit", &cookie)).await;
    assert_eq!(body["cached"], true);
    assert_eq!(h.fake.rate_limit_probes.load(Ordering::SeqCst), 2);

    send(&h.app, post_with("/api/logout", &cookie, json!({}))).await;
    let cookie = login(&h.app, "good").await;
    let (_, _, body) = send(&h.app, get_with("/api/debug/rate-limit", &cookie)).await;
    assert_eq!(body["cached"], false);
  }

  #[tokio::test]
  async fn test_bearer_auth_only_when_enabled() {
    let bearer = |uri: &str| {
      Request::get(uri)
        .header(header::AUTHORIZATION, "Bearer good")
        .body(Body::empty())
        .unwrap()
    };

    let h = harness();
    let (status, _, _) = send(&h.app, bearer("/api/gists")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let mut config = Config::default();
    config.server.allow_bearer = true;
    let h = harness_with(config);
    let (status, _, body) = send(&h.app, bearer("/api/gists")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_count"], 0);
  }

  #[tokio::test]
  async fn test_cache_status_reports_stats() {
    let h = harness();
    let cookie = login(&h.app, "good").await;
    send(&h.app, get_with("/api/repositories", &cookie)).await;
    send(&h.app, get_with("/api/repositories?page=2", &cookie)).await;

    let request = Request::get("/api/cache/status").body(Body::empty()).unwrap();
    let (status, _, body) = send(&h.app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cache_type"], "simple");
    assert_eq!(body["cache_timeout_medium"], 3600);
    assert_eq!(body["redis_configured"], false);
    assert_eq!(body["stats"]["hits"], 1);
  }

  #[tokio::test]
  async fn test_health_and_config() {
    let h = harness();

    let request = Request::get("/api/health").body(Body::empty()).unwrap();
    let (status, _, body) = send(&h.app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let request = Request::get("/api/config").body(Body::empty()).unwrap();
    let (_, _, body) = send(&h.app, request).await;
    assert_eq!(body["backend_port"], 5000);
    assert_eq!(body["api_url"], "https://api.github.com");
  }
}
