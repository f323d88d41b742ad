use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use crate::error::UpstreamError;

/// Error returned by API handlers, rendered as `{"error": "<message>"}`.
#[derive(Error, Debug)]
pub enum ApiError {
  /// No valid session or bearer token
  #[error("Not authenticated")]
  Unauthenticated,

  #[error("{0}")]
  BadRequest(String),

  #[error(transparent)]
  Upstream(#[from] UpstreamError),
}

impl ApiError {
  pub fn status(&self) -> StatusCode {
    match self {
      ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
      ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ApiError::Upstream(err) => match err {
        UpstreamError::Unauthorized => StatusCode::UNAUTHORIZED,
        UpstreamError::Forbidden(_) => StatusCode::FORBIDDEN,
        UpstreamError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        UpstreamError::NotFound(_) => StatusCode::NOT_FOUND,
        UpstreamError::Transient(_) => StatusCode::INTERNAL_SERVER_ERROR,
      },
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    if status.is_server_error() {
      error!(error = %self, "request failed");
    } else {
      warn!(status = status.as_u16(), error = %self, "request rejected");
    }

    let mut response = (status, Json(json!({ "error": self.to_string() }))).into_response();

    // Tell well-behaved clients when to come back
    if let ApiError::Upstream(UpstreamError::RateLimited {
      reset_at: Some(reset_at),
    }) = &self
    {
      let secs = reset_at.signed_duration_since(Utc::now()).num_seconds().max(0);
      if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
        response.headers_mut().insert(header::RETRY_AFTER, value);
      }
    }

    response
  }
}
