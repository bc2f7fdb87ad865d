//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error(transparent)]
  Core(#[from] icv_core::Error),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    use icv_core::Error as E;

    let (status, body) = match &self {
      ApiError::Core(E::Validation { reason, offenders }) => (
        StatusCode::UNPROCESSABLE_ENTITY,
        json!({ "error": reason, "offenders": offenders }),
      ),
      ApiError::Core(E::Unauthorized) => {
        (StatusCode::UNAUTHORIZED, json!({ "error": self.to_string() }))
      }
      ApiError::Core(e) if e.is_client_error() => {
        (StatusCode::BAD_REQUEST, json!({ "error": e.to_string() }))
      }
      ApiError::Core(_) | ApiError::Store(_) => {
        tracing::error!(error = %self, "request failed");
        (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": self.to_string() }))
      }
    };
    (status, Json(body)).into_response()
  }
}
