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
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  /// Duplicate code, or a recompute scope that changed mid-flight.
  #[error("conflict: {0}")]
  Conflict(String),

  /// The request was well-formed but violates an engine invariant.
  #[error("unprocessable: {0}")]
  Unprocessable(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  /// Map a backend error onto the taxonomy.
  ///
  /// Backends wrap the core validation errors in their own types, so this
  /// walks the source chain looking for one; anything without a core error
  /// in its chain is an internal failure.
  pub fn from_store<E>(error: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    let mut current: Option<&(dyn std::error::Error + 'static)> = Some(&error);
    while let Some(e) = current {
      if let Some(core) = e.downcast_ref::<attain_core::Error>() {
        return Self::from_core(core);
      }
      current = e.source();
    }
    Self::Store(Box::new(error))
  }

  fn from_core(error: &attain_core::Error) -> Self {
    use attain_core::Error as Core;

    let message = error.to_string();
    match error {
      Core::OutcomeNotFound(_) | Core::ItemNotFound(_) => {
        Self::NotFound(message)
      }
      Core::DuplicateCode { .. } | Core::StaleScope => Self::Conflict(message),
      Core::TierMismatch { .. }
      | Core::AllocationTargetNotClo(_)
      | Core::DuplicateAllocation(_)
      | Core::OverAllocated { .. }
      | Core::MarksOutOfRange { .. }
      | Core::ScoreOutOfRange { .. }
      | Core::NonPositiveTotal(_) => Self::Unprocessable(message),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      ApiError::Conflict(m) => (StatusCode::CONFLICT, m.clone()),
      ApiError::Unprocessable(m) => {
        (StatusCode::UNPROCESSABLE_ENTITY, m.clone())
      }
      ApiError::Store(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}
