//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use vigil_core::Error as CoreError;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("forbidden: {0}")]
  Forbidden(String),

  #[error("attachment exceeds {limit} bytes")]
  PayloadTooLarge { limit: usize },

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  pub fn store(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Store(Box::new(e))
  }
}

impl From<CoreError> for ApiError {
  fn from(e: CoreError) -> Self { Self::store(e) }
}

/// Find the domain error a store error wraps, if any.
fn domain_error<'a>(
  e: &'a (dyn std::error::Error + 'static),
) -> Option<&'a CoreError> {
  let mut current = Some(e);
  while let Some(err) = current {
    if let Some(core) = err.downcast_ref::<CoreError>() {
      return Some(core);
    }
    current = err.source();
  }
  None
}

fn domain_status(e: &CoreError) -> StatusCode {
  match e {
    CoreError::OccurrenceNotFound(_)
    | CoreError::CorrectiveActionNotFound(_)
    | CoreError::AttachmentNotFound(_)
    | CoreError::HandoffNotFound => StatusCode::NOT_FOUND,

    CoreError::IllegalTransition { .. }
    | CoreError::TriageAlreadySet(_)
    | CoreError::TriageNotAllowed(_)
    | CoreError::ClosingBlocked(_)
    | CoreError::OutcomeNotAllowed(_)
    | CoreError::NotificationAlreadyRecorded(_)
    | CoreError::IllegalCapaAdvance { .. }
    | CoreError::Terminal(_) => StatusCode::CONFLICT,

    CoreError::HandoffExpired => StatusCode::GONE,

    CoreError::Validation(_) | CoreError::ExclusiveOutcome => {
      StatusCode::UNPROCESSABLE_ENTITY
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, body) = match &self {
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, json!({ "error": m })),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, json!({ "error": m })),
      ApiError::Forbidden(m) => (StatusCode::FORBIDDEN, json!({ "error": m })),
      ApiError::PayloadTooLarge { .. } => {
        (StatusCode::PAYLOAD_TOO_LARGE, json!({ "error": self.to_string() }))
      }
      ApiError::Io(e) => {
        tracing::error!(error = %e, "attachment storage failed");
        (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": "storage failure" }))
      }
      ApiError::Store(e) => match domain_error(e.as_ref()) {
        Some(CoreError::ClosingBlocked(blockers)) => (StatusCode::CONFLICT, json!({
          "error": e.to_string(),
          "blockers": blockers,
        })),
        Some(core) => (domain_status(core), json!({ "error": core.to_string() })),
        None => {
          tracing::error!(error = %e, "store failure");
          (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": e.to_string() }))
        }
      },
    };
    (status, Json(body)).into_response()
  }
}
