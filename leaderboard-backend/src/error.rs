use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::auth::AuthError;

/// API error response structure
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
  pub error: String,
}

impl ErrorResponse {
  pub fn new(error: impl Into<String>) -> Self {
    Self {
      error: error.into(),
    }
  }
}

/// Application error type
#[derive(Debug)]
pub enum AppError {
  DatabaseError(leaderboard_db::DbError),
  AuthError(AuthError),
  NotFound(&'static str),
}

impl IntoResponse for AppError {
  fn into_response(self) -> Response {
    let (status, message) = match self {
      AppError::DatabaseError(db_err) => {
        // Don't expose internal database errors
        tracing::error!(?db_err, "Database error occurred");
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
      }
      AppError::AuthError(AuthError::Signing(reason)) => {
        tracing::error!(%reason, "Failed to issue session token");
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
      }
      AppError::AuthError(_) => (StatusCode::UNAUTHORIZED, "Unauthorized Access"),
      AppError::NotFound(what) => (StatusCode::NOT_FOUND, what),
    };

    (status, Json(ErrorResponse::new(message))).into_response()
  }
}

impl From<leaderboard_db::DbError> for AppError {
  fn from(err: leaderboard_db::DbError) -> Self {
    AppError::DatabaseError(err)
  }
}

impl From<AuthError> for AppError {
  fn from(err: AuthError) -> Self {
    AppError::AuthError(err)
  }
}
