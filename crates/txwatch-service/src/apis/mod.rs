//! HTTP API handlers and their error type.

pub mod transactions;

use axum::{
	extract::{rejection::PathRejection, FromRequestParts, Path},
	http::{request::Parts, StatusCode},
	response::{IntoResponse, Json, Response},
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;

/// API error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
	/// Error type/code
	pub error: String,
	/// Human-readable description
	pub message: String,
}

/// Errors returned by API handlers, each mapped to an HTTP status.
#[derive(Debug, Error)]
pub enum ApiError {
	#[error("Bad request: {0}")]
	BadRequest(String),
	#[error("Not found: {0}")]
	NotFound(String),
	#[error("Conflict: {0}")]
	Conflict(String),
	#[error("Internal error: {0}")]
	Internal(String),
}

impl ApiError {
	pub fn status_code(&self) -> StatusCode {
		match self {
			ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
			ApiError::NotFound(_) => StatusCode::NOT_FOUND,
			ApiError::Conflict(_) => StatusCode::CONFLICT,
			ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}

	fn error_type(&self) -> &'static str {
		match self {
			ApiError::BadRequest(_) => "INVALID_REQUEST",
			ApiError::NotFound(_) => "TRANSACTION_NOT_FOUND",
			ApiError::Conflict(_) => "DUPLICATE_TRANSACTION",
			ApiError::Internal(_) => "INTERNAL_ERROR",
		}
	}

	pub fn to_error_response(&self) -> ErrorResponse {
		let message = match self {
			ApiError::BadRequest(message)
			| ApiError::NotFound(message)
			| ApiError::Conflict(message)
			| ApiError::Internal(message) => message.clone(),
		};
		ErrorResponse {
			error: self.error_type().to_string(),
			message,
		}
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		(self.status_code(), Json(self.to_error_response())).into_response()
	}
}

impl From<PathRejection> for ApiError {
	fn from(rejection: PathRejection) -> Self {
		ApiError::BadRequest(rejection.body_text())
	}
}

/// `Path` extractor whose rejection is an `ApiError`, so malformed path
/// segments get the same response body as handler errors.
pub struct ApiPath<T>(pub T);

impl<T, S> FromRequestParts<S> for ApiPath<T>
where
	T: DeserializeOwned + Send,
	S: Send + Sync,
{
	type Rejection = ApiError;

	async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
		let Path(value) = Path::<T>::from_request_parts(parts, state).await?;
		Ok(ApiPath(value))
	}
}
