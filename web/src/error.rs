//! Error types for web handlers.
//!
//! [`AppError`] bridges the typed use-case errors and HTTP responses,
//! implementing Axum's `IntoResponse`. The mapping follows the service's
//! error taxonomy: malformed input → 422, business-rule violations → 400,
//! missing resources → 404, persistence and unexpected failures → 500.

use crate::masking::mask_secrets;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use reserva_app::CreateReservationError;
use serde::Serialize;
use std::fmt;

/// Application error type for web handlers.
///
/// # Examples
///
/// ```ignore
/// async fn handler() -> Result<Json<Data>, AppError> {
///     let reservation = find(code).await
///         .ok_or_else(|| AppError::not_found("Reservation", code))?;
///     Ok(Json(reservation))
/// }
/// ```
#[derive(Debug)]
pub struct AppError {
    /// HTTP status code.
    status: StatusCode,
    /// User-facing message.
    message: String,
    /// Machine-readable error code.
    code: String,
    /// Internal detail, logged (masked) but never exposed to the client.
    detail: Option<String>,
}

impl AppError {
    /// Create a new application error.
    #[must_use]
    pub const fn new(status: StatusCode, message: String, code: String) -> Self {
        Self {
            status,
            message,
            code,
            detail: None,
        }
    }

    /// Attach internal detail for server-side logging.
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// 422 Unprocessable Entity — malformed input.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            message.into(),
            "VALIDATION_ERROR".to_string(),
        )
    }

    /// 400 Bad Request — business rule violation.
    #[must_use]
    pub fn business_rule(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            message.into(),
            "BUSINESS_RULE_VIOLATION".to_string(),
        )
    }

    /// 404 Not Found.
    #[must_use]
    pub fn not_found(resource: impl fmt::Display, id: impl fmt::Display) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            format!("{resource} with id {id} not found"),
            "NOT_FOUND".to_string(),
        )
    }

    /// 500 Internal Server Error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            message.into(),
            "INTERNAL_SERVER_ERROR".to_string(),
        )
    }

    /// The HTTP status this error maps to.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {}

/// Error response body (JSON).
#[derive(Debug, Serialize)]
struct ErrorResponse {
    /// Machine-readable error code.
    code: String,
    /// Human-readable error message.
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            // Internal detail may carry upstream payloads; mask before logging.
            let detail = self.detail.as_deref().map(mask_secrets);
            tracing::error!(
                status = %self.status,
                code = %self.code,
                message = %self.message,
                detail = detail.as_deref().unwrap_or(""),
                "internal server error"
            );
        }

        let body = ErrorResponse {
            code: self.code,
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<CreateReservationError> for AppError {
    fn from(err: CreateReservationError) -> Self {
        match err {
            CreateReservationError::Validation(message) => Self::business_rule(message),
            CreateReservationError::Security(inner) => Self::business_rule(inner.to_string()),
            CreateReservationError::CodeGeneration(inner) => Self::business_rule(inner.to_string()),
            CreateReservationError::Domain(inner) => Self::business_rule(inner.to_string()),
            CreateReservationError::Persistence(source) => {
                Self::internal("unable to persist reservation").with_detail(source.to_string())
            }
        }
    }
}
