use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("{0}")]
    Validation(String),

    // Token-flow categories. Each carries distinct user-facing copy so an
    // emailed-link visitor is never shown a generic error.
    #[error("This action link is invalid or has been removed.")]
    InvalidLink,

    #[error("This action was already completed on {0}.")]
    LinkUsed(String),

    #[error("This action link has expired. Please contact the office for assistance.")]
    LinkExpired,

    #[error("{0}")]
    Database(#[from] sqlx::Error),

    #[error("{0}")]
    Internal(String),
}

impl AppError {
    /// Stable machine-readable code for the token action flow.
    fn code(&self) -> Option<&'static str> {
        match self {
            AppError::InvalidLink => Some("invalid_link"),
            AppError::LinkUsed(_) => Some("already_used"),
            AppError::LinkExpired => Some("expired"),
            AppError::Conflict(_) => Some("conflict"),
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let code = self.code();
        let (status, message) = match self {
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Validation(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            AppError::InvalidLink => (StatusCode::NOT_FOUND, self.to_string()),
            AppError::LinkUsed(_) => (StatusCode::CONFLICT, self.to_string()),
            AppError::LinkExpired => (StatusCode::GONE, self.to_string()),
            AppError::Database(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = match code {
            Some(code) => Json(json!({ "error": message, "code": code })),
            None => Json(json!({ "error": message })),
        };

        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_flow_errors_have_distinct_codes() {
        assert_eq!(AppError::InvalidLink.code(), Some("invalid_link"));
        assert_eq!(
            AppError::LinkUsed("March 1, 2026".into()).code(),
            Some("already_used")
        );
        assert_eq!(AppError::LinkExpired.code(), Some("expired"));
        assert_eq!(
            AppError::Conflict("slot taken".into()).code(),
            Some("conflict")
        );
    }

    #[test]
    fn non_token_errors_carry_no_code() {
        assert_eq!(AppError::NotFound("shift 9".into()).code(), None);
        assert_eq!(AppError::Validation("bad email".into()).code(), None);
    }
}
