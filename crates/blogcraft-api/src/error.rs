use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use blogcraft_db::DbError;
use serde_json::json;
use thiserror::Error;

/// Every failure an endpoint can report. Handlers return this and the
/// `IntoResponse` impl picks the status code and JSON body.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or malformed input.
    #[error("{0}")]
    Validation(String),

    #[error("Email already exists")]
    DuplicateEmail,

    /// Same message for an unknown email and a wrong password.
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// No session cookie and no bearer token.
    #[error("Authentication required")]
    AuthenticationRequired,

    /// A token was presented but failed signature or expiry checks.
    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Blog not found")]
    NotFound,

    #[error("Server error: {0}")]
    Server(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::DuplicateEmail => StatusCode::BAD_REQUEST,
            ApiError::InvalidCredentials | ApiError::AuthenticationRequired => {
                StatusCode::UNAUTHORIZED
            }
            ApiError::InvalidToken => StatusCode::FORBIDDEN,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::DuplicateEmail => ApiError::DuplicateEmail,
            other => ApiError::Server(other.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = match &self {
            ApiError::Server(detail) => {
                tracing::error!("Server error: {}", detail);
                // The diagnostic is returned to the client as-is.
                json!({ "message": "Server error", "error": detail })
            }
            ApiError::InvalidCredentials | ApiError::InvalidToken => {
                tracing::warn!("{}", self);
                json!({ "message": self.to_string() })
            }
            _ => {
                tracing::debug!("{}", self);
                json!({ "message": self.to_string() })
            }
        };

        (status, Json(body)).into_response()
    }
}
