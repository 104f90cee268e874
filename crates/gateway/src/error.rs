//! Error types for the gateway layer

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use cybermitra_assist::AssistError;
use cybermitra_auth::AuthError;

/// Gateway error types
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("access denied: {0}")]
    AuthorizationFailed(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("too many requests: {0}")]
    TooManyRequests(String),

    #[error("internal server error: {0}")]
    InternalError(String),
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::AuthenticationFailed(_) => StatusCode::UNAUTHORIZED,
            GatewayError::AuthorizationFailed(_) => StatusCode::FORBIDDEN,
            GatewayError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::Conflict(_) => StatusCode::CONFLICT,
            GatewayError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            GatewayError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            GatewayError::TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        if matches!(self, GatewayError::InternalError(_)) {
            tracing::error!(error = %self, "request failed");
        }
        let status = self.status_code();
        let error_response = json!({
            "error": status.as_str(),
            "message": self.to_string(),
        });

        (status, Json(error_response)).into_response()
    }
}

/// Result type for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;

impl From<AssistError> for GatewayError {
    fn from(error: AssistError) -> Self {
        match error {
            AssistError::NotFound(what) => GatewayError::NotFound(what.to_string()),
            AssistError::AccessDenied(reason) => GatewayError::AuthorizationFailed(reason.to_string()),
            AssistError::InvalidInput(message) => GatewayError::InvalidRequest(message),
            AssistError::Conflict(message) => GatewayError::Conflict(message),
            AssistError::FileTooLarge { size_bytes, max_bytes } => GatewayError::PayloadTooLarge(
                format!("{size_bytes} bytes exceeds the {max_bytes} byte limit"),
            ),
            AssistError::UnsupportedFileType(content_type) => {
                GatewayError::UnsupportedMediaType(content_type)
            }
            AssistError::Store(error) => GatewayError::InternalError(error.to_string()),
            AssistError::Serialization(error) => GatewayError::InternalError(error.to_string()),
            AssistError::Io(error) => GatewayError::InternalError(error.to_string()),
        }
    }
}

impl From<AuthError> for GatewayError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::InvalidIdentifier(_)
            | AuthError::InvalidProfile(_)
            | AuthError::OtpNotRequested
            | AuthError::OtpExpired
            | AuthError::OtpInvalid { .. }
            | AuthError::RegistrationTokenInvalid => GatewayError::InvalidRequest(error.to_string()),
            AuthError::TooManyAttempts | AuthError::ResendCooldown { .. } => {
                GatewayError::TooManyRequests(error.to_string())
            }
            AuthError::SessionNotFound | AuthError::SessionExpired => {
                GatewayError::AuthenticationFailed(error.to_string())
            }
            AuthError::DeliveryFailed(_) | AuthError::Database(_) | AuthError::Hash(_) => {
                GatewayError::InternalError(error.to_string())
            }
        }
    }
}
