use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;
use utoipa::ToSchema;

pub mod session;

pub use session::{SessionError, SessionResult, TokenRejection};

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// Machine-readable error code attached to error responses for the logging layer.
#[derive(Debug, Clone)]
pub struct ErrorCode(pub &'static str);

#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    Unauthorized(String),
    Forbidden(String),
    Conflict(String),
    InvalidState(String),
    TokenInvalid(TokenRejection),
    BadRequest(String),
    InternalServerError(anyhow::Error),
    Validation(Vec<String>),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message, code, details) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, "NOT_FOUND", None),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg, "UNAUTHORIZED", None),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg, "FORBIDDEN", None),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg, "CONFLICT", None),
            AppError::InvalidState(msg) => (StatusCode::CONFLICT, msg, "INVALID_STATE", None),
            AppError::TokenInvalid(reason) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "Attendance code is invalid or expired".to_string(),
                "TOKEN_INVALID",
                Some(serde_json::json!({ "reason": reason })),
            ),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, "BAD_REQUEST", None),
            AppError::InternalServerError(err) => {
                tracing::error!("Internal server error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    "INTERNAL_SERVER_ERROR",
                    None,
                )
            }
            AppError::Validation(errors) => (
                StatusCode::BAD_REQUEST,
                "Validation failed".to_string(),
                "VALIDATION_ERROR",
                Some(serde_json::json!({ "errors": errors })),
            ),
        };

        let body = Json(ErrorResponse {
            error: error_message,
            code: code.to_string(),
            details,
        });

        let mut response = (status, body).into_response();
        response.extensions_mut().insert(ErrorCode(code));
        response
    }
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotFound(what) => AppError::NotFound(format!("{} not found", what)),
            SessionError::InvalidState(msg) => AppError::InvalidState(msg),
            SessionError::TokenInvalid(reason) => AppError::TokenInvalid(reason),
            // The caller is authenticated; it just lacks the owner capability.
            SessionError::Unauthorized(msg) => AppError::Forbidden(msg),
            SessionError::Conflict(msg) => AppError::Conflict(msg),
            SessionError::Validation(msg) => AppError::Validation(vec![msg]),
            SessionError::Storage(err) => AppError::InternalServerError(err),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalServerError(err)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        SessionError::from(err).into()
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut messages: Vec<String> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| {
                    let code = e.code.as_ref();
                    format!("{}: {}", field, code)
                })
            })
            .collect();
        messages.sort();
        AppError::Validation(messages)
    }
}
