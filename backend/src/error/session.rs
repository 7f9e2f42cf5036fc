//! Domain errors raised by the session engine.

use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

/// Why a presented attendance token was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TokenRejection {
    /// The candidate does not equal the session's current token.
    Mismatch,
    /// The candidate matches but its expiry has passed.
    Expired,
}

impl TokenRejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenRejection::Mismatch => "mismatch",
            TokenRejection::Expired => "expired",
        }
    }
}

impl std::fmt::Display for TokenRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("attendance token rejected ({0})")]
    TokenInvalid(TokenRejection),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

pub type SessionResult<T> = Result<T, SessionError>;

const PG_UNIQUE_VIOLATION: &str = "23505";

impl From<sqlx::Error> for SessionError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => SessionError::NotFound("record".into()),
            sqlx::Error::Database(ref db_err)
                if db_err.code().as_deref() == Some(PG_UNIQUE_VIOLATION) =>
            {
                SessionError::Conflict(db_err.message().to_string())
            }
            other => SessionError::Storage(other.into()),
        }
    }
}
