//! Attendance sessions and the tokens that open them.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use subtle::ConstantTimeEq;
use utoipa::ToSchema;
use validator::Validate;

use crate::error::{SessionError, SessionResult, TokenRejection};
use crate::types::{ClassId, SessionId, UserId};
use crate::validation::rules::validate_not_blank;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Scheduled,
    Active,
    Closed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Scheduled => "scheduled",
            SessionStatus::Active => "active",
            SessionStatus::Closed => "closed",
        }
    }
}

/// One bounded window during which redemptions are accepted.
///
/// `active_token` and `token_expires_at` are written together by the store;
/// one is never present without the other.
#[derive(Debug, Clone, FromRow)]
pub struct Session {
    pub id: SessionId,
    pub owner_id: UserId,
    pub class_id: Option<ClassId>,
    pub title: String,
    pub scheduled_date: NaiveDate,
    pub status: SessionStatus,
    pub active_token: Option<String>,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub expected_count: i32,
    pub redeemed_count: i32,
    /// Bumped on every token-state write; guards concurrent starts.
    pub version: i64,
    pub last_started_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A time-boxed credential bound to exactly one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub value: String,
    pub session_id: SessionId,
    pub expires_at: DateTime<Utc>,
}

impl Token {
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

#[derive(Debug, Clone)]
pub struct NewSession {
    pub owner_id: UserId,
    pub class_id: Option<ClassId>,
    pub title: String,
    pub scheduled_date: NaiveDate,
    pub expected_count: i32,
}

impl Session {
    pub fn new(input: NewSession, now: DateTime<Utc>) -> Self {
        Self {
            id: SessionId::new(),
            owner_id: input.owner_id,
            class_id: input.class_id,
            title: input.title,
            scheduled_date: input.scheduled_date,
            status: SessionStatus::Scheduled,
            active_token: None,
            token_expires_at: None,
            expected_count: input.expected_count.max(0),
            redeemed_count: 0,
            version: 0,
            last_started_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_owned_by(&self, user_id: UserId) -> bool {
        self.owner_id == user_id
    }

    pub fn current_token(&self) -> Option<Token> {
        match (&self.active_token, self.token_expires_at) {
            (Some(value), Some(expires_at)) => Some(Token {
                value: value.clone(),
                session_id: self.id,
                expires_at,
            }),
            _ => None,
        }
    }

    /// Checks that `candidate` may be redeemed against this session at `now`.
    pub fn check_candidate(&self, candidate: &str, now: DateTime<Utc>) -> SessionResult<()> {
        if self.status != SessionStatus::Active {
            return Err(SessionError::InvalidState(format!(
                "session is {}, not active",
                self.status.as_str()
            )));
        }
        let token = self
            .current_token()
            .ok_or(SessionError::TokenInvalid(TokenRejection::Mismatch))?;
        if !bool::from(token.value.as_bytes().ct_eq(candidate.trim().as_bytes())) {
            return Err(SessionError::TokenInvalid(TokenRejection::Mismatch));
        }
        if !token.is_live_at(now) {
            return Err(SessionError::TokenInvalid(TokenRejection::Expired));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateSessionRequest {
    #[validate(length(min = 1, max = 200), custom(function = "validate_not_blank"))]
    pub title: String,
    #[schema(value_type = Option<String>)]
    pub class_id: Option<ClassId>,
    /// Defaults to today in the configured timezone.
    pub scheduled_date: Option<NaiveDate>,
    /// Defaults to the class enrollment size, or zero without a class.
    #[validate(range(min = 0, max = 10000))]
    pub expected_count: Option<i32>,
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct StartSessionRequest {
    /// Token lifetime in minutes; falls back to the configured default.
    pub ttl_minutes: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SessionResponse {
    #[schema(value_type = String)]
    pub id: SessionId,
    #[schema(value_type = String)]
    pub owner_id: UserId,
    #[schema(value_type = Option<String>)]
    pub class_id: Option<ClassId>,
    pub title: String,
    pub scheduled_date: NaiveDate,
    pub status: SessionStatus,
    pub expected_count: i32,
    pub redeemed_count: i32,
    /// Present only for the session owner, who renders it as a QR code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub last_started_at: Option<DateTime<Utc>>,
}

impl SessionResponse {
    pub fn for_viewer(session: Session, viewer: UserId) -> Self {
        let token = if session.is_owned_by(viewer) {
            session.active_token.clone()
        } else {
            None
        };
        Self {
            id: session.id,
            owner_id: session.owner_id,
            class_id: session.class_id,
            title: session.title,
            scheduled_date: session.scheduled_date,
            status: session.status,
            expected_count: session.expected_count,
            redeemed_count: session.redeemed_count,
            token,
            token_expires_at: session.token_expires_at,
            last_started_at: session.last_started_at,
        }
    }
}
