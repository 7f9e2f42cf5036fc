//! Models that represent users, the identity of a caller, and role metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use crate::types::UserId;
use crate::validation::rules::validate_roll_number;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
/// Database representation of a school member.
pub struct User {
    #[schema(value_type = String)]
    pub id: UserId,
    /// Display name used on rosters and exports.
    pub full_name: String,
    /// School-issued roll number; only students carry one.
    pub roll_number: Option<String>,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
/// Closed set of roles recognised by the backend.
pub enum UserRole {
    Student,
    Teacher,
    Admin,
    Counselor,
}

impl UserRole {
    /// Returns the canonical snake_case representation of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Student => "student",
            UserRole::Teacher => "teacher",
            UserRole::Admin => "admin",
            UserRole::Counselor => "counselor",
        }
    }

    /// Staff may run sessions and manage classes.
    pub fn is_staff(&self) -> bool {
        !matches!(self, UserRole::Student)
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, UserRole::Admin)
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "student" => Ok(UserRole::Student),
            "teacher" => Ok(UserRole::Teacher),
            "admin" => Ok(UserRole::Admin),
            "counselor" | "counsellor" => Ok(UserRole::Counselor),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

/// The authenticated caller, as vouched for by the identity provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct CurrentUser {
    #[schema(value_type = String)]
    pub id: UserId,
    pub role: UserRole,
}

impl CurrentUser {
    pub fn new(id: UserId, role: UserRole) -> Self {
        Self { id, role }
    }
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
/// Payload for registering a new user.
pub struct CreateUser {
    #[validate(length(min = 1, max = 120))]
    pub full_name: String,
    #[validate(custom(function = "validate_roll_number"))]
    pub roll_number: Option<String>,
    pub role: UserRole,
}

impl User {
    pub fn new(payload: CreateUser, now: DateTime<Utc>) -> Self {
        Self {
            id: UserId::new(),
            full_name: payload.full_name.trim().to_string(),
            roll_number: payload
                .roll_number
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty()),
            role: payload.role,
            created_at: now,
        }
    }
}
