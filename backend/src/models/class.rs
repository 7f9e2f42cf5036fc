use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use crate::types::{ClassId, UserId};
use crate::validation::rules::validate_not_blank;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
/// A class taught by one teacher; sessions are its meetings.
pub struct Class {
    #[schema(value_type = String)]
    pub id: ClassId,
    pub name: String,
    #[schema(value_type = String)]
    pub teacher_id: UserId,
    pub created_at: DateTime<Utc>,
}

impl Class {
    pub fn new(name: &str, teacher_id: UserId, now: DateTime<Utc>) -> Self {
        Self {
            id: ClassId::new(),
            name: name.trim().to_string(),
            teacher_id,
            created_at: now,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateClassRequest {
    #[validate(length(min = 1, max = 120), custom(function = "validate_not_blank"))]
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct EnrollRequest {
    #[schema(value_type = String)]
    pub subject_id: UserId,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ClassResponse {
    #[schema(value_type = String)]
    pub id: ClassId,
    pub name: String,
    #[schema(value_type = String)]
    pub teacher_id: UserId,
    pub enrolled_count: i64,
}

impl ClassResponse {
    pub fn new(class: Class, enrolled_count: i64) -> Self {
        Self {
            id: class.id,
            name: class.name,
            teacher_id: class.teacher_id,
            enrolled_count,
        }
    }
}
