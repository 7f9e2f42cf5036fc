//! Class and enrollment repository.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::SessionResult;
use crate::models::class::Class;
use crate::types::{ClassId, UserId};

const SELECT_COLUMNS: &str = "id, name, teacher_id, created_at";

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ClassRepositoryTrait: Send + Sync {
    async fn insert(&self, class: &Class) -> SessionResult<Class>;

    async fn find_by_id(&self, id: ClassId) -> SessionResult<Option<Class>>;

    async fn list_for_teacher(&self, teacher_id: UserId) -> SessionResult<Vec<Class>>;

    /// Idempotent; returns false when the subject was already enrolled.
    async fn enroll(&self, class_id: ClassId, subject_id: UserId) -> SessionResult<bool>;

    async fn count_enrolled(&self, class_id: ClassId) -> SessionResult<i64>;

    async fn classes_for_subject(&self, subject_id: UserId) -> SessionResult<Vec<ClassId>>;
}

#[derive(Debug, Clone)]
pub struct PgClassRepository {
    pool: PgPool,
}

impl PgClassRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ClassRepositoryTrait for PgClassRepository {
    async fn insert(&self, class: &Class) -> SessionResult<Class> {
        let query = format!(
            "INSERT INTO classes (id, name, teacher_id, created_at) VALUES ($1, $2, $3, $4) \
             RETURNING {}",
            SELECT_COLUMNS
        );
        let row = sqlx::query_as::<_, Class>(&query)
            .bind(class.id)
            .bind(&class.name)
            .bind(class.teacher_id)
            .bind(class.created_at)
            .fetch_one(&self.pool)
            .await?;
        Ok(row)
    }

    async fn find_by_id(&self, id: ClassId) -> SessionResult<Option<Class>> {
        let query = format!("SELECT {} FROM classes WHERE id = $1", SELECT_COLUMNS);
        let row = sqlx::query_as::<_, Class>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn list_for_teacher(&self, teacher_id: UserId) -> SessionResult<Vec<Class>> {
        let query = format!(
            "SELECT {} FROM classes WHERE teacher_id = $1 ORDER BY name, id",
            SELECT_COLUMNS
        );
        let rows = sqlx::query_as::<_, Class>(&query)
            .bind(teacher_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn enroll(&self, class_id: ClassId, subject_id: UserId) -> SessionResult<bool> {
        let result = sqlx::query(
            "INSERT INTO class_enrollments (class_id, subject_id) VALUES ($1, $2) \
             ON CONFLICT (class_id, subject_id) DO NOTHING",
        )
        .bind(class_id)
        .bind(subject_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_enrolled(&self, class_id: ClassId) -> SessionResult<i64> {
        let total = sqlx::query_scalar("SELECT COUNT(*) FROM class_enrollments WHERE class_id = $1")
            .bind(class_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(total)
    }

    async fn classes_for_subject(&self, subject_id: UserId) -> SessionResult<Vec<ClassId>> {
        let rows = sqlx::query_scalar(
            "SELECT class_id FROM class_enrollments WHERE subject_id = $1 ORDER BY class_id",
        )
        .bind(subject_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
