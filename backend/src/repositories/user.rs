//! User repository: the subject directory the engine resolves ids against.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::SessionResult;
use crate::models::user::User;
use crate::types::UserId;

const SELECT_COLUMNS: &str = "id, full_name, roll_number, role, created_at";

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepositoryTrait: Send + Sync {
    async fn insert(&self, user: &User) -> SessionResult<User>;

    async fn find_by_id(&self, id: UserId) -> SessionResult<Option<User>>;

    async fn list_paginated(&self, limit: i64, offset: i64) -> SessionResult<Vec<User>>;

    async fn count_all(&self) -> SessionResult<i64>;
}

#[derive(Debug, Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepositoryTrait for PgUserRepository {
    async fn insert(&self, user: &User) -> SessionResult<User> {
        let query = format!(
            "INSERT INTO users (id, full_name, roll_number, role, created_at) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            SELECT_COLUMNS
        );
        let row = sqlx::query_as::<_, User>(&query)
            .bind(user.id)
            .bind(&user.full_name)
            .bind(&user.roll_number)
            .bind(user.role)
            .bind(user.created_at)
            .fetch_one(&self.pool)
            .await?;
        Ok(row)
    }

    async fn find_by_id(&self, id: UserId) -> SessionResult<Option<User>> {
        let query = format!("SELECT {} FROM users WHERE id = $1", SELECT_COLUMNS);
        let row = sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn list_paginated(&self, limit: i64, offset: i64) -> SessionResult<Vec<User>> {
        let query = format!(
            "SELECT {} FROM users ORDER BY full_name, id LIMIT $1 OFFSET $2",
            SELECT_COLUMNS
        );
        let rows = sqlx::query_as::<_, User>(&query)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn count_all(&self) -> SessionResult<i64> {
        let total = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(total)
    }
}
