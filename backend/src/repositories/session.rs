//! Session repository trait and its PostgreSQL implementation.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::error::SessionResult;
use crate::models::session::{Session, Token};
use crate::types::{ClassId, SessionId, UserId};

const SELECT_COLUMNS: &str = "id, owner_id, class_id, title, scheduled_date, status, active_token, \
     token_expires_at, expected_count, redeemed_count, version, last_started_at, created_at, updated_at";

/// Storage operations behind the session registry.
///
/// Token-state writes (`activate`, `deactivate`, `close_expired`) bump the
/// session `version`; `activate` only applies when the caller's version is
/// still current.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionRepositoryTrait: Send + Sync {
    async fn insert(&self, session: &Session) -> SessionResult<Session>;

    async fn find_by_id(&self, id: SessionId) -> SessionResult<Option<Session>>;

    /// Installs `token` as current. `None` when the version moved or the row is gone.
    async fn activate(
        &self,
        id: SessionId,
        token: &Token,
        expected_version: i64,
        now: DateTime<Utc>,
    ) -> SessionResult<Option<Session>>;

    /// Clears token and expiry and closes the session. `None` when the row is gone.
    async fn deactivate(&self, id: SessionId, now: DateTime<Utc>)
        -> SessionResult<Option<Session>>;

    async fn increment_redeemed(
        &self,
        id: SessionId,
        now: DateTime<Utc>,
    ) -> SessionResult<Option<Session>>;

    async fn list_for_date(
        &self,
        date: NaiveDate,
        owner_id: Option<UserId>,
    ) -> SessionResult<Vec<Session>>;

    async fn list_for_classes_on(
        &self,
        date: NaiveDate,
        class_ids: Vec<ClassId>,
    ) -> SessionResult<Vec<Session>>;

    /// Sessions of these classes that were started at least once.
    async fn count_started_for_classes(&self, class_ids: Vec<ClassId>) -> SessionResult<i64>;

    /// Closes active sessions whose token expired at or before `now`.
    async fn close_expired(&self, now: DateTime<Utc>) -> SessionResult<u64>;
}

#[derive(Debug, Clone)]
pub struct PgSessionRepository {
    pool: PgPool,
}

impl PgSessionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

pub(crate) fn class_uuids(class_ids: &[ClassId]) -> Vec<Uuid> {
    class_ids.iter().map(|id| *id.as_uuid()).collect()
}

#[async_trait]
impl SessionRepositoryTrait for PgSessionRepository {
    async fn insert(&self, session: &Session) -> SessionResult<Session> {
        let query = format!(
            "INSERT INTO sessions (id, owner_id, class_id, title, scheduled_date, status, active_token, \
             token_expires_at, expected_count, redeemed_count, version, last_started_at, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) \
             RETURNING {}",
            SELECT_COLUMNS
        );
        let row = sqlx::query_as::<_, Session>(&query)
            .bind(session.id)
            .bind(session.owner_id)
            .bind(session.class_id)
            .bind(&session.title)
            .bind(session.scheduled_date)
            .bind(session.status)
            .bind(&session.active_token)
            .bind(session.token_expires_at)
            .bind(session.expected_count)
            .bind(session.redeemed_count)
            .bind(session.version)
            .bind(session.last_started_at)
            .bind(session.created_at)
            .bind(session.updated_at)
            .fetch_one(&self.pool)
            .await?;
        Ok(row)
    }

    async fn find_by_id(&self, id: SessionId) -> SessionResult<Option<Session>> {
        let query = format!("SELECT {} FROM sessions WHERE id = $1", SELECT_COLUMNS);
        let row = sqlx::query_as::<_, Session>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn activate(
        &self,
        id: SessionId,
        token: &Token,
        expected_version: i64,
        now: DateTime<Utc>,
    ) -> SessionResult<Option<Session>> {
        let query = format!(
            "UPDATE sessions SET status = 'active', active_token = $2, token_expires_at = $3, \
             version = version + 1, last_started_at = $4, updated_at = $4 \
             WHERE id = $1 AND version = $5 \
             RETURNING {}",
            SELECT_COLUMNS
        );
        let row = sqlx::query_as::<_, Session>(&query)
            .bind(id)
            .bind(&token.value)
            .bind(token.expires_at)
            .bind(now)
            .bind(expected_version)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn deactivate(
        &self,
        id: SessionId,
        now: DateTime<Utc>,
    ) -> SessionResult<Option<Session>> {
        let query = format!(
            "UPDATE sessions SET status = 'closed', active_token = NULL, token_expires_at = NULL, \
             version = version + 1, updated_at = $2 \
             WHERE id = $1 \
             RETURNING {}",
            SELECT_COLUMNS
        );
        let row = sqlx::query_as::<_, Session>(&query)
            .bind(id)
            .bind(now)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn increment_redeemed(
        &self,
        id: SessionId,
        now: DateTime<Utc>,
    ) -> SessionResult<Option<Session>> {
        let query = format!(
            "UPDATE sessions SET redeemed_count = redeemed_count + 1, updated_at = $2 \
             WHERE id = $1 \
             RETURNING {}",
            SELECT_COLUMNS
        );
        let row = sqlx::query_as::<_, Session>(&query)
            .bind(id)
            .bind(now)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn list_for_date(
        &self,
        date: NaiveDate,
        owner_id: Option<UserId>,
    ) -> SessionResult<Vec<Session>> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {} FROM sessions WHERE scheduled_date = ",
            SELECT_COLUMNS
        ));
        builder.push_bind(date);
        if let Some(owner_id) = owner_id {
            builder.push(" AND owner_id = ").push_bind(owner_id);
        }
        builder.push(" ORDER BY created_at, id");

        let rows = builder
            .build_query_as::<Session>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn list_for_classes_on(
        &self,
        date: NaiveDate,
        class_ids: Vec<ClassId>,
    ) -> SessionResult<Vec<Session>> {
        if class_ids.is_empty() {
            return Ok(Vec::new());
        }
        let query = format!(
            "SELECT {} FROM sessions WHERE scheduled_date = $1 AND class_id = ANY($2) \
             ORDER BY created_at, id",
            SELECT_COLUMNS
        );
        let rows = sqlx::query_as::<_, Session>(&query)
            .bind(date)
            .bind(class_uuids(&class_ids))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn count_started_for_classes(&self, class_ids: Vec<ClassId>) -> SessionResult<i64> {
        if class_ids.is_empty() {
            return Ok(0);
        }
        let total = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sessions WHERE class_id = ANY($1) AND last_started_at IS NOT NULL",
        )
        .bind(class_uuids(&class_ids))
        .fetch_one(&self.pool)
        .await?;
        Ok(total)
    }

    async fn close_expired(&self, now: DateTime<Utc>) -> SessionResult<u64> {
        let result = sqlx::query(
            "UPDATE sessions SET status = 'closed', active_token = NULL, token_expires_at = NULL, \
             version = version + 1, updated_at = $1 \
             WHERE status = 'active' AND token_expires_at <= $1",
        )
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
