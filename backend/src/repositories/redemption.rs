//! Redemption repository trait and its PostgreSQL implementation.

use async_trait::async_trait;
use sqlx::{FromRow, PgPool};

use crate::error::SessionResult;
use crate::models::redemption::{Redemption, RedemptionExportRow, RedemptionUpsert, UpsertOutcome};
use crate::repositories::session::class_uuids;
use crate::types::{ClassId, SessionId, UserId};

const SELECT_COLUMNS: &str = "id, session_id, subject_id, present, method, redeemed_at, latitude, \
     longitude, notes, created_at, updated_at";

/// Storage operations behind the redemption ledger.
///
/// `upsert` must be atomic per (session_id, subject_id): concurrent calls for
/// the same pair leave exactly one row and report `created` for exactly one.
/// Over the pair's lifetime exactly one write reports `first_present`, the
/// first with `present = true`, even if presence is later toggled.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RedemptionRepositoryTrait: Send + Sync {
    async fn upsert(&self, upsert: &RedemptionUpsert) -> SessionResult<UpsertOutcome>;

    async fn find(
        &self,
        session_id: SessionId,
        subject_id: UserId,
    ) -> SessionResult<Option<Redemption>>;

    async fn list_for_session(&self, session_id: SessionId) -> SessionResult<Vec<Redemption>>;

    /// Joined with subject display fields, ordered by roll number then name.
    async fn export_rows(&self, session_id: SessionId) -> SessionResult<Vec<RedemptionExportRow>>;

    /// Most recent first.
    async fn list_for_subject(
        &self,
        subject_id: UserId,
        limit: i64,
    ) -> SessionResult<Vec<Redemption>>;

    /// Present records in started sessions of the given classes, the same
    /// population as `SessionRepositoryTrait::count_started_for_classes`.
    async fn count_present_in_classes(
        &self,
        subject_id: UserId,
        class_ids: Vec<ClassId>,
    ) -> SessionResult<i64>;
}

#[derive(Debug, FromRow)]
struct UpsertRow {
    #[sqlx(flatten)]
    redemption: Redemption,
    created: bool,
    first_present: bool,
}

#[derive(Debug, Clone)]
pub struct PgRedemptionRepository {
    pool: PgPool,
}

impl PgRedemptionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RedemptionRepositoryTrait for PgRedemptionRepository {
    async fn upsert(&self, upsert: &RedemptionUpsert) -> SessionResult<UpsertOutcome> {
        let fresh = Redemption::from_upsert(upsert);
        // xmax is zero only for a row version created by this statement's insert.
        // counted_by keeps the id of the write that first marked the subject
        // present, so exactly one write ever reports first_present.
        let query = format!(
            "INSERT INTO redemptions (id, session_id, subject_id, present, method, redeemed_at, \
             latitude, longitude, notes, created_at, updated_at, counted_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, \
             CASE WHEN $4 THEN $1 END) \
             ON CONFLICT (session_id, subject_id) DO UPDATE SET \
             present = EXCLUDED.present, \
             method = EXCLUDED.method, \
             redeemed_at = EXCLUDED.redeemed_at, \
             latitude = COALESCE(EXCLUDED.latitude, redemptions.latitude), \
             longitude = COALESCE(EXCLUDED.longitude, redemptions.longitude), \
             notes = COALESCE(EXCLUDED.notes, redemptions.notes), \
             updated_at = EXCLUDED.updated_at, \
             counted_by = CASE WHEN redemptions.counted_by IS NULL AND EXCLUDED.present \
             THEN EXCLUDED.id ELSE redemptions.counted_by END \
             RETURNING {}, (xmax = 0) AS created, \
             COALESCE(counted_by = $1, FALSE) AS first_present",
            SELECT_COLUMNS
        );
        let row = sqlx::query_as::<_, UpsertRow>(&query)
            .bind(fresh.id)
            .bind(fresh.session_id)
            .bind(fresh.subject_id)
            .bind(fresh.present)
            .bind(fresh.method)
            .bind(fresh.redeemed_at)
            .bind(fresh.latitude)
            .bind(fresh.longitude)
            .bind(&fresh.notes)
            .bind(fresh.created_at)
            .bind(fresh.updated_at)
            .fetch_one(&self.pool)
            .await?;
        Ok(UpsertOutcome {
            redemption: row.redemption,
            created: row.created,
            first_present: row.first_present,
        })
    }

    async fn find(
        &self,
        session_id: SessionId,
        subject_id: UserId,
    ) -> SessionResult<Option<Redemption>> {
        let query = format!(
            "SELECT {} FROM redemptions WHERE session_id = $1 AND subject_id = $2",
            SELECT_COLUMNS
        );
        let row = sqlx::query_as::<_, Redemption>(&query)
            .bind(session_id)
            .bind(subject_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn list_for_session(&self, session_id: SessionId) -> SessionResult<Vec<Redemption>> {
        let query = format!(
            "SELECT {} FROM redemptions WHERE session_id = $1 ORDER BY redeemed_at, id",
            SELECT_COLUMNS
        );
        let rows = sqlx::query_as::<_, Redemption>(&query)
            .bind(session_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn export_rows(&self, session_id: SessionId) -> SessionResult<Vec<RedemptionExportRow>> {
        let rows = sqlx::query_as::<_, RedemptionExportRow>(
            "SELECT u.full_name, u.roll_number, r.present, r.method, r.redeemed_at \
             FROM redemptions r JOIN users u ON r.subject_id = u.id \
             WHERE r.session_id = $1 \
             ORDER BY u.roll_number NULLS LAST, u.full_name",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn list_for_subject(
        &self,
        subject_id: UserId,
        limit: i64,
    ) -> SessionResult<Vec<Redemption>> {
        let query = format!(
            "SELECT {} FROM redemptions WHERE subject_id = $1 ORDER BY redeemed_at DESC, id LIMIT $2",
            SELECT_COLUMNS
        );
        let rows = sqlx::query_as::<_, Redemption>(&query)
            .bind(subject_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn count_present_in_classes(
        &self,
        subject_id: UserId,
        class_ids: Vec<ClassId>,
    ) -> SessionResult<i64> {
        if class_ids.is_empty() {
            return Ok(0);
        }
        let total = sqlx::query_scalar(
            "SELECT COUNT(*) FROM redemptions r \
             JOIN sessions s ON s.id = r.session_id \
             WHERE r.subject_id = $1 AND r.present \
             AND s.class_id = ANY($2) AND s.last_started_at IS NOT NULL",
        )
        .bind(subject_id)
        .bind(class_uuids(&class_ids))
        .fetch_one(&self.pool)
        .await?;
        Ok(total)
    }
}
