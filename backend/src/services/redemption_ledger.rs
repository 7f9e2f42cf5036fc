//! Redemption ledger: one record per (session, subject), written by upsert.

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::error::{SessionError, SessionResult};
use crate::models::redemption::{
    GeoPoint, Redemption, RedemptionExportRow, RedemptionMethod, RedemptionUpsert, UpsertOutcome,
};
use crate::models::session::Session;
use crate::repositories::{RedemptionRepositoryTrait, UserRepositoryTrait};
use crate::types::{SessionId, UserId};

/// A subject presenting a token against a session.
#[derive(Debug, Clone)]
pub struct RedeemAttempt<'a> {
    pub subject_id: UserId,
    pub candidate: &'a str,
    pub occurred_at: DateTime<Utc>,
    pub geo: Option<GeoPoint>,
    pub notes: Option<String>,
}

#[derive(Clone)]
pub struct RedemptionLedger {
    redemptions: Arc<dyn RedemptionRepositoryTrait>,
    users: Arc<dyn UserRepositoryTrait>,
}

impl RedemptionLedger {
    pub fn new(
        redemptions: Arc<dyn RedemptionRepositoryTrait>,
        users: Arc<dyn UserRepositoryTrait>,
    ) -> Self {
        Self { redemptions, users }
    }

    /// Validates the candidate against `session` and upserts presence.
    ///
    /// A repeated redemption by the same subject updates the existing record;
    /// `created` on the outcome tells the caller whether to count it.
    pub async fn redeem(
        &self,
        session: &Session,
        attempt: RedeemAttempt<'_>,
    ) -> SessionResult<UpsertOutcome> {
        if let Err(err) = session.check_candidate(attempt.candidate, attempt.occurred_at) {
            match &err {
                SessionError::TokenInvalid(reason) => tracing::warn!(
                    session_id = %session.id,
                    subject_id = %attempt.subject_id,
                    reason = %reason,
                    "attendance token rejected"
                ),
                other => tracing::warn!(
                    session_id = %session.id,
                    subject_id = %attempt.subject_id,
                    error = %other,
                    "redemption refused"
                ),
            }
            return Err(err);
        }
        self.ensure_subject(attempt.subject_id).await?;

        self.redemptions
            .upsert(&RedemptionUpsert {
                session_id: session.id,
                subject_id: attempt.subject_id,
                present: true,
                method: RedemptionMethod::Qr,
                occurred_at: attempt.occurred_at,
                geo: attempt.geo,
                notes: attempt.notes,
            })
            .await
    }

    /// Owner sets presence directly, bypassing the token check.
    pub async fn manual_override(
        &self,
        session: &Session,
        caller: UserId,
        subject_id: UserId,
        present: bool,
        occurred_at: DateTime<Utc>,
        notes: Option<String>,
    ) -> SessionResult<UpsertOutcome> {
        if !session.is_owned_by(caller) {
            return Err(SessionError::Unauthorized(
                "only the session owner may override attendance".into(),
            ));
        }
        self.ensure_subject(subject_id).await?;

        let outcome = self
            .redemptions
            .upsert(&RedemptionUpsert {
                session_id: session.id,
                subject_id,
                present,
                method: RedemptionMethod::Manual,
                occurred_at,
                geo: None,
                notes,
            })
            .await?;
        tracing::info!(
            session_id = %session.id,
            subject_id = %subject_id,
            present,
            "manual attendance override"
        );
        Ok(outcome)
    }

    pub async fn list(&self, session_id: SessionId) -> SessionResult<Vec<Redemption>> {
        self.redemptions.list_for_session(session_id).await
    }

    pub async fn export_rows(&self, session_id: SessionId) -> SessionResult<Vec<RedemptionExportRow>> {
        self.redemptions.export_rows(session_id).await
    }

    async fn ensure_subject(&self, subject_id: UserId) -> SessionResult<()> {
        match self.users.find_by_id(subject_id).await? {
            Some(_) => Ok(()),
            None => Err(SessionError::NotFound("subject".into())),
        }
    }
}
