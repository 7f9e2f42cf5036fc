//! Session registry: the only writer of session rows and their token state.

use chrono::NaiveDate;
use std::sync::Arc;

use crate::error::{SessionError, SessionResult};
use crate::models::session::{NewSession, Session, Token};
use crate::repositories::SessionRepositoryTrait;
use crate::types::{ClassId, SessionId, UserId};
use crate::utils::time::Clock;

#[derive(Clone)]
pub struct SessionRegistry {
    repo: Arc<dyn SessionRepositoryTrait>,
    clock: Arc<dyn Clock>,
}

impl SessionRegistry {
    pub fn new(repo: Arc<dyn SessionRepositoryTrait>, clock: Arc<dyn Clock>) -> Self {
        Self { repo, clock }
    }

    pub async fn create(&self, input: NewSession) -> SessionResult<Session> {
        let session = Session::new(input, self.clock.now());
        let stored = self.repo.insert(&session).await?;
        tracing::info!(session_id = %stored.id, owner_id = %stored.owner_id, "session created");
        Ok(stored)
    }

    pub async fn get(&self, id: SessionId) -> SessionResult<Session> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| SessionError::NotFound("session".into()))
    }

    /// Installs `token` on `session`, replacing any current token at once.
    ///
    /// The write applies only if `session.version` is still current; a start
    /// that lost the race gets `Conflict`.
    pub async fn set_active(&self, session: &Session, token: &Token) -> SessionResult<Session> {
        let now = self.clock.now();
        match self
            .repo
            .activate(session.id, token, session.version, now)
            .await?
        {
            Some(updated) => Ok(updated),
            None => Err(self.missing_or_conflict(session.id).await),
        }
    }

    /// Clears token and expiry and closes the session. Safe to repeat.
    pub async fn set_inactive(&self, id: SessionId) -> SessionResult<Session> {
        self.repo
            .deactivate(id, self.clock.now())
            .await?
            .ok_or_else(|| SessionError::NotFound("session".into()))
    }

    pub async fn increment_redeemed(&self, id: SessionId) -> SessionResult<Session> {
        self.repo
            .increment_redeemed(id, self.clock.now())
            .await?
            .ok_or_else(|| SessionError::NotFound("session".into()))
    }

    pub async fn list_for_date(
        &self,
        date: NaiveDate,
        owner_id: Option<UserId>,
    ) -> SessionResult<Vec<Session>> {
        self.repo.list_for_date(date, owner_id).await
    }

    pub async fn list_for_classes_on(
        &self,
        date: NaiveDate,
        class_ids: Vec<ClassId>,
    ) -> SessionResult<Vec<Session>> {
        if class_ids.is_empty() {
            return Ok(Vec::new());
        }
        self.repo.list_for_classes_on(date, class_ids).await
    }

    pub async fn count_started_for_classes(&self, class_ids: Vec<ClassId>) -> SessionResult<i64> {
        if class_ids.is_empty() {
            return Ok(0);
        }
        self.repo.count_started_for_classes(class_ids).await
    }

    /// Closes every active session whose token has lapsed.
    pub async fn close_expired(&self) -> SessionResult<u64> {
        let closed = self.repo.close_expired(self.clock.now()).await?;
        if closed > 0 {
            tracing::info!(closed, "closed sessions with expired tokens");
        }
        Ok(closed)
    }

    async fn missing_or_conflict(&self, id: SessionId) -> SessionError {
        match self.repo.find_by_id(id).await {
            Ok(Some(_)) => SessionError::Conflict("session was modified concurrently".into()),
            Ok(None) => SessionError::NotFound("session".into()),
            Err(err) => err,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::session::SessionStatus;
    use crate::repositories::session::MockSessionRepositoryTrait;
    use crate::utils::time::ManualClock;
    use chrono::{Duration, TimeZone, Utc};

    fn scheduled(now: chrono::DateTime<Utc>) -> Session {
        Session::new(
            NewSession {
                owner_id: UserId::new(),
                class_id: None,
                title: "Biology".into(),
                scheduled_date: now.date_naive(),
                expected_count: 2,
            },
            now,
        )
    }

    fn registry(repo: MockSessionRepositoryTrait, clock: ManualClock) -> SessionRegistry {
        SessionRegistry::new(Arc::new(repo), Arc::new(clock))
    }

    #[tokio::test]
    async fn lost_version_race_is_a_conflict() {
        let now = Utc.with_ymd_and_hms(2026, 5, 11, 9, 0, 0).unwrap();
        let session = scheduled(now);
        let stored = session.clone();
        let token = Token {
            value: "t".into(),
            session_id: session.id,
            expires_at: now + Duration::minutes(10),
        };

        let mut repo = MockSessionRepositoryTrait::new();
        repo.expect_activate()
            .withf(|_, _, version, _| *version == 0)
            .returning(|_, _, _, _| Ok(None));
        repo.expect_find_by_id()
            .returning(move |_| Ok(Some(stored.clone())));

        let err = registry(repo, ManualClock::new(now))
            .set_active(&session, &token)
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Conflict(_)));
    }

    #[tokio::test]
    async fn activating_a_vanished_session_is_not_found() {
        let now = Utc::now();
        let session = scheduled(now);
        let token = Token {
            value: "t".into(),
            session_id: session.id,
            expires_at: now + Duration::minutes(10),
        };

        let mut repo = MockSessionRepositoryTrait::new();
        repo.expect_activate().returning(|_, _, _, _| Ok(None));
        repo.expect_find_by_id().returning(|_| Ok(None));

        let err = registry(repo, ManualClock::new(now))
            .set_active(&session, &token)
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::NotFound(_)));
    }

    #[tokio::test]
    async fn create_stamps_clock_time_and_scheduled_status() {
        let now = Utc.with_ymd_and_hms(2026, 5, 11, 9, 0, 0).unwrap();
        let mut repo = MockSessionRepositoryTrait::new();
        repo.expect_insert().returning(|s| Ok(s.clone()));

        let created = registry(repo, ManualClock::new(now))
            .create(NewSession {
                owner_id: UserId::new(),
                class_id: None,
                title: "Art".into(),
                scheduled_date: now.date_naive(),
                expected_count: 4,
            })
            .await
            .unwrap();
        assert_eq!(created.status, SessionStatus::Scheduled);
        assert_eq!(created.created_at, now);
        assert_eq!(created.version, 0);
    }

    #[tokio::test]
    async fn storage_failures_propagate() {
        let mut repo = MockSessionRepositoryTrait::new();
        repo.expect_find_by_id()
            .returning(|_| Err(SessionError::Storage(anyhow::anyhow!("connection reset"))));

        let err = registry(repo, ManualClock::new(Utc::now()))
            .get(SessionId::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Storage(_)));
    }
}
