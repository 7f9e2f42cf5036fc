//! Session controller: start/stop, token rotation, redemption, manual override.
//!
//! The controller owns no state of its own. Token state lives on the session
//! row and is changed only through [`SessionController::start`] and
//! [`SessionController::stop`].

use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use std::sync::Arc;

use crate::config::Config;
use crate::error::{SessionError, SessionResult};
use crate::models::class::Class;
use crate::models::redemption::{Redemption, RedemptionResponse};
use crate::models::session::{CreateSessionRequest, NewSession, Session};
use crate::models::user::{CurrentUser, UserRole};
use crate::repositories::{ClassRepositoryTrait, Repositories};
use crate::services::export::redemptions_csv;
use crate::services::redemption_ledger::{RedeemAttempt, RedemptionLedger};
use crate::services::session_registry::SessionRegistry;
use crate::services::token_issuer::TokenIssuer;
use crate::types::{ClassId, SessionId, UserId};
use crate::utils::time::{local_date_of, Clock};

/// Token lifetime bounds and the timezone "today" is resolved in.
#[derive(Debug, Clone, Copy)]
pub struct ControllerSettings {
    pub default_ttl_minutes: i64,
    pub max_ttl_minutes: i64,
    pub time_zone: Tz,
}

impl ControllerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            default_ttl_minutes: config.attendance_token_ttl_minutes,
            max_ttl_minutes: config.attendance_token_max_ttl_minutes,
            time_zone: config.time_zone,
        }
    }

    fn resolve_ttl(&self, requested: Option<i64>) -> SessionResult<Duration> {
        let minutes = requested.unwrap_or(self.default_ttl_minutes);
        if minutes <= 0 || minutes > self.max_ttl_minutes {
            return Err(SessionError::Validation(format!(
                "ttl_minutes must be between 1 and {}",
                self.max_ttl_minutes
            )));
        }
        Ok(Duration::minutes(minutes))
    }
}

/// CSV body plus the session it was rendered from.
#[derive(Debug, Clone)]
pub struct SessionExport {
    pub session: Session,
    pub csv: String,
}

#[derive(Clone)]
pub struct SessionController {
    registry: SessionRegistry,
    ledger: RedemptionLedger,
    issuer: TokenIssuer,
    classes: Arc<dyn ClassRepositoryTrait>,
    clock: Arc<dyn Clock>,
    settings: ControllerSettings,
}

impl SessionController {
    pub fn new(repos: &Repositories, clock: Arc<dyn Clock>, settings: ControllerSettings) -> Self {
        Self {
            registry: SessionRegistry::new(repos.sessions.clone(), clock.clone()),
            ledger: RedemptionLedger::new(repos.redemptions.clone(), repos.users.clone()),
            issuer: TokenIssuer::new(clock.clone()),
            classes: repos.classes.clone(),
            clock,
            settings,
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn today(&self) -> NaiveDate {
        local_date_of(self.clock.now(), &self.settings.time_zone)
    }

    pub async fn create(
        &self,
        caller: CurrentUser,
        request: CreateSessionRequest,
    ) -> SessionResult<Session> {
        let class = match request.class_id {
            Some(class_id) => Some(self.class_for_staff(caller, class_id).await?),
            None => None,
        };
        let expected_count = match (request.expected_count, &class) {
            (Some(count), _) => count,
            (None, Some(class)) => {
                let enrolled = self.classes.count_enrolled(class.id).await?;
                i32::try_from(enrolled).unwrap_or(i32::MAX)
            }
            (None, None) => 0,
        };

        self.registry
            .create(NewSession {
                owner_id: caller.id,
                class_id: class.map(|c| c.id),
                title: request.title.trim().to_string(),
                scheduled_date: request.scheduled_date.unwrap_or_else(|| self.today()),
                expected_count,
            })
            .await
    }

    pub async fn get(&self, session_id: SessionId) -> SessionResult<Session> {
        self.registry.get(session_id).await
    }

    /// Issues a fresh token and makes it current. Any previous token stops
    /// validating as soon as this returns.
    pub async fn start(
        &self,
        caller: CurrentUser,
        session_id: SessionId,
        ttl_minutes: Option<i64>,
    ) -> SessionResult<Session> {
        let session = self.owned_session(caller.id, session_id).await?;
        let ttl = self.settings.resolve_ttl(ttl_minutes)?;
        let token = self.issuer.issue(session.id, ttl)?;
        let started = self.registry.set_active(&session, &token).await?;
        tracing::info!(
            session_id = %started.id,
            expires_at = %token.expires_at,
            rotated = session.active_token.is_some(),
            "session started"
        );
        Ok(started)
    }

    pub async fn stop(&self, caller: CurrentUser, session_id: SessionId) -> SessionResult<Session> {
        self.owned_session(caller.id, session_id).await?;
        let stopped = self.registry.set_inactive(session_id).await?;
        tracing::info!(session_id = %stopped.id, redeemed = stopped.redeemed_count, "session stopped");
        Ok(stopped)
    }

    /// Token redemption. The redeemed count moves only when this call is the
    /// subject's first transition to present.
    pub async fn redeem(
        &self,
        session_id: SessionId,
        attempt: RedeemAttempt<'_>,
    ) -> SessionResult<RedemptionResponse> {
        let session = self.registry.get(session_id).await?;
        let subject_id = attempt.subject_id;
        let outcome = self.ledger.redeem(&session, attempt).await?;
        let redeemed_count = self
            .count_if_first_present(&session, outcome.first_present)
            .await?;
        tracing::info!(
            session_id = %session_id,
            subject_id = %subject_id,
            created = outcome.created,
            "attendance redeemed"
        );
        Ok(RedemptionResponse {
            redemption: outcome.redemption,
            redeemed_count,
            created: outcome.created,
        })
    }

    pub async fn manual_override(
        &self,
        caller: CurrentUser,
        session_id: SessionId,
        subject_id: UserId,
        present: bool,
        notes: Option<String>,
    ) -> SessionResult<RedemptionResponse> {
        let session = self.registry.get(session_id).await?;
        let outcome = self
            .ledger
            .manual_override(&session, caller.id, subject_id, present, self.now(), notes)
            .await?;
        let redeemed_count = self
            .count_if_first_present(&session, outcome.first_present)
            .await?;
        Ok(RedemptionResponse {
            redemption: outcome.redemption,
            redeemed_count,
            created: outcome.created,
        })
    }

    pub async fn redemptions(
        &self,
        caller: CurrentUser,
        session_id: SessionId,
    ) -> SessionResult<Vec<Redemption>> {
        let session = self.viewable_roster(caller, session_id).await?;
        self.ledger.list(session.id).await
    }

    pub async fn export(
        &self,
        caller: CurrentUser,
        session_id: SessionId,
    ) -> SessionResult<SessionExport> {
        let session = self.viewable_roster(caller, session_id).await?;
        let rows = self.ledger.export_rows(session.id).await?;
        let csv = redemptions_csv(&rows, &self.settings.time_zone)?;
        Ok(SessionExport { session, csv })
    }

    /// Sessions scheduled today that concern the caller.
    ///
    /// Students see sessions of classes they are enrolled in, teachers see
    /// their own, admins and counselors see every session.
    pub async fn today_sessions(&self, caller: CurrentUser) -> SessionResult<Vec<Session>> {
        let today = self.today();
        match caller.role {
            UserRole::Student => {
                let class_ids = self.classes.classes_for_subject(caller.id).await?;
                self.registry.list_for_classes_on(today, class_ids).await
            }
            UserRole::Teacher => self.registry.list_for_date(today, Some(caller.id)).await,
            UserRole::Admin | UserRole::Counselor => self.registry.list_for_date(today, None).await,
        }
    }

    async fn count_if_first_present(
        &self,
        session: &Session,
        first_present: bool,
    ) -> SessionResult<i32> {
        if first_present {
            Ok(self.registry.increment_redeemed(session.id).await?.redeemed_count)
        } else {
            Ok(session.redeemed_count)
        }
    }

    async fn owned_session(&self, caller: UserId, session_id: SessionId) -> SessionResult<Session> {
        let session = self.registry.get(session_id).await?;
        if !session.is_owned_by(caller) {
            return Err(SessionError::Unauthorized(
                "only the session owner may start or stop it".into(),
            ));
        }
        Ok(session)
    }

    async fn viewable_roster(
        &self,
        caller: CurrentUser,
        session_id: SessionId,
    ) -> SessionResult<Session> {
        let session = self.registry.get(session_id).await?;
        if session.is_owned_by(caller.id) || caller.role.is_admin() {
            Ok(session)
        } else {
            Err(SessionError::Unauthorized(
                "roster is visible to the session owner only".into(),
            ))
        }
    }

    async fn class_for_staff(
        &self,
        caller: CurrentUser,
        class_id: ClassId,
    ) -> SessionResult<Class> {
        let class = self
            .classes
            .find_by_id(class_id)
            .await?
            .ok_or_else(|| SessionError::NotFound("class".into()))?;
        if class.teacher_id != caller.id && !caller.role.is_admin() {
            return Err(SessionError::Unauthorized(
                "class belongs to another teacher".into(),
            ));
        }
        Ok(class)
    }
}
