//! In-memory store implementing every repository trait.
//!
//! All state sits behind one async `RwLock`; each trait method takes the lock
//! once, so an upsert or a conditional activate is atomic with respect to
//! every other call, which mirrors the row-level guarantees of the
//! PostgreSQL implementation.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::{SessionError, SessionResult};
use crate::models::{
    class::Class,
    redemption::{Redemption, RedemptionExportRow, RedemptionUpsert, UpsertOutcome},
    session::{Session, SessionStatus, Token},
    user::User,
};
use crate::repositories::{
    ClassRepositoryTrait, RedemptionRepositoryTrait, SessionRepositoryTrait, UserRepositoryTrait,
};
use crate::types::{ClassId, SessionId, UserId};

#[derive(Debug, Default)]
struct MemoryState {
    users: HashMap<UserId, User>,
    classes: HashMap<ClassId, Class>,
    enrollments: BTreeSet<(ClassId, UserId)>,
    sessions: HashMap<SessionId, Session>,
    redemptions: HashMap<(SessionId, UserId), Redemption>,
    // Pairs that have been present at least once.
    counted: HashSet<(SessionId, UserId)>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn sort_sessions(sessions: &mut [Session]) {
    sessions.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.id.cmp(&b.id))
    });
}

#[async_trait]
impl SessionRepositoryTrait for MemoryStore {
    async fn insert(&self, session: &Session) -> SessionResult<Session> {
        let mut state = self.state.write().await;
        if state.sessions.contains_key(&session.id) {
            return Err(SessionError::Conflict(format!(
                "session {} already exists",
                session.id
            )));
        }
        state.sessions.insert(session.id, session.clone());
        Ok(session.clone())
    }

    async fn find_by_id(&self, id: SessionId) -> SessionResult<Option<Session>> {
        Ok(self.state.read().await.sessions.get(&id).cloned())
    }

    async fn activate(
        &self,
        id: SessionId,
        token: &Token,
        expected_version: i64,
        now: DateTime<Utc>,
    ) -> SessionResult<Option<Session>> {
        let mut state = self.state.write().await;
        let Some(session) = state.sessions.get_mut(&id) else {
            return Ok(None);
        };
        if session.version != expected_version {
            return Ok(None);
        }
        session.status = SessionStatus::Active;
        session.active_token = Some(token.value.clone());
        session.token_expires_at = Some(token.expires_at);
        session.version += 1;
        session.last_started_at = Some(now);
        session.updated_at = now;
        Ok(Some(session.clone()))
    }

    async fn deactivate(
        &self,
        id: SessionId,
        now: DateTime<Utc>,
    ) -> SessionResult<Option<Session>> {
        let mut state = self.state.write().await;
        let Some(session) = state.sessions.get_mut(&id) else {
            return Ok(None);
        };
        session.status = SessionStatus::Closed;
        session.active_token = None;
        session.token_expires_at = None;
        session.version += 1;
        session.updated_at = now;
        Ok(Some(session.clone()))
    }

    async fn increment_redeemed(
        &self,
        id: SessionId,
        now: DateTime<Utc>,
    ) -> SessionResult<Option<Session>> {
        let mut state = self.state.write().await;
        let Some(session) = state.sessions.get_mut(&id) else {
            return Ok(None);
        };
        session.redeemed_count += 1;
        session.updated_at = now;
        Ok(Some(session.clone()))
    }

    async fn list_for_date(
        &self,
        date: NaiveDate,
        owner_id: Option<UserId>,
    ) -> SessionResult<Vec<Session>> {
        let state = self.state.read().await;
        let mut sessions: Vec<Session> = state
            .sessions
            .values()
            .filter(|s| s.scheduled_date == date)
            .filter(|s| owner_id.map_or(true, |owner| s.owner_id == owner))
            .cloned()
            .collect();
        sort_sessions(&mut sessions);
        Ok(sessions)
    }

    async fn list_for_classes_on(
        &self,
        date: NaiveDate,
        class_ids: Vec<ClassId>,
    ) -> SessionResult<Vec<Session>> {
        let state = self.state.read().await;
        let mut sessions: Vec<Session> = state
            .sessions
            .values()
            .filter(|s| s.scheduled_date == date)
            .filter(|s| s.class_id.map_or(false, |c| class_ids.contains(&c)))
            .cloned()
            .collect();
        sort_sessions(&mut sessions);
        Ok(sessions)
    }

    async fn count_started_for_classes(&self, class_ids: Vec<ClassId>) -> SessionResult<i64> {
        let state = self.state.read().await;
        let total = state
            .sessions
            .values()
            .filter(|s| s.last_started_at.is_some())
            .filter(|s| s.class_id.map_or(false, |c| class_ids.contains(&c)))
            .count();
        Ok(total as i64)
    }

    async fn close_expired(&self, now: DateTime<Utc>) -> SessionResult<u64> {
        let mut state = self.state.write().await;
        let mut closed = 0;
        for session in state.sessions.values_mut() {
            let expired = session.status == SessionStatus::Active
                && session.token_expires_at.map_or(false, |at| at <= now);
            if expired {
                session.status = SessionStatus::Closed;
                session.active_token = None;
                session.token_expires_at = None;
                session.version += 1;
                session.updated_at = now;
                closed += 1;
            }
        }
        Ok(closed)
    }
}

#[async_trait]
impl RedemptionRepositoryTrait for MemoryStore {
    async fn upsert(&self, upsert: &RedemptionUpsert) -> SessionResult<UpsertOutcome> {
        let mut state = self.state.write().await;
        let key = (upsert.session_id, upsert.subject_id);
        let first_present = upsert.present && state.counted.insert(key);
        if let Some(existing) = state.redemptions.get_mut(&key) {
            existing.apply_upsert(upsert);
            return Ok(UpsertOutcome {
                redemption: existing.clone(),
                created: false,
                first_present,
            });
        }
        let redemption = Redemption::from_upsert(upsert);
        state.redemptions.insert(key, redemption.clone());
        Ok(UpsertOutcome {
            redemption,
            created: true,
            first_present,
        })
    }

    async fn find(
        &self,
        session_id: SessionId,
        subject_id: UserId,
    ) -> SessionResult<Option<Redemption>> {
        Ok(self
            .state
            .read()
            .await
            .redemptions
            .get(&(session_id, subject_id))
            .cloned())
    }

    async fn list_for_session(&self, session_id: SessionId) -> SessionResult<Vec<Redemption>> {
        let state = self.state.read().await;
        let mut rows: Vec<Redemption> = state
            .redemptions
            .values()
            .filter(|r| r.session_id == session_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.redeemed_at.cmp(&b.redeemed_at).then_with(|| a.id.cmp(&b.id)));
        Ok(rows)
    }

    async fn export_rows(&self, session_id: SessionId) -> SessionResult<Vec<RedemptionExportRow>> {
        let state = self.state.read().await;
        let mut rows: Vec<RedemptionExportRow> = state
            .redemptions
            .values()
            .filter(|r| r.session_id == session_id)
            .filter_map(|r| {
                state.users.get(&r.subject_id).map(|user| RedemptionExportRow {
                    full_name: user.full_name.clone(),
                    roll_number: user.roll_number.clone(),
                    present: r.present,
                    method: r.method,
                    redeemed_at: r.redeemed_at,
                })
            })
            .collect();
        // Matches `ORDER BY roll_number NULLS LAST, full_name`.
        rows.sort_by(|a, b| {
            match (&a.roll_number, &b.roll_number) {
                (Some(x), Some(y)) => x.cmp(y),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            }
            .then_with(|| a.full_name.cmp(&b.full_name))
        });
        Ok(rows)
    }

    async fn list_for_subject(
        &self,
        subject_id: UserId,
        limit: i64,
    ) -> SessionResult<Vec<Redemption>> {
        let state = self.state.read().await;
        let mut rows: Vec<Redemption> = state
            .redemptions
            .values()
            .filter(|r| r.subject_id == subject_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.redeemed_at.cmp(&a.redeemed_at).then_with(|| a.id.cmp(&b.id)));
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }

    async fn count_present_in_classes(
        &self,
        subject_id: UserId,
        class_ids: Vec<ClassId>,
    ) -> SessionResult<i64> {
        let state = self.state.read().await;
        let total = state
            .redemptions
            .values()
            .filter(|r| r.subject_id == subject_id && r.present)
            .filter(|r| {
                state.sessions.get(&r.session_id).map_or(false, |s| {
                    s.last_started_at.is_some()
                        && s.class_id.map_or(false, |c| class_ids.contains(&c))
                })
            })
            .count();
        Ok(total as i64)
    }
}

#[async_trait]
impl UserRepositoryTrait for MemoryStore {
    async fn insert(&self, user: &User) -> SessionResult<User> {
        let mut state = self.state.write().await;
        if state.users.contains_key(&user.id) {
            return Err(SessionError::Conflict(format!("user {} already exists", user.id)));
        }
        let duplicate_roll = user.roll_number.as_ref().map_or(false, |roll| {
            state
                .users
                .values()
                .any(|u| u.roll_number.as_ref() == Some(roll))
        });
        if duplicate_roll {
            return Err(SessionError::Conflict("roll number already in use".into()));
        }
        state.users.insert(user.id, user.clone());
        Ok(user.clone())
    }

    async fn find_by_id(&self, id: UserId) -> SessionResult<Option<User>> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn list_paginated(&self, limit: i64, offset: i64) -> SessionResult<Vec<User>> {
        let state = self.state.read().await;
        let mut users: Vec<User> = state.users.values().cloned().collect();
        users.sort_by(|a, b| a.full_name.cmp(&b.full_name).then_with(|| a.id.cmp(&b.id)));
        Ok(users
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn count_all(&self) -> SessionResult<i64> {
        Ok(self.state.read().await.users.len() as i64)
    }
}

#[async_trait]
impl ClassRepositoryTrait for MemoryStore {
    async fn insert(&self, class: &Class) -> SessionResult<Class> {
        let mut state = self.state.write().await;
        if state.classes.contains_key(&class.id) {
            return Err(SessionError::Conflict(format!("class {} already exists", class.id)));
        }
        state.classes.insert(class.id, class.clone());
        Ok(class.clone())
    }

    async fn find_by_id(&self, id: ClassId) -> SessionResult<Option<Class>> {
        Ok(self.state.read().await.classes.get(&id).cloned())
    }

    async fn list_for_teacher(&self, teacher_id: UserId) -> SessionResult<Vec<Class>> {
        let state = self.state.read().await;
        let mut classes: Vec<Class> = state
            .classes
            .values()
            .filter(|c| c.teacher_id == teacher_id)
            .cloned()
            .collect();
        classes.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(classes)
    }

    async fn enroll(&self, class_id: ClassId, subject_id: UserId) -> SessionResult<bool> {
        let mut state = self.state.write().await;
        if !state.classes.contains_key(&class_id) || !state.users.contains_key(&subject_id) {
            // Mirrors the foreign keys on class_enrollments.
            return Err(SessionError::Conflict("unknown class or subject".into()));
        }
        Ok(state.enrollments.insert((class_id, subject_id)))
    }

    async fn count_enrolled(&self, class_id: ClassId) -> SessionResult<i64> {
        let state = self.state.read().await;
        let total = state
            .enrollments
            .iter()
            .filter(|(class, _)| *class == class_id)
            .count();
        Ok(total as i64)
    }

    async fn classes_for_subject(&self, subject_id: UserId) -> SessionResult<Vec<ClassId>> {
        let state = self.state.read().await;
        let mut classes: Vec<ClassId> = state
            .enrollments
            .iter()
            .filter(|(_, subject)| *subject == subject_id)
            .map(|(class, _)| *class)
            .collect();
        classes.sort();
        Ok(classes)
    }
}
