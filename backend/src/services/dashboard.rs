//! Role dashboards. The variant is chosen once from the caller's role.

use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::error::SessionResult;
use crate::models::class::ClassResponse;
use crate::models::redemption::Redemption;
use crate::models::session::{SessionResponse, SessionStatus};
use crate::models::user::{CurrentUser, UserRole};
use crate::repositories::Repositories;
use crate::services::session_controller::SessionController;
use crate::services::suggestions::{suggest, ActivitySuggestion, AttendanceSnapshot};

const RECENT_REDEMPTIONS: i64 = 10;

#[derive(Debug, Serialize, ToSchema)]
pub struct StudentDashboard {
    pub today: Vec<SessionResponse>,
    pub recent: Vec<Redemption>,
    pub present_total: i64,
    pub sessions_held: i64,
    pub attendance_rate: Option<f64>,
    pub suggestions: Vec<ActivitySuggestion>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TeacherDashboard {
    pub classes: Vec<ClassResponse>,
    pub today: Vec<SessionResponse>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StaffDashboard {
    pub today: Vec<SessionResponse>,
    pub active_now: usize,
    pub redeemed_today: i64,
    pub expected_today: i64,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Dashboard {
    Student(StudentDashboard),
    Teacher(TeacherDashboard),
    /// Admins and counselors.
    Staff(StaffDashboard),
}

#[derive(Clone)]
pub struct DashboardService {
    repos: Repositories,
    controller: SessionController,
}

impl DashboardService {
    pub fn new(repos: Repositories, controller: SessionController) -> Self {
        Self { repos, controller }
    }

    pub async fn build(&self, caller: CurrentUser) -> SessionResult<Dashboard> {
        match caller.role {
            UserRole::Student => self.student(caller).await.map(Dashboard::Student),
            UserRole::Teacher => self.teacher(caller).await.map(Dashboard::Teacher),
            UserRole::Admin | UserRole::Counselor => self.staff(caller).await.map(Dashboard::Staff),
        }
    }

    async fn student(&self, caller: CurrentUser) -> SessionResult<StudentDashboard> {
        let today = self.today_for(caller).await?;
        let class_ids = self.repos.classes.classes_for_subject(caller.id).await?;
        let sessions_held = self
            .controller
            .registry()
            .count_started_for_classes(class_ids.clone())
            .await?;
        let present_total = self
            .repos
            .redemptions
            .count_present_in_classes(caller.id, class_ids)
            .await?;
        let recent = self
            .repos
            .redemptions
            .list_for_subject(caller.id, RECENT_REDEMPTIONS)
            .await?;

        let snapshot = AttendanceSnapshot {
            present_total,
            sessions_held,
            recent: &recent,
        };
        let attendance_rate = snapshot.rate();
        let suggestions = suggest(&snapshot);
        Ok(StudentDashboard {
            today,
            recent,
            present_total,
            sessions_held,
            attendance_rate,
            suggestions,
        })
    }

    async fn teacher(&self, caller: CurrentUser) -> SessionResult<TeacherDashboard> {
        let mut classes = Vec::new();
        for class in self.repos.classes.list_for_teacher(caller.id).await? {
            let enrolled = self.repos.classes.count_enrolled(class.id).await?;
            classes.push(ClassResponse::new(class, enrolled));
        }
        let today = self.today_for(caller).await?;
        Ok(TeacherDashboard { classes, today })
    }

    async fn staff(&self, caller: CurrentUser) -> SessionResult<StaffDashboard> {
        let sessions = self.controller.today_sessions(caller).await?;
        let active_now = sessions
            .iter()
            .filter(|s| s.status == SessionStatus::Active)
            .count();
        let redeemed_today = sessions.iter().map(|s| i64::from(s.redeemed_count)).sum();
        let expected_today = sessions.iter().map(|s| i64::from(s.expected_count)).sum();
        let today = sessions
            .into_iter()
            .map(|s| SessionResponse::for_viewer(s, caller.id))
            .collect();
        Ok(StaffDashboard {
            today,
            active_now,
            redeemed_today,
            expected_today,
        })
    }

    async fn today_for(&self, caller: CurrentUser) -> SessionResult<Vec<SessionResponse>> {
        Ok(self
            .controller
            .today_sessions(caller)
            .await?
            .into_iter()
            .map(|s| SessionResponse::for_viewer(s, caller.id))
            .collect())
    }
}
