use axum::http::StatusCode;
use rollcall_backend::{
    build_router,
    models::{session::CreateSessionRequest, user::{CurrentUser, UserRole}},
    services::{Dashboard, RedeemAttempt},
};
use tower::ServiceExt;

mod support;

use support::{body_json, create_test_token, get_request, memory_app, seed_class, seed_user};

#[tokio::test]
async fn dashboard_variant_follows_role() {
    let app = memory_app();
    let repos = app.state.repos.clone();
    let teacher = seed_user(&repos, UserRole::Teacher, "Ms Ueda").await;
    let student = seed_user(&repos, UserRole::Student, "Alice").await;
    let counselor = seed_user(&repos, UserRole::Counselor, "Mr Hara").await;
    seed_class(&repos, &teacher, &[&student]).await;
    let router = build_router(app.state);

    for (user, role, kind) in [
        (&student, UserRole::Student, "student"),
        (&teacher, UserRole::Teacher, "teacher"),
        (&counselor, UserRole::Counselor, "staff"),
    ] {
        let response = router
            .clone()
            .oneshot(get_request("/api/dashboard", &create_test_token(user.id, role)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["kind"], kind);
    }
}

#[tokio::test]
async fn student_dashboard_reports_rate_and_suggestions() {
    let app = memory_app();
    let repos = app.state.repos.clone();
    let teacher = seed_user(&repos, UserRole::Teacher, "Ms Ueda").await;
    let student = seed_user(&repos, UserRole::Student, "Alice").await;
    let class = seed_class(&repos, &teacher, &[&student]).await;
    let owner = CurrentUser::new(teacher.id, UserRole::Teacher);
    let pupil = CurrentUser::new(student.id, UserRole::Student);
    let controller = app.state.controller.clone();

    // Before any session was held.
    let Dashboard::Student(empty) = app.state.dashboards.build(pupil).await.unwrap() else {
        panic!("expected student dashboard");
    };
    assert_eq!(empty.attendance_rate, None);
    assert_eq!(empty.suggestions.len(), 1);

    // Two sessions held, attended one.
    for attend in [true, false] {
        let session = controller
            .create(
                owner,
                CreateSessionRequest {
                    title: "Science".into(),
                    class_id: Some(class.id),
                    scheduled_date: None,
                    expected_count: None,
                },
            )
            .await
            .unwrap();
        let token = controller
            .start(owner, session.id, None)
            .await
            .unwrap()
            .active_token
            .unwrap();
        if attend {
            controller
                .redeem(
                    session.id,
                    RedeemAttempt {
                        subject_id: student.id,
                        candidate: &token,
                        occurred_at: controller.now(),
                        geo: None,
                        notes: None,
                    },
                )
                .await
                .unwrap();
        }
    }

    let Dashboard::Student(dashboard) = app.state.dashboards.build(pupil).await.unwrap() else {
        panic!("expected student dashboard");
    };
    assert_eq!(dashboard.sessions_held, 2);
    assert_eq!(dashboard.present_total, 1);
    assert_eq!(dashboard.attendance_rate, Some(0.5));
    assert_eq!(dashboard.today.len(), 2);
    assert!(dashboard.today.iter().all(|s| s.token.is_none()));
    assert_eq!(dashboard.recent.len(), 1);
    assert!(!dashboard.suggestions.is_empty());
}

#[tokio::test]
async fn teacher_dashboard_lists_classes_with_enrollment() {
    let app = memory_app();
    let repos = app.state.repos.clone();
    let teacher = seed_user(&repos, UserRole::Teacher, "Ms Ueda").await;
    let a = seed_user(&repos, UserRole::Student, "A").await;
    let b = seed_user(&repos, UserRole::Student, "B").await;
    seed_class(&repos, &teacher, &[&a, &b]).await;

    let Dashboard::Teacher(dashboard) = app
        .state
        .dashboards
        .build(CurrentUser::new(teacher.id, UserRole::Teacher))
        .await
        .unwrap()
    else {
        panic!("expected teacher dashboard");
    };
    assert_eq!(dashboard.classes.len(), 1);
    assert_eq!(dashboard.classes[0].enrolled_count, 2);
    assert!(dashboard.today.is_empty());
}

#[tokio::test]
async fn attendance_rate_ignores_sessions_outside_enrolled_classes() {
    let app = memory_app();
    let repos = app.state.repos.clone();
    let teacher = seed_user(&repos, UserRole::Teacher, "Ms Ueda").await;
    let student = seed_user(&repos, UserRole::Student, "Alice").await;
    let class = seed_class(&repos, &teacher, &[&student]).await;
    let owner = CurrentUser::new(teacher.id, UserRole::Teacher);
    let controller = app.state.controller.clone();

    // One class session missed, one assembly without a class attended.
    for class_id in [Some(class.id), None] {
        let session = controller
            .create(
                owner,
                CreateSessionRequest {
                    title: "Morning".into(),
                    class_id,
                    scheduled_date: None,
                    expected_count: Some(1),
                },
            )
            .await
            .unwrap();
        let token = controller
            .start(owner, session.id, None)
            .await
            .unwrap()
            .active_token
            .unwrap();
        if class_id.is_none() {
            controller
                .redeem(
                    session.id,
                    RedeemAttempt {
                        subject_id: student.id,
                        candidate: &token,
                        occurred_at: controller.now(),
                        geo: None,
                        notes: None,
                    },
                )
                .await
                .unwrap();
        }
    }

    let Dashboard::Student(dashboard) = app
        .state
        .dashboards
        .build(CurrentUser::new(student.id, UserRole::Student))
        .await
        .unwrap()
    else {
        panic!("expected student dashboard");
    };
    assert_eq!(dashboard.sessions_held, 1);
    assert_eq!(dashboard.present_total, 0);
    assert_eq!(dashboard.attendance_rate, Some(0.0));
}
