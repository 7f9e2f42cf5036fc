use axum::http::StatusCode;
use rollcall_backend::{build_router, models::user::UserRole};
use serde_json::json;
use tower::ServiceExt;

mod support;

use support::{body_json, create_test_token, get_request, json_request, memory_app, seed_user};

#[tokio::test]
async fn admin_registers_and_lists_users() {
    let app = memory_app();
    let admin = seed_user(&app.state.repos, UserRole::Admin, "Principal").await;
    let token = create_test_token(admin.id, UserRole::Admin);
    let router = build_router(app.state);

    let response = router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/admin/users",
            &token,
            json!({ "full_name": "Chika Mori", "roll_number": "8B-12", "role": "student" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body_json(response).await;
    assert_eq!(created["roll_number"], "8B-12");

    // Roll numbers are unique.
    let response = router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/admin/users",
            &token,
            json!({ "full_name": "Someone Else", "roll_number": "8B-12", "role": "student" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/admin/users",
            &token,
            json!({ "full_name": "Bad Roll", "roll_number": "8B 12!", "role": "student" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = router
        .oneshot(get_request("/api/admin/users?limit=1", &token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let page = body_json(response).await;
    assert_eq!(page["total"], 2);
    assert_eq!(page["limit"], 1);
    assert_eq!(page["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn teacher_creates_class_and_enrolls_students() {
    let app = memory_app();
    let repos = app.state.repos.clone();
    let teacher = seed_user(&repos, UserRole::Teacher, "Ms Ueda").await;
    let other = seed_user(&repos, UserRole::Teacher, "Mr Sato").await;
    let student = seed_user(&repos, UserRole::Student, "Alice").await;
    let token = create_test_token(teacher.id, UserRole::Teacher);
    let other_token = create_test_token(other.id, UserRole::Teacher);
    let router = build_router(app.state);

    let response = router
        .clone()
        .oneshot(json_request("POST", "/api/classes", &token, json!({ "name": "9C" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let class_id = body_json(response).await["id"].as_str().unwrap().to_string();
    let enroll_uri = format!("/api/classes/{}/enrollments", class_id);

    let response = router
        .clone()
        .oneshot(json_request("POST", &enroll_uri, &token, json!({ "subject_id": student.id })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let enrolled = body_json(response).await;
    assert_eq!(enrolled["newly_enrolled"], true);
    assert_eq!(enrolled["enrolled_count"], 1);

    // Enrolling again is a no-op.
    let response = router
        .clone()
        .oneshot(json_request("POST", &enroll_uri, &token, json!({ "subject_id": student.id })))
        .await
        .unwrap();
    assert_eq!(body_json(response).await["newly_enrolled"], false);

    // Teachers cannot be enrolled, and other teachers cannot enroll.
    let response = router
        .clone()
        .oneshot(json_request("POST", &enroll_uri, &token, json!({ "subject_id": other.id })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let response = router
        .clone()
        .oneshot(json_request(
            "POST",
            &enroll_uri,
            &other_token,
            json!({ "subject_id": student.id }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = router
        .oneshot(get_request("/api/classes", &token))
        .await
        .unwrap();
    let classes = body_json(response).await;
    assert_eq!(classes.as_array().unwrap().len(), 1);
    assert_eq!(classes[0]["enrolled_count"], 1);
}
