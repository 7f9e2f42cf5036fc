#![allow(dead_code)] // OpenAPI doc stubs are only referenced by utoipa macros.

use crate::{
    error::{ErrorResponse, TokenRejection},
    handlers::{classes::EnrollmentResponse, health::HealthResponse, me::MeResponse},
    models::{
        class::{ClassResponse, CreateClassRequest, EnrollRequest},
        redemption::{
            GeoPoint, ManualOverrideRequest, RedeemRequest, Redemption, RedemptionMethod,
            RedemptionResponse,
        },
        session::{CreateSessionRequest, SessionResponse, SessionStatus, StartSessionRequest},
        user::{CreateUser, User, UserRole},
        PaginationQuery,
    },
    services::{
        dashboard::{Dashboard, StaffDashboard, StudentDashboard, TeacherDashboard},
        suggestions::{ActivitySuggestion, SuggestionKind},
    },
};
use utoipa::{
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
    Modify, OpenApi,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        health_doc,
        me_doc,
        dashboard_doc,
        today_sessions_doc,
        get_session_doc,
        create_session_doc,
        start_session_doc,
        stop_session_doc,
        redeem_doc,
        list_redemptions_doc,
        override_redemption_doc,
        export_session_doc,
        create_class_doc,
        list_classes_doc,
        enroll_doc,
        admin_get_users_doc,
        admin_create_user_doc
    ),
    components(
        schemas(
            ErrorResponse,
            TokenRejection,
            HealthResponse,
            MeResponse,
            // sessions
            SessionStatus,
            SessionResponse,
            CreateSessionRequest,
            StartSessionRequest,
            // redemptions
            RedemptionMethod,
            GeoPoint,
            Redemption,
            RedeemRequest,
            ManualOverrideRequest,
            RedemptionResponse,
            // classes
            CreateClassRequest,
            EnrollRequest,
            ClassResponse,
            EnrollmentResponse,
            // users
            UserRole,
            User,
            CreateUser,
            // dashboards
            Dashboard,
            StudentDashboard,
            TeacherDashboard,
            StaffDashboard,
            ActivitySuggestion,
            SuggestionKind
        )
    ),
    modifiers(&SecuritySchemes),
    tags(
        (name = "System", description = "Liveness and identity"),
        (name = "Sessions", description = "Attendance sessions, tokens, and redemption"),
        (name = "Classes", description = "Classes and enrollment"),
        (name = "Admin", description = "User directory administration")
    ),
    security(("BearerAuth" = []))
)]
pub struct ApiDoc;

struct SecuritySchemes;

impl Modify for SecuritySchemes {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_default();

        let mut bearer = Http::new(HttpAuthScheme::Bearer);
        bearer.bearer_format = Some("JWT".to_string());

        components.add_security_scheme("BearerAuth", SecurityScheme::Http(bearer));
    }
}

#[utoipa::path(
    get,
    path = "/api/health",
    responses((status = 200, body = HealthResponse)),
    tag = "System",
    security(())
)]
fn health_doc() {}

#[utoipa::path(
    get,
    path = "/api/me",
    responses(
        (status = 200, description = "Caller identity and profile", body = MeResponse),
        (status = 401, description = "Missing or invalid bearer token")
    ),
    tag = "System"
)]
fn me_doc() {}

#[utoipa::path(
    get,
    path = "/api/dashboard",
    responses((status = 200, description = "Role-specific dashboard", body = Dashboard)),
    tag = "System"
)]
fn dashboard_doc() {}

#[utoipa::path(
    get,
    path = "/api/sessions/today",
    responses((status = 200, body = [SessionResponse])),
    tag = "Sessions"
)]
fn today_sessions_doc() {}

#[utoipa::path(
    get,
    path = "/api/sessions/{id}",
    params(("id" = String, Path, description = "Session id")),
    responses(
        (status = 200, description = "Token is included for the owner only", body = SessionResponse),
        (status = 404, body = ErrorResponse)
    ),
    tag = "Sessions"
)]
fn get_session_doc() {}

#[utoipa::path(
    post,
    path = "/api/sessions",
    request_body = CreateSessionRequest,
    responses(
        (status = 201, body = SessionResponse),
        (status = 400, body = ErrorResponse)
    ),
    tag = "Sessions"
)]
fn create_session_doc() {}

#[utoipa::path(
    post,
    path = "/api/sessions/{id}/start",
    params(("id" = String, Path, description = "Session id")),
    request_body = StartSessionRequest,
    responses(
        (status = 200, description = "New token is current; any previous token is rejected", body = SessionResponse),
        (status = 403, body = ErrorResponse),
        (status = 409, description = "Concurrent start", body = ErrorResponse)
    ),
    tag = "Sessions"
)]
fn start_session_doc() {}

#[utoipa::path(
    post,
    path = "/api/sessions/{id}/stop",
    params(("id" = String, Path, description = "Session id")),
    responses((status = 200, body = SessionResponse)),
    tag = "Sessions"
)]
fn stop_session_doc() {}

#[utoipa::path(
    post,
    path = "/api/sessions/{id}/redeem",
    params(("id" = String, Path, description = "Session id")),
    request_body = RedeemRequest,
    responses(
        (status = 200, body = RedemptionResponse),
        (status = 409, description = "Session is not active", body = ErrorResponse),
        (status = 422, description = "Token mismatch or expired", body = ErrorResponse)
    ),
    tag = "Sessions"
)]
fn redeem_doc() {}

#[utoipa::path(
    get,
    path = "/api/sessions/{id}/redemptions",
    params(("id" = String, Path, description = "Session id")),
    responses((status = 200, body = [Redemption])),
    tag = "Sessions"
)]
fn list_redemptions_doc() {}

#[utoipa::path(
    put,
    path = "/api/sessions/{id}/redemptions/{subject_id}",
    params(
        ("id" = String, Path, description = "Session id"),
        ("subject_id" = String, Path, description = "Student id")
    ),
    request_body = ManualOverrideRequest,
    responses(
        (status = 200, body = RedemptionResponse),
        (status = 403, description = "Caller does not own the session", body = ErrorResponse)
    ),
    tag = "Sessions"
)]
fn override_redemption_doc() {}

#[utoipa::path(
    get,
    path = "/api/sessions/{id}/export",
    params(("id" = String, Path, description = "Session id")),
    responses((status = 200, description = "CSV roster", content_type = "text/csv", body = String)),
    tag = "Sessions"
)]
fn export_session_doc() {}

#[utoipa::path(
    post,
    path = "/api/classes",
    request_body = CreateClassRequest,
    responses((status = 201, body = ClassResponse)),
    tag = "Classes"
)]
fn create_class_doc() {}

#[utoipa::path(
    get,
    path = "/api/classes",
    responses((status = 200, body = [ClassResponse])),
    tag = "Classes"
)]
fn list_classes_doc() {}

#[utoipa::path(
    post,
    path = "/api/classes/{id}/enrollments",
    params(("id" = String, Path, description = "Class id")),
    request_body = EnrollRequest,
    responses((status = 200, body = EnrollmentResponse)),
    tag = "Classes"
)]
fn enroll_doc() {}

#[utoipa::path(
    get,
    path = "/api/admin/users",
    params(PaginationQuery),
    responses((status = 200, description = "Paginated users", body = serde_json::Value)),
    tag = "Admin"
)]
fn admin_get_users_doc() {}

#[utoipa::path(
    post,
    path = "/api/admin/users",
    request_body = CreateUser,
    responses(
        (status = 201, body = User),
        (status = 409, description = "Roll number already in use", body = ErrorResponse)
    ),
    tag = "Admin"
)]
fn admin_create_user_doc() {}
