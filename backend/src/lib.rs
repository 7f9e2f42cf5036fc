pub mod config;
pub mod db;
pub mod docs;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod repositories;
pub mod services;
pub mod state;
pub mod types;
pub mod utils;
pub mod validation;

use axum::{
    http::{HeaderValue, Method},
    middleware as axum_middleware,
    routing::{get, post, put},
    Json, Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;

use crate::{config::Config, middleware as auth_middleware, state::AppState};

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(docs::ApiDoc::openapi())
}

/// Builds the full API router over `state`.
pub fn build_router(state: AppState) -> Router {
    // Build public routes (no auth)
    let public_routes = Router::new()
        .route("/api/health", get(handlers::health::health))
        .route("/api/docs/openapi.json", get(openapi_json));

    // Any authenticated caller
    let user_routes = Router::new()
        .route("/api/me", get(handlers::me::get_me))
        .route("/api/dashboard", get(handlers::me::get_dashboard))
        .route("/api/sessions/today", get(handlers::sessions::list_today))
        .route("/api/sessions/{id}", get(handlers::sessions::get_session))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth_middleware::auth,
        ));

    let student_routes = Router::new()
        .route("/api/sessions/{id}/redeem", post(handlers::sessions::redeem))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth_middleware::auth_student,
        ));

    // Teachers, counselors, and admins
    let staff_routes = Router::new()
        .route("/api/sessions", post(handlers::sessions::create_session))
        .route(
            "/api/sessions/{id}/start",
            post(handlers::sessions::start_session),
        )
        .route(
            "/api/sessions/{id}/stop",
            post(handlers::sessions::stop_session),
        )
        .route(
            "/api/sessions/{id}/redemptions",
            get(handlers::sessions::list_redemptions),
        )
        .route(
            "/api/sessions/{id}/redemptions/{subject_id}",
            put(handlers::sessions::override_redemption),
        )
        .route(
            "/api/sessions/{id}/export",
            get(handlers::sessions::export_session),
        )
        .route(
            "/api/classes",
            get(handlers::classes::list_classes).post(handlers::classes::create_class),
        )
        .route(
            "/api/classes/{id}/enrollments",
            post(handlers::classes::enroll_student),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth_middleware::auth_staff,
        ));

    let admin_routes = Router::new()
        .route(
            "/api/admin/users",
            get(handlers::admin::get_users).post(handlers::admin::create_user),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth_middleware::auth_admin,
        ));

    let cors = cors_layer(&state.config);

    Router::new()
        .merge(public_routes)
        .merge(user_routes)
        .merge(student_routes)
        .merge(staff_routes)
        .merge(admin_routes)
        .layer(
            ServiceBuilder::new()
                .layer(axum_middleware::from_fn(auth_middleware::request_id))
                .layer(TraceLayer::new_for_http())
                .layer(axum_middleware::from_fn(
                    auth_middleware::log_error_responses,
                ))
                .layer(cors),
        )
        .with_state(state)
}

fn cors_layer(config: &Config) -> CorsLayer {
    let origin = if config.allows_any_origin() {
        AllowOrigin::from(Any)
    } else {
        let origins: Vec<HeaderValue> = config
            .cors_allow_origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(origin = %origin, "ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any)
        .max_age(std::time::Duration::from_secs(24 * 60 * 60))
}
