use axum::{
    extract::{Extension, Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppError,
    models::{
        user::{CreateUser, CurrentUser, User},
        PaginatedResponse, PaginationQuery,
    },
    state::AppState,
    validation::Validate,
};

pub async fn get_users(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationQuery>,
) -> Result<Json<PaginatedResponse<User>>, AppError> {
    let limit = pagination.limit();
    let offset = pagination.offset();
    let users = state.repos.users.list_paginated(limit, offset).await?;
    let total = state.repos.users.count_all().await?;
    Ok(Json(PaginatedResponse::new(users, total, limit, offset)))
}

pub async fn create_user(
    State(state): State<AppState>,
    Extension(admin): Extension<CurrentUser>,
    Json(payload): Json<CreateUser>,
) -> Result<(StatusCode, Json<User>), AppError> {
    payload.validate()?;
    let user = User::new(payload, state.clock.now());
    let stored = state.repos.users.insert(&user).await?;
    tracing::info!(
        user_id = %stored.id,
        role = stored.role.as_str(),
        created_by = %admin.id,
        "user registered"
    );
    Ok((StatusCode::CREATED, Json(stored)))
}
