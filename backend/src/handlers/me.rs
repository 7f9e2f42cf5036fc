use axum::{
    extract::{Extension, State},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::AppError,
    models::user::{CurrentUser, UserRole},
    services::Dashboard,
    state::AppState,
    types::UserId,
};

#[derive(Debug, Serialize, ToSchema)]
pub struct MeResponse {
    #[schema(value_type = String)]
    pub id: UserId,
    pub role: UserRole,
    /// Directory profile, absent when the identity is not registered locally.
    pub full_name: Option<String>,
    pub roll_number: Option<String>,
}

pub async fn get_me(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<MeResponse>, AppError> {
    let profile = state.repos.users.find_by_id(user.id).await?;
    Ok(Json(MeResponse {
        id: user.id,
        role: user.role,
        full_name: profile.as_ref().map(|p| p.full_name.clone()),
        roll_number: profile.and_then(|p| p.roll_number),
    }))
}

pub async fn get_dashboard(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<Dashboard>, AppError> {
    Ok(Json(state.dashboards.build(user).await?))
}
