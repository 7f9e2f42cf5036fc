use axum::{
    extract::{Extension, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

use crate::{
    error::AppError,
    models::{
        redemption::{ManualOverrideRequest, RedeemRequest, Redemption, RedemptionResponse},
        session::{CreateSessionRequest, SessionResponse, StartSessionRequest},
        user::CurrentUser,
    },
    services::RedeemAttempt,
    state::AppState,
    types::{SessionId, UserId},
    validation::Validate,
};

pub async fn list_today(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<Vec<SessionResponse>>, AppError> {
    let sessions = state.controller.today_sessions(user).await?;
    Ok(Json(
        sessions
            .into_iter()
            .map(|s| SessionResponse::for_viewer(s, user.id))
            .collect(),
    ))
}

pub async fn get_session(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(session_id): Path<SessionId>,
) -> Result<Json<SessionResponse>, AppError> {
    let session = state.controller.get(session_id).await?;
    Ok(Json(SessionResponse::for_viewer(session, user.id)))
}

pub async fn create_session(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<SessionResponse>), AppError> {
    payload.validate()?;
    let session = state.controller.create(user, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(SessionResponse::for_viewer(session, user.id)),
    ))
}

/// Starting an active session rotates its token.
pub async fn start_session(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(session_id): Path<SessionId>,
    Json(payload): Json<StartSessionRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    let session = state
        .controller
        .start(user, session_id, payload.ttl_minutes)
        .await?;
    Ok(Json(SessionResponse::for_viewer(session, user.id)))
}

pub async fn stop_session(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(session_id): Path<SessionId>,
) -> Result<Json<SessionResponse>, AppError> {
    let session = state.controller.stop(user, session_id).await?;
    Ok(Json(SessionResponse::for_viewer(session, user.id)))
}

pub async fn redeem(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(session_id): Path<SessionId>,
    Json(payload): Json<RedeemRequest>,
) -> Result<Json<RedemptionResponse>, AppError> {
    payload.validate()?;
    let attempt = RedeemAttempt {
        subject_id: user.id,
        candidate: &payload.token,
        occurred_at: state.controller.now(),
        geo: payload.geo,
        notes: payload.notes.clone(),
    };
    let response = state.controller.redeem(session_id, attempt).await?;
    Ok(Json(response))
}

pub async fn list_redemptions(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(session_id): Path<SessionId>,
) -> Result<Json<Vec<Redemption>>, AppError> {
    Ok(Json(state.controller.redemptions(user, session_id).await?))
}

pub async fn override_redemption(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path((session_id, subject_id)): Path<(SessionId, UserId)>,
    Json(payload): Json<ManualOverrideRequest>,
) -> Result<Json<RedemptionResponse>, AppError> {
    payload.validate()?;
    let response = state
        .controller
        .manual_override(user, session_id, subject_id, payload.present, payload.notes)
        .await?;
    Ok(Json(response))
}

pub async fn export_session(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(session_id): Path<SessionId>,
) -> Result<Response, AppError> {
    let export = state.controller.export(user, session_id).await?;
    let disposition = format!(
        "attachment; filename=\"session-{}-{}.csv\"",
        export.session.scheduled_date, export.session.id
    );
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        export.csv,
    )
        .into_response())
}
