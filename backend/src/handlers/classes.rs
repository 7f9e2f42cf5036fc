use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::AppError,
    models::{
        class::{Class, ClassResponse, CreateClassRequest, EnrollRequest},
        user::{CurrentUser, UserRole},
    },
    state::AppState,
    types::{ClassId, UserId},
    validation::Validate,
};

#[derive(Debug, Serialize, ToSchema)]
pub struct EnrollmentResponse {
    #[schema(value_type = String)]
    pub class_id: ClassId,
    #[schema(value_type = String)]
    pub subject_id: UserId,
    /// False when the student was already enrolled.
    pub newly_enrolled: bool,
    pub enrolled_count: i64,
}

pub async fn create_class(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<CreateClassRequest>,
) -> Result<(StatusCode, Json<ClassResponse>), AppError> {
    payload.validate()?;
    let class = Class::new(&payload.name, user.id, state.clock.now());
    let stored = state.repos.classes.insert(&class).await?;
    tracing::info!(class_id = %stored.id, teacher_id = %user.id, "class created");
    Ok((StatusCode::CREATED, Json(ClassResponse::new(stored, 0))))
}

pub async fn list_classes(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<Vec<ClassResponse>>, AppError> {
    let mut responses = Vec::new();
    for class in state.repos.classes.list_for_teacher(user.id).await? {
        let enrolled = state.repos.classes.count_enrolled(class.id).await?;
        responses.push(ClassResponse::new(class, enrolled));
    }
    Ok(Json(responses))
}

pub async fn enroll_student(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(class_id): Path<ClassId>,
    Json(payload): Json<EnrollRequest>,
) -> Result<Json<EnrollmentResponse>, AppError> {
    let class = state
        .repos
        .classes
        .find_by_id(class_id)
        .await?
        .ok_or_else(|| AppError::NotFound("class not found".into()))?;
    if class.teacher_id != user.id && !user.role.is_admin() {
        return Err(AppError::Forbidden("class belongs to another teacher".into()));
    }

    let subject = state
        .repos
        .users
        .find_by_id(payload.subject_id)
        .await?
        .ok_or_else(|| AppError::NotFound("subject not found".into()))?;
    if subject.role != UserRole::Student {
        return Err(AppError::BadRequest("only students can be enrolled".into()));
    }

    let newly_enrolled = state.repos.classes.enroll(class.id, subject.id).await?;
    let enrolled_count = state.repos.classes.count_enrolled(class.id).await?;
    Ok(Json(EnrollmentResponse {
        class_id: class.id,
        subject_id: subject.id,
        newly_enrolled,
        enrolled_count,
    }))
}
