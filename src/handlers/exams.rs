// src/handlers/exams.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::{
    error::AppError,
    extractors::AppJson,
    models::exam::{CreateExamRequest, Exam, ExamView, PublicExam},
    store::DynStore,
    utils::jwt::Claims,
};

/// Lists active exams. Answer keys are stripped for every caller.
#[utoipa::path(
    get,
    path = "/api/exams",
    tag = "exams",
    responses(
        (status = 200, description = "Active exams", body = [PublicExam]),
        (status = 401, description = "Not authenticated"),
    )
)]
pub async fn list_exams(State(store): State<DynStore>) -> Result<impl IntoResponse, AppError> {
    let exams: Vec<PublicExam> = store
        .list_active_exams()
        .await?
        .iter()
        .map(Exam::redacted)
        .collect();

    Ok(Json(exams))
}

/// Fetches one exam for taking or editing.
///
/// Admins get the full exam including `correctAnswer`; everyone else gets the
/// redacted projection.
#[utoipa::path(
    get,
    path = "/api/exams/{id}",
    tag = "exams",
    params(("id" = i64, Path, description = "Exam id")),
    responses(
        (status = 200, description = "Exam, redacted unless the caller is an admin", body = PublicExam),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "Exam not found"),
    )
)]
pub async fn get_exam(
    State(store): State<DynStore>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let exam = store
        .find_exam(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Exam not found".to_string()))?;

    Ok(Json(ExamView::for_role(exam, claims.role)))
}

/// Creates an exam. Admin only.
#[utoipa::path(
    post,
    path = "/api/exams",
    tag = "exams",
    request_body = CreateExamRequest,
    responses(
        (status = 201, description = "Exam created", body = Exam),
        (status = 400, description = "Validation failed"),
        (status = 403, description = "Admin access required"),
    )
)]
pub async fn create_exam(
    State(store): State<DynStore>,
    Extension(claims): Extension<Claims>,
    AppJson(payload): AppJson<CreateExamRequest>,
) -> Result<impl IntoResponse, AppError> {
    let new_exam = payload.into_new_exam(claims.user_id()?)?;
    let exam = store.create_exam(new_exam).await?;

    tracing::info!(
        exam_id = exam.id,
        questions = exam.question_count(),
        total_marks = exam.total_marks,
        "Exam created"
    );

    Ok((StatusCode::CREATED, Json(exam)))
}

/// Replaces an exam's settings and questions. Admin only.
///
/// Past results keep the total they were graded against.
#[utoipa::path(
    put,
    path = "/api/exams/{id}",
    tag = "exams",
    params(("id" = i64, Path, description = "Exam id")),
    request_body = CreateExamRequest,
    responses(
        (status = 200, description = "Exam updated", body = Exam),
        (status = 400, description = "Validation failed"),
        (status = 403, description = "Admin access required"),
        (status = 404, description = "Exam not found"),
    )
)]
pub async fn update_exam(
    State(store): State<DynStore>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    AppJson(payload): AppJson<CreateExamRequest>,
) -> Result<impl IntoResponse, AppError> {
    let new_exam = payload.into_new_exam(claims.user_id()?)?;

    let exam = store
        .update_exam(id, new_exam)
        .await?
        .ok_or_else(|| AppError::NotFound("Exam not found".to_string()))?;

    tracing::info!(exam_id = exam.id, "Exam updated");

    Ok(Json(exam))
}

/// Deletes an exam. Admin only.
#[utoipa::path(
    delete,
    path = "/api/exams/{id}",
    tag = "exams",
    params(("id" = i64, Path, description = "Exam id")),
    responses(
        (status = 200, description = "Exam deleted"),
        (status = 403, description = "Admin access required"),
        (status = 404, description = "Exam not found"),
    )
)]
pub async fn delete_exam(
    State(store): State<DynStore>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    if !store.delete_exam(id).await? {
        return Err(AppError::NotFound("Exam not found".to_string()));
    }

    tracing::info!(exam_id = id, "Exam deleted");

    Ok(Json(serde_json::json!({ "message": "Exam deleted successfully" })))
}
