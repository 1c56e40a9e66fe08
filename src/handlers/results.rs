// src/handlers/results.rs

use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};

use crate::{
    error::AppError,
    extractors::AppJson,
    grading,
    models::result::{ResultView, SubmitExamRequest, SubmitResponse},
    store::DynStore,
    utils::jwt::Claims,
};

/// Grades and stores an exam attempt.
///
/// * Looks up the exam with its answer key.
/// * Rejects malformed answer sets before anything is graded.
/// * Persists the graded result and returns the score summary.
///
/// A repeated `submissionId` from the same student returns the first result
/// with 200 instead of creating another one. Reusing it for a different exam
/// is a 409.
#[utoipa::path(
    post,
    path = "/api/results/submit",
    tag = "results",
    request_body = SubmitExamRequest,
    responses(
        (status = 201, description = "Exam graded", body = SubmitResponse),
        (status = 200, description = "Submission already recorded", body = SubmitResponse),
        (status = 400, description = "Malformed answer set"),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "Exam not found"),
        (status = 409, description = "Submission id already used for another exam"),
    )
)]
pub async fn submit_exam(
    State(store): State<DynStore>,
    Extension(claims): Extension<Claims>,
    AppJson(req): AppJson<SubmitExamRequest>,
) -> Result<impl IntoResponse, AppError> {
    let student_id = claims.user_id()?;

    let exam = store
        .find_exam(req.exam_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Exam not found".to_string()))?;

    grading::validate_submission(&exam, &req.answers)?;

    let graded = grading::grade(
        &exam,
        student_id,
        &req.answers,
        req.submission_id,
        chrono::Utc::now(),
    );

    let saved = store.save_result(graded).await?;
    let summary = saved.result.summary();

    if saved.replayed {
        tracing::info!(
            result_id = summary.result_id,
            student_id,
            "Duplicate submission, returning stored result"
        );
        return Ok((
            StatusCode::OK,
            Json(SubmitResponse {
                message: "Exam already submitted".to_string(),
                result: summary,
            }),
        ));
    }

    tracing::info!(
        result_id = summary.result_id,
        student_id,
        exam_id = exam.id,
        score = summary.score,
        total_marks = summary.total_marks,
        "Exam submitted"
    );

    Ok((
        StatusCode::CREATED,
        Json(SubmitResponse {
            message: "Exam submitted successfully".to_string(),
            result: summary,
        }),
    ))
}

/// The caller's own results, newest first.
#[utoipa::path(
    get,
    path = "/api/results/my-results",
    tag = "results",
    responses(
        (status = 200, description = "Caller's results", body = [ResultView]),
        (status = 401, description = "Not authenticated"),
    )
)]
pub async fn my_results(
    State(store): State<DynStore>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let results = store.find_results_by_student(claims.user_id()?).await?;
    Ok(Json(results))
}

/// Every stored result, newest first. Admin only.
#[utoipa::path(
    get,
    path = "/api/results/all",
    tag = "results",
    responses(
        (status = 200, description = "All results", body = [ResultView]),
        (status = 403, description = "Admin access required"),
    )
)]
pub async fn all_results(State(store): State<DynStore>) -> Result<impl IntoResponse, AppError> {
    let results = store.find_all_results().await?;
    Ok(Json(results))
}
