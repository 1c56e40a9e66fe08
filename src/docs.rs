// src/docs.rs

use utoipa::OpenApi;

use crate::{
    handlers,
    models::{exam, result, user},
};

/// OpenAPI description of the HTTP surface, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    info(title = "Exam Portal API", description = "Timed multiple-choice exams with server-side grading."),
    paths(
        handlers::auth::register,
        handlers::auth::login,
        handlers::exams::list_exams,
        handlers::exams::get_exam,
        handlers::exams::create_exam,
        handlers::exams::update_exam,
        handlers::exams::delete_exam,
        handlers::results::submit_exam,
        handlers::results::my_results,
        handlers::results::all_results,
    ),
    components(schemas(
        user::Role,
        user::User,
        user::UserSummary,
        user::CreateUserRequest,
        user::LoginRequest,
        user::LoginResponse,
        exam::Exam,
        exam::Question,
        exam::PublicExam,
        exam::PublicQuestion,
        exam::CreateExamRequest,
        exam::CreateQuestionRequest,
        result::SubmittedAnswer,
        result::SubmitExamRequest,
        result::SubmitResponse,
        result::SubmissionSummary,
        result::ResultView,
        result::ExamRef,
        result::StudentRef,
    )),
    tags(
        (name = "auth", description = "Registration and login"),
        (name = "exams", description = "Exam catalog"),
        (name = "results", description = "Submission and grading"),
    )
)]
pub struct ApiDoc;
