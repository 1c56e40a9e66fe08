// src/models/result.rs

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::AppError;

/// One entry of a sparse answer set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedAnswer {
    pub question_id: i64,
    pub selected_answer: usize,
}

/// DTO for submitting an exam attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmitExamRequest {
    pub exam_id: i64,

    /// Answered questions only; unanswered ones are simply absent.
    #[serde(default)]
    pub answers: Vec<SubmittedAnswer>,

    /// Idempotency key. Re-sending the same key returns the first result.
    #[serde(default)]
    pub submission_id: Option<Uuid>,
}

/// A graded attempt that has not been persisted yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewResult {
    pub student_id: i64,
    pub exam_id: i64,
    pub answers: Vec<SubmittedAnswer>,
    pub score: u32,
    /// Snapshot of the exam's total at grading time.
    pub total_marks: u32,
    pub percentage: f64,
    pub submission_id: Option<Uuid>,
    pub submitted_at: chrono::DateTime<chrono::Utc>,
}

/// A persisted, graded attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExamResult {
    pub id: i64,
    pub student_id: i64,
    pub exam_id: i64,
    pub answers: Vec<SubmittedAnswer>,
    pub score: u32,
    pub total_marks: u32,
    pub percentage: f64,
    pub submission_id: Option<Uuid>,
    pub submitted_at: chrono::DateTime<chrono::Utc>,
}

impl ExamResult {
    pub fn from_new(id: i64, new: NewResult) -> Self {
        Self {
            id,
            student_id: new.student_id,
            exam_id: new.exam_id,
            answers: new.answers,
            score: new.score,
            total_marks: new.total_marks,
            percentage: new.percentage,
            submission_id: new.submission_id,
            submitted_at: new.submitted_at,
        }
    }

    pub fn summary(&self) -> SubmissionSummary {
        SubmissionSummary {
            result_id: self.id,
            score: self.score,
            total_marks: self.total_marks,
            percentage: round2(self.percentage),
        }
    }
}

/// Outcome of `ResultStore::save`.
#[derive(Debug, Clone)]
pub struct SavedResult {
    pub result: ExamResult,
    /// True when the submission key was already used and nothing was written.
    pub replayed: bool,
}

impl SavedResult {
    /// Wraps the result already stored under a reused submission key. A key
    /// belongs to one attempt at one exam; reusing it for another exam is a
    /// conflict, not a replay.
    pub fn replay(existing: ExamResult, exam_id: i64) -> Result<Self, AppError> {
        if existing.exam_id != exam_id {
            return Err(AppError::Conflict(format!(
                "Submission id was already used for exam {}",
                existing.exam_id
            )));
        }
        Ok(Self {
            result: existing,
            replayed: true,
        })
    }
}

/// Score summary returned to the student right after submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionSummary {
    pub result_id: i64,
    pub score: u32,
    pub total_marks: u32,
    /// Rounded to two decimals.
    pub percentage: f64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SubmitResponse {
    pub message: String,
    pub result: SubmissionSummary,
}

/// Exam identity resolved for display. `title` is `None` when the exam was
/// deleted after the attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExamRef {
    pub id: i64,
    pub title: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StudentRef {
    pub id: i64,
    pub name: Option<String>,
    pub email: Option<String>,
}

/// Result row with exam and student resolved to display names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResultView {
    pub id: i64,
    pub exam: ExamRef,
    pub student: StudentRef,
    pub answers: Vec<SubmittedAnswer>,
    pub score: u32,
    pub total_marks: u32,
    pub percentage: f64,
    pub submitted_at: chrono::DateTime<chrono::Utc>,
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submit_request_uses_camel_case() {
        let req: SubmitExamRequest = serde_json::from_value(serde_json::json!({
            "examId": 3,
            "answers": [{"questionId": 10, "selectedAnswer": 2}]
        }))
        .unwrap();
        assert_eq!(req.exam_id, 3);
        assert_eq!(req.answers[0].question_id, 10);
        assert_eq!(req.answers[0].selected_answer, 2);
        assert!(req.submission_id.is_none());
    }

    #[test]
    fn negative_selection_does_not_parse() {
        let parsed = serde_json::from_value::<SubmitExamRequest>(serde_json::json!({
            "examId": 3,
            "answers": [{"questionId": 10, "selectedAnswer": -1}]
        }));
        assert!(parsed.is_err());
    }

    fn stored(exam_id: i64) -> ExamResult {
        ExamResult {
            id: 1,
            student_id: 2,
            exam_id,
            answers: vec![],
            score: 1,
            total_marks: 3,
            percentage: 100.0 / 3.0,
            submission_id: Some(Uuid::new_v4()),
            submitted_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn replay_of_same_exam_returns_stored_result() {
        let saved = SavedResult::replay(stored(3), 3).unwrap();
        assert!(saved.replayed);
        assert_eq!(saved.result.id, 1);
    }

    #[test]
    fn reused_key_for_another_exam_conflicts() {
        let err = SavedResult::replay(stored(3), 4).unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[test]
    fn summary_rounds_percentage() {
        let result = ExamResult {
            id: 1,
            student_id: 2,
            exam_id: 3,
            answers: vec![],
            score: 1,
            total_marks: 3,
            percentage: 100.0 / 3.0,
            submission_id: None,
            submitted_at: chrono::Utc::now(),
        };
        assert_eq!(result.summary().percentage, 33.33);
    }
}
