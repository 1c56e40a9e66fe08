// src/grading.rs

//! Scoring engine. Pure functions over an exam with its answer key and a
//! sparse answer set; persistence is the caller's job.

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        exam::Exam,
        result::{NewResult, SubmittedAnswer},
    },
};

/// Rejects submissions that cannot be graded unambiguously.
///
/// * The same question id may appear only once.
/// * For questions that belong to the exam, the selected index must be a
///   valid option. Unknown question ids are allowed here and ignored later.
pub fn validate_submission(exam: &Exam, answers: &[SubmittedAnswer]) -> Result<(), AppError> {
    let mut seen = HashSet::with_capacity(answers.len());
    for answer in answers {
        if !seen.insert(answer.question_id) {
            return Err(AppError::BadRequest(format!(
                "Question {} was answered more than once",
                answer.question_id
            )));
        }
    }

    for question in &exam.questions {
        if let Some(answer) = answers.iter().find(|a| a.question_id == question.id) {
            if answer.selected_answer >= question.options.len() {
                return Err(AppError::BadRequest(format!(
                    "Answer for question {} is out of range",
                    question.id
                )));
            }
        }
    }

    Ok(())
}

/// Sum of marks for correctly answered questions.
/// No partial credit and no negative marking.
pub fn score(exam: &Exam, answers: &[SubmittedAnswer]) -> u32 {
    let selected: HashMap<i64, usize> = answers
        .iter()
        .map(|a| (a.question_id, a.selected_answer))
        .collect();

    exam.questions
        .iter()
        .filter(|q| selected.get(&q.id) == Some(&q.correct_answer))
        .map(|q| q.marks)
        .sum()
}

/// `100 * score / total`, or 0.0 when the exam carries no marks.
pub fn percentage(score: u32, total_marks: u32) -> f64 {
    if total_marks == 0 {
        return 0.0;
    }
    f64::from(score) / f64::from(total_marks) * 100.0
}

/// Grades one submission. The exam's total is copied into the result so later
/// edits to the exam never change past results.
pub fn grade(
    exam: &Exam,
    student_id: i64,
    answers: &[SubmittedAnswer],
    submission_id: Option<Uuid>,
    submitted_at: chrono::DateTime<chrono::Utc>,
) -> NewResult {
    let score = score(exam, answers);
    let total_marks = exam.total_marks;
    debug_assert!(score <= total_marks, "score exceeds the exam total");

    NewResult {
        student_id,
        exam_id: exam.id,
        answers: answers.to_vec(),
        score,
        total_marks,
        percentage: percentage(score, total_marks),
        submission_id,
        submitted_at,
    }
}
