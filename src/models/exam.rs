// src/models/exam.rs

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    config::{MAX_DURATION_MINUTES, MAX_QUESTIONS, OPTION_COUNT},
    error::AppError,
    models::user::Role,
    utils::html::clean_html,
};

/// A multiple-choice question including its answer key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: i64,

    /// Prompt text.
    pub question: String,

    /// Option texts, in display order.
    pub options: Vec<String>,

    /// Index into `options` of the correct option.
    pub correct_answer: usize,

    /// Weight of the question. Always at least 1.
    pub marks: u32,
}

/// An exam with answer keys. Only administrators ever receive this shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Exam {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,

    /// Time limit in minutes.
    pub duration: u32,

    pub total_marks: u32,
    pub questions: Vec<Question>,
    pub is_active: bool,
    pub created_by: i64,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl Exam {
    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    /// Copy of the exam with every answer key removed.
    pub fn redacted(&self) -> PublicExam {
        PublicExam {
            id: self.id,
            title: self.title.clone(),
            description: self.description.clone(),
            duration: self.duration,
            total_marks: self.total_marks,
            questions: self
                .questions
                .iter()
                .map(|q| PublicQuestion {
                    id: q.id,
                    question: q.question.clone(),
                    options: q.options.clone(),
                    marks: q.marks,
                })
                .collect(),
            is_active: self.is_active,
            created_by: self.created_by,
            created_at: self.created_at,
        }
    }
}

/// Question as seen by students: there is no answer-key field at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PublicQuestion {
    pub id: i64,
    pub question: String,
    pub options: Vec<String>,
    pub marks: u32,
}

/// Exam as seen by students.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PublicExam {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub duration: u32,
    pub total_marks: u32,
    pub questions: Vec<PublicQuestion>,
    pub is_active: bool,
    pub created_by: i64,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl PublicExam {
    pub fn question(&self, question_id: i64) -> Option<&PublicQuestion> {
        self.questions.iter().find(|q| q.id == question_id)
    }
}

/// The projection of an exam a caller is allowed to see.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ExamView {
    Full(Exam),
    Redacted(PublicExam),
}

impl ExamView {
    pub fn for_role(exam: Exam, role: Role) -> Self {
        if role.is_privileged() {
            ExamView::Full(exam)
        } else {
            ExamView::Redacted(exam.redacted())
        }
    }
}

/// Sanitized exam ready to be stored. `total_marks` is always derived from
/// the questions.
#[derive(Debug, Clone)]
pub struct NewExam {
    pub title: String,
    pub description: Option<String>,
    pub duration: u32,
    pub total_marks: u32,
    pub questions: Vec<NewQuestion>,
    pub is_active: bool,
    pub created_by: i64,
}

#[derive(Debug, Clone)]
pub struct NewQuestion {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: usize,
    pub marks: u32,
}

/// Sum of marks over a question list.
pub fn total_marks(marks: impl IntoIterator<Item = u32>) -> u32 {
    marks.into_iter().sum()
}

/// DTO for creating or replacing an exam. Any client-supplied total is
/// ignored.
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateExamRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(range(min = 1, max = MAX_DURATION_MINUTES))]
    pub duration: u32,
    #[validate(nested)]
    pub questions: Vec<CreateQuestionRequest>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateQuestionRequest {
    #[validate(length(min = 1, max = 1000))]
    pub question: String,
    #[validate(custom(function = validate_options))]
    pub options: Vec<String>,
    pub correct_answer: usize,
    #[serde(default = "default_marks")]
    #[validate(range(min = 1, max = 100))]
    pub marks: u32,
}

fn default_marks() -> u32 {
    1
}

fn validate_options(options: &[String]) -> Result<(), validator::ValidationError> {
    if options.len() != OPTION_COUNT {
        return Err(validator::ValidationError::new("wrong_option_count"));
    }
    for opt in options {
        if opt.trim().is_empty() {
            return Err(validator::ValidationError::new("option_cannot_be_empty"));
        }
        if opt.len() > 500 {
            return Err(validator::ValidationError::new("option_too_long"));
        }
    }
    Ok(())
}

impl CreateExamRequest {
    /// Sanitizes authored text, then runs field validation, the question
    /// limit and the answer-key range check. Length limits apply to the text
    /// as stored.
    pub fn into_new_exam(mut self, created_by: i64) -> Result<NewExam, AppError> {
        self.sanitize();
        self.validate()?;

        if self.questions.len() > MAX_QUESTIONS {
            return Err(AppError::BadRequest(format!(
                "An exam can have at most {MAX_QUESTIONS} questions"
            )));
        }

        for (position, q) in self.questions.iter().enumerate() {
            if q.correct_answer >= q.options.len() {
                return Err(AppError::BadRequest(format!(
                    "Question {}: correctAnswer must be between 0 and {}",
                    position + 1,
                    q.options.len().saturating_sub(1)
                )));
            }
        }

        let questions: Vec<NewQuestion> = self
            .questions
            .into_iter()
            .map(|q| NewQuestion {
                question: q.question,
                options: q.options,
                correct_answer: q.correct_answer,
                marks: q.marks,
            })
            .collect();

        Ok(NewExam {
            title: self.title,
            description: self.description,
            duration: self.duration,
            total_marks: total_marks(questions.iter().map(|q| q.marks)),
            questions,
            is_active: self.is_active.unwrap_or(true),
            created_by,
        })
    }

    fn sanitize(&mut self) {
        self.title = clean_html(&self.title);
        self.description = self.description.as_deref().map(clean_html);
        for q in &mut self.questions {
            q.question = clean_html(&q.question);
            for option in &mut q.options {
                *option = clean_html(option);
            }
        }
    }
}
