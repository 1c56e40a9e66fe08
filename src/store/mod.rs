// src/store/mod.rs

//! Persistence boundary. Handlers only see these traits; `PgStore` backs
//! them with PostgreSQL and `MemoryStore` keeps everything in process.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    error::AppError,
    models::{
        exam::{Exam, NewExam},
        result::{NewResult, ResultView, SavedResult},
        user::{NewUser, User},
    },
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Exam definitions. Read-only from the grading path.
#[async_trait]
pub trait ExamCatalog: Send + Sync {
    /// Active exams, oldest first.
    async fn list_active_exams(&self) -> Result<Vec<Exam>, AppError>;

    async fn find_exam(&self, id: i64) -> Result<Option<Exam>, AppError>;

    async fn create_exam(&self, exam: NewExam) -> Result<Exam, AppError>;

    /// Replaces title, settings and questions. The creator and creation time
    /// are kept. Returns `None` when the exam does not exist.
    async fn update_exam(&self, id: i64, exam: NewExam) -> Result<Option<Exam>, AppError>;

    /// Returns false when nothing was deleted. Past results are kept.
    async fn delete_exam(&self, id: i64) -> Result<bool, AppError>;
}

/// Graded results. Append-only from the grading path.
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Persists a result. A `submission_id` already used by the same student
    /// returns the stored result with `replayed = true` instead of writing.
    async fn save_result(&self, result: NewResult) -> Result<SavedResult, AppError>;

    /// The student's results, newest first.
    async fn find_results_by_student(&self, student_id: i64) -> Result<Vec<ResultView>, AppError>;

    /// Every result, newest first.
    async fn find_all_results(&self) -> Result<Vec<ResultView>, AppError>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fails with `Conflict` when the email is taken.
    async fn create_user(&self, user: NewUser) -> Result<User, AppError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError>;
}

/// Everything the HTTP layer needs from persistence.
pub trait Store: ExamCatalog + ResultStore + UserStore {}

impl<T: ExamCatalog + ResultStore + UserStore> Store for T {}

pub type DynStore = Arc<dyn Store>;
