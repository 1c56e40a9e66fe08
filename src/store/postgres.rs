// src/store/postgres.rs

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{FromRow, PgPool, Postgres, Transaction, types::Json};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        exam::{Exam, NewExam, NewQuestion, Question},
        result::{ExamRef, ExamResult, NewResult, ResultView, SavedResult, StudentRef, SubmittedAnswer},
        user::{NewUser, Role, User},
    },
    store::{ExamCatalog, ResultStore, UserStore},
};

/// PostgreSQL-backed store. Schema lives in `migrations/`.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Represents the 'exams' table.
#[derive(Debug, FromRow)]
struct ExamRow {
    id: i64,
    title: String,
    description: Option<String>,
    duration: i32,
    total_marks: i32,
    is_active: bool,
    created_by: i64,
    created_at: chrono::DateTime<chrono::Utc>,
}

/// Represents the 'exam_questions' table.
#[derive(Debug, FromRow)]
struct QuestionRow {
    id: i64,
    exam_id: i64,
    question: String,
    options: Json<Vec<String>>,
    correct_answer: i32,
    marks: i32,
}

#[derive(Debug, FromRow)]
struct UserRow {
    id: i64,
    name: String,
    email: String,
    password: String,
    role: String,
    created_at: chrono::DateTime<chrono::Utc>,
}

/// Bare 'exam_results' row.
#[derive(Debug, FromRow)]
struct ResultRow {
    id: i64,
    student_id: i64,
    exam_id: i64,
    answers: Json<Vec<SubmittedAnswer>>,
    score: i32,
    total_marks: i32,
    percentage: f64,
    submission_id: Option<Uuid>,
    submitted_at: chrono::DateTime<chrono::Utc>,
}

/// 'exam_results' joined with exam and student display fields.
#[derive(Debug, FromRow)]
struct ResultViewRow {
    id: i64,
    student_id: i64,
    exam_id: i64,
    answers: Json<Vec<SubmittedAnswer>>,
    score: i32,
    total_marks: i32,
    percentage: f64,
    submitted_at: chrono::DateTime<chrono::Utc>,
    exam_title: Option<String>,
    exam_description: Option<String>,
    student_name: Option<String>,
    student_email: Option<String>,
}

const EXAM_COLUMNS: &str =
    "id, title, description, duration, total_marks, is_active, created_by, created_at";

const RESULT_COLUMNS: &str = "id, student_id, exam_id, answers, score, total_marks, percentage, submission_id, submitted_at";

const RESULT_VIEW_SELECT: &str = r#"
    SELECT
        r.id, r.student_id, r.exam_id, r.answers, r.score, r.total_marks,
        r.percentage, r.submitted_at,
        e.title AS exam_title,
        e.description AS exam_description,
        u.name AS student_name,
        u.email AS student_email
    FROM exam_results r
    LEFT JOIN exams e ON e.id = r.exam_id
    LEFT JOIN users u ON u.id = r.student_id
"#;

/// Stored counts are never negative; a negative value means a broken row.
fn from_db<T: TryFrom<i32>>(value: i32, field: &str) -> Result<T, AppError> {
    T::try_from(value).map_err(|_| {
        AppError::InternalServerError(format!("Stored {field} is out of range: {value}"))
    })
}

fn to_i32<T: TryInto<i32>>(value: T, field: &str) -> Result<i32, AppError> {
    value
        .try_into()
        .map_err(|_| AppError::BadRequest(format!("{field} is out of range")))
}

fn assemble(row: ExamRow, questions: Vec<QuestionRow>) -> Result<Exam, AppError> {
    let questions = questions
        .into_iter()
        .map(|q| {
            Ok(Question {
                id: q.id,
                question: q.question,
                options: q.options.0,
                correct_answer: from_db(q.correct_answer, "correct_answer")?,
                marks: from_db(q.marks, "marks")?,
            })
        })
        .collect::<Result<Vec<_>, AppError>>()?;

    Ok(Exam {
        id: row.id,
        title: row.title,
        description: row.description,
        duration: from_db(row.duration, "duration")?,
        total_marks: from_db(row.total_marks, "total_marks")?,
        questions,
        is_active: row.is_active,
        created_by: row.created_by,
        created_at: row.created_at,
    })
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            name: row.name,
            email: row.email,
            password: row.password,
            role: Role::from_db(&row.role),
            created_at: row.created_at,
        }
    }
}

impl TryFrom<ResultRow> for ExamResult {
    type Error = AppError;

    fn try_from(row: ResultRow) -> Result<Self, AppError> {
        Ok(ExamResult {
            id: row.id,
            student_id: row.student_id,
            exam_id: row.exam_id,
            answers: row.answers.0,
            score: from_db(row.score, "score")?,
            total_marks: from_db(row.total_marks, "total_marks")?,
            percentage: row.percentage,
            submission_id: row.submission_id,
            submitted_at: row.submitted_at,
        })
    }
}

impl TryFrom<ResultViewRow> for ResultView {
    type Error = AppError;

    fn try_from(row: ResultViewRow) -> Result<Self, AppError> {
        Ok(ResultView {
            id: row.id,
            exam: ExamRef {
                id: row.exam_id,
                title: row.exam_title,
                description: row.exam_description,
            },
            student: StudentRef {
                id: row.student_id,
                name: row.student_name,
                email: row.student_email,
            },
            answers: row.answers.0,
            score: from_db(row.score, "score")?,
            total_marks: from_db(row.total_marks, "total_marks")?,
            percentage: row.percentage,
            submitted_at: row.submitted_at,
        })
    }
}

impl PgStore {
    /// Loads questions for several exams at once, grouped by exam id and kept
    /// in authored order.
    async fn questions_for(&self, exam_ids: &[i64]) -> Result<HashMap<i64, Vec<QuestionRow>>, AppError> {
        let rows = sqlx::query_as::<_, QuestionRow>(
            r#"
            SELECT id, exam_id, question, options, correct_answer, marks
            FROM exam_questions
            WHERE exam_id = ANY($1)
            ORDER BY exam_id, position
            "#,
        )
        .bind(exam_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut grouped: HashMap<i64, Vec<QuestionRow>> = HashMap::new();
        for row in rows {
            grouped.entry(row.exam_id).or_default().push(row);
        }
        Ok(grouped)
    }

    async fn insert_questions(
        tx: &mut Transaction<'_, Postgres>,
        exam_id: i64,
        questions: &[NewQuestion],
    ) -> Result<Vec<QuestionRow>, AppError> {
        let mut inserted = Vec::with_capacity(questions.len());
        for (position, q) in questions.iter().enumerate() {
            let row = sqlx::query_as::<_, QuestionRow>(
                r#"
                INSERT INTO exam_questions (exam_id, position, question, options, correct_answer, marks)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING id, exam_id, question, options, correct_answer, marks
                "#,
            )
            .bind(exam_id)
            .bind(to_i32(position, "position")?)
            .bind(&q.question)
            .bind(Json(&q.options))
            .bind(to_i32(q.correct_answer, "correctAnswer")?)
            .bind(to_i32(q.marks, "marks")?)
            .fetch_one(&mut **tx)
            .await?;
            inserted.push(row);
        }
        Ok(inserted)
    }
}

#[async_trait]
impl ExamCatalog for PgStore {
    async fn list_active_exams(&self) -> Result<Vec<Exam>, AppError> {
        let rows = sqlx::query_as::<_, ExamRow>(&format!(
            "SELECT {EXAM_COLUMNS} FROM exams WHERE is_active ORDER BY created_at, id"
        ))
        .fetch_all(&self.pool)
        .await?;

        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        let mut questions = self.questions_for(&ids).await?;

        rows.into_iter()
            .map(|row| {
                let qs = questions.remove(&row.id).unwrap_or_default();
                assemble(row, qs)
            })
            .collect()
    }

    async fn find_exam(&self, id: i64) -> Result<Option<Exam>, AppError> {
        let row = sqlx::query_as::<_, ExamRow>(&format!(
            "SELECT {EXAM_COLUMNS} FROM exams WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let questions = self.questions_for(&[id]).await?.remove(&id).unwrap_or_default();
        assemble(row, questions).map(Some)
    }

    async fn create_exam(&self, exam: NewExam) -> Result<Exam, AppError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, ExamRow>(&format!(
            r#"
            INSERT INTO exams (title, description, duration, total_marks, is_active, created_by)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {EXAM_COLUMNS}
            "#
        ))
        .bind(&exam.title)
        .bind(&exam.description)
        .bind(to_i32(exam.duration, "duration")?)
        .bind(to_i32(exam.total_marks, "totalMarks")?)
        .bind(exam.is_active)
        .bind(exam.created_by)
        .fetch_one(&mut *tx)
        .await?;

        let questions = Self::insert_questions(&mut tx, row.id, &exam.questions).await?;
        tx.commit().await?;

        assemble(row, questions)
    }

    async fn update_exam(&self, id: i64, exam: NewExam) -> Result<Option<Exam>, AppError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, ExamRow>(&format!(
            r#"
            UPDATE exams
            SET title = $2, description = $3, duration = $4, total_marks = $5, is_active = $6
            WHERE id = $1
            RETURNING {EXAM_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&exam.title)
        .bind(&exam.description)
        .bind(to_i32(exam.duration, "duration")?)
        .bind(to_i32(exam.total_marks, "totalMarks")?)
        .bind(exam.is_active)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.rollback().await?;
            return Ok(None);
        };

        sqlx::query("DELETE FROM exam_questions WHERE exam_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let questions = Self::insert_questions(&mut tx, id, &exam.questions).await?;
        tx.commit().await?;

        assemble(row, questions).map(Some)
    }

    async fn delete_exam(&self, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM exams WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl ResultStore for PgStore {
    async fn save_result(&self, result: NewResult) -> Result<SavedResult, AppError> {
        let inserted = sqlx::query_as::<_, ResultRow>(&format!(
            r#"
            INSERT INTO exam_results
                (student_id, exam_id, answers, score, total_marks, percentage, submission_id, submitted_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (student_id, submission_id) DO NOTHING
            RETURNING {RESULT_COLUMNS}
            "#
        ))
        .bind(result.student_id)
        .bind(result.exam_id)
        .bind(Json(&result.answers))
        .bind(to_i32(result.score, "score")?)
        .bind(to_i32(result.total_marks, "totalMarks")?)
        .bind(result.percentage)
        .bind(result.submission_id)
        .bind(result.submitted_at)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = inserted {
            return Ok(SavedResult {
                result: row.try_into()?,
                replayed: false,
            });
        }

        // Only reachable when the submission key already exists.
        let existing = sqlx::query_as::<_, ResultRow>(&format!(
            "SELECT {RESULT_COLUMNS} FROM exam_results WHERE student_id = $1 AND submission_id = $2"
        ))
        .bind(result.student_id)
        .bind(result.submission_id)
        .fetch_one(&self.pool)
        .await?;

        SavedResult::replay(existing.try_into()?, result.exam_id)
    }

    async fn find_results_by_student(&self, student_id: i64) -> Result<Vec<ResultView>, AppError> {
        let rows = sqlx::query_as::<_, ResultViewRow>(&format!(
            "{RESULT_VIEW_SELECT} WHERE r.student_id = $1 ORDER BY r.submitted_at DESC, r.id DESC"
        ))
        .bind(student_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ResultView::try_from).collect()
    }

    async fn find_all_results(&self) -> Result<Vec<ResultView>, AppError> {
        let rows = sqlx::query_as::<_, ResultViewRow>(&format!(
            "{RESULT_VIEW_SELECT} ORDER BY r.submitted_at DESC, r.id DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ResultView::try_from).collect()
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn create_user(&self, user: NewUser) -> Result<User, AppError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (name, email, password, role)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, email, password, role, created_at
            "#,
        )
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            // Postgres error code for unique violation is 23505
            if e.to_string().contains("unique constraint") || e.to_string().contains("23505") {
                AppError::Conflict(format!("Email '{}' is already registered", user.email))
            } else {
                tracing::error!("Failed to create user: {:?}", e);
                AppError::from(e)
            }
        })?;

        Ok(row.into())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, name, email, password, role, created_at FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(User::from))
    }
}
