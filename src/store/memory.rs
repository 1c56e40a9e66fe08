// src/store/memory.rs

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    error::AppError,
    models::{
        exam::{Exam, NewExam, Question},
        result::{ExamRef, ExamResult, NewResult, ResultView, SavedResult, StudentRef},
        user::{NewUser, User},
    },
    store::{ExamCatalog, ResultStore, UserStore},
};

/// In-process store used by the test suite and for running without a
/// database. Ids come from one shared counter.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    next_id: i64,
    users: Vec<User>,
    exams: BTreeMap<i64, Exam>,
    results: Vec<ExamResult>,
}

impl Inner {
    fn allocate(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn build_exam(
        &mut self,
        id: i64,
        exam: NewExam,
        created_by: i64,
        created_at: chrono::DateTime<chrono::Utc>,
    ) -> Exam {
        let questions = exam
            .questions
            .into_iter()
            .map(|q| Question {
                id: self.allocate(),
                question: q.question,
                options: q.options,
                correct_answer: q.correct_answer,
                marks: q.marks,
            })
            .collect();

        Exam {
            id,
            title: exam.title,
            description: exam.description,
            duration: exam.duration,
            total_marks: exam.total_marks,
            questions,
            is_active: exam.is_active,
            created_by,
            created_at,
        }
    }

    fn view(&self, result: &ExamResult) -> ResultView {
        let exam = self.exams.get(&result.exam_id);
        let student = self.users.iter().find(|u| u.id == result.student_id);
        ResultView {
            id: result.id,
            exam: ExamRef {
                id: result.exam_id,
                title: exam.map(|e| e.title.clone()),
                description: exam.and_then(|e| e.description.clone()),
            },
            student: StudentRef {
                id: result.student_id,
                name: student.map(|s| s.name.clone()),
                email: student.map(|s| s.email.clone()),
            },
            answers: result.answers.clone(),
            score: result.score,
            total_marks: result.total_marks,
            percentage: result.percentage,
            submitted_at: result.submitted_at,
        }
    }

    fn newest_first<'a>(&self, results: impl Iterator<Item = &'a ExamResult>) -> Vec<ResultView> {
        let mut rows: Vec<&ExamResult> = results.collect();
        rows.sort_by(|a, b| {
            b.submitted_at
                .cmp(&a.submitted_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        rows.into_iter().map(|r| self.view(r)).collect()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ExamCatalog for MemoryStore {
    async fn list_active_exams(&self) -> Result<Vec<Exam>, AppError> {
        let inner = self.inner.read().await;
        Ok(inner.exams.values().filter(|e| e.is_active).cloned().collect())
    }

    async fn find_exam(&self, id: i64) -> Result<Option<Exam>, AppError> {
        Ok(self.inner.read().await.exams.get(&id).cloned())
    }

    async fn create_exam(&self, exam: NewExam) -> Result<Exam, AppError> {
        let mut inner = self.inner.write().await;
        let id = inner.allocate();
        let created_by = exam.created_by;
        let exam = inner.build_exam(id, exam, created_by, chrono::Utc::now());
        inner.exams.insert(id, exam.clone());
        Ok(exam)
    }

    async fn update_exam(&self, id: i64, exam: NewExam) -> Result<Option<Exam>, AppError> {
        let mut inner = self.inner.write().await;
        let Some((created_by, created_at)) = inner.exams.get(&id).map(|e| (e.created_by, e.created_at))
        else {
            return Ok(None);
        };
        let exam = inner.build_exam(id, exam, created_by, created_at);
        inner.exams.insert(id, exam.clone());
        Ok(Some(exam))
    }

    async fn delete_exam(&self, id: i64) -> Result<bool, AppError> {
        Ok(self.inner.write().await.exams.remove(&id).is_some())
    }
}

#[async_trait]
impl ResultStore for MemoryStore {
    async fn save_result(&self, result: NewResult) -> Result<SavedResult, AppError> {
        let mut inner = self.inner.write().await;

        if let Some(key) = result.submission_id {
            let existing = inner
                .results
                .iter()
                .find(|r| r.student_id == result.student_id && r.submission_id == Some(key));
            if let Some(existing) = existing {
                return SavedResult::replay(existing.clone(), result.exam_id);
            }
        }

        let id = inner.allocate();
        let saved = ExamResult::from_new(id, result);
        inner.results.push(saved.clone());
        Ok(SavedResult {
            result: saved,
            replayed: false,
        })
    }

    async fn find_results_by_student(&self, student_id: i64) -> Result<Vec<ResultView>, AppError> {
        let inner = self.inner.read().await;
        Ok(inner.newest_first(inner.results.iter().filter(|r| r.student_id == student_id)))
    }

    async fn find_all_results(&self) -> Result<Vec<ResultView>, AppError> {
        let inner = self.inner.read().await;
        Ok(inner.newest_first(inner.results.iter()))
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_user(&self, user: NewUser) -> Result<User, AppError> {
        let mut inner = self.inner.write().await;
        if inner.users.iter().any(|u| u.email == user.email) {
            return Err(AppError::Conflict(format!(
                "Email '{}' is already registered",
                user.email
            )));
        }

        let created = User {
            id: inner.allocate(),
            name: user.name,
            email: user.email,
            password: user.password_hash,
            role: user.role,
            created_at: chrono::Utc::now(),
        };
        inner.users.push(created.clone());
        Ok(created)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let inner = self.inner.read().await;
        Ok(inner.users.iter().find(|u| u.email == email).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        exam::NewQuestion,
        result::SubmittedAnswer,
        user::Role,
    };

    fn new_exam(marks: &[u32]) -> NewExam {
        NewExam {
            title: "Store exam".to_string(),
            description: None,
            duration: 5,
            total_marks: marks.iter().sum(),
            questions: marks
                .iter()
                .map(|&m| NewQuestion {
                    question: "Q".to_string(),
                    options: vec!["a".into(), "b".into(), "c".into(), "d".into()],
                    correct_answer: 0,
                    marks: m,
                })
                .collect(),
            is_active: true,
            created_by: 1,
        }
    }

    fn new_result(student_id: i64, offset_secs: i64, key: Option<uuid::Uuid>) -> NewResult {
        NewResult {
            student_id,
            exam_id: 1,
            answers: vec![SubmittedAnswer {
                question_id: 2,
                selected_answer: 0,
            }],
            score: 1,
            total_marks: 1,
            percentage: 100.0,
            submission_id: key,
            submitted_at: chrono::Utc::now() + chrono::Duration::seconds(offset_secs),
        }
    }

    #[tokio::test]
    async fn update_keeps_creator_and_replaces_questions() {
        let store = MemoryStore::new();
        let created = store.create_exam(new_exam(&[1, 2])).await.unwrap();

        let mut replacement = new_exam(&[5]);
        replacement.created_by = 99;
        let updated = store
            .update_exam(created.id, replacement)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.created_by, 1);
        assert_eq!(updated.total_marks, 5);
        assert_eq!(updated.questions.len(), 1);
        assert!(store.update_exam(12345, new_exam(&[])).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn results_are_newest_first_and_scoped() {
        let store = MemoryStore::new();
        store.save_result(new_result(1, 0, None)).await.unwrap();
        store.save_result(new_result(1, 10, None)).await.unwrap();
        store.save_result(new_result(2, 5, None)).await.unwrap();

        let mine = store.find_results_by_student(1).await.unwrap();
        assert_eq!(mine.len(), 2);
        assert!(mine[0].submitted_at > mine[1].submitted_at);

        let all = store.find_all_results().await.unwrap();
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn submission_key_is_idempotent_per_student() {
        let store = MemoryStore::new();
        let key = uuid::Uuid::new_v4();

        let first = store.save_result(new_result(1, 0, Some(key))).await.unwrap();
        let again = store.save_result(new_result(1, 3, Some(key))).await.unwrap();
        let other = store.save_result(new_result(2, 0, Some(key))).await.unwrap();

        assert!(!first.replayed);
        assert!(again.replayed);
        assert_eq!(first.result.id, again.result.id);
        assert!(!other.replayed);
        assert_eq!(store.find_all_results().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn reused_key_on_another_exam_is_not_swallowed() {
        let store = MemoryStore::new();
        let key = uuid::Uuid::new_v4();

        store.save_result(new_result(1, 0, Some(key))).await.unwrap();
        let mut other_exam = new_result(1, 1, Some(key));
        other_exam.exam_id = 2;
        let err = store.save_result(other_exam).await.unwrap_err();

        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(store.find_all_results().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn duplicate_email_conflicts() {
        let store = MemoryStore::new();
        let user = NewUser {
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            password_hash: "hash".to_string(),
            role: Role::Student,
        };
        store.create_user(user.clone()).await.unwrap();
        let err = store.create_user(user).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }
}
