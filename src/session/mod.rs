// src/session/mod.rs

//! One student's timed attempt at one exam.
//!
//! `ExamSession` is a plain state machine: every method is a transition that
//! either applies or returns a `SessionError` without side effects. Timing and
//! I/O live in [`driver`], which feeds it events one at a time.

use std::{collections::BTreeMap, fmt};

use serde::Serialize;
use uuid::Uuid;

use crate::{
    client::ApiError,
    models::{
        exam::PublicExam,
        result::{SubmissionSummary, SubmitExamRequest, SubmittedAnswer},
    },
};

pub mod countdown;
pub mod driver;

pub use countdown::Countdown;
pub use driver::{SessionCommand, SessionDriver, SessionOutcome};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "detail", rename_all = "camelCase")]
pub enum SessionState {
    Loading,
    InProgress,
    Submitting,
    Submitted(SubmissionSummary),
    /// Submission failed; the message is meant for the student.
    Failed(String),
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Loading => "loading",
            SessionState::InProgress => "in-progress",
            SessionState::Submitting => "submitting",
            SessionState::Submitted(_) => "submitted",
            SessionState::Failed(_) => "failed",
        }
    }
}

/// What started a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SubmitTrigger {
    Manual,
    /// The countdown reached zero.
    Timeout,
}

/// Asked before a manual submission. Automatic submissions skip it.
pub trait Confirm: Send {
    fn confirm(&mut self, answered: usize, total: usize) -> bool;
}

/// Accepts every prompt.
pub struct AlwaysConfirm;

impl Confirm for AlwaysConfirm {
    fn confirm(&mut self, _answered: usize, _total: usize) -> bool {
        true
    }
}

impl<F> Confirm for F
where
    F: FnMut(usize, usize) -> bool + Send,
{
    fn confirm(&mut self, answered: usize, total: usize) -> bool {
        self(answered, total)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The transition is not allowed from the current state.
    InvalidState {
        action: &'static str,
        state: &'static str,
    },
    UnknownQuestion(i64),
    OptionOutOfRange {
        question_id: i64,
        option: usize,
        options: usize,
    },
    /// Resume was asked for after the time limit passed.
    TimeExpired,
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::InvalidState { action, state } => {
                write!(f, "cannot {action} while the session is {state}")
            }
            SessionError::UnknownQuestion(id) => write!(f, "question {id} is not part of this exam"),
            SessionError::OptionOutOfRange {
                question_id,
                option,
                options,
            } => write!(
                f,
                "option {option} does not exist for question {question_id} ({options} options)"
            ),
            SessionError::TimeExpired => write!(f, "the time limit has passed"),
        }
    }
}

impl std::error::Error for SessionError {}

/// Result of one countdown tick.
#[derive(Debug, Clone, PartialEq)]
pub enum Tick {
    Running { remaining_secs: u64 },
    /// Time ran out; the session moved to `Submitting` with this request.
    Expired(SubmitExamRequest),
}

/// Read-only view published after every event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub exam_id: i64,
    pub state: SessionState,
    pub remaining_secs: u64,
    pub current_question: usize,
    pub answered: usize,
    pub total_questions: usize,
    pub progress_percent: f64,
}

#[derive(Debug, Clone)]
pub struct ExamSession {
    exam_id: i64,
    exam: Option<PublicExam>,
    answers: BTreeMap<i64, usize>,
    remaining_secs: u64,
    current: usize,
    state: SessionState,
    submission_id: Uuid,
    last_trigger: Option<SubmitTrigger>,
}

impl ExamSession {
    pub fn new(exam_id: i64) -> Self {
        Self {
            exam_id,
            exam: None,
            answers: BTreeMap::new(),
            remaining_secs: 0,
            current: 0,
            state: SessionState::Loading,
            submission_id: Uuid::new_v4(),
            last_trigger: None,
        }
    }

    fn guard(&self, action: &'static str, allowed: bool) -> Result<(), SessionError> {
        if allowed {
            Ok(())
        } else {
            Err(SessionError::InvalidState {
                action,
                state: self.state.name(),
            })
        }
    }

    /// `Loading -> InProgress` once the exam arrived.
    pub fn start(&mut self, exam: PublicExam) -> Result<(), SessionError> {
        self.guard("start", self.state == SessionState::Loading)?;
        self.remaining_secs = u64::from(exam.duration) * 60;
        self.current = 0;
        self.exam_id = exam.id;
        self.exam = Some(exam);
        self.state = SessionState::InProgress;
        Ok(())
    }

    /// Records or replaces the answer for one question. The pointer stays put.
    pub fn select_answer(&mut self, question_id: i64, option: usize) -> Result<(), SessionError> {
        self.guard("answer", self.is_in_progress())?;
        let question = self
            .exam
            .as_ref()
            .and_then(|exam| exam.question(question_id))
            .ok_or(SessionError::UnknownQuestion(question_id))?;

        if option >= question.options.len() {
            return Err(SessionError::OptionOutOfRange {
                question_id,
                option,
                options: question.options.len(),
            });
        }

        self.answers.insert(question_id, option);
        Ok(())
    }

    /// Moves the pointer, clamped to the question range. Returns the new index.
    pub fn navigate(&mut self, index: usize) -> Result<usize, SessionError> {
        self.guard("navigate", self.is_in_progress())?;
        self.current = index.min(self.total_questions().saturating_sub(1));
        Ok(self.current)
    }

    /// One second elapsed. Reaching zero submits automatically, exactly once:
    /// afterwards the session is no longer in progress and further ticks fail.
    pub fn tick(&mut self) -> Result<Tick, SessionError> {
        self.guard("tick", self.is_in_progress())?;
        self.remaining_secs = self.remaining_secs.saturating_sub(1);
        if self.remaining_secs > 0 {
            return Ok(Tick::Running {
                remaining_secs: self.remaining_secs,
            });
        }

        let request = self.enter_submitting(SubmitTrigger::Timeout);
        Ok(Tick::Expired(request))
    }

    /// Starts a submission. A manual submission asks `confirm` first and
    /// returns `Ok(None)`, staying in progress, when the student declines.
    pub fn submit(
        &mut self,
        trigger: SubmitTrigger,
        confirm: &mut dyn Confirm,
    ) -> Result<Option<SubmitExamRequest>, SessionError> {
        self.guard("submit", self.is_in_progress())?;
        if trigger == SubmitTrigger::Manual
            && !confirm.confirm(self.answered_count(), self.total_questions())
        {
            return Ok(None);
        }
        Ok(Some(self.enter_submitting(trigger)))
    }

    /// Applies the outcome of the in-flight submission.
    pub fn complete(&mut self, outcome: Result<SubmissionSummary, ApiError>) -> Result<(), SessionError> {
        self.guard("complete", self.state == SessionState::Submitting)?;
        self.state = match outcome {
            Ok(summary) => SessionState::Submitted(summary),
            Err(err) => SessionState::Failed(self.failure_message(&err)),
        };
        Ok(())
    }

    /// Sends the same answer set again after a failure, under the same
    /// submission key so the server can recognize a duplicate.
    pub fn retry(&mut self) -> Result<SubmitExamRequest, SessionError> {
        self.guard("retry", matches!(self.state, SessionState::Failed(_)))?;
        self.state = SessionState::Submitting;
        Ok(self.request())
    }

    /// Returns to answering after a failure while time remains.
    pub fn resume(&mut self) -> Result<(), SessionError> {
        self.guard("resume", matches!(self.state, SessionState::Failed(_)))?;
        if self.remaining_secs == 0 {
            return Err(SessionError::TimeExpired);
        }
        self.state = SessionState::InProgress;
        Ok(())
    }

    fn enter_submitting(&mut self, trigger: SubmitTrigger) -> SubmitExamRequest {
        self.state = SessionState::Submitting;
        self.last_trigger = Some(trigger);
        self.request()
    }

    fn request(&self) -> SubmitExamRequest {
        SubmitExamRequest {
            exam_id: self.exam_id,
            answers: self
                .answers
                .iter()
                .map(|(&question_id, &selected_answer)| SubmittedAnswer {
                    question_id,
                    selected_answer,
                })
                .collect(),
            submission_id: Some(self.submission_id),
        }
    }

    fn failure_message(&self, err: &ApiError) -> String {
        let base = if err.is_unauthorized() {
            "Your login has expired. Please sign in again; your answers are kept.".to_string()
        } else {
            format!("Failed to submit exam: {}. Your answers are kept, please retry.", err.message)
        };
        match self.last_trigger {
            Some(SubmitTrigger::Timeout) => format!("Time's up! {base}"),
            _ => base,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_in_progress(&self) -> bool {
        self.state == SessionState::InProgress
    }

    pub fn exam(&self) -> Option<&PublicExam> {
        self.exam.as_ref()
    }

    pub fn answers(&self) -> &BTreeMap<i64, usize> {
        &self.answers
    }

    pub fn remaining_secs(&self) -> u64 {
        self.remaining_secs
    }

    pub fn current_question(&self) -> usize {
        self.current
    }

    pub fn submission_id(&self) -> Uuid {
        self.submission_id
    }

    pub fn last_trigger(&self) -> Option<SubmitTrigger> {
        self.last_trigger
    }

    pub fn total_questions(&self) -> usize {
        self.exam.as_ref().map_or(0, |exam| exam.questions.len())
    }

    pub fn answered_count(&self) -> usize {
        self.answers.len()
    }

    /// Share of questions answered. An exam without questions counts as done.
    pub fn progress_percent(&self) -> f64 {
        let total = self.total_questions();
        if total == 0 {
            return 100.0;
        }
        self.answered_count() as f64 / total as f64 * 100.0
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            exam_id: self.exam_id,
            state: self.state.clone(),
            remaining_secs: self.remaining_secs,
            current_question: self.current,
            answered: self.answered_count(),
            total_questions: self.total_questions(),
            progress_percent: self.progress_percent(),
        }
    }
}
