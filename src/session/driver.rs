// src/session/driver.rs

use std::{sync::Arc, time::Duration};

use tokio::sync::{mpsc, watch};

use crate::{
    client::{ApiError, ExamApi},
    models::result::{SubmissionSummary, SubmitExamRequest},
    session::{
        AlwaysConfirm, Confirm, ExamSession, SessionSnapshot, SessionState, SubmitTrigger, Tick,
        countdown::Countdown,
    },
};

/// User actions fed into a running session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    Select { question_id: i64, option: usize },
    Navigate(usize),
    Submit,
    Retry,
    Resume,
    /// Navigate away. Collected answers are discarded.
    Leave,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutcome {
    Submitted {
        summary: SubmissionSummary,
        trigger: SubmitTrigger,
    },
    Abandoned {
        answered: usize,
    },
    LoadFailed(ApiError),
}

/// Runs one exam session: loads the exam, owns the countdown, and processes
/// commands and ticks strictly one at a time until the exam is submitted or
/// the student leaves.
pub struct SessionDriver {
    api: Arc<dyn ExamApi>,
    exam_id: i64,
    confirm: Box<dyn Confirm>,
    tick_period: Duration,
    snapshots: watch::Sender<SessionSnapshot>,
}

impl SessionDriver {
    pub fn new(api: Arc<dyn ExamApi>, exam_id: i64) -> Self {
        let (snapshots, _) = watch::channel(ExamSession::new(exam_id).snapshot());
        Self {
            api,
            exam_id,
            confirm: Box::new(AlwaysConfirm),
            tick_period: Duration::from_secs(1),
            snapshots,
        }
    }

    /// Prompt shown before a manual submission.
    pub fn with_confirm(mut self, confirm: impl Confirm + 'static) -> Self {
        self.confirm = Box::new(confirm);
        self
    }

    /// Wall-clock length of one countdown second.
    pub fn with_tick_period(mut self, period: Duration) -> Self {
        self.tick_period = period;
        self
    }

    /// Receives a snapshot after every processed event.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.subscribe()
    }

    pub async fn run(mut self, mut commands: mpsc::Receiver<SessionCommand>) -> SessionOutcome {
        let mut session = ExamSession::new(self.exam_id);

        let exam = match self.api.fetch_exam(self.exam_id).await {
            Ok(exam) => exam,
            Err(err) => {
                tracing::warn!(exam_id = self.exam_id, error = %err, "Failed to load exam");
                return SessionOutcome::LoadFailed(err);
            }
        };
        if let Err(err) = session.start(exam) {
            return SessionOutcome::LoadFailed(ApiError::transport(err.to_string()));
        }
        tracing::info!(
            exam_id = self.exam_id,
            questions = session.total_questions(),
            seconds = session.remaining_secs(),
            "Exam session started"
        );
        self.publish(&session);

        let (tick_tx, mut tick_rx) = mpsc::channel::<()>(1);
        let mut countdown = Some(Countdown::start(self.tick_period, tick_tx.clone()));

        loop {
            let pending = tokio::select! {
                Some(()) = tick_rx.recv() => on_tick(&mut session),
                command = commands.recv() => match command {
                    Some(SessionCommand::Leave) | None => {
                        stop_countdown(&mut countdown, &mut tick_rx);
                        tracing::info!(
                            exam_id = self.exam_id,
                            answered = session.answered_count(),
                            "Exam session abandoned"
                        );
                        return SessionOutcome::Abandoned {
                            answered: session.answered_count(),
                        };
                    }
                    Some(command) => on_command(&mut session, command, self.confirm.as_mut()),
                },
            };

            if let Some(request) = pending {
                stop_countdown(&mut countdown, &mut tick_rx);
                self.publish(&session);

                let outcome = self.api.submit_exam(&request).await;
                if let Err(err) = &outcome {
                    tracing::warn!(exam_id = self.exam_id, error = %err, "Submission failed");
                }
                if let Err(err) = session.complete(outcome) {
                    tracing::error!(error = %err, "Submission finished in an unexpected state");
                }

                if let SessionState::Submitted(summary) = session.state() {
                    let trigger = session.last_trigger().unwrap_or(SubmitTrigger::Manual);
                    tracing::info!(
                        exam_id = self.exam_id,
                        score = summary.score,
                        total_marks = summary.total_marks,
                        ?trigger,
                        "Exam session submitted"
                    );
                    let outcome = SessionOutcome::Submitted {
                        summary: summary.clone(),
                        trigger,
                    };
                    self.publish(&session);
                    return outcome;
                }
            }

            // Resume after a failed submission restarts the clock.
            if session.is_in_progress() && countdown.is_none() {
                countdown = Some(Countdown::start(self.tick_period, tick_tx.clone()));
            }

            self.publish(&session);
        }
    }

    fn publish(&self, session: &ExamSession) {
        self.snapshots.send_replace(session.snapshot());
    }
}

fn on_tick(session: &mut ExamSession) -> Option<SubmitExamRequest> {
    match session.tick() {
        Ok(Tick::Running { .. }) => None,
        Ok(Tick::Expired(request)) => {
            tracing::info!(exam_id = request.exam_id, "Time is up, submitting automatically");
            Some(request)
        }
        Err(err) => {
            tracing::debug!(error = %err, "Ignoring tick");
            None
        }
    }
}

fn on_command(
    session: &mut ExamSession,
    command: SessionCommand,
    confirm: &mut dyn Confirm,
) -> Option<SubmitExamRequest> {
    let result = match command {
        SessionCommand::Select {
            question_id,
            option,
        } => session.select_answer(question_id, option).map(|_| None),
        SessionCommand::Navigate(index) => session.navigate(index).map(|_| None),
        SessionCommand::Submit => session.submit(SubmitTrigger::Manual, confirm),
        SessionCommand::Retry => session.retry().map(Some),
        SessionCommand::Resume => session.resume().map(|_| None),
        SessionCommand::Leave => Ok(None),
    };

    result.unwrap_or_else(|err| {
        tracing::warn!(error = %err, "Rejected session command");
        None
    })
}

fn stop_countdown(countdown: &mut Option<Countdown>, ticks: &mut mpsc::Receiver<()>) {
    if let Some(mut countdown) = countdown.take() {
        countdown.cancel();
    }
    // Drop a tick that was already queued so it cannot count after a resume.
    while ticks.try_recv().is_ok() {}
}
