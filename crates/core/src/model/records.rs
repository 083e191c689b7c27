use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{AnswerOption, LessonId, Question, SessionId, Topic, UserId};

/// Fixed arity of per-task fields on a lesson record.
pub const LESSON_TASK_LIMIT: usize = 5;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RecordError {
    #[error("ordinal must be at least 1, got {0}")]
    InvalidOrdinal(u32),

    #[error("question {ordinal} already has an answer")]
    AlreadyAnswered { ordinal: u32 },

    #[error("stored correctness disagrees with the question for ordinal {ordinal}")]
    CorrectnessMismatch { ordinal: u32 },

    #[error("a lesson needs at least one task")]
    NoTasks,

    #[error("too many lesson tasks: {len} (limit {LESSON_TASK_LIMIT})")]
    TooManyTasks { len: usize },

    #[error("lesson day must be at least 1, got {0}")]
    InvalidDay(u32),

    #[error("expected_task {expected} is outside 1..={max}")]
    InvalidExpectedTask { expected: u32, max: u32 },

    #[error("lesson is already completed")]
    LessonCompleted,
}

/// One persisted question instance, keyed by (session, ordinal).
///
/// Carries the full question snapshot so a dropped ephemeral session can be
/// rebuilt from these rows alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizRecord {
    session: SessionId,
    user: UserId,
    ordinal: u32,
    question: Question,
    lesson_day: Option<u32>,
    asked_at: DateTime<Utc>,
    answered_at: Option<DateTime<Utc>>,
    answer: Option<AnswerOption>,
    is_correct: Option<bool>,
}

impl QuizRecord {
    /// New unanswered record.
    ///
    /// # Errors
    ///
    /// Returns `RecordError::InvalidOrdinal` for ordinal zero.
    pub fn new(
        session: SessionId,
        user: UserId,
        ordinal: u32,
        question: Question,
        lesson_day: Option<u32>,
        asked_at: DateTime<Utc>,
    ) -> Result<Self, RecordError> {
        if ordinal == 0 {
            return Err(RecordError::InvalidOrdinal(ordinal));
        }
        Ok(Self {
            session,
            user,
            ordinal,
            question,
            lesson_day,
            asked_at,
            answered_at: None,
            answer: None,
            is_correct: None,
        })
    }

    /// Rehydrate a record from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `RecordError::InvalidOrdinal` for ordinal zero and
    /// `RecordError::CorrectnessMismatch` if the stored correctness flag does
    /// not match the stored question and answer.
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        session: SessionId,
        user: UserId,
        ordinal: u32,
        question: Question,
        lesson_day: Option<u32>,
        asked_at: DateTime<Utc>,
        answered_at: Option<DateTime<Utc>>,
        answer: Option<AnswerOption>,
        is_correct: Option<bool>,
    ) -> Result<Self, RecordError> {
        if ordinal == 0 {
            return Err(RecordError::InvalidOrdinal(ordinal));
        }
        if let (Some(given), Some(stored)) = (answer, is_correct)
            && question.is_correct(given) != stored
        {
            return Err(RecordError::CorrectnessMismatch { ordinal });
        }
        Ok(Self {
            session,
            user,
            ordinal,
            question,
            lesson_day,
            asked_at,
            answered_at,
            answer,
            is_correct,
        })
    }

    /// Store the user's answer, at most once.
    ///
    /// # Errors
    ///
    /// Returns `RecordError::AlreadyAnswered` when an answer exists.
    pub fn record_answer(
        &mut self,
        answer: AnswerOption,
        answered_at: DateTime<Utc>,
    ) -> Result<bool, RecordError> {
        if self.answer.is_some() {
            return Err(RecordError::AlreadyAnswered {
                ordinal: self.ordinal,
            });
        }
        let correct = self.question.is_correct(answer);
        self.answer = Some(answer);
        self.is_correct = Some(correct);
        self.answered_at = Some(answered_at);
        Ok(correct)
    }

    #[must_use]
    pub fn session(&self) -> SessionId {
        self.session
    }

    #[must_use]
    pub fn user(&self) -> UserId {
        self.user
    }

    #[must_use]
    pub fn ordinal(&self) -> u32 {
        self.ordinal
    }

    #[must_use]
    pub fn question(&self) -> &Question {
        &self.question
    }

    #[must_use]
    pub fn lesson_day(&self) -> Option<u32> {
        self.lesson_day
    }

    #[must_use]
    pub fn asked_at(&self) -> DateTime<Utc> {
        self.asked_at
    }

    #[must_use]
    pub fn answered_at(&self) -> Option<DateTime<Utc>> {
        self.answered_at
    }

    #[must_use]
    pub fn answer(&self) -> Option<AnswerOption> {
        self.answer
    }

    #[must_use]
    pub fn is_correct(&self) -> Option<bool> {
        self.is_correct
    }

    #[must_use]
    pub fn is_answered(&self) -> bool {
        self.answer.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LessonStatus {
    #[default]
    InProgress,
    Completed,
}

impl LessonStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            LessonStatus::InProgress => "in_progress",
            LessonStatus::Completed => "completed",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "in_progress" => Some(LessonStatus::InProgress),
            "completed" => Some(LessonStatus::Completed),
            _ => None,
        }
    }
}

/// One rendered task prompt and the recorded answer, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonTask {
    pub prompt: String,
    pub answer: Option<AnswerOption>,
}

/// Durable record of one day's lesson: theory plus up to
/// [`LESSON_TASK_LIMIT`] tasks and an expected-next-task pointer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonRecord {
    id: LessonId,
    user: UserId,
    day: u32,
    topic: Topic,
    theory: String,
    practice_quiz: SessionId,
    tasks: Vec<LessonTask>,
    status: LessonStatus,
    expected_task: u32,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    score: Option<u32>,
}

impl LessonRecord {
    /// New in-progress lesson with unanswered tasks.
    ///
    /// # Errors
    ///
    /// Returns `RecordError` if `day` is zero or the prompt count is outside
    /// 1..=[`LESSON_TASK_LIMIT`].
    pub fn new(
        id: LessonId,
        user: UserId,
        day: u32,
        topic: Topic,
        theory: impl Into<String>,
        practice_quiz: SessionId,
        prompts: Vec<String>,
        started_at: DateTime<Utc>,
    ) -> Result<Self, RecordError> {
        if day == 0 {
            return Err(RecordError::InvalidDay(day));
        }
        if prompts.is_empty() {
            return Err(RecordError::NoTasks);
        }
        if prompts.len() > LESSON_TASK_LIMIT {
            return Err(RecordError::TooManyTasks { len: prompts.len() });
        }
        let tasks = prompts
            .into_iter()
            .map(|prompt| LessonTask {
                prompt,
                answer: None,
            })
            .collect();
        Ok(Self {
            id,
            user,
            day,
            topic,
            theory: theory.into(),
            practice_quiz,
            tasks,
            status: LessonStatus::InProgress,
            expected_task: 1,
            started_at,
            completed_at: None,
            score: None,
        })
    }

    /// Rehydrate a lesson record from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `RecordError` on invalid day, task arity, or an expected-task
    /// pointer outside `1..=tasks+1`.
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        id: LessonId,
        user: UserId,
        day: u32,
        topic: Topic,
        theory: String,
        practice_quiz: SessionId,
        tasks: Vec<LessonTask>,
        status: LessonStatus,
        expected_task: u32,
        started_at: DateTime<Utc>,
        completed_at: Option<DateTime<Utc>>,
        score: Option<u32>,
    ) -> Result<Self, RecordError> {
        if day == 0 {
            return Err(RecordError::InvalidDay(day));
        }
        if tasks.is_empty() {
            return Err(RecordError::NoTasks);
        }
        if tasks.len() > LESSON_TASK_LIMIT {
            return Err(RecordError::TooManyTasks { len: tasks.len() });
        }
        let max = u32::try_from(tasks.len()).unwrap_or(u32::MAX).saturating_add(1);
        if expected_task == 0 || expected_task > max {
            return Err(RecordError::InvalidExpectedTask {
                expected: expected_task,
                max,
            });
        }
        Ok(Self {
            id,
            user,
            day,
            topic,
            theory,
            practice_quiz,
            tasks,
            status,
            expected_task,
            started_at,
            completed_at,
            score,
        })
    }

    /// Record the answer for the expected task and advance the pointer.
    ///
    /// Returns the 1-based ordinal of the task that was answered.
    ///
    /// # Errors
    ///
    /// Returns `RecordError::LessonCompleted` if nothing is left to answer.
    pub fn record_task_answer(&mut self, answer: AnswerOption) -> Result<u32, RecordError> {
        if self.status == LessonStatus::Completed {
            return Err(RecordError::LessonCompleted);
        }
        let idx = (self.expected_task as usize).saturating_sub(1);
        let Some(task) = self.tasks.get_mut(idx) else {
            return Err(RecordError::LessonCompleted);
        };
        task.answer = Some(answer);
        let answered = self.expected_task;
        self.expected_task += 1;
        Ok(answered)
    }

    /// Mark the lesson completed with its final score.
    ///
    /// # Errors
    ///
    /// Returns `RecordError::LessonCompleted` if it already is.
    pub fn complete(&mut self, completed_at: DateTime<Utc>, score: u32) -> Result<(), RecordError> {
        if self.status == LessonStatus::Completed {
            return Err(RecordError::LessonCompleted);
        }
        self.status = LessonStatus::Completed;
        self.completed_at = Some(completed_at);
        self.score = Some(score);
        Ok(())
    }

    #[must_use]
    pub fn id(&self) -> LessonId {
        self.id
    }

    #[must_use]
    pub fn user(&self) -> UserId {
        self.user
    }

    #[must_use]
    pub fn day(&self) -> u32 {
        self.day
    }

    #[must_use]
    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    #[must_use]
    pub fn theory(&self) -> &str {
        &self.theory
    }

    #[must_use]
    pub fn practice_quiz(&self) -> SessionId {
        self.practice_quiz
    }

    #[must_use]
    pub fn tasks(&self) -> &[LessonTask] {
        &self.tasks
    }

    #[must_use]
    pub fn status(&self) -> LessonStatus {
        self.status
    }

    /// 1-based ordinal of the next unanswered task; `tasks + 1` when done.
    #[must_use]
    pub fn expected_task(&self) -> u32 {
        self.expected_task
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    #[must_use]
    pub fn score(&self) -> Option<u32> {
        self.score
    }

    #[must_use]
    pub fn answered_count(&self) -> usize {
        self.tasks.iter().filter(|t| t.answer.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    fn question() -> Question {
        Question::new(
            "2 + 2 = ?",
            ["3", "4", "5", "6"].map(String::from),
            AnswerOption::B,
            Topic::new("arithmetic"),
            None,
        )
        .unwrap()
    }

    #[test]
    fn quiz_record_answers_once() {
        let mut record = QuizRecord::new(
            SessionId::new(),
            UserId::new(1),
            1,
            question(),
            None,
            fixed_now(),
        )
        .unwrap();
        assert!(!record.is_answered());

        let correct = record.record_answer(AnswerOption::B, fixed_now()).unwrap();
        assert!(correct);
        assert_eq!(record.is_correct(), Some(true));

        let err = record.record_answer(AnswerOption::A, fixed_now()).unwrap_err();
        assert_eq!(err, RecordError::AlreadyAnswered { ordinal: 1 });
    }

    #[test]
    fn quiz_record_rejects_ordinal_zero() {
        let err = QuizRecord::new(
            SessionId::new(),
            UserId::new(1),
            0,
            question(),
            None,
            fixed_now(),
        )
        .unwrap_err();
        assert_eq!(err, RecordError::InvalidOrdinal(0));
    }

    #[test]
    fn quiz_record_from_persisted_checks_correctness() {
        let err = QuizRecord::from_persisted(
            SessionId::new(),
            UserId::new(1),
            2,
            question(),
            None,
            fixed_now(),
            Some(fixed_now()),
            Some(AnswerOption::B),
            Some(false),
        )
        .unwrap_err();
        assert_eq!(err, RecordError::CorrectnessMismatch { ordinal: 2 });
    }

    #[test]
    fn lesson_record_tracks_expected_task() {
        let prompts = (1..=3).map(|i| format!("Task {i}")).collect();
        let mut lesson = LessonRecord::new(
            LessonId::new(),
            UserId::new(1),
            2,
            Topic::new("algebra"),
            "theory",
            SessionId::new(),
            prompts,
            fixed_now(),
        )
        .unwrap();

        assert_eq!(lesson.expected_task(), 1);
        assert_eq!(lesson.record_task_answer(AnswerOption::A).unwrap(), 1);
        assert_eq!(lesson.record_task_answer(AnswerOption::C).unwrap(), 2);
        assert_eq!(lesson.expected_task(), 3);
        assert_eq!(lesson.answered_count(), 2);

        lesson.record_task_answer(AnswerOption::B).unwrap();
        let err = lesson.record_task_answer(AnswerOption::B).unwrap_err();
        assert_eq!(err, RecordError::LessonCompleted);

        lesson.complete(fixed_now(), 2).unwrap();
        assert_eq!(lesson.status(), LessonStatus::Completed);
        assert_eq!(lesson.score(), Some(2));
    }

    #[test]
    fn lesson_record_rejects_too_many_tasks() {
        let prompts = (1..=6).map(|i| format!("Task {i}")).collect();
        let err = LessonRecord::new(
            LessonId::new(),
            UserId::new(1),
            1,
            Topic::general(),
            "",
            SessionId::new(),
            prompts,
            fixed_now(),
        )
        .unwrap_err();
        assert_eq!(err, RecordError::TooManyTasks { len: 6 });
    }

    #[test]
    fn lesson_record_from_persisted_validates_pointer() {
        let tasks = vec![
            LessonTask {
                prompt: "t1".into(),
                answer: Some(AnswerOption::A),
            },
            LessonTask {
                prompt: "t2".into(),
                answer: None,
            },
        ];
        let err = LessonRecord::from_persisted(
            LessonId::new(),
            UserId::new(1),
            1,
            Topic::general(),
            String::new(),
            SessionId::new(),
            tasks,
            LessonStatus::InProgress,
            4,
            fixed_now(),
            None,
            None,
        )
        .unwrap_err();
        assert_eq!(err, RecordError::InvalidExpectedTask { expected: 4, max: 3 });
    }
}
