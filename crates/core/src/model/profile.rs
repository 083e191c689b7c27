use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::model::{LessonId, SessionId, Topic, UserId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProfileError {
    #[error("current_day must be at least 1, got {0}")]
    InvalidDay(u32),

    #[error("current_day may not move backwards: {from} -> {to}")]
    DayRegression { from: u32, to: u32 },
}

/// Interface language for a learner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Language {
    #[default]
    En,
    Uz,
}

impl Language {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Uz => "uz",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "en" => Some(Language::En),
            "uz" => Some(Language::Uz),
            _ => None,
        }
    }
}

/// Proficiency level, assigned at onboarding and refined by the diagnostic.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub enum Level {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

impl Level {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Level::Beginner => "beginner",
            Level::Intermediate => "intermediate",
            Level::Advanced => "advanced",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "beginner" => Some(Level::Beginner),
            "intermediate" => Some(Level::Intermediate),
            "advanced" => Some(Level::Advanced),
            _ => None,
        }
    }
}

/// Durable phase of the learning program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LearningStatus {
    #[default]
    NotStarted,
    Onboarding,
    DiagnosticComplete,
    InProgress,
    Completed,
}

impl LearningStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            LearningStatus::NotStarted => "not_started",
            LearningStatus::Onboarding => "onboarding",
            LearningStatus::DiagnosticComplete => "diagnostic_complete",
            LearningStatus::InProgress => "in_progress",
            LearningStatus::Completed => "completed",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "not_started" => Some(LearningStatus::NotStarted),
            "onboarding" => Some(LearningStatus::Onboarding),
            "diagnostic_complete" => Some(LearningStatus::DiagnosticComplete),
            "in_progress" => Some(LearningStatus::InProgress),
            "completed" => Some(LearningStatus::Completed),
            _ => None,
        }
    }
}

/// Resume marker: names exactly the input the user is expected to send next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Mode {
    #[default]
    Idle,
    AwaitingLanguage,
    AwaitingName,
    AwaitingEmail,
    AwaitingTarget,
    AwaitingLevel,
    QuizAnswer,
    LessonTask,
    LessonChoice,
}

impl Mode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Idle => "idle",
            Mode::AwaitingLanguage => "awaiting_language",
            Mode::AwaitingName => "awaiting_name",
            Mode::AwaitingEmail => "awaiting_email",
            Mode::AwaitingTarget => "awaiting_target",
            Mode::AwaitingLevel => "awaiting_level",
            Mode::QuizAnswer => "quiz_answer",
            Mode::LessonTask => "lesson_task",
            Mode::LessonChoice => "lesson_choice",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "idle" => Some(Mode::Idle),
            "awaiting_language" => Some(Mode::AwaitingLanguage),
            "awaiting_name" => Some(Mode::AwaitingName),
            "awaiting_email" => Some(Mode::AwaitingEmail),
            "awaiting_target" => Some(Mode::AwaitingTarget),
            "awaiting_level" => Some(Mode::AwaitingLevel),
            "quiz_answer" => Some(Mode::QuizAnswer),
            "lesson_task" => Some(Mode::LessonTask),
            "lesson_choice" => Some(Mode::LessonChoice),
            _ => None,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Durable per-user record: identity, phase, day counter and resume marker.
///
/// Created on first contact, mutated by every phase, never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    id: UserId,
    full_name: String,
    email: Option<String>,
    language: Language,
    level: Level,
    target_score: Option<String>,
    learning_status: LearningStatus,
    current_day: u32,
    mode: Mode,
    active_quiz: Option<SessionId>,
    active_lesson: Option<LessonId>,
    test_score: Option<f64>,
    strong_topics: Vec<Topic>,
    weak_topics: Vec<Topic>,
    lessons_completed: u32,
    created_at: DateTime<Utc>,
    last_active: DateTime<Utc>,
}

impl UserProfile {
    /// Fresh profile for a first contact.
    #[must_use]
    pub fn new(id: UserId, full_name: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            full_name: full_name.into(),
            email: None,
            language: Language::default(),
            level: Level::default(),
            target_score: None,
            learning_status: LearningStatus::default(),
            current_day: 1,
            mode: Mode::default(),
            active_quiz: None,
            active_lesson: None,
            test_score: None,
            strong_topics: Vec::new(),
            weak_topics: Vec::new(),
            lessons_completed: 0,
            created_at,
            last_active: created_at,
        }
    }

    /// Rehydrate a profile from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `ProfileError::InvalidDay` if `current_day` is zero.
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        id: UserId,
        full_name: String,
        email: Option<String>,
        language: Language,
        level: Level,
        target_score: Option<String>,
        learning_status: LearningStatus,
        current_day: u32,
        mode: Mode,
        active_quiz: Option<SessionId>,
        active_lesson: Option<LessonId>,
        test_score: Option<f64>,
        strong_topics: Vec<Topic>,
        weak_topics: Vec<Topic>,
        lessons_completed: u32,
        created_at: DateTime<Utc>,
        last_active: DateTime<Utc>,
    ) -> Result<Self, ProfileError> {
        if current_day == 0 {
            return Err(ProfileError::InvalidDay(current_day));
        }
        Ok(Self {
            id,
            full_name,
            email,
            language,
            level,
            target_score,
            learning_status,
            current_day,
            mode,
            active_quiz,
            active_lesson,
            test_score,
            strong_topics,
            weak_topics,
            lessons_completed,
            created_at,
            last_active,
        })
    }

    #[must_use]
    pub fn id(&self) -> UserId {
        self.id
    }

    #[must_use]
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    #[must_use]
    pub fn language(&self) -> Language {
        self.language
    }

    #[must_use]
    pub fn level(&self) -> Level {
        self.level
    }

    #[must_use]
    pub fn target_score(&self) -> Option<&str> {
        self.target_score.as_deref()
    }

    #[must_use]
    pub fn learning_status(&self) -> LearningStatus {
        self.learning_status
    }

    #[must_use]
    pub fn current_day(&self) -> u32 {
        self.current_day
    }

    #[must_use]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    #[must_use]
    pub fn active_quiz(&self) -> Option<SessionId> {
        self.active_quiz
    }

    #[must_use]
    pub fn active_lesson(&self) -> Option<LessonId> {
        self.active_lesson
    }

    #[must_use]
    pub fn test_score(&self) -> Option<f64> {
        self.test_score
    }

    #[must_use]
    pub fn strong_topics(&self) -> &[Topic] {
        &self.strong_topics
    }

    #[must_use]
    pub fn weak_topics(&self) -> &[Topic] {
        &self.weak_topics
    }

    #[must_use]
    pub fn lessons_completed(&self) -> u32 {
        self.lessons_completed
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn last_active(&self) -> DateTime<Utc> {
        self.last_active
    }

    pub fn set_full_name(&mut self, name: impl Into<String>) {
        self.full_name = name.into();
    }

    pub fn set_email(&mut self, email: impl Into<String>) {
        self.email = Some(email.into());
    }

    pub fn set_language(&mut self, language: Language) {
        self.language = language;
    }

    pub fn set_level(&mut self, level: Level) {
        self.level = level;
    }

    pub fn set_target_score(&mut self, target: impl Into<String>) {
        self.target_score = Some(target.into());
    }

    pub fn set_learning_status(&mut self, status: LearningStatus) {
        self.learning_status = status;
    }

    pub fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_active = now;
    }

    /// Move the day counter forward.
    ///
    /// # Errors
    ///
    /// Returns `ProfileError::DayRegression` if `day` is behind the current
    /// day, or `ProfileError::InvalidDay` if it is zero.
    pub fn advance_to_day(&mut self, day: u32) -> Result<(), ProfileError> {
        if day == 0 {
            return Err(ProfileError::InvalidDay(day));
        }
        if day < self.current_day {
            return Err(ProfileError::DayRegression {
                from: self.current_day,
                to: day,
            });
        }
        self.current_day = day;
        Ok(())
    }

    /// Mark a quiz flow as active and await answers.
    pub fn start_quiz(&mut self, session: SessionId) {
        self.active_quiz = Some(session);
        self.mode = Mode::QuizAnswer;
    }

    /// Mark a lesson flow (and its practice quiz) as active.
    pub fn start_lesson(&mut self, lesson: LessonId, practice_quiz: SessionId) {
        self.active_lesson = Some(lesson);
        self.active_quiz = Some(practice_quiz);
        self.mode = Mode::LessonTask;
    }

    /// Clear the active flow markers without touching progress counters.
    pub fn clear_active_flow(&mut self) {
        self.active_quiz = None;
        self.active_lesson = None;
        self.mode = Mode::Idle;
    }

    /// Record the diagnostic outcome and move to `DiagnosticComplete`.
    pub fn record_diagnostic(
        &mut self,
        percentage: f64,
        strengths: Vec<Topic>,
        weaknesses: Vec<Topic>,
        level: Level,
    ) {
        self.test_score = Some(percentage);
        self.strong_topics = strengths;
        self.weak_topics = weaknesses;
        self.level = level;
        self.learning_status = LearningStatus::DiagnosticComplete;
        self.clear_active_flow();
    }

    /// Count a finished (non-extra) lesson and advance the day.
    ///
    /// # Errors
    ///
    /// Propagates `ProfileError` from the day advance; cannot regress.
    pub fn finish_lesson(&mut self) -> Result<(), ProfileError> {
        self.lessons_completed = self.lessons_completed.saturating_add(1);
        let next = self.current_day.saturating_add(1);
        self.advance_to_day(next)?;
        self.clear_active_flow();
        Ok(())
    }

    /// Reset to a diagnostic-complete-equivalent state, preserving the
    /// diagnostic outcome. The day counter is the one place allowed to move
    /// backwards; quiz and lesson history rows are untouched.
    pub fn restart(&mut self) {
        self.learning_status = LearningStatus::DiagnosticComplete;
        self.current_day = 1;
        self.lessons_completed = 0;
        self.clear_active_flow();
    }
}
