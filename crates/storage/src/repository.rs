use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use tutor_core::model::{
    AnswerOption, LessonId, LessonRecord, QuizRecord, SessionId, UserId, UserProfile,
};

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Session-level metadata for a set of quiz records.
///
/// `lesson_day` distinguishes lesson practice quizzes from the diagnostic;
/// `extra_practice` marks sessions that never advance the day counter.
#[derive(Debug, Clone, PartialEq)]
pub struct QuizSessionMeta {
    pub session: SessionId,
    pub user: UserId,
    pub lesson_day: Option<u32>,
    pub extra_practice: bool,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub total_score: Option<f64>,
}

impl QuizSessionMeta {
    #[must_use]
    pub fn new(
        session: SessionId,
        user: UserId,
        lesson_day: Option<u32>,
        extra_practice: bool,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            session,
            user,
            lesson_day,
            extra_practice,
            created_at,
            completed_at: None,
            total_score: None,
        }
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }
}

/// Repository contract for user profiles.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Persist a new profile.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the user already exists.
    async fn create_user(&self, profile: &UserProfile) -> Result<(), StorageError>;

    /// Fetch a profile by user id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on connection or mapping failures.
    async fn get_user(&self, id: UserId) -> Result<Option<UserProfile>, StorageError>;

    /// Overwrite an existing profile.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the user does not exist.
    async fn update_user(&self, profile: &UserProfile) -> Result<(), StorageError>;
}

/// Repository contract for quiz sessions and their per-question records.
#[async_trait]
pub trait QuizRepository: Send + Sync {
    /// Persist a session and its full record set atomically-enough that a
    /// reader either sees the session with all records or not at all.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the session id already exists.
    async fn create_quiz_session(
        &self,
        meta: &QuizSessionMeta,
        records: &[QuizRecord],
    ) -> Result<(), StorageError>;

    /// Fetch session metadata.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on connection or mapping failures.
    async fn quiz_session(
        &self,
        session: SessionId,
    ) -> Result<Option<QuizSessionMeta>, StorageError>;

    /// Fetch all records of a session, ordered by ordinal.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on connection or mapping failures.
    async fn quiz_records(&self, session: SessionId) -> Result<Vec<QuizRecord>, StorageError>;

    /// Store the answer for one record.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` for an unknown (session, ordinal).
    async fn update_quiz_answer(
        &self,
        session: SessionId,
        ordinal: u32,
        answer: AnswerOption,
        is_correct: bool,
        answered_at: DateTime<Utc>,
    ) -> Result<(), StorageError>;

    /// Mark a session completed with its total score.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` for an unknown session.
    async fn complete_quiz_session(
        &self,
        session: SessionId,
        total_score: f64,
        completed_at: DateTime<Utc>,
    ) -> Result<(), StorageError>;
}

/// Repository contract for lesson records.
#[async_trait]
pub trait LessonRepository: Send + Sync {
    /// Persist a new lesson record.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the lesson id already exists.
    async fn create_lesson_record(&self, lesson: &LessonRecord) -> Result<(), StorageError>;

    /// Fetch a lesson record by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on connection or mapping failures.
    async fn get_lesson_record(&self, id: LessonId)
    -> Result<Option<LessonRecord>, StorageError>;

    /// Overwrite an existing lesson record.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the lesson does not exist.
    async fn update_lesson_record(&self, lesson: &LessonRecord) -> Result<(), StorageError>;
}

/// Simple in-memory store for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    users: Arc<Mutex<HashMap<UserId, UserProfile>>>,
    quizzes: Arc<Mutex<HashMap<SessionId, (QuizSessionMeta, Vec<QuizRecord>)>>>,
    lessons: Arc<Mutex<HashMap<LessonId, LessonRecord>>>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn create_user(&self, profile: &UserProfile) -> Result<(), StorageError> {
        let mut guard = self.users.lock().map_err(poisoned)?;
        if guard.contains_key(&profile.id()) {
            return Err(StorageError::Conflict);
        }
        guard.insert(profile.id(), profile.clone());
        Ok(())
    }

    async fn get_user(&self, id: UserId) -> Result<Option<UserProfile>, StorageError> {
        let guard = self.users.lock().map_err(poisoned)?;
        Ok(guard.get(&id).cloned())
    }

    async fn update_user(&self, profile: &UserProfile) -> Result<(), StorageError> {
        let mut guard = self.users.lock().map_err(poisoned)?;
        match guard.get_mut(&profile.id()) {
            Some(existing) => {
                *existing = profile.clone();
                Ok(())
            }
            None => Err(StorageError::NotFound),
        }
    }
}

#[async_trait]
impl QuizRepository for InMemoryStore {
    async fn create_quiz_session(
        &self,
        meta: &QuizSessionMeta,
        records: &[QuizRecord],
    ) -> Result<(), StorageError> {
        let mut guard = self.quizzes.lock().map_err(poisoned)?;
        if guard.contains_key(&meta.session) {
            return Err(StorageError::Conflict);
        }
        let mut stored = records.to_vec();
        stored.sort_by_key(QuizRecord::ordinal);
        guard.insert(meta.session, (meta.clone(), stored));
        Ok(())
    }

    async fn quiz_session(
        &self,
        session: SessionId,
    ) -> Result<Option<QuizSessionMeta>, StorageError> {
        let guard = self.quizzes.lock().map_err(poisoned)?;
        Ok(guard.get(&session).map(|(meta, _)| meta.clone()))
    }

    async fn quiz_records(&self, session: SessionId) -> Result<Vec<QuizRecord>, StorageError> {
        let guard = self.quizzes.lock().map_err(poisoned)?;
        Ok(guard
            .get(&session)
            .map(|(_, records)| records.clone())
            .unwrap_or_default())
    }

    async fn update_quiz_answer(
        &self,
        session: SessionId,
        ordinal: u32,
        answer: AnswerOption,
        is_correct: bool,
        answered_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let mut guard = self.quizzes.lock().map_err(poisoned)?;
        let (_, records) = guard.get_mut(&session).ok_or(StorageError::NotFound)?;
        let record = records
            .iter_mut()
            .find(|r| r.ordinal() == ordinal)
            .ok_or(StorageError::NotFound)?;
        let rebuilt = QuizRecord::from_persisted(
            record.session(),
            record.user(),
            record.ordinal(),
            record.question().clone(),
            record.lesson_day(),
            record.asked_at(),
            Some(answered_at),
            Some(answer),
            Some(is_correct),
        )
        .map_err(|e| StorageError::Serialization(e.to_string()))?;
        *record = rebuilt;
        Ok(())
    }

    async fn complete_quiz_session(
        &self,
        session: SessionId,
        total_score: f64,
        completed_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let mut guard = self.quizzes.lock().map_err(poisoned)?;
        let (meta, _) = guard.get_mut(&session).ok_or(StorageError::NotFound)?;
        meta.completed_at = Some(completed_at);
        meta.total_score = Some(total_score);
        Ok(())
    }
}

#[async_trait]
impl LessonRepository for InMemoryStore {
    async fn create_lesson_record(&self, lesson: &LessonRecord) -> Result<(), StorageError> {
        let mut guard = self.lessons.lock().map_err(poisoned)?;
        if guard.contains_key(&lesson.id()) {
            return Err(StorageError::Conflict);
        }
        guard.insert(lesson.id(), lesson.clone());
        Ok(())
    }

    async fn get_lesson_record(
        &self,
        id: LessonId,
    ) -> Result<Option<LessonRecord>, StorageError> {
        let guard = self.lessons.lock().map_err(poisoned)?;
        Ok(guard.get(&id).cloned())
    }

    async fn update_lesson_record(&self, lesson: &LessonRecord) -> Result<(), StorageError> {
        let mut guard = self.lessons.lock().map_err(poisoned)?;
        match guard.get_mut(&lesson.id()) {
            Some(existing) => {
                *existing = lesson.clone();
                Ok(())
            }
            None => Err(StorageError::NotFound),
        }
    }
}

/// Aggregates the three repositories behind trait objects for backend
/// swapping.
#[derive(Clone)]
pub struct Storage {
    pub users: Arc<dyn UserRepository>,
    pub quizzes: Arc<dyn QuizRepository>,
    pub lessons: Arc<dyn LessonRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let store = InMemoryStore::new();
        let users: Arc<dyn UserRepository> = Arc::new(store.clone());
        let quizzes: Arc<dyn QuizRepository> = Arc::new(store.clone());
        let lessons: Arc<dyn LessonRepository> = Arc::new(store);
        Self {
            users,
            quizzes,
            lessons,
        }
    }
}
