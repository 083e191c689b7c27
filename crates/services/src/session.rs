//! Per-user ephemeral sessions and the concurrency guard.
//!
//! The session manager owns the only shared mutable state in the system:
//! the user-to-session map and the in-flight marker set. Both sit behind
//! mutexes that are never held across await points; callers get owned
//! snapshots back, not references into the map.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};

use tutor_core::model::{AnswerOption, LessonId, Question, SessionId, Topic, UserId};
use tutor_core::scoring::ScoredAnswer;

use crate::error::SessionError;

/// What kind of flow a session drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    Diagnostic,
    Lesson { day: u32 },
}

/// One collected answer inside a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectedAnswer {
    pub ordinal: u32,
    pub answer: AnswerOption,
    pub correct: AnswerOption,
    pub is_correct: bool,
    pub topic: Topic,
}

/// In-memory state of one active flow; at most one exists per user.
///
/// Does not survive a restart; the resume coordinator rebuilds it from the
/// persisted quiz records.
#[derive(Debug, Clone)]
pub struct EphemeralSession {
    user: UserId,
    kind: SessionKind,
    session_id: SessionId,
    lesson_id: Option<LessonId>,
    questions: Vec<Question>,
    current: usize,
    answers: Vec<CollectedAnswer>,
    extra_practice: bool,
    started_at: DateTime<Utc>,
}

impl EphemeralSession {
    /// Fresh session at question one.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Empty` if no questions are provided.
    pub fn new(
        user: UserId,
        kind: SessionKind,
        session_id: SessionId,
        questions: Vec<Question>,
        started_at: DateTime<Utc>,
    ) -> Result<Self, SessionError> {
        if questions.is_empty() {
            return Err(SessionError::Empty);
        }
        Ok(Self {
            user,
            kind,
            session_id,
            lesson_id: None,
            questions,
            current: 0,
            answers: Vec::new(),
            extra_practice: false,
            started_at,
        })
    }

    /// Rebuild a session from persisted state; the index is the collected
    /// answer count.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Empty` for an empty question list and
    /// `SessionError::Completed` if every question is already answered.
    pub fn from_persisted(
        user: UserId,
        kind: SessionKind,
        session_id: SessionId,
        lesson_id: Option<LessonId>,
        questions: Vec<Question>,
        answers: Vec<CollectedAnswer>,
        extra_practice: bool,
        started_at: DateTime<Utc>,
    ) -> Result<Self, SessionError> {
        if questions.is_empty() {
            return Err(SessionError::Empty);
        }
        if answers.len() >= questions.len() {
            return Err(SessionError::Completed);
        }
        let current = answers.len();
        Ok(Self {
            user,
            kind,
            session_id,
            lesson_id,
            questions,
            current,
            answers,
            extra_practice,
            started_at,
        })
    }

    #[must_use]
    pub fn with_lesson(mut self, lesson_id: LessonId) -> Self {
        self.lesson_id = Some(lesson_id);
        self
    }

    #[must_use]
    pub fn with_extra_practice(mut self, extra_practice: bool) -> Self {
        self.extra_practice = extra_practice;
        self
    }

    #[must_use]
    pub fn user(&self) -> UserId {
        self.user
    }

    #[must_use]
    pub fn kind(&self) -> SessionKind {
        self.kind
    }

    #[must_use]
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    #[must_use]
    pub fn lesson_id(&self) -> Option<LessonId> {
        self.lesson_id
    }

    #[must_use]
    pub fn is_extra_practice(&self) -> bool {
        self.extra_practice
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.questions.len()
    }

    /// Zero-based index of the question currently awaiting an answer.
    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current
    }

    #[must_use]
    pub fn answered_count(&self) -> usize {
        self.answers.len()
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.current >= self.questions.len()
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.current)
    }

    #[must_use]
    pub fn answers(&self) -> &[CollectedAnswer] {
        &self.answers
    }

    /// Collected answers reduced to scoring input, in encounter order.
    #[must_use]
    pub fn scored_answers(&self) -> Vec<ScoredAnswer> {
        self.answers
            .iter()
            .map(|a| ScoredAnswer {
                topic: a.topic.clone(),
                is_correct: a.is_correct,
            })
            .collect()
    }

    fn record_answer(&mut self, answer: AnswerOption) -> Result<CollectedAnswer, SessionError> {
        if self.is_complete() {
            return Err(SessionError::Completed);
        }
        let expected = u32::try_from(self.current).unwrap_or(u32::MAX).saturating_add(1);
        let got = u32::try_from(self.answers.len()).unwrap_or(u32::MAX);
        if self.answers.len() != self.current {
            return Err(SessionError::OutOfOrder { expected, got });
        }
        let question = &self.questions[self.current];
        let collected = CollectedAnswer {
            ordinal: expected,
            answer,
            correct: question.correct(),
            is_correct: question.is_correct(answer),
            topic: question.topic().clone(),
        };
        self.answers.push(collected.clone());
        self.current += 1;
        Ok(collected)
    }
}

/// Owned snapshot of an answer step, safe to use after the map lock drops.
#[derive(Debug, Clone)]
pub struct AnswerOutcome {
    pub collected: CollectedAnswer,
    pub next_question: Option<Question>,
    pub is_complete: bool,
    pub session_id: SessionId,
    pub kind: SessionKind,
    pub extra_practice: bool,
    pub answered: usize,
    pub total: usize,
}

/// Owned snapshot of a session's position for rendering and state checks.
#[derive(Debug, Clone)]
pub struct SessionView {
    pub session_id: SessionId,
    pub kind: SessionKind,
    pub lesson_id: Option<LessonId>,
    pub current_index: usize,
    pub total: usize,
    pub current_question: Option<Question>,
    pub extra_practice: bool,
}

/// Removes its event signature from the in-flight set on drop, whatever the
/// outcome of the handling it guarded.
pub struct InFlightGuard {
    markers: Arc<Mutex<HashSet<String>>>,
    signature: String,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        recover(self.markers.lock()).remove(&self.signature);
    }
}

// A poisoned lock only means another handler panicked mid-update; the data
// is plain collections and stays usable.
fn recover<'a, T>(
    result: Result<MutexGuard<'a, T>, PoisonError<MutexGuard<'a, T>>>,
) -> MutexGuard<'a, T> {
    result.unwrap_or_else(PoisonError::into_inner)
}

/// Maps users to their ephemeral session and guards duplicate deliveries.
#[derive(Clone, Default)]
pub struct SessionManager {
    sessions: Arc<Mutex<HashMap<UserId, EphemeralSession>>>,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl SessionManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert the in-flight marker for an event signature.
    ///
    /// Returns `None` when the identical event is already being processed;
    /// the caller must drop the duplicate. The returned guard removes the
    /// marker when it goes out of scope.
    #[must_use]
    pub fn try_begin_event(&self, signature: impl Into<String>) -> Option<InFlightGuard> {
        let signature = signature.into();
        let mut markers = recover(self.in_flight.lock());
        if !markers.insert(signature.clone()) {
            return None;
        }
        Some(InFlightGuard {
            markers: Arc::clone(&self.in_flight),
            signature,
        })
    }

    /// Install a session for its user.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::AlreadyActive` if the user already has one;
    /// the existing session is left untouched.
    pub fn begin_session(&self, session: EphemeralSession) -> Result<(), SessionError> {
        let mut sessions = recover(self.sessions.lock());
        if sessions.contains_key(&session.user()) {
            return Err(SessionError::AlreadyActive);
        }
        sessions.insert(session.user(), session);
        Ok(())
    }

    #[must_use]
    pub fn has_session(&self, user: UserId) -> bool {
        recover(self.sessions.lock()).contains_key(&user)
    }

    /// Zero-based index of the question the user's session is waiting on.
    #[must_use]
    pub fn current_index(&self, user: UserId) -> Option<u32> {
        recover(self.sessions.lock())
            .get(&user)
            .map(|s| u32::try_from(s.current_index()).unwrap_or(u32::MAX))
    }

    #[must_use]
    pub fn view(&self, user: UserId) -> Option<SessionView> {
        recover(self.sessions.lock()).get(&user).map(|s| SessionView {
            session_id: s.session_id(),
            kind: s.kind(),
            lesson_id: s.lesson_id(),
            current_index: s.current_index(),
            total: s.total(),
            current_question: s.current_question().cloned(),
            extra_practice: s.is_extra_practice(),
        })
    }

    /// Record an answer against the user's session.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NoActiveSession` without a session,
    /// `SessionError::OutOfOrder` on an index mismatch, and
    /// `SessionError::Completed` when nothing is left to answer.
    pub fn record_answer(
        &self,
        user: UserId,
        answer: AnswerOption,
    ) -> Result<AnswerOutcome, SessionError> {
        let mut sessions = recover(self.sessions.lock());
        let session = sessions
            .get_mut(&user)
            .ok_or(SessionError::NoActiveSession)?;
        let collected = session.record_answer(answer)?;
        Ok(AnswerOutcome {
            collected,
            next_question: session.current_question().cloned(),
            is_complete: session.is_complete(),
            session_id: session.session_id(),
            kind: session.kind(),
            extra_practice: session.is_extra_practice(),
            answered: session.answered_count(),
            total: session.total(),
        })
    }

    /// Tear down the user's session and return the final snapshot.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NoActiveSession` if none exists.
    pub fn end_session(&self, user: UserId) -> Result<EphemeralSession, SessionError> {
        recover(self.sessions.lock())
            .remove(&user)
            .ok_or(SessionError::NoActiveSession)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tutor_core::time::fixed_now;

    fn question(n: usize) -> Question {
        Question::new(
            format!("Q{n}"),
            [
                format!("a{n}"),
                format!("b{n}"),
                format!("c{n}"),
                format!("d{n}"),
            ],
            AnswerOption::A,
            Topic::new("algebra"),
            None,
        )
        .unwrap()
    }

    fn session(user: i64, count: usize) -> EphemeralSession {
        EphemeralSession::new(
            UserId::new(user),
            SessionKind::Diagnostic,
            SessionId::new(),
            (1..=count).map(question).collect(),
            fixed_now(),
        )
        .unwrap()
    }

    #[test]
    fn begin_session_is_not_reentrant() {
        let manager = SessionManager::new();
        manager.begin_session(session(1, 3)).unwrap();
        let err = manager.begin_session(session(1, 3)).unwrap_err();
        assert_eq!(err, SessionError::AlreadyActive);
        // Exactly one session remains.
        assert!(manager.has_session(UserId::new(1)));
        assert_eq!(manager.current_index(UserId::new(1)), Some(0));
    }

    #[test]
    fn answers_advance_and_complete() {
        let manager = SessionManager::new();
        let user = UserId::new(2);
        manager.begin_session(session(2, 2)).unwrap();

        let outcome = manager.record_answer(user, AnswerOption::A).unwrap();
        assert!(outcome.collected.is_correct);
        assert!(!outcome.is_complete);
        assert_eq!(outcome.next_question.unwrap().text(), "Q2");

        let outcome = manager.record_answer(user, AnswerOption::C).unwrap();
        assert!(!outcome.collected.is_correct);
        assert!(outcome.is_complete);
        assert!(outcome.next_question.is_none());

        let err = manager.record_answer(user, AnswerOption::A).unwrap_err();
        assert_eq!(err, SessionError::Completed);

        let snapshot = manager.end_session(user).unwrap();
        assert_eq!(snapshot.answered_count(), 2);
        assert!(!manager.has_session(user));
    }

    #[test]
    fn answer_without_session_fails() {
        let manager = SessionManager::new();
        let err = manager
            .record_answer(UserId::new(3), AnswerOption::A)
            .unwrap_err();
        assert_eq!(err, SessionError::NoActiveSession);
    }

    #[test]
    fn in_flight_marker_drops_duplicates_and_cleans_up() {
        let manager = SessionManager::new();
        let guard = manager.try_begin_event("7:answer:1:A");
        assert!(guard.is_some());
        // Identical signature while in flight: duplicate, dropped.
        assert!(manager.try_begin_event("7:answer:1:A").is_none());
        // A different signature passes.
        let other = manager.try_begin_event("7:answer:1:B");
        assert!(other.is_some());

        drop(guard);
        // Marker removed on drop, the signature is usable again.
        assert!(manager.try_begin_event("7:answer:1:A").is_some());
    }

    #[test]
    fn resumed_session_continues_at_answered_count() {
        let questions: Vec<Question> = (1..=4).map(question).collect();
        let answers = vec![
            CollectedAnswer {
                ordinal: 1,
                answer: AnswerOption::A,
                correct: AnswerOption::A,
                is_correct: true,
                topic: Topic::new("algebra"),
            },
            CollectedAnswer {
                ordinal: 2,
                answer: AnswerOption::B,
                correct: AnswerOption::A,
                is_correct: false,
                topic: Topic::new("algebra"),
            },
        ];
        let session = EphemeralSession::from_persisted(
            UserId::new(5),
            SessionKind::Lesson { day: 2 },
            SessionId::new(),
            None,
            questions,
            answers,
            false,
            fixed_now(),
        )
        .unwrap();

        assert_eq!(session.current_index(), 2);
        assert_eq!(session.current_question().unwrap().text(), "Q3");
    }

    #[test]
    fn fully_answered_persisted_state_is_completed() {
        let questions = vec![question(1)];
        let answers = vec![CollectedAnswer {
            ordinal: 1,
            answer: AnswerOption::A,
            correct: AnswerOption::A,
            is_correct: true,
            topic: Topic::new("algebra"),
        }];
        let err = EphemeralSession::from_persisted(
            UserId::new(5),
            SessionKind::Diagnostic,
            SessionId::new(),
            None,
            questions,
            answers,
            false,
            fixed_now(),
        )
        .unwrap_err();
        assert_eq!(err, SessionError::Completed);
    }

    #[test]
    fn empty_question_list_is_rejected() {
        let err = EphemeralSession::new(
            UserId::new(1),
            SessionKind::Diagnostic,
            SessionId::new(),
            Vec::new(),
            fixed_now(),
        )
        .unwrap_err();
        assert_eq!(err, SessionError::Empty);
    }
}
