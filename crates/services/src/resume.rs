//! Rebuilds ephemeral sessions from persisted records after a restart.

use storage::repository::Storage;
use tutor_core::model::{QuizRecord, SessionId, UserProfile};

use crate::error::DispatchError;
use crate::session::{CollectedAnswer, EphemeralSession, SessionKind};

/// Consults the persisted records when an event arrives for a user with no
/// in-memory session.
///
/// Reconstruction is idempotent: with no new events, two invocations yield
/// the same session positioned at the same unanswered question, and an
/// already-answered question is never re-asked.
#[derive(Clone)]
pub struct ResumeCoordinator {
    storage: Storage,
}

impl ResumeCoordinator {
    #[must_use]
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    /// Rebuild the user's session from persisted state.
    ///
    /// Returns `None` when no incomplete flow exists; the caller then falls
    /// through to the progression machine's default action.
    ///
    /// # Errors
    ///
    /// Returns `DispatchError` on storage failures or corrupt record sets.
    pub async fn reconstruct(
        &self,
        profile: &UserProfile,
    ) -> Result<Option<EphemeralSession>, DispatchError> {
        if let Some(session_id) = profile.active_quiz()
            && let Some(session) = self.from_quiz(profile, session_id).await?
        {
            return Ok(Some(session));
        }

        // The quiz link can be lost while the lesson survives (drift); the
        // lesson record still points at its practice quiz.
        if let Some(lesson_id) = profile.active_lesson() {
            let Some(lesson) = self.storage.lessons.get_lesson_record(lesson_id).await? else {
                return Ok(None);
            };
            if lesson.status() == tutor_core::model::LessonStatus::Completed {
                return Ok(None);
            }
            if let Some(session) = self.from_quiz(profile, lesson.practice_quiz()).await? {
                let expected = u32::try_from(session.answered_count())
                    .unwrap_or(u32::MAX)
                    .saturating_add(1);
                if expected != lesson.expected_task() {
                    tracing::warn!(
                        user = %profile.id(),
                        lesson = %lesson.id(),
                        expected_task = lesson.expected_task(),
                        from_records = expected,
                        "lesson pointer disagrees with quiz records; records win"
                    );
                }
                return Ok(Some(session.with_lesson(lesson_id)));
            }
        }

        Ok(None)
    }

    async fn from_quiz(
        &self,
        profile: &UserProfile,
        session_id: SessionId,
    ) -> Result<Option<EphemeralSession>, DispatchError> {
        let Some(meta) = self.storage.quizzes.quiz_session(session_id).await? else {
            return Ok(None);
        };
        if meta.is_completed() {
            return Ok(None);
        }

        let records = self.storage.quizzes.quiz_records(session_id).await?;
        if records.is_empty() || records.iter().all(QuizRecord::is_answered) {
            return Ok(None);
        }

        // Question list, index and collected answers all come strictly from
        // the records, ordered by stored ordinal.
        let questions = records.iter().map(|r| r.question().clone()).collect();
        let answers: Vec<CollectedAnswer> = records
            .iter()
            .filter_map(|record| {
                let answer = record.answer()?;
                Some(CollectedAnswer {
                    ordinal: record.ordinal(),
                    answer,
                    correct: record.question().correct(),
                    is_correct: record.is_correct().unwrap_or_default(),
                    topic: record.question().topic().clone(),
                })
            })
            .collect();

        let kind = meta
            .lesson_day
            .map_or(SessionKind::Diagnostic, |day| SessionKind::Lesson { day });

        let session = EphemeralSession::from_persisted(
            profile.id(),
            kind,
            session_id,
            profile.active_lesson(),
            questions,
            answers,
            meta.extra_practice,
            meta.created_at,
        )?;
        Ok(Some(session))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage::repository::QuizSessionMeta;
    use tutor_core::model::{AnswerOption, Question, Topic, UserId};
    use tutor_core::time::fixed_now;

    fn question(n: u32) -> Question {
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

    async fn seed_quiz(
        storage: &Storage,
        user: UserId,
        total: u32,
        answered: u32,
    ) -> SessionId {
        let session = SessionId::new();
        let meta = QuizSessionMeta::new(session, user, None, false, fixed_now());
        let records: Vec<QuizRecord> = (1..=total)
            .map(|i| {
                QuizRecord::new(session, user, i, question(i), None, fixed_now()).unwrap()
            })
            .collect();
        storage
            .quizzes
            .create_quiz_session(&meta, &records)
            .await
            .unwrap();
        for i in 1..=answered {
            storage
                .quizzes
                .update_quiz_answer(session, i, AnswerOption::A, true, fixed_now())
                .await
                .unwrap();
        }
        session
    }

    #[tokio::test]
    async fn resumes_at_first_unanswered_question() {
        let storage = Storage::in_memory();
        let user = UserId::new(1);
        let session_id = seed_quiz(&storage, user, 5, 3).await;

        let mut profile = UserProfile::new(user, "Learner", fixed_now());
        profile.start_quiz(session_id);

        let coordinator = ResumeCoordinator::new(storage);
        let session = coordinator.reconstruct(&profile).await.unwrap().unwrap();

        assert_eq!(session.current_index(), 3);
        assert_eq!(session.current_question().unwrap().text(), "Q4");
        assert_eq!(session.answered_count(), 3);
    }

    #[tokio::test]
    async fn reconstruction_is_idempotent() {
        let storage = Storage::in_memory();
        let user = UserId::new(2);
        let session_id = seed_quiz(&storage, user, 4, 1).await;

        let mut profile = UserProfile::new(user, "Learner", fixed_now());
        profile.start_quiz(session_id);

        let coordinator = ResumeCoordinator::new(storage);
        let first = coordinator.reconstruct(&profile).await.unwrap().unwrap();
        let second = coordinator.reconstruct(&profile).await.unwrap().unwrap();

        assert_eq!(first.current_index(), second.current_index());
        assert_eq!(
            first.current_question().unwrap(),
            second.current_question().unwrap()
        );
    }

    #[tokio::test]
    async fn fully_answered_flow_is_not_resumed() {
        let storage = Storage::in_memory();
        let user = UserId::new(3);
        let session_id = seed_quiz(&storage, user, 3, 3).await;

        let mut profile = UserProfile::new(user, "Learner", fixed_now());
        profile.start_quiz(session_id);

        let coordinator = ResumeCoordinator::new(storage);
        assert!(coordinator.reconstruct(&profile).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn completed_session_meta_is_not_resumed() {
        let storage = Storage::in_memory();
        let user = UserId::new(4);
        let session_id = seed_quiz(&storage, user, 3, 1).await;
        storage
            .quizzes
            .complete_quiz_session(session_id, 33.3, fixed_now())
            .await
            .unwrap();

        let mut profile = UserProfile::new(user, "Learner", fixed_now());
        profile.start_quiz(session_id);

        let coordinator = ResumeCoordinator::new(storage);
        assert!(coordinator.reconstruct(&profile).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn no_active_markers_means_no_resume() {
        let storage = Storage::in_memory();
        let profile = UserProfile::new(UserId::new(5), "Learner", fixed_now());
        let coordinator = ResumeCoordinator::new(storage);
        assert!(coordinator.reconstruct(&profile).await.unwrap().is_none());
    }
}
