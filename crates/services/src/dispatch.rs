//! Single entry point for inbound user events.
//!
//! Every event goes through the same pipeline: in-flight guard, profile
//! load, session resume if the ephemeral session is gone, then the
//! progression state machine decides whether the event advances anything.
//! Side effects (content generation, persistence, outbound messages) are
//! executed here; persisted-store writes are best-effort with one retry,
//! and a lost write is logged, never surfaced to the user.

use std::sync::Arc;

use tutor_core::Clock;
use tutor_core::model::{
    AnswerOption, Language, LessonId, LessonRecord, Level, Mode, Question, QuizRecord, SessionId,
    Topic, UserId, UserProfile,
};
use tutor_core::progression::{
    Action, DIAGNOSTIC_QUESTIONS, Event, LESSON_TASKS, OnboardingStep, PROGRAM_DAYS,
    ProgressionState, Transition, default_action, study_plan, topic_for_day, transition,
};
use tutor_core::scoring::{DiagnosticReport, LevelThresholds};

use storage::repository::{QuizSessionMeta, Storage, StorageError};

use crate::content::ContentProvider;
use crate::error::{DispatchError, SessionError};
use crate::resume::ResumeCoordinator;
use crate::session::{AnswerOutcome, EphemeralSession, SessionKind, SessionManager};
use crate::transport::Messenger;

/// Semantic inbound event. The transport adapter decodes its wire format
/// into one of these; answer events carry the 1-based ordinal of the
/// question they respond to, which doubles as the duplicate disambiguator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IncomingEvent {
    Start,
    Text(String),
    LanguageSelected(Language),
    LevelSelected(Level),
    StartDiagnostic,
    AnswerSelected { ordinal: u32, option: AnswerOption },
    PlanRequested,
    LessonRequested,
    TaskAnswerSelected { ordinal: u32, option: AnswerOption },
    MorePractice,
    NextDay,
    ExtraPractice,
    ViewStats,
    Restart,
}

/// How an event was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Handled,
    DuplicateDropped,
    Ignored,
}

/// Orchestrates one user event end to end.
#[derive(Clone)]
pub struct Dispatcher {
    clock: Clock,
    storage: Storage,
    content: ContentProvider,
    sessions: SessionManager,
    resume: ResumeCoordinator,
    messenger: Arc<dyn Messenger>,
    thresholds: LevelThresholds,
}

impl Dispatcher {
    #[must_use]
    pub fn new(
        clock: Clock,
        storage: Storage,
        content: ContentProvider,
        sessions: SessionManager,
        messenger: Arc<dyn Messenger>,
    ) -> Self {
        let resume = ResumeCoordinator::new(storage.clone());
        Self {
            clock,
            storage,
            content,
            sessions,
            resume,
            messenger,
            thresholds: LevelThresholds::default(),
        }
    }

    #[must_use]
    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Handle one inbound event for one user.
    ///
    /// # Errors
    ///
    /// Returns `DispatchError` only for failures that leave the flow in an
    /// unusable position (e.g. the profile cannot be read at all);
    /// everything recoverable is absorbed here.
    pub async fn handle_event(
        &self,
        user: UserId,
        event: IncomingEvent,
    ) -> Result<Dispatch, DispatchError> {
        let Some(_guard) = self.sessions.try_begin_event(event_signature(user, &event)) else {
            tracing::debug!(%user, "dropping duplicate delivery");
            return Ok(Dispatch::DuplicateDropped);
        };

        let now = self.clock.now();

        let Some(mut profile) = self.storage.users.get_user(user).await? else {
            if matches!(event, IncomingEvent::Start) {
                return self.first_contact(user).await;
            }
            tracing::debug!(%user, "event for unknown user ignored");
            return Ok(Dispatch::Ignored);
        };
        profile.touch(now);

        // A flow marker without an in-memory session means the process
        // restarted (or the session was abandoned): reconcile before
        // interpreting the event.
        if !self.sessions.has_session(user)
            && matches!(profile.mode(), Mode::QuizAnswer | Mode::LessonTask)
        {
            return self.resume_flow(&mut profile).await;
        }

        // A bare nudge re-renders the current question or falls through to
        // the default action for the persisted status.
        if matches!(event, IncomingEvent::Start) {
            if let Some(view) = self.sessions.view(user)
                && let Some(question) = view.current_question
            {
                let header = position_header(view.kind, view.current_index + 1, view.total);
                self.send(user, &render_question(&header, &question), &answer_options())
                    .await;
                return Ok(Dispatch::Handled);
            }
            let action = default_action(&profile);
            self.run_action(&mut profile, action).await?;
            return Ok(Dispatch::Handled);
        }

        // Invalid email is feedback, not a transition.
        if profile.mode() == Mode::AwaitingEmail
            && let IncomingEvent::Text(text) = &event
            && !looks_like_email(text)
        {
            self.send(user, messages::INVALID_EMAIL, &[]).await;
            return Ok(Dispatch::Handled);
        }

        let Some(core_event) = self.translate(user, &profile, &event) else {
            tracing::debug!(%user, ?event, "event has no meaning in the current mode");
            return Ok(Dispatch::Ignored);
        };

        let state = ProgressionState::from_profile(&profile, self.sessions.current_index(user));
        match transition(&state, &core_event) {
            Transition::Ignored => {
                tracing::debug!(%user, ?state, ?core_event, "state conflict; event ignored");
                Ok(Dispatch::Ignored)
            }
            Transition::Advance { action, .. } => {
                self.run_action(&mut profile, action).await?;
                Ok(Dispatch::Handled)
            }
        }
    }

    // ─── Event interpretation ──────────────────────────────────────────────

    fn translate(
        &self,
        user: UserId,
        profile: &UserProfile,
        event: &IncomingEvent,
    ) -> Option<Event> {
        match event {
            IncomingEvent::Start => None,
            IncomingEvent::Text(text) => match profile.mode() {
                Mode::AwaitingName => Some(Event::NameEntered(text.trim().to_string())),
                Mode::AwaitingEmail => Some(Event::EmailEntered(text.trim().to_string())),
                Mode::AwaitingTarget => Some(Event::TargetEntered(text.trim().to_string())),
                _ => None,
            },
            IncomingEvent::LanguageSelected(language) => Some(Event::LanguageChosen(*language)),
            IncomingEvent::LevelSelected(level) => Some(Event::LevelChosen(*level)),
            IncomingEvent::StartDiagnostic => Some(Event::DiagnosticRequested),
            IncomingEvent::AnswerSelected { ordinal, option } => {
                // A late duplicate answers a question that is no longer
                // current; dropped as a state conflict.
                let current = self.sessions.current_index(user)?;
                (*ordinal == current.saturating_add(1)).then_some(Event::AnswerSelected(*option))
            }
            IncomingEvent::TaskAnswerSelected { ordinal, option } => {
                let current = self.sessions.current_index(user)?;
                (*ordinal == current.saturating_add(1))
                    .then_some(Event::TaskAnswerSelected(*option))
            }
            IncomingEvent::PlanRequested => Some(Event::PlanRequested),
            IncomingEvent::LessonRequested => Some(Event::LessonRequested {
                day: profile.current_day(),
            }),
            IncomingEvent::MorePractice => Some(Event::MorePracticeChosen),
            IncomingEvent::NextDay => Some(Event::NextDayChosen),
            IncomingEvent::ExtraPractice => Some(Event::ExtraPracticeRequested {
                day: profile.current_day().min(PROGRAM_DAYS),
            }),
            IncomingEvent::ViewStats => Some(Event::StatsRequested),
            IncomingEvent::Restart => Some(Event::RestartRequested),
        }
    }

    // ─── Entry paths ───────────────────────────────────────────────────────

    async fn first_contact(&self, user: UserId) -> Result<Dispatch, DispatchError> {
        let mut profile = UserProfile::new(user, "", self.clock.now());
        profile.set_learning_status(tutor_core::model::LearningStatus::Onboarding);
        profile.set_mode(Mode::AwaitingLanguage);
        match self.storage.users.create_user(&profile).await {
            Ok(()) => {}
            Err(StorageError::Conflict) => {
                // Concurrent first contact; the other delivery won.
                return Ok(Dispatch::Ignored);
            }
            Err(err) => return Err(err.into()),
        }
        self.send(user, messages::CHOOSE_LANGUAGE, &language_options())
            .await;
        Ok(Dispatch::Handled)
    }

    async fn resume_flow(&self, profile: &mut UserProfile) -> Result<Dispatch, DispatchError> {
        let user = profile.id();
        match self.resume.reconstruct(profile).await? {
            Some(session) => {
                let view_kind = session.kind();
                let index = session.current_index();
                let total = session.total();
                let question = session.current_question().cloned();
                if let Err(err) = self.sessions.begin_session(session) {
                    tracing::debug!(%user, error = %err, "resume raced an active session");
                    return Ok(Dispatch::Ignored);
                }
                if let Some(question) = question {
                    let header = format!(
                        "{}\n\n{}",
                        messages::RESUMING,
                        position_header(view_kind, index + 1, total)
                    );
                    self.send(user, &render_question(&header, &question), &answer_options())
                        .await;
                }
                self.persist_user(profile).await;
                Ok(Dispatch::Handled)
            }
            None => {
                // Stale marker: the flow completed or its records are gone.
                profile.clear_active_flow();
                self.persist_user(profile).await;
                let action = default_action(profile);
                self.run_action(profile, action).await?;
                Ok(Dispatch::Handled)
            }
        }
    }

    // ─── Action execution ──────────────────────────────────────────────────

    #[allow(clippy::too_many_lines)]
    async fn run_action(
        &self,
        profile: &mut UserProfile,
        action: Action,
    ) -> Result<(), DispatchError> {
        let user = profile.id();
        match action {
            Action::PromptLanguage => {
                profile.set_learning_status(tutor_core::model::LearningStatus::Onboarding);
                profile.set_mode(Mode::AwaitingLanguage);
                self.persist_user(profile).await;
                self.send(user, messages::CHOOSE_LANGUAGE, &language_options())
                    .await;
            }
            Action::PromptName { language } => {
                profile.set_language(language);
                profile.set_mode(Mode::AwaitingName);
                self.persist_user(profile).await;
                self.send(user, messages::ENTER_NAME, &[]).await;
            }
            Action::PromptEmail { name } => {
                profile.set_full_name(name);
                profile.set_mode(Mode::AwaitingEmail);
                self.persist_user(profile).await;
                self.send(user, messages::ENTER_EMAIL, &[]).await;
            }
            Action::PromptTarget { email } => {
                profile.set_email(email);
                profile.set_mode(Mode::AwaitingTarget);
                self.persist_user(profile).await;
                self.send(user, messages::ENTER_TARGET, &[]).await;
            }
            Action::PromptLevel { target } => {
                profile.set_target_score(target);
                profile.set_mode(Mode::AwaitingLevel);
                self.persist_user(profile).await;
                self.send(user, messages::CHOOSE_LEVEL, &level_options()).await;
            }
            Action::OfferDiagnostic { level } => {
                profile.set_level(level);
                profile.set_mode(Mode::Idle);
                self.persist_user(profile).await;
                self.send(
                    user,
                    &messages::offer_diagnostic(DIAGNOSTIC_QUESTIONS),
                    &[messages::START_TEST_OPTION.to_string()],
                )
                .await;
            }
            Action::RepromptStep(step) => {
                let (text, options) = reprompt(step);
                self.send(user, text, &options).await;
            }
            Action::StartDiagnostic => self.start_diagnostic(profile).await?,
            Action::RecordDiagnosticAnswer { answer } => {
                if let Some(outcome) = self.record_answer_step(profile, answer).await {
                    if let Some(next) = &outcome.next_question {
                        let header = position_header(
                            outcome.kind,
                            outcome.answered + 1,
                            outcome.total,
                        );
                        self.send(user, &render_question(&header, next), &answer_options())
                            .await;
                    }
                }
            }
            Action::CompleteDiagnostic { answer } => {
                if self.record_answer_step(profile, answer).await.is_some() {
                    self.finish_diagnostic(profile).await?;
                }
            }
            Action::OfferPlan => {
                self.send(
                    user,
                    messages::OFFER_PLAN,
                    &[messages::GET_PLAN_OPTION.to_string()],
                )
                .await;
            }
            Action::ShowPlan => {
                profile.set_learning_status(tutor_core::model::LearningStatus::InProgress);
                profile.set_mode(Mode::Idle);
                self.persist_user(profile).await;
                let plan = study_plan(profile.weak_topics());
                self.send(
                    user,
                    &messages::plan_text(&plan),
                    &[messages::START_LESSON_OPTION.to_string()],
                )
                .await;
            }
            Action::OfferLesson { day } => {
                self.send(
                    user,
                    &messages::offer_lesson(day),
                    &[messages::START_LESSON_OPTION.to_string()],
                )
                .await;
            }
            Action::StartLesson { day } => self.start_lesson(profile, day, false).await?,
            Action::RecordTaskAnswer { answer } => {
                if let Some(outcome) = self.record_answer_step(profile, answer).await {
                    self.send(user, &messages::task_feedback(&outcome), &[]).await;
                    if let Some(next) = &outcome.next_question {
                        let header = position_header(
                            outcome.kind,
                            outcome.answered + 1,
                            outcome.total,
                        );
                        self.send(user, &render_question(&header, next), &answer_options())
                            .await;
                    }
                }
            }
            Action::CompleteLesson { day, answer } => {
                if let Some(outcome) = self.record_answer_step(profile, answer).await {
                    self.send(user, &messages::task_feedback(&outcome), &[]).await;
                    self.finish_lesson(profile, day).await?;
                }
            }
            Action::StartExtraPractice { day } => self.start_lesson(profile, day, true).await?,
            Action::OfferNextChoice { day } => {
                self.send(user, &messages::lesson_choice(day), &lesson_choice_options())
                    .await;
            }
            Action::AcknowledgeNextDay { day } => {
                profile.set_mode(Mode::Idle);
                self.persist_user(profile).await;
                self.send(user, &messages::see_you_tomorrow(day), &[]).await;
            }
            Action::CompleteProgram => {
                profile.set_learning_status(tutor_core::model::LearningStatus::Completed);
                profile.set_mode(Mode::Idle);
                self.persist_user(profile).await;
                self.send(
                    user,
                    &messages::program_complete(profile),
                    &completion_options(),
                )
                .await;
            }
            Action::ShowStats => {
                self.send(user, &messages::stats(profile), &[]).await;
            }
            Action::ShowCompletionMenu => {
                self.send(user, messages::COMPLETION_MENU, &completion_options())
                    .await;
            }
            Action::RestartProgram => {
                profile.restart();
                self.persist_user(profile).await;
                self.send(
                    user,
                    messages::RESTARTED,
                    &[messages::GET_PLAN_OPTION.to_string()],
                )
                .await;
            }
        }
        Ok(())
    }

    async fn start_diagnostic(&self, profile: &mut UserProfile) -> Result<(), DispatchError> {
        let user = profile.id();
        let now = self.clock.now();

        let questions = match self
            .content
            .generate_questions(
                None,
                profile.level(),
                profile.language(),
                DIAGNOSTIC_QUESTIONS as usize,
            )
            .await
        {
            Ok(questions) => questions,
            Err(err) => {
                tracing::warn!(%user, error = %err, "diagnostic content unavailable");
                self.send(user, messages::CONTENT_UNAVAILABLE, &[]).await;
                return Ok(());
            }
        };

        let session_id = SessionId::new();
        let records = build_records(session_id, user, &questions, None, now)?;
        let meta = QuizSessionMeta::new(session_id, user, None, false, now);

        // The session is only exposed once its full record set exists.
        if !self.create_quiz_with_retry(&meta, &records).await {
            self.send(user, messages::TRANSIENT_ERROR, &[]).await;
            return Ok(());
        }

        let session =
            EphemeralSession::new(user, SessionKind::Diagnostic, session_id, questions, now)?;
        let first = session.current_question().cloned();
        if let Err(err) = self.sessions.begin_session(session) {
            tracing::warn!(%user, error = %err, "diagnostic raced an active session");
            return Ok(());
        }

        profile.start_quiz(session_id);
        self.persist_user(profile).await;

        if let Some(question) = first {
            let header = position_header(SessionKind::Diagnostic, 1, DIAGNOSTIC_QUESTIONS as usize);
            self.send(user, &render_question(&header, &question), &answer_options())
                .await;
        }
        Ok(())
    }

    async fn start_lesson(
        &self,
        profile: &mut UserProfile,
        day: u32,
        extra_practice: bool,
    ) -> Result<(), DispatchError> {
        let user = profile.id();
        let now = self.clock.now();
        let topic = practice_topic(profile, day, extra_practice);

        let questions = match self
            .content
            .generate_questions(
                Some(&topic),
                profile.level(),
                profile.language(),
                LESSON_TASKS as usize,
            )
            .await
        {
            Ok(questions) => questions,
            Err(err) => {
                tracing::warn!(%user, error = %err, "lesson content unavailable");
                self.send(user, messages::CONTENT_UNAVAILABLE, &[]).await;
                return Ok(());
            }
        };

        let session_id = SessionId::new();
        let records = build_records(session_id, user, &questions, Some(day), now)?;
        let meta = QuizSessionMeta::new(session_id, user, Some(day), extra_practice, now);
        if !self.create_quiz_with_retry(&meta, &records).await {
            self.send(user, messages::TRANSIENT_ERROR, &[]).await;
            return Ok(());
        }

        let mut session = EphemeralSession::new(
            user,
            SessionKind::Lesson { day },
            session_id,
            questions.clone(),
            now,
        )?
        .with_extra_practice(extra_practice);

        if extra_practice {
            // Extra practice reuses the task flow but keeps no lesson
            // record; its quiz records alone cover resume.
            profile.start_quiz(session_id);
            profile.set_mode(Mode::LessonTask);
        } else {
            let theory = self.content.generate_theory(&topic, profile.language()).await;
            let lesson_id = LessonId::new();
            let prompts = questions.iter().map(render_task).collect();
            let lesson = LessonRecord::new(
                lesson_id,
                user,
                day,
                topic.clone(),
                theory.clone(),
                session_id,
                prompts,
                now,
            )?;
            if let Err(err) = self.storage.lessons.create_lesson_record(&lesson).await {
                // The quiz records carry the resumable state on their own.
                tracing::warn!(%user, error = %err, "lesson record write lost");
            }
            session = session.with_lesson(lesson_id);
            profile.start_lesson(lesson_id, session_id);
            self.send(user, &messages::theory_intro(day, &topic, &theory), &[])
                .await;
        }

        let first = session.current_question().cloned();
        if let Err(err) = self.sessions.begin_session(session) {
            tracing::warn!(%user, error = %err, "lesson raced an active session");
            return Ok(());
        }
        self.persist_user(profile).await;

        if let Some(question) = first {
            let header = position_header(SessionKind::Lesson { day }, 1, LESSON_TASKS as usize);
            self.send(user, &render_question(&header, &question), &answer_options())
                .await;
        }
        Ok(())
    }

    /// Record one answer in the session and persist it; returns `None` when
    /// the answer no longer applies (silent drop).
    async fn record_answer_step(
        &self,
        profile: &UserProfile,
        answer: AnswerOption,
    ) -> Option<AnswerOutcome> {
        let user = profile.id();
        let outcome = match self.sessions.record_answer(user, answer) {
            Ok(outcome) => outcome,
            Err(
                err @ (SessionError::NoActiveSession
                | SessionError::OutOfOrder { .. }
                | SessionError::Completed),
            ) => {
                tracing::debug!(%user, error = %err, "answer dropped");
                return None;
            }
            Err(err) => {
                tracing::warn!(%user, error = %err, "answer rejected");
                return None;
            }
        };

        self.persist_quiz_answer(&outcome).await;
        if matches!(outcome.kind, SessionKind::Lesson { .. }) && !outcome.extra_practice {
            self.advance_lesson_pointer(profile, answer).await;
        }
        Some(outcome)
    }

    async fn finish_diagnostic(&self, profile: &mut UserProfile) -> Result<(), DispatchError> {
        let user = profile.id();
        let now = self.clock.now();
        let snapshot = self.sessions.end_session(user)?;

        let report =
            match DiagnosticReport::from_answers(&snapshot.scored_answers(), &self.thresholds) {
                Ok(report) => report,
                Err(err) => {
                    tracing::warn!(%user, error = %err, "diagnostic could not be scored");
                    return Ok(());
                }
            };

        if let Err(err) = self
            .storage
            .quizzes
            .complete_quiz_session(snapshot.session_id(), report.percentage(), now)
            .await
        {
            tracing::warn!(%user, error = %err, "quiz completion write lost");
        }

        profile.record_diagnostic(
            report.percentage(),
            report.strengths().to_vec(),
            report.weaknesses().to_vec(),
            report.level(),
        );
        self.persist_user(profile).await;

        self.send(
            user,
            &messages::diagnostic_results(&report),
            &[messages::GET_PLAN_OPTION.to_string()],
        )
        .await;
        Ok(())
    }

    async fn finish_lesson(&self, profile: &mut UserProfile, day: u32) -> Result<(), DispatchError> {
        let user = profile.id();
        let now = self.clock.now();
        let snapshot = self.sessions.end_session(user)?;

        let correct = u32::try_from(
            snapshot
                .answers()
                .iter()
                .filter(|a| a.is_correct)
                .count(),
        )
        .unwrap_or(u32::MAX);
        let total = u32::try_from(snapshot.total()).unwrap_or(u32::MAX);
        let percentage = tutor_core::scoring::score_percentage(correct, total);

        if let Err(err) = self
            .storage
            .quizzes
            .complete_quiz_session(snapshot.session_id(), percentage, now)
            .await
        {
            tracing::warn!(%user, error = %err, "quiz completion write lost");
        }

        if let Some(lesson_id) = snapshot.lesson_id() {
            self.complete_lesson_record(lesson_id, correct, now).await;
        }

        if snapshot.is_extra_practice() {
            profile.clear_active_flow();
            self.persist_user(profile).await;
            self.send(user, &messages::practice_results(correct, total), &[])
                .await;
        } else {
            profile.finish_lesson()?;
            profile.set_mode(Mode::LessonChoice);
            self.persist_user(profile).await;
            self.send(
                user,
                &messages::lesson_results(day, correct, total),
                &lesson_choice_options(),
            )
            .await;
        }
        Ok(())
    }

    // ─── Best-effort persistence ───────────────────────────────────────────

    async fn persist_user(&self, profile: &UserProfile) {
        for attempt in 0..2 {
            match self.storage.users.update_user(profile).await {
                Ok(()) => return,
                Err(err) if attempt == 0 => {
                    tracing::debug!(user = %profile.id(), error = %err, "retrying profile write");
                }
                Err(err) => {
                    tracing::warn!(
                        user = %profile.id(),
                        error = %err,
                        "profile write lost; flow continues optimistically"
                    );
                }
            }
        }
    }

    async fn create_quiz_with_retry(
        &self,
        meta: &QuizSessionMeta,
        records: &[QuizRecord],
    ) -> bool {
        for attempt in 0..2 {
            match self.storage.quizzes.create_quiz_session(meta, records).await {
                Ok(()) => return true,
                Err(err) if attempt == 0 => {
                    tracing::debug!(error = %err, "retrying quiz session write");
                }
                Err(err) => {
                    tracing::warn!(error = %err, "quiz session could not be persisted");
                }
            }
        }
        false
    }

    async fn persist_quiz_answer(&self, outcome: &AnswerOutcome) {
        let now = self.clock.now();
        for attempt in 0..2 {
            match self
                .storage
                .quizzes
                .update_quiz_answer(
                    outcome.session_id,
                    outcome.collected.ordinal,
                    outcome.collected.answer,
                    outcome.collected.is_correct,
                    now,
                )
                .await
            {
                Ok(()) => return,
                Err(err) if attempt == 0 => {
                    tracing::debug!(error = %err, "retrying answer write");
                }
                Err(err) => {
                    // A later resume may re-ask this question; accepted
                    // inconsistency window.
                    tracing::warn!(
                        session = %outcome.session_id,
                        ordinal = outcome.collected.ordinal,
                        error = %err,
                        "answer write lost"
                    );
                }
            }
        }
    }

    async fn advance_lesson_pointer(&self, profile: &UserProfile, answer: AnswerOption) {
        let Some(lesson_id) = profile.active_lesson() else {
            return;
        };
        let mut lesson = match self.storage.lessons.get_lesson_record(lesson_id).await {
            Ok(Some(lesson)) => lesson,
            Ok(None) => {
                tracing::warn!(user = %profile.id(), %lesson_id, "active lesson record missing");
                return;
            }
            Err(err) => {
                tracing::warn!(user = %profile.id(), error = %err, "lesson read failed");
                return;
            }
        };
        if let Err(err) = lesson.record_task_answer(answer) {
            tracing::debug!(user = %profile.id(), error = %err, "lesson pointer not advanced");
            return;
        }
        if let Err(err) = self.storage.lessons.update_lesson_record(&lesson).await {
            tracing::warn!(user = %profile.id(), error = %err, "lesson pointer write lost");
        }
    }

    async fn complete_lesson_record(&self, lesson_id: LessonId, score: u32, now: chrono::DateTime<chrono::Utc>) {
        let mut lesson = match self.storage.lessons.get_lesson_record(lesson_id).await {
            Ok(Some(lesson)) => lesson,
            Ok(None) => return,
            Err(err) => {
                tracing::warn!(%lesson_id, error = %err, "lesson read failed");
                return;
            }
        };
        if lesson.complete(now, score).is_ok()
            && let Err(err) = self.storage.lessons.update_lesson_record(&lesson).await
        {
            tracing::warn!(%lesson_id, error = %err, "lesson completion write lost");
        }
    }

    async fn send(&self, user: UserId, text: &str, options: &[String]) {
        if let Err(err) = self.messenger.send_message(user, text, options).await {
            tracing::warn!(%user, error = %err, "outbound message failed");
        }
    }
}

// ─── Pure helpers ──────────────────────────────────────────────────────────

fn event_signature(user: UserId, event: &IncomingEvent) -> String {
    match event {
        IncomingEvent::Start => format!("{user}:start"),
        IncomingEvent::Text(text) => format!("{user}:text:{text}"),
        IncomingEvent::LanguageSelected(language) => {
            format!("{user}:lang:{}", language.as_str())
        }
        IncomingEvent::LevelSelected(level) => format!("{user}:level:{}", level.as_str()),
        IncomingEvent::StartDiagnostic => format!("{user}:start_test"),
        IncomingEvent::AnswerSelected { ordinal, option } => {
            format!("{user}:answer:{ordinal}:{option}")
        }
        IncomingEvent::TaskAnswerSelected { ordinal, option } => {
            format!("{user}:task:{ordinal}:{option}")
        }
        IncomingEvent::PlanRequested => format!("{user}:plan"),
        IncomingEvent::LessonRequested => format!("{user}:lesson"),
        IncomingEvent::MorePractice => format!("{user}:more_practice"),
        IncomingEvent::NextDay => format!("{user}:next_day"),
        IncomingEvent::ExtraPractice => format!("{user}:extra_practice"),
        IncomingEvent::ViewStats => format!("{user}:stats"),
        IncomingEvent::Restart => format!("{user}:restart"),
    }
}

fn build_records(
    session: SessionId,
    user: UserId,
    questions: &[Question],
    lesson_day: Option<u32>,
    now: chrono::DateTime<chrono::Utc>,
) -> Result<Vec<QuizRecord>, DispatchError> {
    questions
        .iter()
        .enumerate()
        .map(|(i, question)| {
            let ordinal = u32::try_from(i).unwrap_or(u32::MAX) + 1;
            QuizRecord::new(session, user, ordinal, question.clone(), lesson_day, now)
                .map_err(DispatchError::from)
        })
        .collect()
}

fn practice_topic(profile: &UserProfile, day: u32, extra_practice: bool) -> Topic {
    if extra_practice && day > PROGRAM_DAYS {
        // Post-completion practice targets the weakest topic.
        return profile
            .weak_topics()
            .first()
            .cloned()
            .unwrap_or_else(Topic::general);
    }
    topic_for_day(profile.weak_topics(), day)
}

fn looks_like_email(text: &str) -> bool {
    let trimmed = text.trim();
    match trimmed.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.'),
        None => false,
    }
}

fn render_question(header: &str, question: &Question) -> String {
    format!(
        "{header}\n\n{}\n\nA) {}\nB) {}\nC) {}\nD) {}",
        question.text(),
        question.option(AnswerOption::A),
        question.option(AnswerOption::B),
        question.option(AnswerOption::C),
        question.option(AnswerOption::D),
    )
}

fn render_task(question: &Question) -> String {
    format!(
        "{}\nA) {}\nB) {}\nC) {}\nD) {}",
        question.text(),
        question.option(AnswerOption::A),
        question.option(AnswerOption::B),
        question.option(AnswerOption::C),
        question.option(AnswerOption::D),
    )
}

fn position_header(kind: SessionKind, position: usize, total: usize) -> String {
    match kind {
        SessionKind::Diagnostic => format!("Question {position}/{total}:"),
        SessionKind::Lesson { .. } => format!("Task {position}/{total}:"),
    }
}

fn answer_options() -> Vec<String> {
    AnswerOption::ALL.map(|o| o.as_str().to_string()).to_vec()
}

fn language_options() -> Vec<String> {
    vec!["English".to_string(), "O'zbek".to_string()]
}

fn level_options() -> Vec<String> {
    vec![
        "Beginner".to_string(),
        "Intermediate".to_string(),
        "Advanced".to_string(),
    ]
}

fn lesson_choice_options() -> Vec<String> {
    vec![
        messages::MORE_PRACTICE_OPTION.to_string(),
        messages::NEXT_DAY_OPTION.to_string(),
    ]
}

fn completion_options() -> Vec<String> {
    vec![
        messages::EXTRA_PRACTICE_OPTION.to_string(),
        messages::VIEW_STATS_OPTION.to_string(),
        messages::RESTART_OPTION.to_string(),
    ]
}

fn reprompt(step: OnboardingStep) -> (&'static str, Vec<String>) {
    match step {
        OnboardingStep::Language => (messages::CHOOSE_LANGUAGE, language_options()),
        OnboardingStep::Name => (messages::ENTER_NAME, Vec::new()),
        OnboardingStep::Email => (messages::ENTER_EMAIL, Vec::new()),
        OnboardingStep::Target => (messages::ENTER_TARGET, Vec::new()),
        OnboardingStep::Level => (messages::CHOOSE_LEVEL, level_options()),
    }
}

/// Terse outbound copy. Localization and final UI wording belong to the
/// transport layer; these strings are the core's plain rendering.
mod messages {
    use tutor_core::model::{Topic, UserProfile};
    use tutor_core::scoring::DiagnosticReport;

    use crate::session::AnswerOutcome;

    pub const CHOOSE_LANGUAGE: &str = "Welcome! Choose your language:";
    pub const ENTER_NAME: &str = "Enter your name:";
    pub const ENTER_EMAIL: &str = "Enter your email:";
    pub const ENTER_TARGET: &str = "What's your target score? (e.g. 180)";
    pub const CHOOSE_LEVEL: &str = "What's your current level?";
    pub const INVALID_EMAIL: &str = "Invalid email. Please enter a valid address.";
    pub const OFFER_PLAN: &str = "Your diagnostic is done. Get your study plan:";
    pub const COMPLETION_MENU: &str = "Program finished. What would you like to do?";
    pub const RESTARTED: &str = "Program restarted. Your history is preserved.";
    pub const RESUMING: &str = "Resuming where you left off.";
    pub const CONTENT_UNAVAILABLE: &str = "Could not generate content, please retry.";
    pub const TRANSIENT_ERROR: &str = "Something went wrong, please try again.";

    pub const START_TEST_OPTION: &str = "Start Test";
    pub const GET_PLAN_OPTION: &str = "Get Plan";
    pub const START_LESSON_OPTION: &str = "Start Lesson";
    pub const MORE_PRACTICE_OPTION: &str = "More Practice";
    pub const NEXT_DAY_OPTION: &str = "Next Day";
    pub const EXTRA_PRACTICE_OPTION: &str = "Extra Practice";
    pub const VIEW_STATS_OPTION: &str = "View Stats";
    pub const RESTART_OPTION: &str = "Restart Program";

    pub fn offer_diagnostic(count: u32) -> String {
        format!("Great! Let's start the diagnostic test: {count} questions.")
    }

    fn join_topics(topics: &[Topic]) -> String {
        topics
            .iter()
            .map(Topic::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn diagnostic_results(report: &DiagnosticReport) -> String {
        format!(
            "Test completed!\n\nScore: {}/{} ({:.0}%)\nLevel: {}\nStrong: {}\nWeak: {}",
            report.correct(),
            report.total(),
            report.percentage(),
            report.level().as_str(),
            join_topics(report.strengths()),
            join_topics(report.weaknesses()),
        )
    }

    pub fn plan_text(plan: &[Topic]) -> String {
        let mut out = String::from("Your study plan:\n");
        for (i, topic) in plan.iter().enumerate() {
            out.push_str(&format!("Day {}: {topic}\n", i + 1));
        }
        out.push_str("\nReady to start?");
        out
    }

    pub fn offer_lesson(day: u32) -> String {
        format!("Ready for Day {day}? Start when you are.")
    }

    pub fn theory_intro(day: u32, topic: &Topic, theory: &str) -> String {
        format!("Day {day}: {topic}\n\n{theory}")
    }

    pub fn task_feedback(outcome: &AnswerOutcome) -> String {
        if outcome.collected.is_correct {
            "Correct!".to_string()
        } else {
            format!("Wrong. Correct answer: {}", outcome.collected.correct)
        }
    }

    pub fn lesson_results(day: u32, correct: u32, total: u32) -> String {
        format!("Day {day} completed!\n\nScore: {correct}/{total}")
    }

    pub fn practice_results(correct: u32, total: u32) -> String {
        format!("Practice finished. Score: {correct}/{total}")
    }

    pub fn lesson_choice(day: u32) -> String {
        format!("Day {day} is done. More practice, or move on?")
    }

    pub fn see_you_tomorrow(day: u32) -> String {
        format!("See you tomorrow for Day {day}!")
    }

    pub fn program_complete(profile: &UserProfile) -> String {
        format!(
            "Congratulations! The {}-day program is complete.\n\n\
             Initial score: {:.0}%\nLessons completed: {}",
            super::PROGRAM_DAYS,
            profile.test_score().unwrap_or_default(),
            profile.lessons_completed(),
        )
    }

    pub fn stats(profile: &UserProfile) -> String {
        format!(
            "Stats for {}\n\nTest score: {:.0}%\nLessons completed: {}\nCurrent day: {}\n\
             Strong: {}\nWeak: {}",
            profile.full_name(),
            profile.test_score().unwrap_or_default(),
            profile.lessons_completed(),
            profile.current_day(),
            join_topics(profile.strong_topics()),
            join_topics(profile.weak_topics()),
        )
    }
}
