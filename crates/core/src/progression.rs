//! The progression state machine driving onboarding, the diagnostic, the
//! lesson loop and completion.
//!
//! Transitions are pure: [`transition`] inspects the current state and an
//! explicit [`Event`] and either advances with an [`Action`] for the caller
//! to execute, or reports [`Transition::Ignored`] when the event's
//! precondition does not hold. A mismatched precondition is a silent no-op,
//! never a user-visible error.

use serde::{Deserialize, Serialize};

use crate::model::{AnswerOption, Language, LearningStatus, Level, Mode, Topic, UserProfile};

/// Length of the study program in days.
pub const PROGRAM_DAYS: u32 = 14;

/// Number of questions in the diagnostic assessment.
pub const DIAGNOSTIC_QUESTIONS: u32 = 12;

/// Number of practice tasks per lesson.
pub const LESSON_TASKS: u32 = crate::model::LESSON_TASK_LIMIT as u32;

/// Topics filling the study plan after the learner's weak topics.
const DEFAULT_PLAN_TOPICS: [&str; 14] = [
    "Algebra",
    "Geometry",
    "Arithmetic",
    "Percentages",
    "Fractions",
    "Ratios",
    "Equations",
    "Inequalities",
    "Functions",
    "Graphs",
    "Probability",
    "Statistics",
    "Number Theory",
    "Combinatorics",
];

/// The 14-day plan: weak topics first, then the default list, one per day.
#[must_use]
pub fn study_plan(weak_topics: &[Topic]) -> Vec<Topic> {
    let mut plan: Vec<Topic> = weak_topics.to_vec();
    for name in DEFAULT_PLAN_TOPICS {
        let topic = Topic::new(name);
        if !plan.contains(&topic) {
            plan.push(topic);
        }
    }
    plan.truncate(PROGRAM_DAYS as usize);
    plan
}

/// Topic scheduled for the given day; days past the plan fall back to review.
#[must_use]
pub fn topic_for_day(weak_topics: &[Topic], day: u32) -> Topic {
    let plan = study_plan(weak_topics);
    plan.get((day as usize).saturating_sub(1))
        .cloned()
        .unwrap_or_else(|| Topic::new("review"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OnboardingStep {
    Language,
    Name,
    Email,
    Target,
    Level,
}

/// Authoritative phase of a user, derived from persisted status and mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProgressionState {
    New,
    Onboarding(OnboardingStep),
    DiagnosticReady,
    DiagnosticInProgress { index: u32 },
    DiagnosticComplete,
    PlanReady,
    LessonInProgress { day: u32, task_index: u32 },
    LessonComplete { day: u32 },
    ProgramComplete,
}

impl ProgressionState {
    /// Derive the state from a persisted profile.
    ///
    /// `active_index` is the in-memory session's current question index, when
    /// a session exists; a resume marker pointing at an active flow with no
    /// index available maps to the flow's first item.
    #[must_use]
    pub fn from_profile(profile: &UserProfile, active_index: Option<u32>) -> Self {
        let day = profile.current_day();
        let index = active_index.unwrap_or(0);
        match (profile.learning_status(), profile.mode()) {
            (LearningStatus::NotStarted, _) => ProgressionState::New,
            (LearningStatus::Onboarding, Mode::AwaitingLanguage) => {
                ProgressionState::Onboarding(OnboardingStep::Language)
            }
            (LearningStatus::Onboarding, Mode::AwaitingName) => {
                ProgressionState::Onboarding(OnboardingStep::Name)
            }
            (LearningStatus::Onboarding, Mode::AwaitingEmail) => {
                ProgressionState::Onboarding(OnboardingStep::Email)
            }
            (LearningStatus::Onboarding, Mode::AwaitingTarget) => {
                ProgressionState::Onboarding(OnboardingStep::Target)
            }
            (LearningStatus::Onboarding, Mode::AwaitingLevel) => {
                ProgressionState::Onboarding(OnboardingStep::Level)
            }
            (LearningStatus::Onboarding, Mode::QuizAnswer) => {
                ProgressionState::DiagnosticInProgress { index }
            }
            (LearningStatus::Onboarding, _) => ProgressionState::DiagnosticReady,
            (LearningStatus::DiagnosticComplete, _) => ProgressionState::DiagnosticComplete,
            (LearningStatus::InProgress, Mode::QuizAnswer | Mode::LessonTask) => {
                ProgressionState::LessonInProgress {
                    day,
                    task_index: index,
                }
            }
            (LearningStatus::InProgress, Mode::LessonChoice) => ProgressionState::LessonComplete {
                day: day.saturating_sub(1).max(1),
            },
            (LearningStatus::InProgress, _) => {
                if day > PROGRAM_DAYS {
                    ProgressionState::ProgramComplete
                } else {
                    ProgressionState::PlanReady
                }
            }
            (LearningStatus::Completed, Mode::QuizAnswer | Mode::LessonTask) => {
                ProgressionState::LessonInProgress {
                    day,
                    task_index: index,
                }
            }
            (LearningStatus::Completed, _) => ProgressionState::ProgramComplete,
        }
    }
}

/// An explicit trigger for a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    FirstContact,
    LanguageChosen(Language),
    NameEntered(String),
    EmailEntered(String),
    TargetEntered(String),
    LevelChosen(Level),
    DiagnosticRequested,
    AnswerSelected(AnswerOption),
    PlanRequested,
    LessonRequested { day: u32 },
    TaskAnswerSelected(AnswerOption),
    MorePracticeChosen,
    NextDayChosen,
    ExtraPracticeRequested { day: u32 },
    StatsRequested,
    RestartRequested,
}

/// Side effect the caller must execute when a transition advances.
///
/// Payloads carry exactly the event data that has to be persisted or acted
/// on; everything else comes from the profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    PromptLanguage,
    PromptName { language: Language },
    PromptEmail { name: String },
    PromptTarget { email: String },
    PromptLevel { target: String },
    OfferDiagnostic { level: Level },
    RepromptStep(OnboardingStep),
    StartDiagnostic,
    RecordDiagnosticAnswer { answer: AnswerOption },
    CompleteDiagnostic { answer: AnswerOption },
    OfferPlan,
    ShowPlan,
    OfferLesson { day: u32 },
    StartLesson { day: u32 },
    RecordTaskAnswer { answer: AnswerOption },
    CompleteLesson { day: u32, answer: AnswerOption },
    StartExtraPractice { day: u32 },
    OfferNextChoice { day: u32 },
    AcknowledgeNextDay { day: u32 },
    CompleteProgram,
    ShowStats,
    ShowCompletionMenu,
    RestartProgram,
}

/// Outcome of feeding an event through the machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Advance {
        next: ProgressionState,
        action: Action,
    },
    /// Precondition mismatch: drop the event silently.
    Ignored,
}

fn advance(next: ProgressionState, action: Action) -> Transition {
    Transition::Advance { next, action }
}

/// Feed one event through the machine.
#[must_use]
pub fn transition(state: &ProgressionState, event: &Event) -> Transition {
    use OnboardingStep as Step;
    use ProgressionState as S;

    match (state, event) {
        (S::New, Event::FirstContact) => {
            advance(S::Onboarding(Step::Language), Action::PromptLanguage)
        }
        (S::Onboarding(Step::Language), Event::LanguageChosen(language)) => advance(
            S::Onboarding(Step::Name),
            Action::PromptName {
                language: *language,
            },
        ),
        (S::Onboarding(Step::Name), Event::NameEntered(name)) => advance(
            S::Onboarding(Step::Email),
            Action::PromptEmail { name: name.clone() },
        ),
        (S::Onboarding(Step::Email), Event::EmailEntered(email)) => advance(
            S::Onboarding(Step::Target),
            Action::PromptTarget {
                email: email.clone(),
            },
        ),
        (S::Onboarding(Step::Target), Event::TargetEntered(target)) => advance(
            S::Onboarding(Step::Level),
            Action::PromptLevel {
                target: target.clone(),
            },
        ),
        (S::Onboarding(Step::Level), Event::LevelChosen(level)) => {
            advance(S::DiagnosticReady, Action::OfferDiagnostic { level: *level })
        }
        (S::DiagnosticReady, Event::DiagnosticRequested) => advance(
            S::DiagnosticInProgress { index: 0 },
            Action::StartDiagnostic,
        ),
        (S::DiagnosticInProgress { index }, Event::AnswerSelected(answer)) => {
            if index + 1 >= DIAGNOSTIC_QUESTIONS {
                advance(
                    S::DiagnosticComplete,
                    Action::CompleteDiagnostic { answer: *answer },
                )
            } else {
                advance(
                    S::DiagnosticInProgress { index: index + 1 },
                    Action::RecordDiagnosticAnswer { answer: *answer },
                )
            }
        }
        (S::DiagnosticComplete, Event::PlanRequested) => advance(S::PlanReady, Action::ShowPlan),
        (S::PlanReady, Event::LessonRequested { day }) => advance(
            S::LessonInProgress {
                day: *day,
                task_index: 0,
            },
            Action::StartLesson { day: *day },
        ),
        (
            S::LessonInProgress { day, task_index },
            Event::TaskAnswerSelected(answer),
        ) => {
            if task_index + 1 >= LESSON_TASKS {
                advance(
                    S::LessonComplete { day: *day },
                    Action::CompleteLesson {
                        day: *day,
                        answer: *answer,
                    },
                )
            } else {
                advance(
                    S::LessonInProgress {
                        day: *day,
                        task_index: task_index + 1,
                    },
                    Action::RecordTaskAnswer { answer: *answer },
                )
            }
        }
        (S::LessonComplete { day }, Event::MorePracticeChosen) => advance(
            S::LessonInProgress {
                day: *day,
                task_index: 0,
            },
            Action::StartExtraPractice { day: *day },
        ),
        (S::LessonComplete { day }, Event::NextDayChosen) => {
            if *day >= PROGRAM_DAYS {
                advance(S::ProgramComplete, Action::CompleteProgram)
            } else {
                advance(S::PlanReady, Action::AcknowledgeNextDay { day: day + 1 })
            }
        }
        (S::ProgramComplete, Event::StatsRequested) => {
            advance(S::ProgramComplete, Action::ShowStats)
        }
        (S::ProgramComplete, Event::ExtraPracticeRequested { day }) => advance(
            S::LessonInProgress {
                day: *day,
                task_index: 0,
            },
            Action::StartExtraPractice { day: *day },
        ),
        (S::ProgramComplete, Event::RestartRequested) => {
            advance(S::DiagnosticComplete, Action::RestartProgram)
        }
        _ => Transition::Ignored,
    }
}

/// Fall-through action when an event arrives with no resumable flow: nudge
/// the user toward the next step for their persisted status.
#[must_use]
pub fn default_action(profile: &UserProfile) -> Action {
    match profile.learning_status() {
        LearningStatus::NotStarted => Action::PromptLanguage,
        LearningStatus::Onboarding => match profile.mode() {
            Mode::AwaitingLanguage => Action::RepromptStep(OnboardingStep::Language),
            Mode::AwaitingName => Action::RepromptStep(OnboardingStep::Name),
            Mode::AwaitingEmail => Action::RepromptStep(OnboardingStep::Email),
            Mode::AwaitingTarget => Action::RepromptStep(OnboardingStep::Target),
            Mode::AwaitingLevel => Action::RepromptStep(OnboardingStep::Level),
            _ => Action::OfferDiagnostic {
                level: profile.level(),
            },
        },
        LearningStatus::DiagnosticComplete => Action::OfferPlan,
        LearningStatus::InProgress => {
            if profile.mode() == Mode::LessonChoice {
                Action::OfferNextChoice {
                    day: profile.current_day().saturating_sub(1).max(1),
                }
            } else if profile.current_day() > PROGRAM_DAYS {
                Action::ShowCompletionMenu
            } else {
                Action::OfferLesson {
                    day: profile.current_day(),
                }
            }
        }
        LearningStatus::Completed => Action::ShowCompletionMenu,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::UserId;
    use crate::time::fixed_now;

    fn profile_with(status: LearningStatus, mode: Mode, day: u32) -> UserProfile {
        let mut p = UserProfile::new(UserId::new(7), "Learner", fixed_now());
        p.set_learning_status(status);
        p.set_mode(mode);
        if day > 1 {
            p.advance_to_day(day).unwrap();
        }
        p
    }

    #[test]
    fn onboarding_walks_every_step() {
        let mut state = ProgressionState::New;
        let script: [(Event, ProgressionState); 6] = [
            (
                Event::FirstContact,
                ProgressionState::Onboarding(OnboardingStep::Language),
            ),
            (
                Event::LanguageChosen(Language::En),
                ProgressionState::Onboarding(OnboardingStep::Name),
            ),
            (
                Event::NameEntered("Aziz".into()),
                ProgressionState::Onboarding(OnboardingStep::Email),
            ),
            (
                Event::EmailEntered("aziz@example.com".into()),
                ProgressionState::Onboarding(OnboardingStep::Target),
            ),
            (
                Event::TargetEntered("180".into()),
                ProgressionState::Onboarding(OnboardingStep::Level),
            ),
            (
                Event::LevelChosen(Level::Intermediate),
                ProgressionState::DiagnosticReady,
            ),
        ];
        for (event, expected) in script {
            match transition(&state, &event) {
                Transition::Advance { next, .. } => {
                    assert_eq!(next, expected);
                    state = next;
                }
                Transition::Ignored => panic!("unexpected no-op for {event:?}"),
            }
        }
    }

    #[test]
    fn diagnostic_advances_and_completes_on_last_answer() {
        let mut state = ProgressionState::DiagnosticInProgress { index: 0 };
        for i in 0..DIAGNOSTIC_QUESTIONS - 1 {
            let Transition::Advance { next, action } =
                transition(&state, &Event::AnswerSelected(AnswerOption::A))
            else {
                panic!("answer {i} ignored");
            };
            assert!(matches!(action, Action::RecordDiagnosticAnswer { .. }));
            state = next;
        }
        let Transition::Advance { next, action } =
            transition(&state, &Event::AnswerSelected(AnswerOption::C))
        else {
            panic!("final answer ignored");
        };
        assert_eq!(next, ProgressionState::DiagnosticComplete);
        assert_eq!(
            action,
            Action::CompleteDiagnostic {
                answer: AnswerOption::C
            }
        );
    }

    #[test]
    fn mismatched_precondition_is_silent_noop() {
        // A second "start diagnostic" while one is already running.
        let state = ProgressionState::DiagnosticInProgress { index: 3 };
        assert_eq!(
            transition(&state, &Event::DiagnosticRequested),
            Transition::Ignored
        );
        // A lesson answer during the diagnostic.
        assert_eq!(
            transition(&state, &Event::TaskAnswerSelected(AnswerOption::A)),
            Transition::Ignored
        );
        // Restart outside of completion.
        assert_eq!(
            transition(&ProgressionState::PlanReady, &Event::RestartRequested),
            Transition::Ignored
        );
    }

    #[test]
    fn lesson_completes_after_last_task() {
        let mut state = ProgressionState::LessonInProgress {
            day: 3,
            task_index: 0,
        };
        for _ in 0..LESSON_TASKS - 1 {
            let Transition::Advance { next, .. } =
                transition(&state, &Event::TaskAnswerSelected(AnswerOption::B))
            else {
                panic!("task answer ignored");
            };
            state = next;
        }
        let Transition::Advance { next, action } =
            transition(&state, &Event::TaskAnswerSelected(AnswerOption::B))
        else {
            panic!("final task ignored");
        };
        assert_eq!(next, ProgressionState::LessonComplete { day: 3 });
        assert_eq!(
            action,
            Action::CompleteLesson {
                day: 3,
                answer: AnswerOption::B
            }
        );
    }

    #[test]
    fn next_day_after_day_fourteen_completes_program() {
        let state = ProgressionState::LessonComplete { day: PROGRAM_DAYS };
        let Transition::Advance { next, action } = transition(&state, &Event::NextDayChosen)
        else {
            panic!("ignored");
        };
        assert_eq!(next, ProgressionState::ProgramComplete);
        assert_eq!(action, Action::CompleteProgram);

        let earlier = ProgressionState::LessonComplete { day: 4 };
        let Transition::Advance { next, action } = transition(&earlier, &Event::NextDayChosen)
        else {
            panic!("ignored");
        };
        assert_eq!(next, ProgressionState::PlanReady);
        assert_eq!(action, Action::AcknowledgeNextDay { day: 5 });
    }

    #[test]
    fn program_complete_permits_stats_practice_and_restart() {
        let state = ProgressionState::ProgramComplete;
        assert!(matches!(
            transition(&state, &Event::StatsRequested),
            Transition::Advance {
                action: Action::ShowStats,
                ..
            }
        ));
        assert!(matches!(
            transition(&state, &Event::ExtraPracticeRequested { day: 14 }),
            Transition::Advance {
                action: Action::StartExtraPractice { day: 14 },
                ..
            }
        ));
        let Transition::Advance { next, action } =
            transition(&state, &Event::RestartRequested)
        else {
            panic!("ignored");
        };
        assert_eq!(next, ProgressionState::DiagnosticComplete);
        assert_eq!(action, Action::RestartProgram);
    }

    #[test]
    fn state_derivation_covers_the_resume_marker() {
        let p = profile_with(LearningStatus::Onboarding, Mode::AwaitingEmail, 1);
        assert_eq!(
            ProgressionState::from_profile(&p, None),
            ProgressionState::Onboarding(OnboardingStep::Email)
        );

        let p = profile_with(LearningStatus::Onboarding, Mode::QuizAnswer, 1);
        assert_eq!(
            ProgressionState::from_profile(&p, Some(5)),
            ProgressionState::DiagnosticInProgress { index: 5 }
        );

        let p = profile_with(LearningStatus::InProgress, Mode::LessonTask, 4);
        assert_eq!(
            ProgressionState::from_profile(&p, Some(2)),
            ProgressionState::LessonInProgress {
                day: 4,
                task_index: 2
            }
        );

        let p = profile_with(LearningStatus::InProgress, Mode::LessonChoice, 5);
        assert_eq!(
            ProgressionState::from_profile(&p, None),
            ProgressionState::LessonComplete { day: 4 }
        );

        let p = profile_with(LearningStatus::InProgress, Mode::Idle, PROGRAM_DAYS + 1);
        assert_eq!(
            ProgressionState::from_profile(&p, None),
            ProgressionState::ProgramComplete
        );

        let p = profile_with(LearningStatus::Completed, Mode::Idle, PROGRAM_DAYS + 1);
        assert_eq!(
            ProgressionState::from_profile(&p, None),
            ProgressionState::ProgramComplete
        );
    }

    #[test]
    fn default_actions_follow_status() {
        let p = profile_with(LearningStatus::NotStarted, Mode::Idle, 1);
        assert_eq!(default_action(&p), Action::PromptLanguage);

        let p = profile_with(LearningStatus::Onboarding, Mode::AwaitingTarget, 1);
        assert_eq!(
            default_action(&p),
            Action::RepromptStep(OnboardingStep::Target)
        );

        let p = profile_with(LearningStatus::DiagnosticComplete, Mode::Idle, 1);
        assert_eq!(default_action(&p), Action::OfferPlan);

        let p = profile_with(LearningStatus::InProgress, Mode::Idle, 6);
        assert_eq!(default_action(&p), Action::OfferLesson { day: 6 });

        let p = profile_with(LearningStatus::Completed, Mode::Idle, 15);
        assert_eq!(default_action(&p), Action::ShowCompletionMenu);
    }

    #[test]
    fn study_plan_puts_weak_topics_first() {
        let weak = vec![Topic::new("logarithms"), Topic::new("geometry")];
        let plan = study_plan(&weak);
        assert_eq!(plan.len(), PROGRAM_DAYS as usize);
        assert_eq!(plan[0], Topic::new("logarithms"));
        assert_eq!(plan[1], Topic::new("geometry"));
        // Geometry appears once even though it is also a default topic.
        assert_eq!(plan.iter().filter(|t| **t == Topic::new("geometry")).count(), 1);
    }

    #[test]
    fn topic_for_day_past_plan_is_review() {
        assert_eq!(topic_for_day(&[], 1), Topic::new("algebra"));
        assert_eq!(topic_for_day(&[], PROGRAM_DAYS + 1), Topic::new("review"));
    }
}
