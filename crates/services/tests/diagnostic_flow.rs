mod common;

use common::Harness;
use services::{Dispatch, IncomingEvent};
use tutor_core::model::{AnswerOption, LearningStatus, Level, Mode, Topic, UserId};

#[tokio::test]
async fn onboarding_and_diagnostic_classify_the_user() {
    let harness = Harness::new();
    let user = UserId::new(100);

    harness.onboard(user).await;

    let profile = harness.storage.users.get_user(user).await.unwrap().unwrap();
    assert_eq!(profile.full_name(), "Aziz");
    assert_eq!(profile.email(), Some("aziz@example.com"));
    assert_eq!(profile.target_score(), Some("180"));
    assert_eq!(profile.learning_status(), LearningStatus::Onboarding);
    assert_eq!(profile.mode(), Mode::Idle);

    // 9/12 correct across 4 topics; the 75% boundary is inclusive.
    harness.run_diagnostic(user, 9).await;

    let profile = harness.storage.users.get_user(user).await.unwrap().unwrap();
    assert_eq!(profile.learning_status(), LearningStatus::DiagnosticComplete);
    assert_eq!(profile.test_score(), Some(75.0));
    assert_eq!(profile.level(), Level::Advanced);
    assert_eq!(profile.mode(), Mode::Idle);
    assert!(profile.active_quiz().is_none());

    // Topics cycle a,g,f,t; ordinals 10..12 were wrong, so geometry,
    // functions and trigonometry all sit at 2/3 and keep encounter order.
    assert_eq!(
        profile.strong_topics(),
        &[
            Topic::new("algebra"),
            Topic::new("geometry"),
            Topic::new("functions")
        ]
    );
    assert_eq!(
        profile.weak_topics(),
        &[
            Topic::new("geometry"),
            Topic::new("functions"),
            Topic::new("trigonometry")
        ]
    );

    let results = harness.messenger.last();
    assert!(results.text.contains("9/12"));
    assert!(results.text.contains("75%"));

    // Accepting the plan moves the program into the lesson loop.
    harness.dispatch(user, IncomingEvent::PlanRequested).await;
    let profile = harness.storage.users.get_user(user).await.unwrap().unwrap();
    assert_eq!(profile.learning_status(), LearningStatus::InProgress);
    assert!(harness.messenger.last().text.contains("Day 1"));
}

#[tokio::test]
async fn diagnostic_start_is_not_reentrant() {
    let harness = Harness::new();
    let user = UserId::new(101);
    harness.onboard(user).await;

    harness.dispatch(user, IncomingEvent::StartDiagnostic).await;
    // A second request while the diagnostic is running is a silent no-op.
    let second = harness.dispatch(user, IncomingEvent::StartDiagnostic).await;
    assert_eq!(second, Dispatch::Ignored);

    // Exactly one session, still waiting on question 1.
    assert_eq!(harness.dispatcher.sessions().current_index(user), Some(0));
    assert_eq!(harness.messenger.texts_containing("Question 1/12"), 1);
}

#[tokio::test]
async fn duplicate_answer_is_recorded_once() {
    let harness = Harness::new();
    let user = UserId::new(102);
    harness.onboard(user).await;
    harness.dispatch(user, IncomingEvent::StartDiagnostic).await;

    let event = IncomingEvent::AnswerSelected {
        ordinal: 1,
        option: AnswerOption::A,
    };
    let first = harness.dispatch(user, event.clone()).await;
    assert_eq!(first, Dispatch::Handled);

    // At-least-once delivery: the same event arrives again.
    let second = harness.dispatch(user, event).await;
    assert_eq!(second, Dispatch::Ignored);

    assert_eq!(harness.dispatcher.sessions().current_index(user), Some(1));

    let profile = harness.storage.users.get_user(user).await.unwrap().unwrap();
    let session_id = profile.active_quiz().unwrap();
    let records = harness.storage.quizzes.quiz_records(session_id).await.unwrap();
    assert_eq!(records.iter().filter(|r| r.is_answered()).count(), 1);
    assert_eq!(records[0].is_correct(), Some(true));
}

#[tokio::test]
async fn diagnostic_resumes_after_restart() {
    let harness = Harness::new();
    let user = UserId::new(103);
    harness.onboard(user).await;
    harness.dispatch(user, IncomingEvent::StartDiagnostic).await;
    for ordinal in 1..=4 {
        harness
            .dispatch(
                user,
                IncomingEvent::AnswerSelected {
                    ordinal,
                    option: AnswerOption::A,
                },
            )
            .await;
    }

    // Process restart: same storage, fresh session manager.
    let restarted = Harness::over(harness.storage.clone());
    restarted.dispatch(user, IncomingEvent::Start).await;

    // The resumed index equals the count of answered persisted records.
    assert_eq!(restarted.dispatcher.sessions().current_index(user), Some(4));
    let resumed = restarted.messenger.last();
    assert!(resumed.text.contains("Question 5/12"));

    // Resume is idempotent: another nudge re-renders the same question.
    restarted.dispatch(user, IncomingEvent::Start).await;
    assert_eq!(restarted.dispatcher.sessions().current_index(user), Some(4));
    assert!(restarted.messenger.last().text.contains("Question 5/12"));

    // The flow finishes normally on the restarted process.
    for ordinal in 5..=12 {
        restarted
            .dispatch(
                user,
                IncomingEvent::AnswerSelected {
                    ordinal,
                    option: AnswerOption::A,
                },
            )
            .await;
    }
    let profile = restarted.storage.users.get_user(user).await.unwrap().unwrap();
    assert_eq!(profile.learning_status(), LearningStatus::DiagnosticComplete);
    assert_eq!(profile.test_score(), Some(100.0));
}

#[tokio::test]
async fn events_for_unknown_users_are_ignored() {
    let harness = Harness::new();
    let outcome = harness
        .dispatch(UserId::new(999), IncomingEvent::PlanRequested)
        .await;
    assert_eq!(outcome, Dispatch::Ignored);
    assert!(harness.messenger.sent().is_empty());
}

#[tokio::test]
async fn invalid_email_reprompts_without_advancing() {
    let harness = Harness::new();
    let user = UserId::new(104);
    harness.dispatch(user, IncomingEvent::Start).await;
    harness
        .dispatch(user, IncomingEvent::LanguageSelected(tutor_core::model::Language::En))
        .await;
    harness.dispatch(user, IncomingEvent::Text("Aziz".into())).await;

    harness
        .dispatch(user, IncomingEvent::Text("not-an-email".into()))
        .await;
    let profile = harness.storage.users.get_user(user).await.unwrap().unwrap();
    assert_eq!(profile.mode(), Mode::AwaitingEmail);
    assert!(harness.messenger.last().text.contains("Invalid email"));

    harness
        .dispatch(user, IncomingEvent::Text("aziz@example.com".into()))
        .await;
    let profile = harness.storage.users.get_user(user).await.unwrap().unwrap();
    assert_eq!(profile.mode(), Mode::AwaitingTarget);
}
