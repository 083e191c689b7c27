#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use services::{
    ContentProvider, Dispatcher, FallbackBank, GenerateError, IncomingEvent, Messenger,
    SessionManager, TextGenerator, TransportError,
};
use storage::repository::Storage;
use tutor_core::Clock;
use tutor_core::model::{AnswerOption, Language, Level, UserId};
use tutor_core::time::fixed_now;

pub const TOPICS: [&str; 4] = ["algebra", "geometry", "functions", "trigonometry"];

/// Deterministic stand-in for the generative service: reads the requested
/// count out of the prompt and returns that many well-formed blocks, with
/// topics cycling and A always correct.
pub struct MockGenerator;

fn requested_count(prompt: &str) -> Option<usize> {
    let rest = prompt.split("exactly ").nth(1)?;
    rest.split_whitespace().next()?.parse().ok()
}

#[async_trait]
impl TextGenerator for MockGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, GenerateError> {
        if prompt.contains("SHORT math lesson") {
            return Ok("Key idea, one formula, one worked example.".to_string());
        }
        let count = requested_count(prompt).ok_or(GenerateError::EmptyResponse)?;
        let mut out = String::new();
        for i in 1..=count {
            out.push_str(&format!(
                "QUESTION: Generated question {i}?\n\
                 A) right {i}\nB) wrong {i}\nC) off {i}\nD) far {i}\n\
                 CORRECT: A\nTOPIC: {}\n\n",
                TOPICS[(i - 1) % TOPICS.len()],
            ));
        }
        Ok(out)
    }
}

#[derive(Debug, Clone)]
pub struct Sent {
    pub user: UserId,
    pub text: String,
    pub options: Vec<String>,
}

/// Captures outbound messages for assertions.
#[derive(Default)]
pub struct RecordingMessenger {
    sent: Mutex<Vec<Sent>>,
}

impl RecordingMessenger {
    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn last(&self) -> Sent {
        self.sent.lock().unwrap().last().cloned().expect("no messages sent")
    }

    pub fn texts_containing(&self, needle: &str) -> usize {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.text.contains(needle))
            .count()
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send_message(
        &self,
        user: UserId,
        text: &str,
        options: &[String],
    ) -> Result<(), TransportError> {
        self.sent.lock().unwrap().push(Sent {
            user,
            text: text.to_string(),
            options: options.to_vec(),
        });
        Ok(())
    }
}

pub struct Harness {
    pub storage: Storage,
    pub messenger: Arc<RecordingMessenger>,
    pub dispatcher: Dispatcher,
}

impl Harness {
    pub fn new() -> Self {
        Self::over(Storage::in_memory())
    }

    /// A harness over existing storage with a fresh session manager; used
    /// to simulate a process restart.
    pub fn over(storage: Storage) -> Self {
        let messenger = Arc::new(RecordingMessenger::default());
        let content = ContentProvider::new(Arc::new(MockGenerator), FallbackBank::builtin());
        let dispatcher = Dispatcher::new(
            Clock::fixed(fixed_now()),
            storage.clone(),
            content,
            SessionManager::new(),
            messenger.clone(),
        );
        Self {
            storage,
            messenger,
            dispatcher,
        }
    }

    pub async fn dispatch(&self, user: UserId, event: IncomingEvent) -> services::Dispatch {
        self.dispatcher.handle_event(user, event).await.unwrap()
    }

    /// Walk the full onboarding script up to the diagnostic offer.
    pub async fn onboard(&self, user: UserId) {
        self.dispatch(user, IncomingEvent::Start).await;
        self.dispatch(user, IncomingEvent::LanguageSelected(Language::En))
            .await;
        self.dispatch(user, IncomingEvent::Text("Aziz".into())).await;
        self.dispatch(user, IncomingEvent::Text("aziz@example.com".into()))
            .await;
        self.dispatch(user, IncomingEvent::Text("180".into())).await;
        self.dispatch(user, IncomingEvent::LevelSelected(Level::Beginner))
            .await;
    }

    /// Run the diagnostic answering the first `correct` questions right.
    pub async fn run_diagnostic(&self, user: UserId, correct: u32) {
        self.dispatch(user, IncomingEvent::StartDiagnostic).await;
        for ordinal in 1..=12 {
            let option = if ordinal <= correct {
                AnswerOption::A
            } else {
                AnswerOption::B
            };
            self.dispatch(user, IncomingEvent::AnswerSelected { ordinal, option })
                .await;
        }
    }

    /// Onboard, pass the diagnostic, and accept the plan.
    pub async fn reach_lessons(&self, user: UserId) {
        self.onboard(user).await;
        self.run_diagnostic(user, 9).await;
        self.dispatch(user, IncomingEvent::PlanRequested).await;
    }

    /// Answer all five tasks of the currently running lesson correctly.
    pub async fn finish_lesson_tasks(&self, user: UserId) {
        for ordinal in 1..=5 {
            self.dispatch(
                user,
                IncomingEvent::TaskAnswerSelected {
                    ordinal,
                    option: AnswerOption::A,
                },
            )
            .await;
        }
    }
}
