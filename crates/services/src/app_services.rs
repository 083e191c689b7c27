use std::sync::Arc;

use storage::repository::Storage;
use storage::sqlite::SqliteInitError;

use crate::Clock;
use crate::bank::FallbackBank;
use crate::content::ContentProvider;
use crate::dispatch::Dispatcher;
use crate::generator::{OpenAiGenerator, TextGenerator};
use crate::session::SessionManager;
use crate::transport::Messenger;

/// Assembles the storage, content and session collaborators into a ready
/// dispatcher.
#[derive(Clone)]
pub struct TutorServices {
    dispatcher: Arc<Dispatcher>,
}

impl TutorServices {
    /// Build services backed by `SQLite` storage and the env-configured
    /// generative client.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if storage initialization fails.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        messenger: Arc<dyn Messenger>,
    ) -> Result<Self, SqliteInitError> {
        let storage = Storage::sqlite(db_url).await?;
        let generator: Arc<dyn TextGenerator> = Arc::new(OpenAiGenerator::from_env());
        Ok(Self::assemble(clock, storage, generator, messenger))
    }

    /// Build services over in-memory storage, for tests and prototyping.
    #[must_use]
    pub fn in_memory(
        clock: Clock,
        generator: Arc<dyn TextGenerator>,
        messenger: Arc<dyn Messenger>,
    ) -> Self {
        Self::assemble(clock, Storage::in_memory(), generator, messenger)
    }

    fn assemble(
        clock: Clock,
        storage: Storage,
        generator: Arc<dyn TextGenerator>,
        messenger: Arc<dyn Messenger>,
    ) -> Self {
        let content = ContentProvider::new(generator, FallbackBank::builtin());
        let sessions = SessionManager::new();
        let dispatcher = Arc::new(Dispatcher::new(
            clock, storage, content, sessions, messenger,
        ));
        Self { dispatcher }
    }

    #[must_use]
    pub fn dispatcher(&self) -> Arc<Dispatcher> {
        Arc::clone(&self.dispatcher)
    }
}
