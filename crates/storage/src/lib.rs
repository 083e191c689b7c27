#![forbid(unsafe_code)]

pub mod repository;
pub mod sqlite;

pub use repository::{
    LessonRepository, QuizRepository, QuizSessionMeta, Storage, StorageError, UserRepository,
};
pub use sqlite::SqliteInitError;
