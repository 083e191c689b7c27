//! Shared error types for the services crate.
//!
//! The failure taxonomy is explicit: transient external failures and
//! malformed content share a retry-then-fallback policy, state conflicts are
//! silent no-ops handled upstream by the progression machine, and exhausted
//! content is the single user-visible failure.

use thiserror::Error;

use storage::repository::StorageError;
use tutor_core::model::{ProfileError, RecordError};

/// Errors from a single call to the generative text service.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GenerateError {
    #[error("generative service is not configured")]
    Disabled,
    #[error("generative service returned an empty response")]
    EmptyResponse,
    #[error("generative service request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl GenerateError {
    /// Transient failures are worth another attempt with a fresh prompt.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        !matches!(self, GenerateError::Disabled)
    }
}

/// Errors emitted by the content provider after retries and fallback.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ContentError {
    #[error("generated content yielded no valid questions")]
    Malformed,
    #[error("content exhausted: requested {requested}, produced {produced}")]
    Exhausted { requested: usize, produced: usize },
    #[error(transparent)]
    Generate(#[from] GenerateError),
}

/// Errors emitted by the session manager.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionError {
    #[error("a session is already active for this user")]
    AlreadyActive,
    #[error("no active session for this user")]
    NoActiveSession,
    #[error("answer out of order: expected ordinal {expected}, got {got}")]
    OutOfOrder { expected: u32, got: u32 },
    #[error("session already completed")]
    Completed,
    #[error("no questions available for session")]
    Empty,
}

/// Errors surfaced by the event dispatcher.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DispatchError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Record(#[from] RecordError),
    #[error(transparent)]
    Profile(#[from] ProfileError),
}
