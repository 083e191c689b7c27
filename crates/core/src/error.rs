use thiserror::Error;

use crate::model::{ProfileError, QuestionError, RecordError};
use crate::scoring::ScoringError;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Question(#[from] QuestionError),
    #[error(transparent)]
    Profile(#[from] ProfileError),
    #[error(transparent)]
    Record(#[from] RecordError),
    #[error(transparent)]
    Scoring(#[from] ScoringError),
}
