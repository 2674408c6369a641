//! Errors shared by the application handlers.

use thiserror::Error;

use crate::domain::foundation::{DomainError, ErrorCode, ValidationError};
use crate::ports::{DirectoryError, StoreError};

/// Failure of a handler after its input was accepted.
///
/// Invalid input is not an error: handlers report it as a `Rejected` outcome.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("storage failure: {0}")]
    Store(#[from] StoreError),

    #[error("directory failure: {0}")]
    Directory(#[from] DirectoryError),
}

impl From<HandlerError> for DomainError {
    fn from(err: HandlerError) -> Self {
        match err {
            HandlerError::Validation(e) => e.into(),
            HandlerError::Store(e) => e.into(),
            HandlerError::Directory(e) => DomainError::new(ErrorCode::DatabaseError, e.to_string()),
        }
    }
}
