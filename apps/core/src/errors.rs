use thiserror::Error;

use crate::store::StoreError;

/// Caller-visible error type for the core operations.
///
/// The closed set the transport layer has to render: lookups that miss,
/// invalid arguments, and uniqueness conflicts. AI provider failures never
/// appear here; the evaluation service always resolves to a valid result.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("conflict: {0}")]
    ConstraintViolation(String),

    #[error("storage error: {0}")]
    Storage(StoreError),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<StoreError> for CoreError {
    fn from(error: StoreError) -> Self {
        match error {
            // Uniqueness conflicts are user-correctable; everything else in
            // the storage taxonomy propagates unchanged in kind.
            StoreError::Constraint(message) => CoreError::ConstraintViolation(message),
            other => CoreError::Storage(other),
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(error: serde_json::Error) -> Self {
        CoreError::Storage(StoreError::Serialization(error))
    }
}
