use chat_protocol::error_codes;
use thiserror::Error;

/// Wraps the storage backend's native error type.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// The closed set of failures a Domain Operation can surface to its caller.
/// The Session's dispatch loop is the sole place these are translated into
/// an outbound `error` frame; they never propagate to other sessions.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("{0}")]
    InvalidPayload(String),
    #[error("not a member of this room")]
    NotMember,
    #[error("internal error")]
    Internal,
}

impl From<StorageError> for DomainError {
    fn from(_: StorageError) -> Self {
        DomainError::Internal
    }
}

impl DomainError {
    pub fn code(&self) -> &'static str {
        match self {
            DomainError::InvalidPayload(_) => error_codes::INVALID_PAYLOAD,
            DomainError::NotMember => error_codes::NOT_MEMBER,
            DomainError::Internal => error_codes::INTERNAL_ERROR,
        }
    }
}
