use thiserror::Error;

use crate::murmur::backend::BackendError;

pub type Result<T> = core::result::Result<T, MurmurError>;

#[derive(Error, Debug)]
pub enum MurmurError {
    #[error("Live feed subscription error: {0}")]
    Subscription(String),

    #[error("Failed to load older messages: {0}")]
    PaginationFetch(String),

    #[error("Message text must not be empty")]
    SendValidation,

    #[error("No active conversation")]
    NoActiveConversation,

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("User not found")]
    UserNotFound,

    #[error("Contact not found")]
    ContactNotFound,

    #[error("You cannot add yourself as a contact")]
    CannotAddSelf,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Logging setup error: {0}")]
    LoggingSetup(String),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Filesystem error: {0}")]
    Filesystem(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl MurmurError {
    /// Whether the error is scoped to user input and can be fixed without a retry.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            MurmurError::SendValidation | MurmurError::CannotAddSelf | MurmurError::InvalidInput(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_errors_convert() {
        let err: MurmurError = BackendError::Unavailable("offline".to_string()).into();
        assert!(matches!(err, MurmurError::Backend(_)));
        assert!(err.to_string().contains("offline"));
    }

    #[test]
    fn validation_errors_are_flagged() {
        assert!(MurmurError::SendValidation.is_validation());
        assert!(MurmurError::CannotAddSelf.is_validation());
        assert!(!MurmurError::NoActiveConversation.is_validation());
        assert!(!MurmurError::PaginationFetch("boom".to_string()).is_validation());
    }
}
