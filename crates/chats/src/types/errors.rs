//! Error types for the chat system.

use thiserror::Error;

/// Result type alias for chat operations
pub type ChatResult<T> = Result<T, ChatError>;

/// Result type alias for repository operations
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Failures surfaced by the chat service
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("User not found: {username}")]
    UserNotFound { username: String },

    #[error("Chat not found: {id}")]
    ChatNotFound { id: String },

    #[error("Chat creation conflicted and the existing chat could not be read back")]
    CreationConflict,

    #[error("Username already taken: {username}")]
    UsernameTaken { username: String },

    #[error("Permission denied: {reason}")]
    PermissionDenied { reason: String },

    #[error("Unsupported operation: {message}")]
    Unsupported { message: String },

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(#[source] RepositoryError),
}

impl ChatError {
    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a not found error for chats
    pub fn chat_not_found(id: impl Into<String>) -> Self {
        Self::ChatNotFound { id: id.into() }
    }

    /// Create a not found error for users
    pub fn user_not_found(username: impl Into<String>) -> Self {
        Self::UserNotFound {
            username: username.into(),
        }
    }

    /// Create a permission denied error
    pub fn permission_denied(reason: impl Into<String>) -> Self {
        Self::PermissionDenied {
            reason: reason.into(),
        }
    }

    /// Create an unsupported operation error
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported {
            message: message.into(),
        }
    }

    /// Whether the failure came from the caller's input rather than the system
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self,
            ChatError::CreationConflict | ChatError::StorageUnavailable(_)
        )
    }
}

/// Failures surfaced by chat storage and the user directory
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("uniqueness conflict: {0}")]
    Conflict(String),

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    /// A guarded membership write found its precondition no longer holds
    #[error("membership change refused: {0}")]
    Refused(String),

    /// The acting participant lacks the rights the write requires
    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

impl From<RepositoryError> for ChatError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(id) => ChatError::ChatNotFound { id },
            RepositoryError::Conflict(_) => ChatError::CreationConflict,
            RepositoryError::Refused(message) => ChatError::Validation { message },
            RepositoryError::Forbidden(reason) => ChatError::PermissionDenied { reason },
            other => ChatError::StorageUnavailable(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_errors_map_to_service_errors() {
        let not_found: ChatError = RepositoryError::NotFound("abc".into()).into();
        assert!(matches!(not_found, ChatError::ChatNotFound { ref id } if id == "abc"));

        let conflict: ChatError = RepositoryError::Conflict("sides".into()).into();
        assert!(matches!(conflict, ChatError::CreationConflict));

        let refused: ChatError = RepositoryError::Refused("last admin".into()).into();
        assert!(matches!(refused, ChatError::Validation { .. }));
        assert!(refused.is_client_error());

        let forbidden: ChatError = RepositoryError::Forbidden("not an admin".into()).into();
        assert!(matches!(forbidden, ChatError::PermissionDenied { .. }));

        let storage: ChatError = RepositoryError::Unavailable("down".into()).into();
        assert!(matches!(storage, ChatError::StorageUnavailable(_)));
        assert!(!storage.is_client_error());
    }

    #[test]
    fn test_client_errors() {
        assert!(ChatError::validation("empty title").is_client_error());
        assert!(ChatError::user_not_found("ghost").is_client_error());
        assert!(!ChatError::CreationConflict.is_client_error());
    }
}
