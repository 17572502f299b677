use thiserror::Error;

/// Errors that are safe to expose to other modules
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MessengerError {
    #[error("{resource} not found: {id}")]
    NotFound { resource: &'static str, id: String },

    #[error("Conflict: {message}")]
    Conflict { message: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Forbidden: {message}")]
    Forbidden { message: String },

    #[error("Internal error")]
    Internal,
}

impl MessengerError {
    pub fn not_found(resource: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    pub fn internal() -> Self {
        Self::Internal
    }
}

impl From<crate::domain::error::DomainError> for MessengerError {
    fn from(domain_error: crate::domain::error::DomainError) -> Self {
        use crate::domain::error::DomainError::*;
        match domain_error {
            UserNotFound { id } => Self::not_found("User", id),
            ThreadNotFound { id } => Self::not_found("Thread", id),
            MessageNotFound { id } => Self::not_found("Message", id),
            ProfileNotFound { user_id } => Self::not_found("Profile", user_id),
            UsernameAlreadyExists { username } => {
                Self::conflict(format!("username '{username}' is taken"))
            }
            DirectThreadExists { thread_id } => {
                Self::conflict(format!("direct thread {thread_id} already exists for this pair"))
            }
            NotAParticipant { thread_id, user_id } => Self::forbidden(format!(
                "user {user_id} is not a participant of thread {thread_id}"
            )),
            e @ (SelfThread { .. }
            | TooFewParticipants { .. }
            | InvalidLink { .. }
            | LinkTooLong { .. }
            | InvalidAvatarFilename { .. }
            | Validation { .. }) => Self::validation(e.to_string()),
            Asset { .. } | Database { .. } => Self::internal(),
        }
    }
}
