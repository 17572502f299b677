use thiserror::Error;
use uuid::Uuid;

/// Domain-specific errors using thiserror
#[derive(Error, Debug)]
pub enum DomainError {
    #[error("User not found: {id}")]
    UserNotFound { id: Uuid },

    #[error("Thread not found: {id}")]
    ThreadNotFound { id: Uuid },

    #[error("Message not found: {id}")]
    MessageNotFound { id: Uuid },

    #[error("Profile not found for user {user_id}")]
    ProfileNotFound { user_id: Uuid },

    #[error("Username '{username}' already exists")]
    UsernameAlreadyExists { username: String },

    #[error("A thread needs two distinct participants, got {user_id} twice")]
    SelfThread { user_id: Uuid },

    #[error("A thread needs at least 2 participants, would have {count}")]
    TooFewParticipants { count: usize },

    #[error("Direct thread {thread_id} already exists for this pair")]
    DirectThreadExists { thread_id: Uuid },

    #[error("User {user_id} is not a participant of thread {thread_id}")]
    NotAParticipant { thread_id: Uuid, user_id: Uuid },

    #[error("Invalid link '{link}': {reason}")]
    InvalidLink { link: String, reason: String },

    #[error("Link too long: {len} characters (max: {max})")]
    LinkTooLong { len: usize, max: usize },

    #[error("Invalid avatar filename: '{filename}'")]
    InvalidAvatarFilename { filename: String },

    #[error("Validation failed: {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Asset store error: {message}")]
    Asset { message: String },

    #[error("Database error: {message}")]
    Database { message: String },
}

impl DomainError {
    pub fn user_not_found(id: Uuid) -> Self {
        Self::UserNotFound { id }
    }

    pub fn thread_not_found(id: Uuid) -> Self {
        Self::ThreadNotFound { id }
    }

    pub fn message_not_found(id: Uuid) -> Self {
        Self::MessageNotFound { id }
    }

    pub fn profile_not_found(user_id: Uuid) -> Self {
        Self::ProfileNotFound { user_id }
    }

    pub fn username_already_exists(username: impl Into<String>) -> Self {
        Self::UsernameAlreadyExists {
            username: username.into(),
        }
    }

    pub fn self_thread(user_id: Uuid) -> Self {
        Self::SelfThread { user_id }
    }

    pub fn too_few_participants(count: usize) -> Self {
        Self::TooFewParticipants { count }
    }

    pub fn direct_thread_exists(thread_id: Uuid) -> Self {
        Self::DirectThreadExists { thread_id }
    }

    pub fn not_a_participant(thread_id: Uuid, user_id: Uuid) -> Self {
        Self::NotAParticipant { thread_id, user_id }
    }

    pub fn invalid_link(link: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidLink {
            link: link.into(),
            reason: reason.into(),
        }
    }

    pub fn link_too_long(len: usize, max: usize) -> Self {
        Self::LinkTooLong { len, max }
    }

    pub fn invalid_avatar_filename(filename: impl Into<String>) -> Self {
        Self::InvalidAvatarFilename {
            filename: filename.into(),
        }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn asset(message: impl Into<String>) -> Self {
        Self::Asset {
            message: message.into(),
        }
    }

    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
        }
    }
}
