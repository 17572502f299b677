use std::collections::BTreeSet;

use async_trait::async_trait;
use uuid::Uuid;

use crate::contract::{
    error::MessengerError,
    model::{AttachOutcome, AvatarUpload, Message, Profile, ProfilePatch, Thread, User},
};

/// Public API trait for the messenger module that other modules can use
#[async_trait]
pub trait MessengerApi: Send + Sync {
    // --- users ---

    /// Create a user and provision its empty profile
    async fn register_user(&self, username: &str) -> Result<User, MessengerError>;

    async fn get_user(&self, id: Uuid) -> Result<User, MessengerError>;

    /// Delete a user together with its messages, profile and avatar asset
    async fn delete_user(&self, id: Uuid) -> Result<(), MessengerError>;

    // --- threads ---

    /// The direct thread between two users, if any. Argument order does not matter.
    async fn find_thread(&self, a: Uuid, b: Uuid) -> Result<Option<Thread>, MessengerError>;

    async fn find_or_create_thread(&self, a: Uuid, b: Uuid) -> Result<Thread, MessengerError>;

    /// Create a thread with no participants yet
    async fn create_thread(&self) -> Result<Thread, MessengerError>;

    async fn add_participants(
        &self,
        thread_id: Uuid,
        users: Vec<Uuid>,
    ) -> Result<Thread, MessengerError>;

    async fn get_thread(&self, id: Uuid) -> Result<Thread, MessengerError>;

    async fn participants(&self, thread_id: Uuid) -> Result<BTreeSet<Uuid>, MessengerError>;

    /// Threads the user participates in, most recently active first
    async fn list_threads_for(&self, user_id: Uuid) -> Result<Vec<Thread>, MessengerError>;

    /// Attach existing messages; messages by non-participants are filtered out
    async fn add_messages(
        &self,
        thread_id: Uuid,
        message_ids: Vec<Uuid>,
    ) -> Result<AttachOutcome, MessengerError>;

    async fn add_message(
        &self,
        thread_id: Uuid,
        message_id: Uuid,
    ) -> Result<AttachOutcome, MessengerError>;

    /// Create a message and attach it; fails for non-participants
    async fn post_message(
        &self,
        thread_id: Uuid,
        author_id: Uuid,
        content: &str,
    ) -> Result<Message, MessengerError>;

    // --- messages ---

    async fn create_message(&self, author_id: Uuid, content: &str)
        -> Result<Message, MessengerError>;

    async fn get_message(&self, id: Uuid) -> Result<Message, MessengerError>;

    /// Messages of a thread in creation order
    async fn list_messages(&self, thread_id: Uuid) -> Result<Vec<Message>, MessengerError>;

    // --- profiles ---

    async fn get_profile(&self, user_id: Uuid) -> Result<Profile, MessengerError>;

    /// Profiles ordered by username
    async fn list_profiles(&self) -> Result<Vec<Profile>, MessengerError>;

    async fn update_profile(
        &self,
        user_id: Uuid,
        patch: ProfilePatch,
    ) -> Result<Profile, MessengerError>;

    async fn replace_avatar(
        &self,
        user_id: Uuid,
        upload: AvatarUpload,
    ) -> Result<Profile, MessengerError>;

    async fn clear_avatar(&self, user_id: Uuid) -> Result<Profile, MessengerError>;
}
