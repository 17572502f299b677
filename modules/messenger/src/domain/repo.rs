use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::contract::model::{Message, Profile, Thread, User};
use crate::domain::pair::PairKey;

/// Outcome of inserting a user row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserInsert {
    Inserted,
    UsernameTaken,
}

/// Persistence ports for the domain layer.
/// Object-safe and async-friendly via `async_trait`.
#[async_trait]
pub trait UsersRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>>;
    async fn username_exists(&self, username: &str) -> anyhow::Result<bool>;
    /// Insert a fully-formed user and its empty profile in one transaction;
    /// the service computes id and timestamps. A taken username, including
    /// one lost to a concurrent insert, leaves nothing behind.
    async fn insert_with_profile(&self, u: User) -> anyhow::Result<UserInsert>;
    /// Delete by id, cascading to dependent rows. Returns true if a row was deleted.
    async fn delete(&self, id: Uuid) -> anyhow::Result<bool>;
}

#[async_trait]
pub trait MessagesRepository: Send + Sync {
    async fn insert(&self, m: Message) -> anyhow::Result<()>;
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Message>>;
    /// Load the given messages; ids that do not exist are simply absent.
    async fn find_many(&self, ids: &[Uuid]) -> anyhow::Result<Vec<Message>>;
    /// Messages attached to a thread, oldest first.
    async fn list_for_thread(&self, thread_id: Uuid) -> anyhow::Result<Vec<Message>>;
}

/// Outcome of a participant change that may collide with another direct thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParticipantsUpdate {
    Updated(Thread),
    /// The resulting pair already has its own direct thread.
    PairTaken { existing: Uuid },
}

#[async_trait]
pub trait ThreadsRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Thread>>;
    async fn find_direct(&self, key: &PairKey) -> anyhow::Result<Option<Thread>>;
    /// Atomically return the direct thread for `key`, inserting `candidate`
    /// (with its participants) when none exists. The flag is true if inserted.
    async fn find_or_create_direct(
        &self,
        key: &PairKey,
        candidate: Thread,
    ) -> anyhow::Result<(Thread, bool)>;
    /// Insert a thread without participants.
    async fn insert_empty(&self, t: Thread) -> anyhow::Result<()>;
    /// Add participants and recompute the direct-pair key in one transaction.
    async fn add_participants(
        &self,
        thread_id: Uuid,
        users: &[Uuid],
        at: DateTime<Utc>,
    ) -> anyhow::Result<ParticipantsUpdate>;
    /// Associate already-validated messages and set `updated_at = touched_at`,
    /// even when `message_ids` is empty. Re-attaching is a no-op.
    async fn attach_messages(
        &self,
        thread_id: Uuid,
        message_ids: &[Uuid],
        touched_at: DateTime<Utc>,
    ) -> anyhow::Result<()>;
    /// Insert `m` and attach it to the thread in one transaction, setting
    /// `updated_at` to the message's `created_at`.
    async fn insert_attached_message(&self, thread_id: Uuid, m: Message) -> anyhow::Result<()>;
    /// Threads the user participates in, most recently updated first.
    async fn list_for_user(&self, user_id: Uuid) -> anyhow::Result<Vec<Thread>>;
}

#[async_trait]
pub trait ProfilesRepository: Send + Sync {
    async fn find_by_user(&self, user_id: Uuid) -> anyhow::Result<Option<Profile>>;
    /// Insert an empty profile unless one exists. Returns true if inserted.
    async fn insert_if_missing(&self, user_id: Uuid) -> anyhow::Result<bool>;
    /// Persist `bio` and `link`; the avatar column is left untouched.
    async fn update_details(&self, p: Profile) -> anyhow::Result<()>;
    /// Set the avatar path and return the previous one, in one transaction.
    async fn swap_avatar(
        &self,
        user_id: Uuid,
        avatar: Option<String>,
    ) -> anyhow::Result<Option<String>>;
    /// All profiles ordered by their user's username.
    async fn list_by_username(&self) -> anyhow::Result<Vec<Profile>>;
}

/// The set of repositories the service depends on.
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UsersRepository>,
    pub messages: Arc<dyn MessagesRepository>,
    pub threads: Arc<dyn ThreadsRepository>,
    pub profiles: Arc<dyn ProfilesRepository>,
}

impl Repositories {
    /// Use one backend that implements every port.
    pub fn shared<R>(repo: Arc<R>) -> Self
    where
        R: UsersRepository
            + MessagesRepository
            + ThreadsRepository
            + ProfilesRepository
            + 'static,
    {
        Self {
            users: repo.clone(),
            messages: repo.clone(),
            threads: repo.clone(),
            profiles: repo,
        }
    }
}
