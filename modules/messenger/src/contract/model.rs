use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Identity record mirrored from the auth subsystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

/// User-authored text. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: Uuid,
    pub author_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Lifecycle of a thread: created empty, active once it has two participants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    Unlinked,
    Active,
}

/// A conversation between a set of participants.
///
/// A thread with exactly two participants is a direct thread and is what
/// pairwise lookups return; more participants make it a group thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thread {
    pub id: Uuid,
    pub participants: BTreeSet<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Thread {
    pub fn state(&self) -> ThreadState {
        if self.participants.len() >= 2 {
            ThreadState::Active
        } else {
            ThreadState::Unlinked
        }
    }

    pub fn is_direct(&self) -> bool {
        self.participants.len() == 2
    }

    pub fn has_participant(&self, user_id: Uuid) -> bool {
        self.participants.contains(&user_id)
    }
}

/// Result of attaching a batch of messages to a thread.
///
/// Messages whose author is not a participant are listed in `rejected` and
/// left out of the thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachOutcome {
    pub thread_id: Uuid,
    pub accepted: Vec<Uuid>,
    pub rejected: Vec<Uuid>,
    pub updated_at: DateTime<Utc>,
}

impl AttachOutcome {
    pub fn all_accepted(&self) -> bool {
        self.rejected.is_empty()
    }
}

/// One-to-one user metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub user_id: Uuid,
    /// Relative path of the avatar in the asset store.
    pub avatar: Option<String>,
    pub bio: Option<String>,
    pub link: Option<String>,
}

impl Profile {
    pub fn empty(user_id: Uuid) -> Self {
        Self {
            user_id,
            avatar: None,
            bio: None,
            link: None,
        }
    }
}

/// Partial update of profile details.
///
/// Outer `None` keeps the current value, `Some(None)` clears it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProfilePatch {
    pub bio: Option<Option<String>>,
    pub link: Option<Option<String>>,
}

/// A new avatar image as uploaded by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvatarUpload {
    pub filename: String,
    pub bytes: Vec<u8>,
}
