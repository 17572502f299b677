use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Transport-agnostic domain event, published after the change is committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessengerEvent {
    UserRegistered {
        id: Uuid,
        at: DateTime<Utc>,
    },
    UserDeleted {
        id: Uuid,
        at: DateTime<Utc>,
    },
    ThreadCreated {
        id: Uuid,
        at: DateTime<Utc>,
    },
    MessagesAttached {
        thread_id: Uuid,
        accepted: usize,
        rejected: usize,
        at: DateTime<Utc>,
    },
    AvatarReplaced {
        user_id: Uuid,
        at: DateTime<Utc>,
    },
}
