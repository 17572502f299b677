use std::collections::BTreeSet;

use uuid::Uuid;

use crate::contract::model::{Message, Profile, Thread, User};
use crate::infra::storage::entity::{message, profile, thread, user};

/// Convert a database entity to a contract model
pub fn user_to_contract(entity: user::Model) -> User {
    User {
        id: entity.id,
        username: entity.username,
        created_at: entity.created_at,
    }
}

pub fn message_to_contract(entity: message::Model) -> Message {
    Message {
        id: entity.id,
        author_id: entity.author_id,
        content: entity.content,
        created_at: entity.created_at,
    }
}

/// Threads carry their participant set, which lives in a separate table.
pub fn thread_to_contract(
    entity: thread::Model,
    participants: impl IntoIterator<Item = Uuid>,
) -> Thread {
    Thread {
        id: entity.id,
        participants: participants.into_iter().collect::<BTreeSet<_>>(),
        created_at: entity.created_at,
        updated_at: entity.updated_at,
    }
}

pub fn profile_to_contract(entity: profile::Model) -> Profile {
    Profile {
        user_id: entity.user_id,
        avatar: entity.avatar,
        bio: entity.bio,
        link: entity.link,
    }
}
