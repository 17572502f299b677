use std::collections::{BTreeSet, HashMap, HashSet};

use chrono::Utc;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use super::{db_err, Service};
use crate::contract::model::{AttachOutcome, Message, Thread};
use crate::domain::error::DomainError;
use crate::domain::events::MessengerEvent;
use crate::domain::pair::PairKey;
use crate::domain::repo::ParticipantsUpdate;

impl Service {
    /// The direct thread of `a` and `b`, if one exists.
    #[instrument(name = "messenger.service.find_thread", skip(self), fields(a = %a, b = %b))]
    pub async fn find_thread(&self, a: Uuid, b: Uuid) -> Result<Option<Thread>, DomainError> {
        let Some(key) = PairKey::new(a, b) else {
            debug!("Same user on both sides, no direct thread");
            return Ok(None);
        };
        let found = self.repos.threads.find_direct(&key).await.map_err(db_err)?;
        debug!(found = found.is_some(), "Looked up direct thread");
        Ok(found)
    }

    /// Return the direct thread of `a` and `b`, creating it on a miss.
    #[instrument(
        name = "messenger.service.find_or_create_thread",
        skip(self),
        fields(a = %a, b = %b)
    )]
    pub async fn find_or_create_thread(&self, a: Uuid, b: Uuid) -> Result<Thread, DomainError> {
        let key = PairKey::new(a, b).ok_or_else(|| DomainError::self_thread(a))?;

        // Fast path without touching the user table.
        if let Some(thread) = self.repos.threads.find_direct(&key).await.map_err(db_err)? {
            debug!(thread_id = %thread.id, "Found existing thread");
            return Ok(thread);
        }

        self.require_user(a).await?;
        self.require_user(b).await?;

        let now = Utc::now();
        let candidate = Thread {
            id: Uuid::new_v4(),
            participants: BTreeSet::from([a, b]),
            created_at: now,
            updated_at: now,
        };
        let (thread, created) = self
            .repos
            .threads
            .find_or_create_direct(&key, candidate)
            .await
            .map_err(db_err)?;

        if created {
            self.events.publish(&MessengerEvent::ThreadCreated {
                id: thread.id,
                at: thread.created_at,
            });
            info!(thread_id = %thread.id, "Created direct thread");
        } else {
            debug!(thread_id = %thread.id, "Thread created concurrently, reusing it");
        }
        Ok(thread)
    }

    /// Create a thread with no participants (the `Unlinked` state).
    #[instrument(name = "messenger.service.create_thread", skip(self))]
    pub async fn create_thread(&self) -> Result<Thread, DomainError> {
        let now = Utc::now();
        let thread = Thread {
            id: Uuid::new_v4(),
            participants: BTreeSet::new(),
            created_at: now,
            updated_at: now,
        };
        self.repos
            .threads
            .insert_empty(thread.clone())
            .await
            .map_err(db_err)?;

        self.events.publish(&MessengerEvent::ThreadCreated {
            id: thread.id,
            at: thread.created_at,
        });
        info!(thread_id = %thread.id, "Created empty thread");
        Ok(thread)
    }

    /// Add users to a thread. The thread must end up with at least two
    /// participants; exactly two makes it the pair's direct thread.
    #[instrument(
        name = "messenger.service.add_participants",
        skip(self, users),
        fields(thread_id = %thread_id, count = users.len())
    )]
    pub async fn add_participants(
        &self,
        thread_id: Uuid,
        users: Vec<Uuid>,
    ) -> Result<Thread, DomainError> {
        let thread = self.get_thread(thread_id).await?;

        let new_users: Vec<Uuid> = users
            .into_iter()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .filter(|u| !thread.participants.contains(u))
            .collect();

        let total = thread.participants.len() + new_users.len();
        if total < 2 {
            return Err(DomainError::too_few_participants(total));
        }
        if new_users.is_empty() {
            debug!("All users already participate");
            return Ok(thread);
        }

        for user_id in &new_users {
            self.require_user(*user_id).await?;
        }

        match self
            .repos
            .threads
            .add_participants(thread_id, &new_users, Utc::now())
            .await
            .map_err(db_err)?
        {
            ParticipantsUpdate::Updated(thread) => {
                info!(participants = thread.participants.len(), "Added participants");
                Ok(thread)
            }
            ParticipantsUpdate::PairTaken { existing } => {
                Err(DomainError::direct_thread_exists(existing))
            }
        }
    }

    #[instrument(name = "messenger.service.get_thread", skip(self), fields(thread_id = %id))]
    pub async fn get_thread(&self, id: Uuid) -> Result<Thread, DomainError> {
        self.repos
            .threads
            .find_by_id(id)
            .await
            .map_err(db_err)?
            .ok_or_else(|| DomainError::thread_not_found(id))
    }

    /// Current participant ids of a thread.
    pub async fn participants(&self, thread_id: Uuid) -> Result<BTreeSet<Uuid>, DomainError> {
        Ok(self.get_thread(thread_id).await?.participants)
    }

    /// Threads of a user, most recently active first.
    #[instrument(name = "messenger.service.list_threads_for", skip(self), fields(user_id = %user_id))]
    pub async fn list_threads_for(&self, user_id: Uuid) -> Result<Vec<Thread>, DomainError> {
        let threads = self
            .repos
            .threads
            .list_for_user(user_id)
            .await
            .map_err(db_err)?;
        debug!("Listed {} threads", threads.len());
        Ok(threads)
    }

    /// Attach existing messages to a thread.
    ///
    /// Each message's author must currently participate in the thread;
    /// messages by anyone else are left out and reported in
    /// [`AttachOutcome::rejected`]. `updated_at` is refreshed whether or
    /// not anything was accepted.
    #[instrument(
        name = "messenger.service.add_messages",
        skip(self, message_ids),
        fields(thread_id = %thread_id, count = message_ids.len())
    )]
    pub async fn add_messages(
        &self,
        thread_id: Uuid,
        message_ids: Vec<Uuid>,
    ) -> Result<AttachOutcome, DomainError> {
        let thread = self.get_thread(thread_id).await?;

        let mut seen = HashSet::new();
        let ids: Vec<Uuid> = message_ids
            .into_iter()
            .filter(|id| seen.insert(*id))
            .collect();

        let by_id: HashMap<Uuid, Message> = self
            .repos
            .messages
            .find_many(&ids)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(|m| (m.id, m))
            .collect();

        let mut accepted = Vec::with_capacity(ids.len());
        let mut rejected = Vec::new();
        for id in ids {
            let message = by_id
                .get(&id)
                .ok_or_else(|| DomainError::message_not_found(id))?;
            if thread.has_participant(message.author_id) {
                accepted.push(id);
            } else {
                debug!(message_id = %id, author_id = %message.author_id, "Dropping message from non-participant");
                rejected.push(id);
            }
        }

        let touched_at = Utc::now();
        self.repos
            .threads
            .attach_messages(thread_id, &accepted, touched_at)
            .await
            .map_err(db_err)?;

        self.events.publish(&MessengerEvent::MessagesAttached {
            thread_id,
            accepted: accepted.len(),
            rejected: rejected.len(),
            at: touched_at,
        });

        info!(
            accepted = accepted.len(),
            rejected = rejected.len(),
            "Attached messages"
        );
        Ok(AttachOutcome {
            thread_id,
            accepted,
            rejected,
            updated_at: touched_at,
        })
    }

    /// Single-message form of [`Service::add_messages`].
    pub async fn add_message(
        &self,
        thread_id: Uuid,
        message_id: Uuid,
    ) -> Result<AttachOutcome, DomainError> {
        self.add_messages(thread_id, vec![message_id]).await
    }

    /// Create a message and attach it to the thread. Both happen in one store
    /// transaction, so a failed attach leaves no stray message.
    ///
    /// Unlike the batch path, a non-participant author is an error and no
    /// message is created.
    #[instrument(
        name = "messenger.service.post_message",
        skip(self, content),
        fields(thread_id = %thread_id, author_id = %author_id)
    )]
    pub async fn post_message(
        &self,
        thread_id: Uuid,
        author_id: Uuid,
        content: &str,
    ) -> Result<Message, DomainError> {
        let thread = self.get_thread(thread_id).await?;
        if !thread.has_participant(author_id) {
            return Err(DomainError::not_a_participant(thread_id, author_id));
        }

        // Participants are existing users; the membership check covers the author.
        let message = Message {
            id: Uuid::now_v7(),
            author_id,
            content: content.to_string(),
            created_at: Utc::now(),
        };
        self.repos
            .threads
            .insert_attached_message(thread_id, message.clone())
            .await
            .map_err(db_err)?;

        self.events.publish(&MessengerEvent::MessagesAttached {
            thread_id,
            accepted: 1,
            rejected: 0,
            at: message.created_at,
        });

        info!(message_id = %message.id, "Posted message");
        Ok(message)
    }
}
