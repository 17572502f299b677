use chrono::Utc;
use tracing::{debug, instrument};
use uuid::Uuid;

use super::{db_err, Service};
use crate::contract::model::Message;
use crate::domain::error::DomainError;

impl Service {
    /// Store a new message. Content is free-form; `created_at` is set here
    /// and never changes.
    #[instrument(
        name = "messenger.service.create_message",
        skip(self, content),
        fields(author_id = %author_id, len = content.len())
    )]
    pub async fn create_message(
        &self,
        author_id: Uuid,
        content: &str,
    ) -> Result<Message, DomainError> {
        self.require_user(author_id).await?;

        let message = Message {
            // v7 ids sort by creation time, which breaks created_at ties
            id: Uuid::now_v7(),
            author_id,
            content: content.to_string(),
            created_at: Utc::now(),
        };
        self.repos
            .messages
            .insert(message.clone())
            .await
            .map_err(db_err)?;

        debug!(message_id = %message.id, "Created message");
        Ok(message)
    }

    #[instrument(name = "messenger.service.get_message", skip(self), fields(message_id = %id))]
    pub async fn get_message(&self, id: Uuid) -> Result<Message, DomainError> {
        self.repos
            .messages
            .find_by_id(id)
            .await
            .map_err(db_err)?
            .ok_or_else(|| DomainError::message_not_found(id))
    }

    /// Messages of a thread, oldest first.
    #[instrument(name = "messenger.service.list_messages", skip(self), fields(thread_id = %thread_id))]
    pub async fn list_messages(&self, thread_id: Uuid) -> Result<Vec<Message>, DomainError> {
        self.get_thread(thread_id).await?;
        let messages = self
            .repos
            .messages
            .list_for_thread(thread_id)
            .await
            .map_err(db_err)?;
        debug!("Listed {} messages", messages.len());
        Ok(messages)
    }
}
