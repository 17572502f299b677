use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;
use uuid::Uuid;

use crate::contract::{
    client::MessengerApi,
    error::MessengerError,
    model::{AttachOutcome, AvatarUpload, Message, Profile, ProfilePatch, Thread, User},
};
use crate::domain::service::Service;

/// Local implementation of the MessengerApi trait that delegates to the domain service
pub struct MessengerLocalClient {
    service: Arc<Service>,
}

impl MessengerLocalClient {
    pub fn new(service: Arc<Service>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl MessengerApi for MessengerLocalClient {
    async fn register_user(&self, username: &str) -> Result<User, MessengerError> {
        self.service
            .register_user(username)
            .await
            .map_err(Into::into)
    }

    async fn get_user(&self, id: Uuid) -> Result<User, MessengerError> {
        self.service.get_user(id).await.map_err(Into::into)
    }

    async fn delete_user(&self, id: Uuid) -> Result<(), MessengerError> {
        self.service.delete_user(id).await.map_err(Into::into)
    }

    async fn find_thread(&self, a: Uuid, b: Uuid) -> Result<Option<Thread>, MessengerError> {
        self.service.find_thread(a, b).await.map_err(Into::into)
    }

    async fn find_or_create_thread(&self, a: Uuid, b: Uuid) -> Result<Thread, MessengerError> {
        self.service
            .find_or_create_thread(a, b)
            .await
            .map_err(Into::into)
    }

    async fn create_thread(&self) -> Result<Thread, MessengerError> {
        self.service.create_thread().await.map_err(Into::into)
    }

    async fn add_participants(
        &self,
        thread_id: Uuid,
        users: Vec<Uuid>,
    ) -> Result<Thread, MessengerError> {
        self.service
            .add_participants(thread_id, users)
            .await
            .map_err(Into::into)
    }

    async fn get_thread(&self, id: Uuid) -> Result<Thread, MessengerError> {
        self.service.get_thread(id).await.map_err(Into::into)
    }

    async fn participants(&self, thread_id: Uuid) -> Result<BTreeSet<Uuid>, MessengerError> {
        self.service
            .participants(thread_id)
            .await
            .map_err(Into::into)
    }

    async fn list_threads_for(&self, user_id: Uuid) -> Result<Vec<Thread>, MessengerError> {
        self.service
            .list_threads_for(user_id)
            .await
            .map_err(Into::into)
    }

    async fn add_messages(
        &self,
        thread_id: Uuid,
        message_ids: Vec<Uuid>,
    ) -> Result<AttachOutcome, MessengerError> {
        self.service
            .add_messages(thread_id, message_ids)
            .await
            .map_err(Into::into)
    }

    async fn add_message(
        &self,
        thread_id: Uuid,
        message_id: Uuid,
    ) -> Result<AttachOutcome, MessengerError> {
        self.service
            .add_message(thread_id, message_id)
            .await
            .map_err(Into::into)
    }

    async fn post_message(
        &self,
        thread_id: Uuid,
        author_id: Uuid,
        content: &str,
    ) -> Result<Message, MessengerError> {
        self.service
            .post_message(thread_id, author_id, content)
            .await
            .map_err(Into::into)
    }

    async fn create_message(
        &self,
        author_id: Uuid,
        content: &str,
    ) -> Result<Message, MessengerError> {
        self.service
            .create_message(author_id, content)
            .await
            .map_err(Into::into)
    }

    async fn get_message(&self, id: Uuid) -> Result<Message, MessengerError> {
        self.service.get_message(id).await.map_err(Into::into)
    }

    async fn list_messages(&self, thread_id: Uuid) -> Result<Vec<Message>, MessengerError> {
        self.service
            .list_messages(thread_id)
            .await
            .map_err(Into::into)
    }

    async fn get_profile(&self, user_id: Uuid) -> Result<Profile, MessengerError> {
        self.service.get_profile(user_id).await.map_err(Into::into)
    }

    async fn list_profiles(&self) -> Result<Vec<Profile>, MessengerError> {
        self.service.list_profiles().await.map_err(Into::into)
    }

    async fn update_profile(
        &self,
        user_id: Uuid,
        patch: ProfilePatch,
    ) -> Result<Profile, MessengerError> {
        self.service
            .update_profile(user_id, patch)
            .await
            .map_err(Into::into)
    }

    async fn replace_avatar(
        &self,
        user_id: Uuid,
        upload: AvatarUpload,
    ) -> Result<Profile, MessengerError> {
        self.service
            .replace_avatar(user_id, upload)
            .await
            .map_err(Into::into)
    }

    async fn clear_avatar(&self, user_id: Uuid) -> Result<Profile, MessengerError> {
        self.service.clear_avatar(user_id).await.map_err(Into::into)
    }
}
