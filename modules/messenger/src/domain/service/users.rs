use chrono::Utc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::{db_err, Service};
use crate::contract::model::User;
use crate::domain::error::DomainError;
use crate::domain::events::MessengerEvent;
use crate::domain::repo::UserInsert;

impl Service {
    /// Create a user together with its empty profile.
    ///
    /// Both rows are written in one store transaction rather than as a
    /// reaction to a "user created" event, so a user never exists without a
    /// profile.
    #[instrument(name = "messenger.service.register_user", skip(self))]
    pub async fn register_user(&self, username: &str) -> Result<User, DomainError> {
        info!("Registering user");

        let username = self.validate_username(username)?;

        if self
            .repos
            .users
            .username_exists(&username)
            .await
            .map_err(db_err)?
        {
            return Err(DomainError::username_already_exists(username));
        }

        let user = User {
            id: Uuid::new_v4(),
            username,
            created_at: Utc::now(),
        };
        match self
            .repos
            .users
            .insert_with_profile(user.clone())
            .await
            .map_err(db_err)?
        {
            UserInsert::Inserted => {}
            UserInsert::UsernameTaken => {
                debug!("Username taken by a concurrent registration");
                return Err(DomainError::username_already_exists(user.username));
            }
        }

        self.events.publish(&MessengerEvent::UserRegistered {
            id: user.id,
            at: user.created_at,
        });

        info!(user_id = %user.id, "Registered user");
        Ok(user)
    }

    #[instrument(name = "messenger.service.get_user", skip(self), fields(user_id = %id))]
    pub async fn get_user(&self, id: Uuid) -> Result<User, DomainError> {
        debug!("Getting user by id");
        self.repos
            .users
            .find_by_id(id)
            .await
            .map_err(db_err)?
            .ok_or_else(|| DomainError::user_not_found(id))
    }

    /// Delete a user. Messages, profile and thread memberships go with it;
    /// the avatar asset is removed from the asset store afterwards.
    #[instrument(name = "messenger.service.delete_user", skip(self), fields(user_id = %id))]
    pub async fn delete_user(&self, id: Uuid) -> Result<(), DomainError> {
        info!("Deleting user");

        let avatar = self
            .repos
            .profiles
            .find_by_user(id)
            .await
            .map_err(db_err)?
            .and_then(|p| p.avatar);

        let deleted = self.repos.users.delete(id).await.map_err(db_err)?;
        if !deleted {
            return Err(DomainError::user_not_found(id));
        }

        if let Some(path) = avatar {
            if let Err(e) = self.assets.delete(&path).await {
                warn!(path = %path, "Failed to delete avatar of removed user: {e:#}");
            }
        }

        self.events.publish(&MessengerEvent::UserDeleted {
            id,
            at: Utc::now(),
        });

        info!("Deleted user");
        Ok(())
    }

    pub(super) async fn require_user(&self, id: Uuid) -> Result<User, DomainError> {
        self.repos
            .users
            .find_by_id(id)
            .await
            .map_err(db_err)?
            .ok_or_else(|| DomainError::user_not_found(id))
    }

    fn validate_username(&self, raw: &str) -> Result<String, DomainError> {
        let username = raw.trim();
        if username.is_empty() {
            return Err(DomainError::validation("username", "cannot be empty"));
        }
        let len = username.chars().count();
        if len > self.config.max_username_length {
            return Err(DomainError::validation(
                "username",
                format!(
                    "too long: {len} characters (max: {})",
                    self.config.max_username_length
                ),
            ));
        }
        if let Some(c) = username
            .chars()
            .find(|c| !(c.is_alphanumeric() || "@.+-_".contains(*c)))
        {
            return Err(DomainError::validation(
                "username",
                format!("character {c:?} is not allowed"),
            ));
        }
        Ok(username.to_string())
    }
}
