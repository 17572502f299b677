use chrono::Utc;
use tracing::{debug, info, instrument, warn};
use url::Url;
use uuid::Uuid;

use super::{asset_err, db_err, Service};
use crate::contract::model::{AvatarUpload, Profile, ProfilePatch};
use crate::domain::avatar;
use crate::domain::error::DomainError;
use crate::domain::events::MessengerEvent;

impl Service {
    /// Make sure the user has a profile; creates an empty one if missing.
    #[instrument(name = "messenger.service.ensure_profile_exists", skip(self), fields(user_id = %user_id))]
    pub async fn ensure_profile_exists(&self, user_id: Uuid) -> Result<Profile, DomainError> {
        self.require_user(user_id).await?;

        let created = self
            .repos
            .profiles
            .insert_if_missing(user_id)
            .await
            .map_err(db_err)?;
        debug!(created, "Ensured profile");

        self.get_profile(user_id).await
    }

    #[instrument(name = "messenger.service.get_profile", skip(self), fields(user_id = %user_id))]
    pub async fn get_profile(&self, user_id: Uuid) -> Result<Profile, DomainError> {
        self.repos
            .profiles
            .find_by_user(user_id)
            .await
            .map_err(db_err)?
            .ok_or_else(|| DomainError::profile_not_found(user_id))
    }

    /// All profiles ordered by username.
    #[instrument(name = "messenger.service.list_profiles", skip(self))]
    pub async fn list_profiles(&self) -> Result<Vec<Profile>, DomainError> {
        self.repos
            .profiles
            .list_by_username()
            .await
            .map_err(db_err)
    }

    #[instrument(name = "messenger.service.update_profile", skip(self, patch), fields(user_id = %user_id))]
    pub async fn update_profile(
        &self,
        user_id: Uuid,
        patch: ProfilePatch,
    ) -> Result<Profile, DomainError> {
        let mut profile = self.get_profile(user_id).await?;

        if let Some(bio) = patch.bio {
            profile.bio = bio.filter(|b| !b.trim().is_empty());
        }
        if let Some(link) = patch.link {
            profile.link = match link.map(|l| l.trim().to_string()) {
                Some(l) if !l.is_empty() => Some(self.validate_link(l)?),
                _ => None,
            };
        }

        self.repos
            .profiles
            .update_details(profile.clone())
            .await
            .map_err(db_err)?;

        info!("Updated profile");
        Ok(profile)
    }

    /// Store a new avatar and drop the previous one.
    ///
    /// Order: write the new asset, swap the profile's path in one
    /// transaction, then delete the old asset. A failure at any step leaves
    /// the profile pointing at an asset that exists.
    #[instrument(
        name = "messenger.service.replace_avatar",
        skip(self, upload),
        fields(user_id = %user_id, filename = %upload.filename, size = upload.bytes.len())
    )]
    pub async fn replace_avatar(
        &self,
        user_id: Uuid,
        upload: AvatarUpload,
    ) -> Result<Profile, DomainError> {
        let current = self.get_profile(user_id).await?;
        let path = avatar::path_for(&self.config.avatar_prefix, user_id, &upload.filename)?;

        self.assets
            .store(&path, &upload.bytes)
            .await
            .map_err(asset_err)?;

        let previous = match self
            .repos
            .profiles
            .swap_avatar(user_id, Some(path.clone()))
            .await
        {
            Ok(previous) => previous,
            Err(e) => {
                if current.avatar.as_deref() != Some(path.as_str()) {
                    if let Err(cleanup) = self.assets.delete(&path).await {
                        warn!(path = %path, "Failed to remove unused avatar: {cleanup:#}");
                    }
                }
                return Err(db_err(e));
            }
        };

        if let Some(old) = previous.filter(|old| *old != path) {
            self.delete_asset_quietly(&old).await;
        }

        self.events.publish(&MessengerEvent::AvatarReplaced {
            user_id,
            at: Utc::now(),
        });

        info!(path = %path, "Replaced avatar");
        Ok(Profile {
            avatar: Some(path),
            ..current
        })
    }

    /// Remove the avatar from the profile and from the asset store.
    #[instrument(name = "messenger.service.clear_avatar", skip(self), fields(user_id = %user_id))]
    pub async fn clear_avatar(&self, user_id: Uuid) -> Result<Profile, DomainError> {
        let current = self.get_profile(user_id).await?;

        let previous = self
            .repos
            .profiles
            .swap_avatar(user_id, None)
            .await
            .map_err(db_err)?;

        if let Some(old) = previous {
            self.delete_asset_quietly(&old).await;
            info!("Cleared avatar");
        }

        Ok(Profile {
            avatar: None,
            ..current
        })
    }

    /// The profile no longer references `path`, so a failed delete only
    /// leaves an orphaned file behind.
    async fn delete_asset_quietly(&self, path: &str) {
        match self.assets.delete(path).await {
            Ok(true) => debug!(path, "Deleted previous avatar"),
            Ok(false) => debug!(path, "Previous avatar was already gone"),
            Err(e) => warn!(path, "Failed to delete previous avatar: {e:#}"),
        }
    }

    fn validate_link(&self, link: String) -> Result<String, DomainError> {
        let len = link.chars().count();
        if len > self.config.max_link_length {
            return Err(DomainError::link_too_long(len, self.config.max_link_length));
        }
        let parsed = Url::parse(&link).map_err(|e| DomainError::invalid_link(&link, e.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(DomainError::invalid_link(
                &link,
                format!("unsupported scheme '{}'", parsed.scheme()),
            ));
        }
        if parsed.host_str().is_none() {
            return Err(DomainError::invalid_link(&link, "missing host"));
        }
        Ok(link)
    }
}
