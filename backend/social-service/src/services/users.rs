use regex::Regex;
use serde::Deserialize;
use std::sync::{Arc, LazyLock};
use tracing::{info, warn};
use uuid::Uuid;

use super::content::ContentService;
use super::counters::CounterService;
use super::media::{upload_error, MediaStore, MediaUpload};
use super::notifications::NotificationService;
use super::{require_principal, text_length};
use crate::domain::{Principal, Profile, User, VerificationTier};
use crate::error::{ServiceError, ServiceResult, StoreError};
use crate::metrics::record_mutation;
use crate::repository::{ContentStore, NotificationFilter};

static USERNAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_æøåÆØÅ]+$").expect("Invalid username regex"));

pub const USERNAME_MIN_LEN: usize = 3;
pub const USERNAME_MAX_LEN: usize = 20;
pub const NAME_MAX_LEN: usize = 20;
pub const BIOGRAPHY_MAX_LEN: usize = 160;

pub fn validate_username(username: &str) -> ServiceResult<()> {
    let len = username.chars().count();
    if !(USERNAME_MIN_LEN..=USERNAME_MAX_LEN).contains(&len) {
        return Err(ServiceError::validation(format!(
            "Username must be between {} and {} characters",
            USERNAME_MIN_LEN, USERNAME_MAX_LEN
        )));
    }
    if !USERNAME_REGEX.is_match(username) {
        return Err(ServiceError::validation(
            "Username can only contain letters, numbers and underscores",
        ));
    }
    Ok(())
}

fn check_length(field: &str, value: Option<&str>, max: usize) -> ServiceResult<()> {
    match value {
        Some(value) if text_length(value) > max => Err(ServiceError::validation(format!(
            "{} must be at most {} characters",
            field, max
        ))),
        _ => Ok(()),
    }
}

/// Profile text a user may change. Absent or empty fields keep their value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub biography: Option<String>,
}

/// Which profile image a picture change targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PictureSlot {
    Profile,
    Background,
}

impl PictureSlot {
    pub fn as_str(&self) -> &'static str {
        match self {
            PictureSlot::Profile => "profile",
            PictureSlot::Background => "background",
        }
    }

    fn url_mut<'a>(&self, profile: &'a mut Profile) -> &'a mut Option<String> {
        match self {
            PictureSlot::Profile => &mut profile.profile_picture,
            PictureSlot::Background => &mut profile.background_picture,
        }
    }

    /// Profile pictures are stored under the username; backgrounds get a fresh name.
    fn owner_hint(&self, user: &User) -> Option<String> {
        match self {
            PictureSlot::Profile => Some(user.username.clone()),
            PictureSlot::Background => None,
        }
    }
}

/// Registration, profile upkeep and account removal.
#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn ContentStore>,
    media: Arc<dyn MediaStore>,
    content: ContentService,
    counters: CounterService,
    notifications: NotificationService,
}

impl UserService {
    pub fn new(
        store: Arc<dyn ContentStore>,
        media: Arc<dyn MediaStore>,
        content: ContentService,
        counters: CounterService,
        notifications: NotificationService,
    ) -> Self {
        Self {
            store,
            media,
            content,
            counters,
            notifications,
        }
    }

    pub async fn register(&self, username: &str, tier: VerificationTier) -> ServiceResult<User> {
        validate_username(username)?;

        let user = User::new(username, tier);
        match self.store.insert_user(&user).await {
            Ok(()) => {
                info!(user_id = %user.id, username = %user.username, "User registered");
                Ok(user)
            }
            Err(StoreError::Duplicate(_)) => Err(ServiceError::conflict("Username already exists")),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn get(&self, id: Uuid) -> ServiceResult<User> {
        self.store
            .find_user(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("User not found"))
    }

    pub async fn get_by_username(&self, username: &str) -> ServiceResult<User> {
        self.store
            .find_user_by_username(username)
            .await?
            .ok_or_else(|| ServiceError::not_found("User not found"))
    }

    async fn save_profile(&self, user: &User) -> ServiceResult<()> {
        if !self.store.update_profile(user.id, &user.profile).await? {
            return Err(ServiceError::not_found("User not found"));
        }
        Ok(())
    }

    async fn discard_media(&self, url: &str) {
        if let Err(err) = self.media.delete(url).await {
            warn!(url = %url, error = %err, "Failed to delete profile file");
        }
    }

    pub async fn update_profile(
        &self,
        principal: Option<&Principal>,
        update: ProfileUpdate,
    ) -> ServiceResult<User> {
        let result = self.apply_update_profile(principal, update).await;
        record_mutation("profile_update", &result);
        result
    }

    async fn apply_update_profile(
        &self,
        principal: Option<&Principal>,
        update: ProfileUpdate,
    ) -> ServiceResult<User> {
        let principal = require_principal(principal, "update profile")?;
        check_length("First name", update.first_name.as_deref(), NAME_MAX_LEN)?;
        check_length("Last name", update.last_name.as_deref(), NAME_MAX_LEN)?;
        check_length("Biography", update.biography.as_deref(), BIOGRAPHY_MAX_LEN)?;

        let mut user = self.get(principal.id).await?;
        let profile = &mut user.profile;
        for (slot, value) in [
            (&mut profile.first_name, update.first_name),
            (&mut profile.last_name, update.last_name),
            (&mut profile.biography, update.biography),
        ] {
            if let Some(value) = value.filter(|v| !v.is_empty()) {
                *slot = Some(value);
            }
        }

        self.save_profile(&user).await?;
        info!(user_id = %user.id, "Profile updated");
        Ok(user)
    }

    /// Replaces, or with `file` unset clears, one profile image. The previous
    /// file is deleted first.
    pub async fn change_picture(
        &self,
        principal: Option<&Principal>,
        slot: PictureSlot,
        file: Option<MediaUpload>,
    ) -> ServiceResult<User> {
        let result = self.apply_change_picture(principal, slot, file).await;
        record_mutation("picture_change", &result);
        result
    }

    async fn apply_change_picture(
        &self,
        principal: Option<&Principal>,
        slot: PictureSlot,
        file: Option<MediaUpload>,
    ) -> ServiceResult<User> {
        let principal =
            require_principal(principal, &format!("change {} picture", slot.as_str()))?;
        let mut user = self.get(principal.id).await?;

        if let Some(previous) = slot.url_mut(&mut user.profile).take() {
            self.discard_media(&previous).await;
        }

        let uploaded = match file {
            Some(file) => self.media.upload(file, slot.owner_hint(&user)).await.map(Some),
            None => Ok(None),
        };

        match uploaded {
            Ok(url) => {
                *slot.url_mut(&mut user.profile) = url;
                self.save_profile(&user).await?;
            }
            Err(err) => {
                // The previous file is already gone, so persist the cleared slot.
                self.save_profile(&user).await?;
                return Err(upload_error(err));
            }
        }

        info!(user_id = %user.id, slot = slot.as_str(), "Picture changed");
        Ok(user)
    }

    /// Removes an account with everything it wrote and every relation it
    /// holds. Self or admin only; the admin account itself cannot be removed.
    pub async fn delete_user(
        &self,
        principal: Option<&Principal>,
        username: &str,
    ) -> ServiceResult<User> {
        let result = self.apply_delete_user(principal, username).await;
        record_mutation("user_delete", &result);
        result
    }

    async fn apply_delete_user(
        &self,
        principal: Option<&Principal>,
        username: &str,
    ) -> ServiceResult<User> {
        let principal = require_principal(principal, "delete a user")?;
        let user = self.get_by_username(username).await?;

        let is_admin_account = user.username.eq_ignore_ascii_case(Principal::ADMIN_USERNAME);
        if is_admin_account || (user.id != principal.id && !principal.is_admin()) {
            return Err(ServiceError::forbidden(
                "You are not authorized to delete this user",
            ));
        }

        let contents = self.content.purge_author(&user).await?;
        self.counters.release_user(user.id).await?;

        let mut notifications = 0;
        for filter in [
            NotificationFilter {
                sender_id: Some(user.id),
                ..Default::default()
            },
            NotificationFilter {
                recipient_id: Some(user.id),
                ..Default::default()
            },
        ] {
            notifications += self.notifications.retract_matching(&filter).await?;
        }

        let user = self
            .store
            .delete_user(user.id)
            .await?
            .ok_or_else(|| ServiceError::not_found("User not found"))?;

        for url in [&user.profile.profile_picture, &user.profile.background_picture]
            .into_iter()
            .flatten()
        {
            self.discard_media(url).await;
        }

        info!(
            user_id = %user.id,
            deleted_by = %principal.id,
            contents,
            notifications,
            "User deleted"
        );
        Ok(user)
    }
}
