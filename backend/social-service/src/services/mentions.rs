use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use super::notifications::NotificationService;
use crate::domain::{ContentRef, NotificationType, RefSet};
use crate::error::ServiceResult;
use crate::repository::ContentStore;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MentionDiff {
    pub to_add: BTreeSet<Uuid>,
    pub to_remove: BTreeSet<Uuid>,
}

impl MentionDiff {
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

pub fn diff_mentions(old: &BTreeSet<Uuid>, new: &BTreeSet<Uuid>) -> MentionDiff {
    MentionDiff {
        to_add: new.difference(old).copied().collect(),
        to_remove: old.difference(new).copied().collect(),
    }
}

/// Keeps users' mentioned-sets and MENTION notifications in step with a
/// content's mention list.
#[derive(Clone)]
pub struct MentionSynchronizer {
    store: Arc<dyn ContentStore>,
    notifications: NotificationService,
}

impl MentionSynchronizer {
    pub fn new(store: Arc<dyn ContentStore>, notifications: NotificationService) -> Self {
        Self {
            store,
            notifications,
        }
    }

    /// Maps extracted usernames to user ids. Unknown names are dropped.
    pub async fn resolve(&self, usernames: &[String]) -> ServiceResult<BTreeSet<Uuid>> {
        if usernames.is_empty() {
            return Ok(BTreeSet::new());
        }
        let users = self.store.find_users_by_usernames(usernames).await?;
        Ok(users.into_iter().map(|u| u.id).collect())
    }

    /// Applies the diff between `old` and `new` for content written by `author_id`.
    pub async fn sync(
        &self,
        author_id: Uuid,
        target: ContentRef,
        old: &BTreeSet<Uuid>,
        new: &BTreeSet<Uuid>,
    ) -> ServiceResult<MentionDiff> {
        let diff = diff_mentions(old, new);

        for user_id in &diff.to_add {
            self.store
                .add_user_ref(*user_id, RefSet::Mentioned, target)
                .await?;
            self.notifications
                .notify(NotificationType::Mention, author_id, *user_id, Some(target))
                .await?;
        }

        for user_id in &diff.to_remove {
            self.store
                .remove_user_ref(*user_id, RefSet::Mentioned, target)
                .await?;
            self.notifications
                .retract(
                    NotificationType::Mention,
                    author_id,
                    *user_id,
                    Some(target.id),
                )
                .await?;
        }

        if !diff.is_empty() {
            debug!(
                content_id = %target.id,
                added = diff.to_add.len(),
                removed = diff.to_remove.len(),
                "Mentions synchronized"
            );
        }
        Ok(diff)
    }
}
