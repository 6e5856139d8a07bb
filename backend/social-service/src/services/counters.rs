use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use super::notifications::NotificationService;
use super::require_principal;
use crate::config::CountersConfig;
use crate::domain::{
    Content, ContentKind, ContentRef, Counter, NotificationType, Principal, RefSet, Repost,
    RepostView, User,
};
use crate::error::{ServiceError, ServiceResult};
use crate::metrics::record_mutation;
use crate::repository::ContentStore;

const RECONCILE_BATCH: u64 = 500;

/// Like, repost and follow bookkeeping.
///
/// Every counter move is gated on a membership write that reports a change,
/// so repeating a request cannot apply it twice.
///
/// Reconciliation recomputes counters from relations and repairs drift.
#[derive(Clone)]
pub struct CounterService {
    store: Arc<dyn ContentStore>,
    notifications: NotificationService,
    config: CountersConfig,
}

impl CounterService {
    pub fn new(
        store: Arc<dyn ContentStore>,
        notifications: NotificationService,
        config: CountersConfig,
    ) -> Self {
        Self {
            store,
            notifications,
            config,
        }
    }

    async fn load(&self, target: ContentRef) -> ServiceResult<Content> {
        self.store
            .find_content(target)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("{} not found", target.kind)))
    }

    // ========== Likes ==========

    pub async fn like(
        &self,
        principal: Option<&Principal>,
        target: ContentRef,
    ) -> ServiceResult<Content> {
        let result = self.apply_like(principal, target).await;
        record_mutation("like", &result);
        result
    }

    async fn apply_like(
        &self,
        principal: Option<&Principal>,
        target: ContentRef,
    ) -> ServiceResult<Content> {
        let principal = require_principal(principal, "like content")?;
        let mut content = self.load(target).await?;

        if !self
            .store
            .add_user_ref(principal.id, RefSet::Liked, target)
            .await?
        {
            return Ok(content);
        }

        match self
            .store
            .adjust_counter(target, Counter::Likes, 1, true)
            .await?
        {
            Some(value) => content.amt_likes = value,
            None => {
                self.store
                    .remove_user_ref(principal.id, RefSet::Liked, target)
                    .await?;
                return Err(ServiceError::not_found(format!("{} not found", target.kind)));
            }
        }

        self.notifications
            .notify(
                NotificationType::Like,
                principal.id,
                content.author_id,
                Some(target),
            )
            .await?;

        info!(user_id = %principal.id, content_id = %target.id, "Content liked");
        Ok(content)
    }

    pub async fn unlike(
        &self,
        principal: Option<&Principal>,
        target: ContentRef,
    ) -> ServiceResult<Content> {
        let result = self.apply_unlike(principal, target).await;
        record_mutation("unlike", &result);
        result
    }

    async fn apply_unlike(
        &self,
        principal: Option<&Principal>,
        target: ContentRef,
    ) -> ServiceResult<Content> {
        let principal = require_principal(principal, "unlike content")?;
        let mut content = self.load(target).await?;

        if !self
            .store
            .remove_user_ref(principal.id, RefSet::Liked, target)
            .await?
        {
            return Ok(content);
        }

        if let Some(value) = self
            .store
            .adjust_counter(target, Counter::Likes, -1, true)
            .await?
        {
            content.amt_likes = value;
        }

        self.notifications
            .retract(
                NotificationType::Like,
                principal.id,
                content.author_id,
                Some(target.id),
            )
            .await?;

        info!(user_id = %principal.id, content_id = %target.id, "Content unliked");
        Ok(content)
    }

    // ========== Reposts ==========

    pub async fn repost(
        &self,
        principal: Option<&Principal>,
        target: ContentRef,
    ) -> ServiceResult<RepostView> {
        let result = self.apply_repost(principal, target).await;
        record_mutation("repost", &result);
        result
    }

    async fn apply_repost(
        &self,
        principal: Option<&Principal>,
        target: ContentRef,
    ) -> ServiceResult<RepostView> {
        let principal = require_principal(principal, "repost")?;

        if self
            .store
            .find_repost(principal.id, target.id)
            .await?
            .is_some()
        {
            return Err(ServiceError::conflict("You have already reposted this post"));
        }

        let mut original = self.load(target).await?;
        let repost = Repost::new(principal.id, target);

        // Unique (author, original) in the store closes the window after the check above.
        if !self.store.insert_repost(&repost).await? {
            return Err(ServiceError::conflict("You have already reposted this post"));
        }

        if let Some(value) = self
            .store
            .adjust_counter(target, Counter::Reposts, 1, true)
            .await?
        {
            original.amt_reposts = value;
        }

        self.store
            .add_user_ref(principal.id, RefSet::Reposted, target)
            .await?;

        self.notifications
            .notify(
                NotificationType::Repost,
                principal.id,
                original.author_id,
                Some(target),
            )
            .await?;

        info!(user_id = %principal.id, content_id = %target.id, "Content reposted");
        Ok(RepostView::hydrate(&repost, &original))
    }

    pub async fn unrepost(
        &self,
        principal: Option<&Principal>,
        original_id: Uuid,
    ) -> ServiceResult<Repost> {
        let result = self.apply_unrepost(principal, original_id).await;
        record_mutation("unrepost", &result);
        result
    }

    async fn apply_unrepost(
        &self,
        principal: Option<&Principal>,
        original_id: Uuid,
    ) -> ServiceResult<Repost> {
        let principal = require_principal(principal, "unrepost")?;

        let repost = self
            .store
            .find_repost(principal.id, original_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Repost not found"))?;

        let target = repost.original();
        let original = self
            .store
            .find_content(target)
            .await?
            .ok_or_else(|| ServiceError::not_found("Original post not found"))?;

        if !self.store.delete_repost(repost.id).await? {
            // A concurrent unrepost already settled the counter.
            return Ok(repost);
        }

        let clamp = !self.config.legacy_unclamped_unrepost;
        self.store
            .adjust_counter(target, Counter::Reposts, -1, clamp)
            .await?;

        self.store
            .remove_user_ref(principal.id, RefSet::Reposted, target)
            .await?;

        self.notifications
            .retract(
                NotificationType::Repost,
                principal.id,
                original.author_id,
                Some(target.id),
            )
            .await?;

        info!(user_id = %principal.id, content_id = %target.id, "Repost removed");
        Ok(repost)
    }

    // ========== Follows ==========

    /// Returns the followed user with its updated follower set.
    pub async fn follow(
        &self,
        principal: Option<&Principal>,
        followee_id: Uuid,
    ) -> ServiceResult<User> {
        let result = self.apply_follow(principal, followee_id).await;
        record_mutation("follow", &result);
        result
    }

    async fn apply_follow(
        &self,
        principal: Option<&Principal>,
        followee_id: Uuid,
    ) -> ServiceResult<User> {
        let principal = require_principal(principal, "follow users")?;
        if principal.id == followee_id {
            return Err(ServiceError::conflict("You cannot follow yourself"));
        }

        self.store
            .find_user(followee_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("User not found"))?;

        if !self.store.link_follow(principal.id, followee_id).await? {
            return Err(ServiceError::conflict("You are already following this user"));
        }

        self.notifications
            .notify(NotificationType::Follow, principal.id, followee_id, None)
            .await?;

        info!(follower_id = %principal.id, followee_id = %followee_id, "User followed");
        self.store
            .find_user(followee_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("User not found"))
    }

    pub async fn unfollow(
        &self,
        principal: Option<&Principal>,
        followee_id: Uuid,
    ) -> ServiceResult<User> {
        let result = self.apply_unfollow(principal, followee_id).await;
        record_mutation("unfollow", &result);
        result
    }

    async fn apply_unfollow(
        &self,
        principal: Option<&Principal>,
        followee_id: Uuid,
    ) -> ServiceResult<User> {
        let principal = require_principal(principal, "unfollow users")?;
        if principal.id == followee_id {
            return Err(ServiceError::conflict("You cannot unfollow yourself"));
        }

        self.store
            .find_user(followee_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("User not found"))?;

        if !self.store.unlink_follow(principal.id, followee_id).await? {
            return Err(ServiceError::conflict("You are not following this user"));
        }

        self.notifications
            .retract(NotificationType::Follow, principal.id, followee_id, None)
            .await?;

        info!(follower_id = %principal.id, followee_id = %followee_id, "User unfollowed");
        self.store
            .find_user(followee_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("User not found"))
    }

    // ========== Account removal ==========

    /// Takes back every like, repost and follow `user_id` holds, moving the
    /// counters on the other side as unlike, unrepost and unfollow would.
    /// Notifications are left to the caller.
    pub async fn release_user(&self, user_id: Uuid) -> ServiceResult<()> {
        let user = self
            .store
            .find_user(user_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("User not found"))?;

        let mut unliked = 0u64;
        let mut unreposted = 0u64;
        for kind in [ContentKind::Post, ContentKind::Comment] {
            let refs = user.refs(kind);

            for id in &refs.liked {
                let target = ContentRef::new(*id, kind);
                if self
                    .store
                    .remove_user_ref(user.id, RefSet::Liked, target)
                    .await?
                {
                    self.store
                        .adjust_counter(target, Counter::Likes, -1, true)
                        .await?;
                    unliked += 1;
                }
            }

            for id in &refs.reposted {
                let target = ContentRef::new(*id, kind);
                if let Some(repost) = self.store.find_repost(user.id, *id).await? {
                    if self.store.delete_repost(repost.id).await? {
                        self.store
                            .adjust_counter(target, Counter::Reposts, -1, true)
                            .await?;
                        unreposted += 1;
                    }
                }
                self.store
                    .remove_user_ref(user.id, RefSet::Reposted, target)
                    .await?;
            }
        }

        for followee in &user.following {
            self.store.unlink_follow(user.id, *followee).await?;
        }
        for follower in &user.followers {
            self.store.unlink_follow(*follower, user.id).await?;
        }

        info!(
            user_id = %user.id,
            unliked,
            unreposted,
            following = user.following.len(),
            followers = user.followers.len(),
            "Released user relations"
        );
        Ok(())
    }

    // ========== Reconciliation ==========

    /// Recomputes amtLikes, amtComments and amtReposts for every item of
    /// `kind` from the underlying relations. Returns how many were repaired.
    pub async fn reconcile_counters(&self, kind: ContentKind) -> ServiceResult<u64> {
        let mut repaired = 0;
        let mut skip = 0;

        loop {
            let ids = self
                .store
                .list_content_ids(kind, skip, RECONCILE_BATCH)
                .await?;
            if ids.is_empty() {
                break;
            }

            for id in &ids {
                let target = ContentRef::new(*id, kind);
                let Some(content) = self.store.find_content(target).await? else {
                    continue;
                };
                let tally = self.store.tally_relations(target).await?;

                if (content.amt_likes, content.amt_comments, content.amt_reposts)
                    != (tally.likes, tally.comments, tally.reposts)
                {
                    warn!(
                        content_id = %id,
                        stored_likes = content.amt_likes,
                        stored_comments = content.amt_comments,
                        stored_reposts = content.amt_reposts,
                        likes = tally.likes,
                        comments = tally.comments,
                        reposts = tally.reposts,
                        "Counter drift repaired"
                    );
                    self.store.set_counters(target, tally).await?;
                    repaired += 1;
                }
            }

            skip += ids.len() as u64;
        }

        info!(kind = %kind, repaired, "Counter reconciliation finished");
        Ok(repaired)
    }
}
