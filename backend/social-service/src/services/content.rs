use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::media::{upload_error, MediaStore, MediaUpload};
use super::mentions::MentionSynchronizer;
use super::notifications::{FanoutDispatcher, FollowerFanout, NotificationService};
use super::{page_window, require_principal, text_length};
use super::text_extraction::TextExtractor;
use crate::config::ContentConfig;
use crate::domain::{
    Content, ContentKind, ContentRef, Counter, NotificationType, Principal, RefSet, User,
};
use crate::error::{ServiceError, ServiceResult};
use crate::metrics::record_mutation;
use crate::repository::ContentStore;

#[derive(Debug, Clone, Default)]
pub struct NewContent {
    pub body: String,
    /// Set for comments. The created content's kind follows from it.
    pub parent: Option<ContentRef>,
    pub media: Option<MediaUpload>,
}

#[derive(Debug, Clone, Default)]
pub struct ContentEdit {
    pub body: String,
    /// Replaces the current media when present; otherwise media is kept.
    pub media: Option<MediaUpload>,
}

/// Create, edit and delete for posts and comments, with every derived
/// counter, reference set and notification kept in step.
#[derive(Clone)]
pub struct ContentService {
    store: Arc<dyn ContentStore>,
    media: Arc<dyn MediaStore>,
    extractor: Arc<dyn TextExtractor>,
    mentions: MentionSynchronizer,
    notifications: NotificationService,
    fanout: Arc<FanoutDispatcher>,
    config: ContentConfig,
}

impl ContentService {
    pub fn new(
        store: Arc<dyn ContentStore>,
        media: Arc<dyn MediaStore>,
        extractor: Arc<dyn TextExtractor>,
        notifications: NotificationService,
        fanout: Arc<FanoutDispatcher>,
        config: ContentConfig,
    ) -> Self {
        let mentions = MentionSynchronizer::new(store.clone(), notifications.clone());
        Self {
            store,
            media,
            extractor,
            mentions,
            notifications,
            fanout,
            config,
        }
    }

    fn body_limit(&self, principal: &Principal) -> usize {
        if principal.verification.has_extended_limit() {
            self.config.extended_body_limit
        } else {
            self.config.standard_body_limit
        }
    }

    fn validate_body(
        &self,
        principal: &Principal,
        kind: ContentKind,
        body: &str,
        has_media: bool,
    ) -> ServiceResult<()> {
        if body.is_empty() && !has_media {
            return Err(ServiceError::validation(format!(
                "A {} must have a body or an image",
                kind
            )));
        }

        let limit = self.body_limit(principal);
        if text_length(body) > limit {
            return Err(ServiceError::validation(format!(
                "{} body exceeds {} characters",
                capitalized(kind),
                limit
            )));
        }
        Ok(())
    }

    async fn discard_media(&self, url: &str) {
        if let Err(err) = self.media.delete(url).await {
            warn!(url = %url, error = %err, "Failed to delete uploaded file");
        }
    }

    pub async fn get(&self, target: ContentRef) -> ServiceResult<Content> {
        self.store
            .find_content(target)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("{} not found", capitalized(target.kind))))
    }

    /// Direct replies to `parent`, newest first.
    pub async fn list_comments(
        &self,
        parent: ContentRef,
        page: u64,
        limit: u64,
    ) -> ServiceResult<Vec<Content>> {
        let (skip, limit) = page_window(page, limit, self.config.max_page_limit)?;
        self.get(parent).await?;
        Ok(self.store.find_comments(parent, skip, limit).await?)
    }

    pub async fn create(
        &self,
        principal: Option<&Principal>,
        input: NewContent,
    ) -> ServiceResult<Content> {
        let result = self.apply_create(principal, input).await;
        record_mutation("content_create", &result);
        result
    }

    async fn apply_create(
        &self,
        principal: Option<&Principal>,
        input: NewContent,
    ) -> ServiceResult<Content> {
        let kind = if input.parent.is_some() {
            ContentKind::Comment
        } else {
            ContentKind::Post
        };
        let principal = require_principal(principal, &format!("create a {}", kind))?;
        self.validate_body(principal, kind, &input.body, input.media.is_some())?;

        let author = self
            .store
            .find_user(principal.id)
            .await?
            .ok_or_else(|| ServiceError::not_found("User not found"))?;

        let parent = match input.parent {
            Some(parent_ref) => Some(
                self.store
                    .find_content(parent_ref)
                    .await?
                    .ok_or_else(|| ServiceError::not_found("Parent not found"))?,
            ),
            None => None,
        };

        let mut content = Content::new(author.id, input.body, input.parent);
        if let Some(upload) = input.media {
            content.image_url = Some(self.media.upload(upload, None).await.map_err(upload_error)?);
        }

        content.hashtags = self.extractor.extract_hashtags(&content.body);
        let usernames = self.extractor.extract_mentions(&content.body);
        content.mentioned_user_ids = self.mentions.resolve(&usernames).await?;

        if let Err(err) = self.store.insert_content(&content).await {
            if let Some(url) = &content.image_url {
                self.discard_media(url).await;
            }
            return Err(err.into());
        }

        let target = content.reference();
        self.store
            .add_user_ref(author.id, RefSet::Owned, target)
            .await?;

        if let Some(parent) = &parent {
            self.store
                .adjust_counter(parent.reference(), Counter::Comments, 1, true)
                .await?;
            self.notifications
                .notify(
                    NotificationType::Comment,
                    author.id,
                    parent.author_id,
                    Some(parent.reference()),
                )
                .await?;
        }

        self.mentions
            .sync(
                author.id,
                target,
                &BTreeSet::new(),
                &content.mentioned_user_ids,
            )
            .await?;

        if kind == ContentKind::Post {
            self.fanout
                .dispatch(FollowerFanout {
                    author_id: author.id,
                    post: target,
                    followers: author.followers.iter().copied().collect(),
                })
                .await;
        }

        info!(
            user_id = %author.id,
            content_id = %content.id,
            kind = %kind,
            "Content created"
        );
        Ok(content)
    }

    pub async fn edit(
        &self,
        principal: Option<&Principal>,
        target: ContentRef,
        input: ContentEdit,
    ) -> ServiceResult<Content> {
        let result = self.apply_edit(principal, target, input).await;
        record_mutation("content_edit", &result);
        result
    }

    async fn apply_edit(
        &self,
        principal: Option<&Principal>,
        target: ContentRef,
        input: ContentEdit,
    ) -> ServiceResult<Content> {
        let principal = require_principal(principal, &format!("edit a {}", target.kind))?;
        let mut content = self.get(target).await?;

        if content.author_id != principal.id {
            return Err(ServiceError::forbidden(format!(
                "You are not authorized to edit this {}",
                target.kind
            )));
        }

        let has_media = input.media.is_some() || content.image_url.is_some();
        self.validate_body(principal, target.kind, &input.body, has_media)?;

        let fresh_upload = input.media.is_some();
        let replaced_media = match input.media {
            Some(upload) => {
                let url = self.media.upload(upload, None).await.map_err(upload_error)?;
                content.image_url.replace(url)
            }
            None => None,
        };

        if content.original_body.is_none() {
            content.original_body = Some(content.body.clone());
        }
        if content.original_body.as_deref() == Some(input.body.as_str()) {
            content.original_body = None;
        }
        content.body = input.body;

        content.hashtags = self.extractor.extract_hashtags(&content.body);
        let usernames = self.extractor.extract_mentions(&content.body);
        let new_mentions = self.mentions.resolve(&usernames).await?;
        let old_mentions = std::mem::replace(&mut content.mentioned_user_ids, new_mentions);

        if !self.store.update_content(&content).await? {
            // Deleted while the edit was in flight.
            if let Some(url) = content.image_url.as_deref().filter(|_| fresh_upload) {
                self.discard_media(url).await;
            }
            return Err(ServiceError::not_found(format!(
                "{} not found",
                capitalized(target.kind)
            )));
        }

        self.mentions
            .sync(
                content.author_id,
                target,
                &old_mentions,
                &content.mentioned_user_ids,
            )
            .await?;

        if let Some(old_url) = replaced_media {
            self.discard_media(&old_url).await;
        }

        debug!(content_id = %content.id, edited = content.is_edited(), "Content edited");
        Ok(content)
    }

    pub async fn delete(
        &self,
        principal: Option<&Principal>,
        target: ContentRef,
    ) -> ServiceResult<Content> {
        let result = self.apply_delete(principal, target).await;
        record_mutation("content_delete", &result);
        result
    }

    /// Replies are left in place when their parent goes away.
    async fn apply_delete(
        &self,
        principal: Option<&Principal>,
        target: ContentRef,
    ) -> ServiceResult<Content> {
        let principal = require_principal(principal, &format!("delete a {}", target.kind))?;
        let content = self.get(target).await?;

        if content.author_id != principal.id && !principal.is_admin() {
            return Err(ServiceError::forbidden(format!(
                "You are not authorized to delete this {}",
                target.kind
            )));
        }

        let content = self
            .cascade_delete(target)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("{} not found", capitalized(target.kind))))?;

        debug!(user_id = %principal.id, content_id = %content.id, "Content deleted on request");
        Ok(content)
    }

    /// Deletes everything `author` wrote, comments before posts so that a
    /// parent still exists when its amtComments is decremented. Returns the
    /// number of items removed.
    pub async fn purge_author(&self, author: &User) -> ServiceResult<u64> {
        let comments = author.comments.owned.iter().map(|id| ContentRef::comment(*id));
        let posts = author.posts.owned.iter().map(|id| ContentRef::post(*id));

        let mut removed = 0;
        for target in comments.chain(posts) {
            if self.cascade_delete(target).await?.is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Removes `target` and unwinds every counter, reference and notification
    /// that points at it. `None` when it was already gone.
    async fn cascade_delete(&self, target: ContentRef) -> ServiceResult<Option<Content>> {
        let Some(content) = self.store.delete_content(target).await? else {
            return Ok(None);
        };

        if let Some(url) = &content.image_url {
            self.discard_media(url).await;
        }

        if let Some(parent_ref) = content.parent {
            if let Some(parent) = self.store.find_content(parent_ref).await? {
                self.store
                    .adjust_counter(parent_ref, Counter::Comments, -1, true)
                    .await?;
                self.notifications
                    .retract(
                        NotificationType::Comment,
                        content.author_id,
                        parent.author_id,
                        Some(parent_ref.id),
                    )
                    .await?;
            }
        }

        self.store
            .remove_user_ref(content.author_id, RefSet::Owned, target)
            .await?;

        let unliked = self.store.pull_user_refs(RefSet::Liked, target).await?;
        let unreposted = self.store.pull_user_refs(RefSet::Reposted, target).await?;
        let reposts = self.store.delete_reposts_of(target.id).await?;

        self.mentions
            .sync(
                content.author_id,
                target,
                &content.mentioned_user_ids,
                &BTreeSet::new(),
            )
            .await?;

        let notifications = self.notifications.retract_for_target(target.id).await?;

        info!(
            author_id = %content.author_id,
            content_id = %content.id,
            kind = %target.kind,
            unliked,
            unreposted,
            reposts = reposts.len(),
            notifications,
            "Content deleted"
        );
        Ok(Some(content))
    }
}

fn capitalized(kind: ContentKind) -> &'static str {
    match kind {
        ContentKind::Post => "Post",
        ContentKind::Comment => "Comment",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::VerificationTier;
    use crate::error::MediaError;
    use crate::repository::InMemoryStore;
    use crate::services::media::MockMediaStore;
    use crate::services::text_extraction::RegexTextExtractor;

    fn service_on(store: Arc<InMemoryStore>, media: MockMediaStore) -> ContentService {
        let notifications = NotificationService::new(store.clone());
        let fanout = Arc::new(FanoutDispatcher::inline(notifications.clone()));
        ContentService::new(
            store,
            Arc::new(media),
            Arc::new(RegexTextExtractor),
            notifications,
            fanout,
            ContentConfig::default(),
        )
    }

    async fn service_with(media: MockMediaStore) -> (Arc<InMemoryStore>, ContentService, Principal) {
        let store = Arc::new(InMemoryStore::new());
        let alice = User::new("alice", VerificationTier::Unverified);
        store.insert_user(&alice).await.unwrap();
        let service = service_on(store.clone(), media);
        (store, service, Principal::from(&alice))
    }

    #[tokio::test]
    async fn failed_upload_aborts_create() {
        let mut media = MockMediaStore::new();
        media
            .expect_upload()
            .returning(|_, _| Err(MediaError::Io(std::io::Error::other("disk full"))));
        let (store, service, alice) = service_with(media).await;

        let err = service
            .create(
                Some(&alice),
                NewContent {
                    body: "with picture".into(),
                    parent: None,
                    media: Some(MediaUpload::new("a.png", vec![1])),
                },
            )
            .await
            .unwrap_err();

        assert!(err.is_internal());
        let user = store.find_user(alice.id).await.unwrap().unwrap();
        assert!(user.posts.owned.is_empty());
    }

    #[tokio::test]
    async fn failed_media_cleanup_does_not_fail_delete() {
        let mut media = MockMediaStore::new();
        media
            .expect_upload()
            .returning(|_, _| Ok("/uploads/1-a.png".to_string()));
        media
            .expect_delete()
            .times(1)
            .returning(|url| Err(MediaError::Missing(url.to_string())));
        let (store, service, alice) = service_with(media).await;

        let post = service
            .create(
                Some(&alice),
                NewContent {
                    body: String::new(),
                    parent: None,
                    media: Some(MediaUpload::new("a.png", vec![1])),
                },
            )
            .await
            .unwrap();
        assert_eq!(post.image_url.as_deref(), Some("/uploads/1-a.png"));

        service.delete(Some(&alice), post.reference()).await.unwrap();
        assert!(store.find_content(post.reference()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn replacing_media_discards_old_file() {
        let mut media = MockMediaStore::new();
        let mut seq = mockall::Sequence::new();
        media
            .expect_upload()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok("/uploads/old.png".to_string()));
        media
            .expect_upload()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok("/uploads/new.png".to_string()));
        media
            .expect_delete()
            .withf(|url| url == "/uploads/old.png")
            .times(1)
            .returning(|_| Ok(()));
        let (_, service, alice) = service_with(media).await;

        let post = service
            .create(
                Some(&alice),
                NewContent {
                    body: "pic".into(),
                    parent: None,
                    media: Some(MediaUpload::new("old.png", vec![1])),
                },
            )
            .await
            .unwrap();

        let edited = service
            .edit(
                Some(&alice),
                post.reference(),
                ContentEdit {
                    body: "pic".into(),
                    media: Some(MediaUpload::new("new.png", vec![2])),
                },
            )
            .await
            .unwrap();
        assert_eq!(edited.image_url.as_deref(), Some("/uploads/new.png"));
    }

    #[tokio::test]
    async fn edit_of_concurrently_deleted_content_is_not_found() {
        let store = Arc::new(InMemoryStore::new());
        let alice = User::new("alice", VerificationTier::Unverified);
        let bob = User::new("bob", VerificationTier::Unverified);
        store.insert_user(&alice).await.unwrap();
        store.insert_user(&bob).await.unwrap();
        let post = Content::new(alice.id, "hi", None);
        store.insert_content(&post).await.unwrap();

        // The upload lands after the edit has loaded the post; delete it then.
        let mut media = MockMediaStore::new();
        let racing = store.clone();
        let target = post.reference();
        media.expect_upload().times(1).returning(move |_, _| {
            futures::executor::block_on(racing.delete_content(target)).unwrap();
            Ok("/uploads/late.png".to_string())
        });
        media
            .expect_delete()
            .withf(|url| url == "/uploads/late.png")
            .times(1)
            .returning(|_| Ok(()));
        let service = service_on(store.clone(), media);

        let err = service
            .edit(
                Some(&Principal::from(&alice)),
                target,
                ContentEdit {
                    body: "hi @bob".into(),
                    media: Some(MediaUpload::new("late.png", vec![1])),
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::NotFound(_)));
        let bob = store.find_user(bob.id).await.unwrap().unwrap();
        assert!(bob.posts.mentioned.is_empty());
        assert_eq!(store.notification_count().await, 0);
    }
}
