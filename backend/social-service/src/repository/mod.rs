//! Content store seam.
//!
//! Every service talks to persistence through [`ContentStore`]. Membership
//! and counter primitives are atomic per call so that check-then-act races in
//! callers collapse into a single conditional write.

pub mod memory;
pub mod postgres;

pub use memory::InMemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{
    Content, ContentKind, ContentRef, Counter, HashtagCount, Notification, NotificationKey,
    NotificationType, Profile, RefSet, RelationTally, Repost, User,
};
use crate::error::StoreResult;

/// Rank key applied to the post population.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostOrder {
    /// createdAt desc
    Newest,
    /// (amtLikes desc, createdAt desc)
    MostLiked,
    /// (controversyRatio desc, createdAt desc), ratio computed per query
    MostControversial,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostQuery {
    /// `None` means no author restriction.
    pub authors: Option<Vec<Uuid>>,
    pub order: PostOrder,
    pub skip: u64,
    pub limit: u64,
}

/// Reposts sorted by repostedAt desc.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepostQuery {
    pub authors: Option<Vec<Uuid>>,
    pub skip: u64,
    pub limit: u64,
}

/// Conjunctive filter for bulk notification deletion. Unset fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationFilter {
    pub kind: Option<NotificationType>,
    pub sender_id: Option<Uuid>,
    pub recipient_id: Option<Uuid>,
    pub target_id: Option<Uuid>,
}

impl NotificationFilter {
    pub fn matches(&self, notification: &Notification) -> bool {
        self.kind.map_or(true, |k| notification.kind == k)
            && self.sender_id.map_or(true, |s| notification.sender_id == s)
            && self.recipient_id.map_or(true, |r| notification.recipient_id == r)
            && self
                .target_id
                .map_or(true, |t| notification.target.map(|c| c.id) == Some(t))
    }
}

#[async_trait]
pub trait ContentStore: Send + Sync {
    // ---- users ----
    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>>;

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>>;

    /// Case-insensitive lookup; unknown names are simply absent from the result.
    async fn find_users_by_usernames(&self, usernames: &[String]) -> StoreResult<Vec<User>>;

    /// Fails with `StoreError::Duplicate` when the username is taken.
    async fn insert_user(&self, user: &User) -> StoreResult<()>;

    /// Overwrites the profile section. Returns false when the user is gone.
    async fn update_profile(&self, user_id: Uuid, profile: &Profile) -> StoreResult<bool>;

    /// Removes the user row only; callers unwind relations first.
    async fn delete_user(&self, id: Uuid) -> StoreResult<Option<User>>;

    /// Adds `content_id` to the user's set. Returns false if it was already present
    /// or the user does not exist.
    async fn add_user_ref(
        &self,
        user_id: Uuid,
        set: RefSet,
        target: ContentRef,
    ) -> StoreResult<bool>;

    /// Removes `content_id` from the user's set. Returns false if it was absent.
    async fn remove_user_ref(
        &self,
        user_id: Uuid,
        set: RefSet,
        target: ContentRef,
    ) -> StoreResult<bool>;

    /// Pulls `target` out of that set on every user. Returns affected user count.
    async fn pull_user_refs(&self, set: RefSet, target: ContentRef) -> StoreResult<u64>;

    /// Links follower -> followee on both users. Returns false if already linked.
    async fn link_follow(&self, follower_id: Uuid, followee_id: Uuid) -> StoreResult<bool>;

    /// Unlinks follower -> followee on both users. Returns false if not linked.
    async fn unlink_follow(&self, follower_id: Uuid, followee_id: Uuid) -> StoreResult<bool>;

    // ---- content ----
    async fn find_content(&self, target: ContentRef) -> StoreResult<Option<Content>>;

    async fn insert_content(&self, content: &Content) -> StoreResult<()>;

    /// Persists body, originalBody, media, hashtags and mentions. Counters are
    /// only ever moved through [`ContentStore::adjust_counter`]. Returns false
    /// when no such content exists.
    async fn update_content(&self, content: &Content) -> StoreResult<bool>;

    async fn delete_content(&self, target: ContentRef) -> StoreResult<Option<Content>>;

    /// Applies `delta` atomically. With `clamp` the result never drops below 0.
    /// Returns the new value, or `None` when the content does not exist.
    async fn adjust_counter(
        &self,
        target: ContentRef,
        counter: Counter,
        delta: i64,
        clamp: bool,
    ) -> StoreResult<Option<i64>>;

    /// Overwrites all three counters; reconciliation only.
    async fn set_counters(&self, target: ContentRef, tally: RelationTally) -> StoreResult<()>;

    async fn find_posts(&self, query: &PostQuery) -> StoreResult<Vec<Content>>;

    /// Direct children of `parent`, newest first.
    async fn find_comments(
        &self,
        parent: ContentRef,
        skip: u64,
        limit: u64,
    ) -> StoreResult<Vec<Content>>;

    /// Ids of one population in creation order, for batch jobs.
    async fn list_content_ids(
        &self,
        kind: ContentKind,
        skip: u64,
        limit: u64,
    ) -> StoreResult<Vec<Uuid>>;

    /// Counts likers, reposts and direct children of `target` from the relations.
    async fn tally_relations(&self, target: ContentRef) -> StoreResult<RelationTally>;

    /// Occurrences of every hashtag across posts and comments.
    async fn hashtag_counts(&self) -> StoreResult<Vec<HashtagCount>>;

    /// Posts and comments tagged `tag`, newest first.
    async fn find_by_hashtag(&self, tag: &str, skip: u64, limit: u64)
        -> StoreResult<Vec<Content>>;

    // ---- reposts ----
    /// Returns false when this author already reposted this original.
    async fn insert_repost(&self, repost: &Repost) -> StoreResult<bool>;

    async fn find_repost(&self, author_id: Uuid, original_id: Uuid)
        -> StoreResult<Option<Repost>>;

    async fn delete_repost(&self, id: Uuid) -> StoreResult<bool>;

    /// Deletes every repost of `original_id`, returning the removed rows.
    async fn delete_reposts_of(&self, original_id: Uuid) -> StoreResult<Vec<Repost>>;

    async fn find_reposts(&self, query: &RepostQuery) -> StoreResult<Vec<Repost>>;

    // ---- notifications ----
    /// Upsert-by-key: inserts unless a notification with the same key exists.
    async fn insert_notification_if_absent(&self, notification: &Notification)
        -> StoreResult<bool>;

    async fn delete_notification_by_key(&self, key: &NotificationKey) -> StoreResult<bool>;

    async fn delete_notifications(&self, filter: &NotificationFilter) -> StoreResult<u64>;

    async fn find_notification(&self, id: Uuid) -> StoreResult<Option<Notification>>;

    async fn delete_notification(&self, id: Uuid) -> StoreResult<bool>;

    /// Recipient inbox, newest first.
    async fn find_notifications(
        &self,
        recipient_id: Uuid,
        skip: u64,
        limit: u64,
    ) -> StoreResult<Vec<Notification>>;
}
