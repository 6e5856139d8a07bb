use async_trait::async_trait;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{ContentStore, NotificationFilter, PostOrder, PostQuery, RepostQuery};
use crate::domain::{
    Content, ContentKind, ContentRef, Counter, HashtagCount, Notification, NotificationKey,
    Profile, RefSet, RelationTally, Repost, User,
};
use crate::error::{StoreError, StoreResult};

#[derive(Default)]
struct State {
    users: HashMap<Uuid, User>,
    contents: HashMap<Uuid, Content>,
    reposts: HashMap<Uuid, Repost>,
    notifications: HashMap<Uuid, Notification>,
}

impl State {
    fn content(&self, target: ContentRef) -> Option<&Content> {
        self.contents.get(&target.id).filter(|c| c.kind == target.kind)
    }

    fn content_mut(&mut self, target: ContentRef) -> Option<&mut Content> {
        self.contents
            .get_mut(&target.id)
            .filter(|c| c.kind == target.kind)
    }
}

/// Arena of id-keyed maps behind a single lock, so each trait call is atomic.
#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored notifications; handy for assertions.
    pub async fn notification_count(&self) -> usize {
        self.state.read().await.notifications.len()
    }

    pub async fn all_notifications(&self) -> Vec<Notification> {
        self.state.read().await.notifications.values().cloned().collect()
    }
}

fn page<T>(items: Vec<T>, skip: u64, limit: u64) -> Vec<T> {
    items
        .into_iter()
        .skip(usize::try_from(skip).unwrap_or(usize::MAX))
        .take(usize::try_from(limit).unwrap_or(usize::MAX))
        .collect()
}

fn newest_first(a: &Content, b: &Content) -> Ordering {
    b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id))
}

fn compare_posts(order: PostOrder, a: &Content, b: &Content) -> Ordering {
    match order {
        PostOrder::Newest => newest_first(a, b),
        PostOrder::MostLiked => b
            .amt_likes
            .cmp(&a.amt_likes)
            .then_with(|| newest_first(a, b)),
        PostOrder::MostControversial => b
            .controversy_ratio()
            .partial_cmp(&a.controversy_ratio())
            .unwrap_or(Ordering::Equal)
            .then_with(|| newest_first(a, b)),
    }
}

fn author_allowed(authors: &Option<Vec<Uuid>>, author_id: Uuid) -> bool {
    authors.as_ref().map_or(true, |ids| ids.contains(&author_id))
}

#[async_trait]
impl ContentStore for InMemoryStore {
    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let state = self.state.read().await;
        Ok(state
            .users
            .values()
            .find(|u| u.username.eq_ignore_ascii_case(username))
            .cloned())
    }

    async fn find_users_by_usernames(&self, usernames: &[String]) -> StoreResult<Vec<User>> {
        let state = self.state.read().await;
        Ok(state
            .users
            .values()
            .filter(|u| {
                usernames
                    .iter()
                    .any(|name| u.username.eq_ignore_ascii_case(name))
            })
            .cloned()
            .collect())
    }

    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if state
            .users
            .values()
            .any(|u| u.username.eq_ignore_ascii_case(&user.username))
        {
            return Err(StoreError::Duplicate(format!(
                "username '{}' already exists",
                user.username
            )));
        }
        state.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn update_profile(&self, user_id: Uuid, profile: &Profile) -> StoreResult<bool> {
        let mut state = self.state.write().await;
        Ok(match state.users.get_mut(&user_id) {
            Some(user) => {
                user.profile = profile.clone();
                true
            }
            None => false,
        })
    }

    async fn delete_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.state.write().await.users.remove(&id))
    }

    async fn add_user_ref(
        &self,
        user_id: Uuid,
        set: RefSet,
        target: ContentRef,
    ) -> StoreResult<bool> {
        let mut state = self.state.write().await;
        Ok(match state.users.get_mut(&user_id) {
            Some(user) => user.refs_mut(target.kind).get_mut(set).insert(target.id),
            None => false,
        })
    }

    async fn remove_user_ref(
        &self,
        user_id: Uuid,
        set: RefSet,
        target: ContentRef,
    ) -> StoreResult<bool> {
        let mut state = self.state.write().await;
        Ok(match state.users.get_mut(&user_id) {
            Some(user) => user.refs_mut(target.kind).get_mut(set).remove(&target.id),
            None => false,
        })
    }

    async fn pull_user_refs(&self, set: RefSet, target: ContentRef) -> StoreResult<u64> {
        let mut state = self.state.write().await;
        let mut affected = 0;
        for user in state.users.values_mut() {
            if user.refs_mut(target.kind).get_mut(set).remove(&target.id) {
                affected += 1;
            }
        }
        Ok(affected)
    }

    async fn link_follow(&self, follower_id: Uuid, followee_id: Uuid) -> StoreResult<bool> {
        let mut state = self.state.write().await;
        if !state.users.contains_key(&follower_id) || !state.users.contains_key(&followee_id) {
            return Ok(false);
        }
        let linked = state
            .users
            .get_mut(&follower_id)
            .map(|u| u.following.insert(followee_id))
            .unwrap_or(false);
        if linked {
            if let Some(followee) = state.users.get_mut(&followee_id) {
                followee.followers.insert(follower_id);
            }
        }
        Ok(linked)
    }

    async fn unlink_follow(&self, follower_id: Uuid, followee_id: Uuid) -> StoreResult<bool> {
        let mut state = self.state.write().await;
        let unlinked = state
            .users
            .get_mut(&follower_id)
            .map(|u| u.following.remove(&followee_id))
            .unwrap_or(false);
        if let Some(followee) = state.users.get_mut(&followee_id) {
            followee.followers.remove(&follower_id);
        }
        Ok(unlinked)
    }

    async fn find_content(&self, target: ContentRef) -> StoreResult<Option<Content>> {
        Ok(self.state.read().await.content(target).cloned())
    }

    async fn insert_content(&self, content: &Content) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if state.contents.contains_key(&content.id) {
            return Err(StoreError::Duplicate(format!("content {}", content.id)));
        }
        state.contents.insert(content.id, content.clone());
        Ok(())
    }

    async fn update_content(&self, content: &Content) -> StoreResult<bool> {
        let mut state = self.state.write().await;
        let Some(stored) = state.content_mut(content.reference()) else {
            return Ok(false);
        };
        stored.body = content.body.clone();
        stored.original_body = content.original_body.clone();
        stored.image_url = content.image_url.clone();
        stored.hashtags = content.hashtags.clone();
        stored.mentioned_user_ids = content.mentioned_user_ids.clone();
        Ok(true)
    }

    async fn delete_content(&self, target: ContentRef) -> StoreResult<Option<Content>> {
        let mut state = self.state.write().await;
        if state.content(target).is_none() {
            return Ok(None);
        }
        Ok(state.contents.remove(&target.id))
    }

    async fn adjust_counter(
        &self,
        target: ContentRef,
        counter: Counter,
        delta: i64,
        clamp: bool,
    ) -> StoreResult<Option<i64>> {
        let mut state = self.state.write().await;
        let Some(content) = state.content_mut(target) else {
            return Ok(None);
        };
        let slot = match counter {
            Counter::Likes => &mut content.amt_likes,
            Counter::Comments => &mut content.amt_comments,
            Counter::Reposts => &mut content.amt_reposts,
        };
        *slot += delta;
        if clamp && *slot < 0 {
            *slot = 0;
        }
        Ok(Some(*slot))
    }

    async fn set_counters(&self, target: ContentRef, tally: RelationTally) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if let Some(content) = state.content_mut(target) {
            content.amt_likes = tally.likes;
            content.amt_comments = tally.comments;
            content.amt_reposts = tally.reposts;
        }
        Ok(())
    }

    async fn find_posts(&self, query: &PostQuery) -> StoreResult<Vec<Content>> {
        let state = self.state.read().await;
        let mut posts: Vec<Content> = state
            .contents
            .values()
            .filter(|c| c.kind == ContentKind::Post && author_allowed(&query.authors, c.author_id))
            .cloned()
            .collect();
        posts.sort_by(|a, b| compare_posts(query.order, a, b));
        Ok(page(posts, query.skip, query.limit))
    }

    async fn find_comments(
        &self,
        parent: ContentRef,
        skip: u64,
        limit: u64,
    ) -> StoreResult<Vec<Content>> {
        let state = self.state.read().await;
        let mut comments: Vec<Content> = state
            .contents
            .values()
            .filter(|c| c.parent == Some(parent))
            .cloned()
            .collect();
        comments.sort_by(newest_first);
        Ok(page(comments, skip, limit))
    }

    async fn list_content_ids(
        &self,
        kind: ContentKind,
        skip: u64,
        limit: u64,
    ) -> StoreResult<Vec<Uuid>> {
        let state = self.state.read().await;
        let mut items: Vec<&Content> = state.contents.values().filter(|c| c.kind == kind).collect();
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(page(items.into_iter().map(|c| c.id).collect(), skip, limit))
    }

    async fn tally_relations(&self, target: ContentRef) -> StoreResult<RelationTally> {
        let state = self.state.read().await;
        let likes = state
            .users
            .values()
            .filter(|u| u.has_ref(RefSet::Liked, target))
            .count() as i64;
        let reposts = state
            .reposts
            .values()
            .filter(|r| r.original() == target)
            .count() as i64;
        let comments = state
            .contents
            .values()
            .filter(|c| c.parent == Some(target))
            .count() as i64;
        Ok(RelationTally {
            likes,
            comments,
            reposts,
        })
    }

    async fn hashtag_counts(&self) -> StoreResult<Vec<HashtagCount>> {
        let state = self.state.read().await;
        let mut counts: BTreeMap<String, u64> = BTreeMap::new();
        for content in state.contents.values() {
            for tag in &content.hashtags {
                *counts.entry(tag.clone()).or_default() += 1;
            }
        }
        Ok(counts
            .into_iter()
            .map(|(tag, count)| HashtagCount { tag, count })
            .collect())
    }

    async fn find_by_hashtag(
        &self,
        tag: &str,
        skip: u64,
        limit: u64,
    ) -> StoreResult<Vec<Content>> {
        let state = self.state.read().await;
        let mut tagged: Vec<Content> = state
            .contents
            .values()
            .filter(|c| c.hashtags.contains(tag))
            .cloned()
            .collect();
        tagged.sort_by(newest_first);
        Ok(page(tagged, skip, limit))
    }

    async fn insert_repost(&self, repost: &Repost) -> StoreResult<bool> {
        let mut state = self.state.write().await;
        let exists = state.reposts.values().any(|r| {
            r.author_id == repost.author_id && r.original_id == repost.original_id
        });
        if exists {
            return Ok(false);
        }
        state.reposts.insert(repost.id, repost.clone());
        Ok(true)
    }

    async fn find_repost(
        &self,
        author_id: Uuid,
        original_id: Uuid,
    ) -> StoreResult<Option<Repost>> {
        let state = self.state.read().await;
        Ok(state
            .reposts
            .values()
            .find(|r| r.author_id == author_id && r.original_id == original_id)
            .cloned())
    }

    async fn delete_repost(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.state.write().await.reposts.remove(&id).is_some())
    }

    async fn delete_reposts_of(&self, original_id: Uuid) -> StoreResult<Vec<Repost>> {
        let mut state = self.state.write().await;
        let ids: Vec<Uuid> = state
            .reposts
            .values()
            .filter(|r| r.original_id == original_id)
            .map(|r| r.id)
            .collect();
        Ok(ids
            .into_iter()
            .filter_map(|id| state.reposts.remove(&id))
            .collect())
    }

    async fn find_reposts(&self, query: &RepostQuery) -> StoreResult<Vec<Repost>> {
        let state = self.state.read().await;
        let mut reposts: Vec<Repost> = state
            .reposts
            .values()
            .filter(|r| author_allowed(&query.authors, r.author_id))
            .cloned()
            .collect();
        reposts.sort_by(|a, b| {
            b.reposted_at
                .cmp(&a.reposted_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(page(reposts, query.skip, query.limit))
    }

    async fn insert_notification_if_absent(
        &self,
        notification: &Notification,
    ) -> StoreResult<bool> {
        let mut state = self.state.write().await;
        let key = notification.key();
        if state.notifications.values().any(|n| n.key() == key) {
            return Ok(false);
        }
        state
            .notifications
            .insert(notification.id, notification.clone());
        Ok(true)
    }

    async fn delete_notification_by_key(&self, key: &NotificationKey) -> StoreResult<bool> {
        let mut state = self.state.write().await;
        let id = state
            .notifications
            .values()
            .find(|n| n.key() == *key)
            .map(|n| n.id);
        Ok(match id {
            Some(id) => state.notifications.remove(&id).is_some(),
            None => false,
        })
    }

    async fn delete_notifications(&self, filter: &NotificationFilter) -> StoreResult<u64> {
        let mut state = self.state.write().await;
        let before = state.notifications.len();
        state.notifications.retain(|_, n| !filter.matches(n));
        Ok((before - state.notifications.len()) as u64)
    }

    async fn find_notification(&self, id: Uuid) -> StoreResult<Option<Notification>> {
        Ok(self.state.read().await.notifications.get(&id).cloned())
    }

    async fn delete_notification(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.state.write().await.notifications.remove(&id).is_some())
    }

    async fn find_notifications(
        &self,
        recipient_id: Uuid,
        skip: u64,
        limit: u64,
    ) -> StoreResult<Vec<Notification>> {
        let state = self.state.read().await;
        let mut items: Vec<Notification> = state
            .notifications
            .values()
            .filter(|n| n.recipient_id == recipient_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        Ok(page(items, skip, limit))
    }
}
