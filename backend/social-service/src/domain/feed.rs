use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

use super::models::{controversy_ratio, Content, ContentKind, ContentRef, Repost};

/// A repost rehydrated with the original's current state at read time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepostView {
    pub id: Uuid,
    pub author_id: Uuid,
    pub original_id: Uuid,
    pub original_kind: ContentKind,
    pub original_author_id: Uuid,
    pub reposted_at: DateTime<Utc>,
    pub body: String,
    pub original_body: Option<String>,
    pub amt_likes: i64,
    pub amt_comments: i64,
    pub amt_reposts: i64,
    pub created_at: DateTime<Utc>,
    pub image_url: Option<String>,
    pub hashtags: BTreeSet<String>,
    pub mentioned_user_ids: BTreeSet<Uuid>,
    pub parent: Option<ContentRef>,
}

impl RepostView {
    pub fn hydrate(repost: &Repost, original: &Content) -> Self {
        Self {
            id: repost.id,
            author_id: repost.author_id,
            original_id: original.id,
            original_kind: repost.original_kind,
            original_author_id: original.author_id,
            reposted_at: repost.reposted_at,
            body: original.body.clone(),
            original_body: original.original_body.clone(),
            amt_likes: original.amt_likes,
            amt_comments: original.amt_comments,
            amt_reposts: original.amt_reposts,
            created_at: original.created_at,
            image_url: original.image_url.clone(),
            hashtags: original.hashtags.clone(),
            mentioned_user_ids: original.mentioned_user_ids.clone(),
            parent: original.parent,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum FeedItem {
    Post(Content),
    Repost(RepostView),
}

impl FeedItem {
    pub fn id(&self) -> Uuid {
        match self {
            FeedItem::Post(post) => post.id,
            FeedItem::Repost(repost) => repost.id,
        }
    }

    /// `createdAt` for posts, `repostedAt` for reposts.
    pub fn effective_timestamp(&self) -> DateTime<Utc> {
        match self {
            FeedItem::Post(post) => post.created_at,
            FeedItem::Repost(repost) => repost.reposted_at,
        }
    }

    pub fn amt_likes(&self) -> i64 {
        match self {
            FeedItem::Post(post) => post.amt_likes,
            FeedItem::Repost(repost) => repost.amt_likes,
        }
    }

    pub fn controversy_ratio(&self) -> f64 {
        match self {
            FeedItem::Post(post) => post.controversy_ratio(),
            FeedItem::Repost(repost) => controversy_ratio(repost.amt_comments, repost.amt_likes),
        }
    }
}
