use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Which population a piece of content belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Post,
    Comment,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Post => "post",
            ContentKind::Comment => "comment",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "post" | "posts" => Ok(ContentKind::Post),
            "comment" | "comments" | "reply" => Ok(ContentKind::Comment),
            other => Err(format!("unknown content kind '{}'", other)),
        }
    }
}

/// Id-keyed reference to a Post or Comment, resolved by lookup at read time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContentRef {
    pub id: Uuid,
    pub kind: ContentKind,
}

impl ContentRef {
    pub fn new(id: Uuid, kind: ContentKind) -> Self {
        Self { id, kind }
    }

    pub fn post(id: Uuid) -> Self {
        Self::new(id, ContentKind::Post)
    }

    pub fn comment(id: Uuid) -> Self {
        Self::new(id, ContentKind::Comment)
    }
}

impl fmt::Display for ContentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// Post or Comment. A comment is exactly the content that carries a parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    pub id: Uuid,
    pub kind: ContentKind,
    pub body: String,
    /// Snapshot of the body taken on first edit; cleared when an edit restores it.
    pub original_body: Option<String>,
    pub author_id: Uuid,
    pub amt_likes: i64,
    pub amt_comments: i64,
    pub amt_reposts: i64,
    pub created_at: DateTime<Utc>,
    pub image_url: Option<String>,
    pub hashtags: BTreeSet<String>,
    pub mentioned_user_ids: BTreeSet<Uuid>,
    pub parent: Option<ContentRef>,
}

impl Content {
    /// Fresh top-level post or, when `parent` is set, a comment.
    pub fn new(author_id: Uuid, body: impl Into<String>, parent: Option<ContentRef>) -> Self {
        let kind = if parent.is_some() {
            ContentKind::Comment
        } else {
            ContentKind::Post
        };

        Self {
            id: Uuid::new_v4(),
            kind,
            body: body.into(),
            original_body: None,
            author_id,
            amt_likes: 0,
            amt_comments: 0,
            amt_reposts: 0,
            created_at: Utc::now(),
            image_url: None,
            hashtags: BTreeSet::new(),
            mentioned_user_ids: BTreeSet::new(),
            parent,
        }
    }

    pub fn reference(&self) -> ContentRef {
        ContentRef::new(self.id, self.kind)
    }

    pub fn is_edited(&self) -> bool {
        self.original_body.is_some()
    }

    /// `amtComments / amtLikes`, or 0 when nothing has been liked yet.
    pub fn controversy_ratio(&self) -> f64 {
        controversy_ratio(self.amt_comments, self.amt_likes)
    }
}

pub fn controversy_ratio(amt_comments: i64, amt_likes: i64) -> f64 {
    if amt_likes > 0 {
        amt_comments as f64 / amt_likes as f64
    } else {
        0.0
    }
}

/// Reference-only share of existing content. Never copies the original.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repost {
    pub id: Uuid,
    pub author_id: Uuid,
    pub original_id: Uuid,
    pub original_kind: ContentKind,
    pub reposted_at: DateTime<Utc>,
}

impl Repost {
    pub fn new(author_id: Uuid, original: ContentRef) -> Self {
        Self {
            id: Uuid::new_v4(),
            author_id,
            original_id: original.id,
            original_kind: original.kind,
            reposted_at: Utc::now(),
        }
    }

    pub fn original(&self) -> ContentRef {
        ContentRef::new(self.original_id, self.original_kind)
    }
}

/// Verification tier; decides the body length limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VerificationTier {
    #[default]
    Unverified,
    Verified,
    Developer,
}

impl VerificationTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationTier::Unverified => "UNVERIFIED",
            VerificationTier::Verified => "VERIFIED",
            VerificationTier::Developer => "DEVELOPER",
        }
    }

    pub fn has_extended_limit(&self) -> bool {
        matches!(self, VerificationTier::Verified | VerificationTier::Developer)
    }
}

impl FromStr for VerificationTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "UNVERIFIED" => Ok(VerificationTier::Unverified),
            "VERIFIED" => Ok(VerificationTier::Verified),
            "DEVELOPER" => Ok(VerificationTier::Developer),
            other => Err(format!("unknown verification tier '{}'", other)),
        }
    }
}

/// The four per-kind id sets a user carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefSet {
    Owned,
    Liked,
    Mentioned,
    Reposted,
}

impl RefSet {
    pub const ALL: [RefSet; 4] = [
        RefSet::Owned,
        RefSet::Liked,
        RefSet::Mentioned,
        RefSet::Reposted,
    ];
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentRefs {
    pub owned: BTreeSet<Uuid>,
    pub liked: BTreeSet<Uuid>,
    pub mentioned: BTreeSet<Uuid>,
    pub reposted: BTreeSet<Uuid>,
}

impl ContentRefs {
    pub fn get(&self, set: RefSet) -> &BTreeSet<Uuid> {
        match set {
            RefSet::Owned => &self.owned,
            RefSet::Liked => &self.liked,
            RefSet::Mentioned => &self.mentioned,
            RefSet::Reposted => &self.reposted,
        }
    }

    pub fn get_mut(&mut self, set: RefSet) -> &mut BTreeSet<Uuid> {
        match set {
            RefSet::Owned => &mut self.owned,
            RefSet::Liked => &mut self.liked,
            RefSet::Mentioned => &mut self.mentioned,
            RefSet::Reposted => &mut self.reposted,
        }
    }
}

/// Self-description and profile media. Picture fields hold public URLs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub biography: Option<String>,
    pub profile_picture: Option<String>,
    pub background_picture: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub verification: VerificationTier,
    pub followers: BTreeSet<Uuid>,
    pub following: BTreeSet<Uuid>,
    pub posts: ContentRefs,
    pub comments: ContentRefs,
    #[serde(default)]
    pub profile: Profile,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(username: impl Into<String>, verification: VerificationTier) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.into(),
            verification,
            followers: BTreeSet::new(),
            following: BTreeSet::new(),
            posts: ContentRefs::default(),
            comments: ContentRefs::default(),
            profile: Profile::default(),
            created_at: Utc::now(),
        }
    }

    pub fn refs(&self, kind: ContentKind) -> &ContentRefs {
        match kind {
            ContentKind::Post => &self.posts,
            ContentKind::Comment => &self.comments,
        }
    }

    pub fn refs_mut(&mut self, kind: ContentKind) -> &mut ContentRefs {
        match kind {
            ContentKind::Post => &mut self.posts,
            ContentKind::Comment => &mut self.comments,
        }
    }

    pub fn has_ref(&self, set: RefSet, target: ContentRef) -> bool {
        self.refs(target.kind).get(set).contains(&target.id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationType {
    Like,
    Repost,
    Comment,
    Mention,
    Follow,
    FollowingPost,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::Like => "LIKE",
            NotificationType::Repost => "REPOST",
            NotificationType::Comment => "COMMENT",
            NotificationType::Mention => "MENTION",
            NotificationType::Follow => "FOLLOW",
            NotificationType::FollowingPost => "FOLLOWING_POST",
        }
    }
}

impl FromStr for NotificationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LIKE" => Ok(NotificationType::Like),
            "REPOST" => Ok(NotificationType::Repost),
            "COMMENT" => Ok(NotificationType::Comment),
            "MENTION" => Ok(NotificationType::Mention),
            "FOLLOW" => Ok(NotificationType::Follow),
            "FOLLOWING_POST" => Ok(NotificationType::FollowingPost),
            other => Err(format!("unknown notification type '{}'", other)),
        }
    }
}

/// Uniqueness key: at most one live notification per key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NotificationKey {
    pub kind: NotificationType,
    pub sender_id: Uuid,
    pub recipient_id: Uuid,
    pub target_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub kind: NotificationType,
    pub sender_id: Uuid,
    pub recipient_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub target: Option<ContentRef>,
}

impl Notification {
    pub fn new(
        kind: NotificationType,
        sender_id: Uuid,
        recipient_id: Uuid,
        target: Option<ContentRef>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            sender_id,
            recipient_id,
            created_at: Utc::now(),
            target,
        }
    }

    pub fn key(&self) -> NotificationKey {
        NotificationKey {
            kind: self.kind,
            sender_id: self.sender_id,
            recipient_id: self.recipient_id,
            target_id: self.target.map(|t| t.id),
        }
    }
}

/// Authenticated caller as supplied by the auth collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: Uuid,
    pub username: String,
    pub verification: VerificationTier,
}

impl Principal {
    pub const ADMIN_USERNAME: &'static str = "admin";

    pub fn is_admin(&self) -> bool {
        self.username == Self::ADMIN_USERNAME
    }
}

impl From<&User> for Principal {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            verification: user.verification,
        }
    }
}

/// Counters kept denormalized on content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    Likes,
    Comments,
    Reposts,
}

/// Ground-truth relation counts used by reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RelationTally {
    pub likes: i64,
    pub comments: i64,
    pub reposts: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashtagCount {
    pub tag: String,
    pub count: u64,
}
