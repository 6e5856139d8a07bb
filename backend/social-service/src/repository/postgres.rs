use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::migrate::Migrator;
use sqlx::PgPool;
use std::str::FromStr;
use uuid::Uuid;

use super::{ContentStore, NotificationFilter, PostOrder, PostQuery, RepostQuery};
use crate::domain::{
    Content, ContentKind, ContentRef, ContentRefs, Counter, HashtagCount, Notification,
    NotificationKey, NotificationType, Profile, RefSet, RelationTally, Repost, User,
    VerificationTier,
};
use crate::error::{StoreError, StoreResult};

pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

const USER_COLUMNS: &str = "id, username, verification, followers, following, \
     owned_post_ids, liked_post_ids, mentioned_post_ids, reposted_post_ids, \
     owned_comment_ids, liked_comment_ids, mentioned_comment_ids, reposted_comment_ids, \
     first_name, last_name, biography, profile_picture, background_picture, created_at";

const CONTENT_COLUMNS: &str = "id, kind, body, original_body, author_id, amt_likes, \
     amt_comments, amt_reposts, created_at, image_url, hashtags, mentioned_user_ids, \
     parent_id, parent_kind";

const NOTIFICATION_COLUMNS: &str =
    "id, kind, sender_id, recipient_id, created_at, target_id, target_kind";

/// Column holding one user reference set. Only ever interpolated from this table.
fn ref_column(set: RefSet, kind: ContentKind) -> &'static str {
    match (set, kind) {
        (RefSet::Owned, ContentKind::Post) => "owned_post_ids",
        (RefSet::Liked, ContentKind::Post) => "liked_post_ids",
        (RefSet::Mentioned, ContentKind::Post) => "mentioned_post_ids",
        (RefSet::Reposted, ContentKind::Post) => "reposted_post_ids",
        (RefSet::Owned, ContentKind::Comment) => "owned_comment_ids",
        (RefSet::Liked, ContentKind::Comment) => "liked_comment_ids",
        (RefSet::Mentioned, ContentKind::Comment) => "mentioned_comment_ids",
        (RefSet::Reposted, ContentKind::Comment) => "reposted_comment_ids",
    }
}

fn counter_column(counter: Counter) -> &'static str {
    match counter {
        Counter::Likes => "amt_likes",
        Counter::Comments => "amt_comments",
        Counter::Reposts => "amt_reposts",
    }
}

fn order_clause(order: PostOrder) -> &'static str {
    match order {
        PostOrder::Newest => "created_at DESC, id DESC",
        PostOrder::MostLiked => "amt_likes DESC, created_at DESC, id DESC",
        PostOrder::MostControversial => {
            "(CASE WHEN amt_likes > 0 THEN amt_comments::float8 / amt_likes ELSE 0 END) DESC, \
             created_at DESC, id DESC"
        }
    }
}

fn parse_kind(raw: &str) -> StoreResult<ContentKind> {
    ContentKind::from_str(raw).map_err(StoreError::Corrupt)
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    verification: String,
    followers: Vec<Uuid>,
    following: Vec<Uuid>,
    owned_post_ids: Vec<Uuid>,
    liked_post_ids: Vec<Uuid>,
    mentioned_post_ids: Vec<Uuid>,
    reposted_post_ids: Vec<Uuid>,
    owned_comment_ids: Vec<Uuid>,
    liked_comment_ids: Vec<Uuid>,
    mentioned_comment_ids: Vec<Uuid>,
    reposted_comment_ids: Vec<Uuid>,
    first_name: Option<String>,
    last_name: Option<String>,
    biography: Option<String>,
    profile_picture: Option<String>,
    background_picture: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> StoreResult<Self> {
        Ok(User {
            id: row.id,
            username: row.username,
            verification: VerificationTier::from_str(&row.verification)
                .map_err(StoreError::Corrupt)?,
            followers: row.followers.into_iter().collect(),
            following: row.following.into_iter().collect(),
            posts: ContentRefs {
                owned: row.owned_post_ids.into_iter().collect(),
                liked: row.liked_post_ids.into_iter().collect(),
                mentioned: row.mentioned_post_ids.into_iter().collect(),
                reposted: row.reposted_post_ids.into_iter().collect(),
            },
            comments: ContentRefs {
                owned: row.owned_comment_ids.into_iter().collect(),
                liked: row.liked_comment_ids.into_iter().collect(),
                mentioned: row.mentioned_comment_ids.into_iter().collect(),
                reposted: row.reposted_comment_ids.into_iter().collect(),
            },
            profile: Profile {
                first_name: row.first_name,
                last_name: row.last_name,
                biography: row.biography,
                profile_picture: row.profile_picture,
                background_picture: row.background_picture,
            },
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ContentRow {
    id: Uuid,
    kind: String,
    body: String,
    original_body: Option<String>,
    author_id: Uuid,
    amt_likes: i64,
    amt_comments: i64,
    amt_reposts: i64,
    created_at: DateTime<Utc>,
    image_url: Option<String>,
    hashtags: Vec<String>,
    mentioned_user_ids: Vec<Uuid>,
    parent_id: Option<Uuid>,
    parent_kind: Option<String>,
}

impl TryFrom<ContentRow> for Content {
    type Error = StoreError;

    fn try_from(row: ContentRow) -> StoreResult<Self> {
        let parent = match (row.parent_id, row.parent_kind) {
            (Some(id), Some(kind)) => Some(ContentRef::new(id, parse_kind(&kind)?)),
            (None, None) => None,
            _ => {
                return Err(StoreError::Corrupt(format!(
                    "content {} has a partial parent reference",
                    row.id
                )))
            }
        };

        Ok(Content {
            id: row.id,
            kind: parse_kind(&row.kind)?,
            body: row.body,
            original_body: row.original_body,
            author_id: row.author_id,
            amt_likes: row.amt_likes,
            amt_comments: row.amt_comments,
            amt_reposts: row.amt_reposts,
            created_at: row.created_at,
            image_url: row.image_url,
            hashtags: row.hashtags.into_iter().collect(),
            mentioned_user_ids: row.mentioned_user_ids.into_iter().collect(),
            parent,
        })
    }
}

#[derive(sqlx::FromRow)]
struct RepostRow {
    id: Uuid,
    author_id: Uuid,
    original_id: Uuid,
    original_kind: String,
    reposted_at: DateTime<Utc>,
}

impl TryFrom<RepostRow> for Repost {
    type Error = StoreError;

    fn try_from(row: RepostRow) -> StoreResult<Self> {
        Ok(Repost {
            id: row.id,
            author_id: row.author_id,
            original_id: row.original_id,
            original_kind: parse_kind(&row.original_kind)?,
            reposted_at: row.reposted_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct NotificationRow {
    id: Uuid,
    kind: String,
    sender_id: Uuid,
    recipient_id: Uuid,
    created_at: DateTime<Utc>,
    target_id: Option<Uuid>,
    target_kind: Option<String>,
}

impl TryFrom<NotificationRow> for Notification {
    type Error = StoreError;

    fn try_from(row: NotificationRow) -> StoreResult<Self> {
        let target = match (row.target_id, row.target_kind) {
            (Some(id), Some(kind)) => Some(ContentRef::new(id, parse_kind(&kind)?)),
            _ => None,
        };

        Ok(Notification {
            id: row.id,
            kind: NotificationType::from_str(&row.kind).map_err(StoreError::Corrupt)?,
            sender_id: row.sender_id,
            recipient_id: row.recipient_id,
            created_at: row.created_at,
            target,
        })
    }
}

fn convert_all<R, T>(rows: Vec<R>) -> StoreResult<Vec<T>>
where
    T: TryFrom<R, Error = StoreError>,
{
    rows.into_iter().map(T::try_from).collect()
}

/// Postgres-backed content store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        MIGRATOR.run(&self.pool).await
    }
}

#[async_trait]
impl ContentStore for PgStore {
    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(User::try_from).transpose()
    }

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE LOWER(username) = LOWER($1)");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        row.map(User::try_from).transpose()
    }

    async fn find_users_by_usernames(&self, usernames: &[String]) -> StoreResult<Vec<User>> {
        if usernames.is_empty() {
            return Ok(Vec::new());
        }
        let lowered: Vec<String> = usernames.iter().map(|u| u.to_lowercase()).collect();
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE LOWER(username) = ANY($1)");
        let rows = sqlx::query_as::<_, UserRow>(&sql)
            .bind(&lowered)
            .fetch_all(&self.pool)
            .await?;
        convert_all(rows)
    }

    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO users (id, username, verification, created_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(user.verification.as_str())
        .bind(user.created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => Err(StoreError::Duplicate(format!(
                "username '{}' already exists",
                user.username
            ))),
            Err(err) => Err(err.into()),
        }
    }

    async fn update_profile(&self, user_id: Uuid, profile: &Profile) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET first_name = $2, last_name = $3, biography = $4,
                profile_picture = $5, background_picture = $6
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .bind(&profile.first_name)
        .bind(&profile.last_name)
        .bind(&profile.biography)
        .bind(&profile.profile_picture)
        .bind(&profile.background_picture)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        let sql = format!("DELETE FROM users WHERE id = $1 RETURNING {USER_COLUMNS}");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(User::try_from).transpose()
    }

    async fn add_user_ref(
        &self,
        user_id: Uuid,
        set: RefSet,
        target: ContentRef,
    ) -> StoreResult<bool> {
        let col = ref_column(set, target.kind);
        let sql = format!(
            "UPDATE users SET {col} = array_append({col}, $2) \
             WHERE id = $1 AND NOT ($2 = ANY({col}))"
        );
        let result = sqlx::query(&sql)
            .bind(user_id)
            .bind(target.id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn remove_user_ref(
        &self,
        user_id: Uuid,
        set: RefSet,
        target: ContentRef,
    ) -> StoreResult<bool> {
        let col = ref_column(set, target.kind);
        let sql = format!(
            "UPDATE users SET {col} = array_remove({col}, $2) \
             WHERE id = $1 AND $2 = ANY({col})"
        );
        let result = sqlx::query(&sql)
            .bind(user_id)
            .bind(target.id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn pull_user_refs(&self, set: RefSet, target: ContentRef) -> StoreResult<u64> {
        let col = ref_column(set, target.kind);
        let sql = format!("UPDATE users SET {col} = array_remove({col}, $1) WHERE $1 = ANY({col})");
        let result = sqlx::query(&sql)
            .bind(target.id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn link_follow(&self, follower_id: Uuid, followee_id: Uuid) -> StoreResult<bool> {
        let mut tx = self.pool.begin().await?;

        let linked = sqlx::query(
            r#"
            UPDATE users SET following = array_append(following, $2)
            WHERE id = $1
              AND NOT ($2 = ANY(following))
              AND EXISTS (SELECT 1 FROM users WHERE id = $2)
            "#,
        )
        .bind(follower_id)
        .bind(followee_id)
        .execute(&mut *tx)
        .await?
        .rows_affected()
            > 0;

        if linked {
            sqlx::query(
                r#"
                UPDATE users SET followers = array_append(followers, $1)
                WHERE id = $2 AND NOT ($1 = ANY(followers))
                "#,
            )
            .bind(follower_id)
            .bind(followee_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(linked)
    }

    async fn unlink_follow(&self, follower_id: Uuid, followee_id: Uuid) -> StoreResult<bool> {
        let mut tx = self.pool.begin().await?;

        let unlinked = sqlx::query(
            r#"
            UPDATE users SET following = array_remove(following, $2)
            WHERE id = $1 AND $2 = ANY(following)
            "#,
        )
        .bind(follower_id)
        .bind(followee_id)
        .execute(&mut *tx)
        .await?
        .rows_affected()
            > 0;

        sqlx::query(
            r#"
            UPDATE users SET followers = array_remove(followers, $1)
            WHERE id = $2 AND $1 = ANY(followers)
            "#,
        )
        .bind(follower_id)
        .bind(followee_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(unlinked)
    }

    async fn find_content(&self, target: ContentRef) -> StoreResult<Option<Content>> {
        let sql = format!("SELECT {CONTENT_COLUMNS} FROM contents WHERE id = $1 AND kind = $2");
        let row = sqlx::query_as::<_, ContentRow>(&sql)
            .bind(target.id)
            .bind(target.kind.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Content::try_from).transpose()
    }

    async fn insert_content(&self, content: &Content) -> StoreResult<()> {
        let hashtags: Vec<String> = content.hashtags.iter().cloned().collect();
        let mentions: Vec<Uuid> = content.mentioned_user_ids.iter().copied().collect();

        let result = sqlx::query(
            r#"
            INSERT INTO contents (
                id, kind, body, original_body, author_id, amt_likes, amt_comments,
                amt_reposts, created_at, image_url, hashtags, mentioned_user_ids,
                parent_id, parent_kind
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(content.id)
        .bind(content.kind.as_str())
        .bind(&content.body)
        .bind(&content.original_body)
        .bind(content.author_id)
        .bind(content.amt_likes)
        .bind(content.amt_comments)
        .bind(content.amt_reposts)
        .bind(content.created_at)
        .bind(&content.image_url)
        .bind(&hashtags)
        .bind(&mentions)
        .bind(content.parent.map(|p| p.id))
        .bind(content.parent.map(|p| p.kind.as_str()))
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => {
                Err(StoreError::Duplicate(format!("content {}", content.id)))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn update_content(&self, content: &Content) -> StoreResult<bool> {
        let hashtags: Vec<String> = content.hashtags.iter().cloned().collect();
        let mentions: Vec<Uuid> = content.mentioned_user_ids.iter().copied().collect();

        let result = sqlx::query(
            r#"
            UPDATE contents
            SET body = $3, original_body = $4, image_url = $5,
                hashtags = $6, mentioned_user_ids = $7
            WHERE id = $1 AND kind = $2
            "#,
        )
        .bind(content.id)
        .bind(content.kind.as_str())
        .bind(&content.body)
        .bind(&content.original_body)
        .bind(&content.image_url)
        .bind(&hashtags)
        .bind(&mentions)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_content(&self, target: ContentRef) -> StoreResult<Option<Content>> {
        let sql = format!(
            "DELETE FROM contents WHERE id = $1 AND kind = $2 RETURNING {CONTENT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, ContentRow>(&sql)
            .bind(target.id)
            .bind(target.kind.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Content::try_from).transpose()
    }

    async fn adjust_counter(
        &self,
        target: ContentRef,
        counter: Counter,
        delta: i64,
        clamp: bool,
    ) -> StoreResult<Option<i64>> {
        let col = counter_column(counter);
        let sql = format!(
            "UPDATE contents \
             SET {col} = CASE WHEN $4 AND {col} + $3 < 0 THEN 0 ELSE {col} + $3 END \
             WHERE id = $1 AND kind = $2 \
             RETURNING {col}"
        );
        let value: Option<i64> = sqlx::query_scalar(&sql)
            .bind(target.id)
            .bind(target.kind.as_str())
            .bind(delta)
            .bind(clamp)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value)
    }

    async fn set_counters(&self, target: ContentRef, tally: RelationTally) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE contents
            SET amt_likes = $3, amt_comments = $4, amt_reposts = $5
            WHERE id = $1 AND kind = $2
            "#,
        )
        .bind(target.id)
        .bind(target.kind.as_str())
        .bind(tally.likes)
        .bind(tally.comments)
        .bind(tally.reposts)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_posts(&self, query: &PostQuery) -> StoreResult<Vec<Content>> {
        let sql = format!(
            "SELECT {CONTENT_COLUMNS} FROM contents \
             WHERE kind = 'post' AND ($1::uuid[] IS NULL OR author_id = ANY($1)) \
             ORDER BY {} \
             LIMIT $2 OFFSET $3",
            order_clause(query.order)
        );
        let rows = sqlx::query_as::<_, ContentRow>(&sql)
            .bind(&query.authors)
            .bind(query.limit as i64)
            .bind(query.skip as i64)
            .fetch_all(&self.pool)
            .await?;
        convert_all(rows)
    }

    async fn find_comments(
        &self,
        parent: ContentRef,
        skip: u64,
        limit: u64,
    ) -> StoreResult<Vec<Content>> {
        let sql = format!(
            "SELECT {CONTENT_COLUMNS} FROM contents \
             WHERE parent_id = $1 AND parent_kind = $2 \
             ORDER BY created_at DESC, id DESC \
             LIMIT $3 OFFSET $4"
        );
        let rows = sqlx::query_as::<_, ContentRow>(&sql)
            .bind(parent.id)
            .bind(parent.kind.as_str())
            .bind(limit as i64)
            .bind(skip as i64)
            .fetch_all(&self.pool)
            .await?;
        convert_all(rows)
    }

    async fn list_content_ids(
        &self,
        kind: ContentKind,
        skip: u64,
        limit: u64,
    ) -> StoreResult<Vec<Uuid>> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT id FROM contents
            WHERE kind = $1
            ORDER BY created_at ASC, id ASC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(kind.as_str())
        .bind(limit as i64)
        .bind(skip as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn tally_relations(&self, target: ContentRef) -> StoreResult<RelationTally> {
        let liked_col = ref_column(RefSet::Liked, target.kind);
        let likes_sql = format!("SELECT COUNT(*) FROM users WHERE $1 = ANY({liked_col})");

        let (likes, reposts, comments) = tokio::try_join!(
            sqlx::query_scalar::<_, i64>(&likes_sql)
                .bind(target.id)
                .fetch_one(&self.pool),
            sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM reposts WHERE original_id = $1 AND original_kind = $2",
            )
            .bind(target.id)
            .bind(target.kind.as_str())
            .fetch_one(&self.pool),
            sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM contents WHERE parent_id = $1 AND parent_kind = $2",
            )
            .bind(target.id)
            .bind(target.kind.as_str())
            .fetch_one(&self.pool),
        )?;

        Ok(RelationTally {
            likes,
            comments,
            reposts,
        })
    }

    async fn hashtag_counts(&self) -> StoreResult<Vec<HashtagCount>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT tag, COUNT(*)::bigint
            FROM contents, unnest(hashtags) AS tag
            GROUP BY tag
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(tag, count)| HashtagCount {
                tag,
                count: count.max(0) as u64,
            })
            .collect())
    }

    async fn find_by_hashtag(
        &self,
        tag: &str,
        skip: u64,
        limit: u64,
    ) -> StoreResult<Vec<Content>> {
        let sql = format!(
            "SELECT {CONTENT_COLUMNS} FROM contents \
             WHERE $1 = ANY(hashtags) \
             ORDER BY created_at DESC, id DESC \
             LIMIT $2 OFFSET $3"
        );
        let rows = sqlx::query_as::<_, ContentRow>(&sql)
            .bind(tag)
            .bind(limit as i64)
            .bind(skip as i64)
            .fetch_all(&self.pool)
            .await?;
        convert_all(rows)
    }

    async fn insert_repost(&self, repost: &Repost) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO reposts (id, author_id, original_id, original_kind, reposted_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (author_id, original_id) DO NOTHING
            "#,
        )
        .bind(repost.id)
        .bind(repost.author_id)
        .bind(repost.original_id)
        .bind(repost.original_kind.as_str())
        .bind(repost.reposted_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_repost(
        &self,
        author_id: Uuid,
        original_id: Uuid,
    ) -> StoreResult<Option<Repost>> {
        let row = sqlx::query_as::<_, RepostRow>(
            r#"
            SELECT id, author_id, original_id, original_kind, reposted_at
            FROM reposts
            WHERE author_id = $1 AND original_id = $2
            "#,
        )
        .bind(author_id)
        .bind(original_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Repost::try_from).transpose()
    }

    async fn delete_repost(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM reposts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_reposts_of(&self, original_id: Uuid) -> StoreResult<Vec<Repost>> {
        let rows = sqlx::query_as::<_, RepostRow>(
            r#"
            DELETE FROM reposts
            WHERE original_id = $1
            RETURNING id, author_id, original_id, original_kind, reposted_at
            "#,
        )
        .bind(original_id)
        .fetch_all(&self.pool)
        .await?;
        convert_all(rows)
    }

    async fn find_reposts(&self, query: &RepostQuery) -> StoreResult<Vec<Repost>> {
        let rows = sqlx::query_as::<_, RepostRow>(
            r#"
            SELECT id, author_id, original_id, original_kind, reposted_at
            FROM reposts
            WHERE ($1::uuid[] IS NULL OR author_id = ANY($1))
            ORDER BY reposted_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(&query.authors)
        .bind(query.limit as i64)
        .bind(query.skip as i64)
        .fetch_all(&self.pool)
        .await?;
        convert_all(rows)
    }

    async fn insert_notification_if_absent(
        &self,
        notification: &Notification,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO notifications (id, kind, sender_id, recipient_id, created_at, target_id, target_kind)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(notification.id)
        .bind(notification.kind.as_str())
        .bind(notification.sender_id)
        .bind(notification.recipient_id)
        .bind(notification.created_at)
        .bind(notification.target.map(|t| t.id))
        .bind(notification.target.map(|t| t.kind.as_str()))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_notification_by_key(&self, key: &NotificationKey) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM notifications
            WHERE kind = $1 AND sender_id = $2 AND recipient_id = $3
              AND target_id IS NOT DISTINCT FROM $4
            "#,
        )
        .bind(key.kind.as_str())
        .bind(key.sender_id)
        .bind(key.recipient_id)
        .bind(key.target_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_notifications(&self, filter: &NotificationFilter) -> StoreResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM notifications
            WHERE ($1::text IS NULL OR kind = $1)
              AND ($2::uuid IS NULL OR sender_id = $2)
              AND ($3::uuid IS NULL OR recipient_id = $3)
              AND ($4::uuid IS NULL OR target_id = $4)
            "#,
        )
        .bind(filter.kind.map(|k| k.as_str()))
        .bind(filter.sender_id)
        .bind(filter.recipient_id)
        .bind(filter.target_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn find_notification(&self, id: Uuid) -> StoreResult<Option<Notification>> {
        let sql = format!("SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE id = $1");
        let row = sqlx::query_as::<_, NotificationRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Notification::try_from).transpose()
    }

    async fn delete_notification(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_notifications(
        &self,
        recipient_id: Uuid,
        skip: u64,
        limit: u64,
    ) -> StoreResult<Vec<Notification>> {
        let sql = format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications \
             WHERE recipient_id = $1 \
             ORDER BY created_at DESC, id DESC \
             LIMIT $2 OFFSET $3"
        );
        let rows = sqlx::query_as::<_, NotificationRow>(&sql)
            .bind(recipient_id)
            .bind(limit as i64)
            .bind(skip as i64)
            .fetch_all(&self.pool)
            .await?;
        convert_all(rows)
    }
}
