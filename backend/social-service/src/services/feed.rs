//! Feed composition.
//!
//! LATEST and FOLLOWING fetch one page of posts and one page of reposts with
//! the same skip/limit window, merge them by effective timestamp and cut the
//! result back to `limit`. Items past `limit` in the merged batch are not
//! carried to the next page, and a dense source can crowd out a sparse one.
//! Clients depend on this paging, so it stays until a single ranked feed
//! index replaces it.
//!
//! POPULAR and CONTROVERSIAL rank posts only, in the store, so paging is exact.

use std::cmp::Ordering;
use std::sync::Arc;

use futures::future::try_join_all;
use tracing::{debug, warn};
use uuid::Uuid;

use super::page_window;
use super::ranking::RankingPolicy;
use crate::config::FeedConfig;
use crate::domain::{Content, FeedItem, Principal, Repost, RepostView};
use crate::error::{ServiceError, ServiceResult};
use crate::metrics::{FEED_ITEMS_RETURNED, FEED_REQUEST_DURATION_SECONDS};
use crate::repository::{ContentStore, PostOrder, PostQuery, RepostQuery};

/// Newest effective timestamp first; ids break ties so pages are stable.
fn by_recency(a: &FeedItem, b: &FeedItem) -> Ordering {
    b.effective_timestamp()
        .cmp(&a.effective_timestamp())
        .then_with(|| b.id().cmp(&a.id()))
}

pub fn merge_by_recency(posts: Vec<Content>, reposts: Vec<RepostView>, limit: usize) -> Vec<FeedItem> {
    let mut items: Vec<FeedItem> = posts
        .into_iter()
        .map(FeedItem::Post)
        .chain(reposts.into_iter().map(FeedItem::Repost))
        .collect();
    items.sort_by(by_recency);
    items.truncate(limit);
    items
}

#[derive(Clone)]
pub struct FeedService {
    store: Arc<dyn ContentStore>,
    config: FeedConfig,
}

impl FeedService {
    pub fn new(store: Arc<dyn ContentStore>, config: FeedConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    fn window(&self, page: u64, limit: Option<u64>) -> ServiceResult<(u64, u64)> {
        page_window(
            page,
            limit.unwrap_or(self.config.default_limit),
            self.config.max_limit,
        )
    }

    pub async fn get_feed(
        &self,
        policy: RankingPolicy,
        page: u64,
        limit: Option<u64>,
        principal: Option<&Principal>,
    ) -> ServiceResult<Vec<FeedItem>> {
        let timer = FEED_REQUEST_DURATION_SECONDS
            .with_label_values(&[policy.as_str()])
            .start_timer();

        let (skip, limit) = self.window(page, limit)?;
        let authors = self.author_scope(policy, principal).await?;

        let items = if policy.includes_reposts() {
            self.compose_by_recency(authors, skip, limit).await?
        } else {
            let posts = self
                .store
                .find_posts(&PostQuery {
                    authors,
                    order: policy.post_order(),
                    skip,
                    limit,
                })
                .await?;
            posts.into_iter().map(FeedItem::Post).collect()
        };

        timer.observe_duration();
        FEED_ITEMS_RETURNED
            .with_label_values(&[policy.as_str()])
            .observe(items.len() as f64);
        debug!(policy = %policy, page, limit, items = items.len(), "Feed composed");
        Ok(items)
    }

    /// `None` means every author. Without a principal FOLLOWING widens to
    /// every author unless the deployment requires authentication for it.
    async fn author_scope(
        &self,
        policy: RankingPolicy,
        principal: Option<&Principal>,
    ) -> ServiceResult<Option<Vec<Uuid>>> {
        if !policy.is_author_scoped() {
            return Ok(None);
        }

        match principal {
            Some(principal) => {
                let user = self
                    .store
                    .find_user(principal.id)
                    .await?
                    .ok_or_else(|| ServiceError::not_found("User not found"))?;
                Ok(Some(user.following.into_iter().collect()))
            }
            None if self.config.following_requires_auth => Err(ServiceError::authentication(
                "You must be logged in to view the following feed",
            )),
            None => Ok(None),
        }
    }

    async fn compose_by_recency(
        &self,
        authors: Option<Vec<Uuid>>,
        skip: u64,
        limit: u64,
    ) -> ServiceResult<Vec<FeedItem>> {
        let post_query = PostQuery {
            authors: authors.clone(),
            order: PostOrder::Newest,
            skip,
            limit,
        };
        let repost_query = RepostQuery {
            authors,
            skip,
            limit,
        };

        let (posts, reposts) = tokio::try_join!(
            self.store.find_posts(&post_query),
            self.store.find_reposts(&repost_query),
        )?;

        let reposts = self.hydrate(reposts).await?;
        Ok(merge_by_recency(posts, reposts, limit as usize))
    }

    /// Attaches each repost's current original. Reposts whose original is
    /// gone are dropped from the page.
    async fn hydrate(&self, reposts: Vec<Repost>) -> ServiceResult<Vec<RepostView>> {
        let lookups = reposts.into_iter().map(|repost| {
            let store = self.store.clone();
            async move {
                let original = store.find_content(repost.original()).await?;
                Ok::<_, ServiceError>((repost, original))
            }
        });

        Ok(try_join_all(lookups)
            .await?
            .into_iter()
            .filter_map(|(repost, original)| match original {
                Some(original) => Some(RepostView::hydrate(&repost, &original)),
                None => {
                    warn!(
                        repost_id = %repost.id,
                        original_id = %repost.original_id,
                        "Repost references missing content"
                    );
                    None
                }
            })
            .collect())
    }

    /// A user's reposts, newest first, rehydrated like feed reposts.
    pub async fn get_reposts_by_user(
        &self,
        username: &str,
        page: u64,
        limit: Option<u64>,
    ) -> ServiceResult<Vec<RepostView>> {
        let (skip, limit) = self.window(page, limit)?;
        let user = self
            .store
            .find_user_by_username(username)
            .await?
            .ok_or_else(|| ServiceError::not_found("User not found"))?;

        let reposts = self
            .store
            .find_reposts(&RepostQuery {
                authors: Some(vec![user.id]),
                skip,
                limit,
            })
            .await?;
        self.hydrate(reposts).await
    }
}
