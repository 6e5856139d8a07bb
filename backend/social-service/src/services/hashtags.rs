use std::sync::Arc;

use super::page_window;
use crate::domain::{Content, HashtagCount};
use crate::error::{ServiceError, ServiceResult};
use crate::repository::ContentStore;

pub const DEFAULT_TRENDING_LIMIT: u64 = 16;
pub const DEFAULT_TAGGED_LIMIT: u64 = 10;
pub const MAX_HASHTAG_LIMIT: u64 = 100;

/// Normalizes user input to the stored tag form: no leading `#`, lowercase.
fn normalize_tag(raw: &str) -> ServiceResult<String> {
    let tag = raw.trim().trim_start_matches('#').to_lowercase();
    if tag.is_empty() {
        return Err(ServiceError::validation("Invalid hashtag provided"));
    }
    Ok(tag)
}

#[derive(Clone)]
pub struct HashtagService {
    store: Arc<dyn ContentStore>,
}

impl HashtagService {
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        Self { store }
    }

    /// Tags across posts and comments, most used first, ties by tag name.
    pub async fn trending(&self, page: u64, limit: Option<u64>) -> ServiceResult<Vec<HashtagCount>> {
        let (skip, limit) = page_window(
            page,
            limit.unwrap_or(DEFAULT_TRENDING_LIMIT),
            MAX_HASHTAG_LIMIT,
        )?;

        let mut counts = self.store.hashtag_counts().await?;
        counts.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.tag.cmp(&b.tag)));

        Ok(counts
            .into_iter()
            .skip(usize::try_from(skip).unwrap_or(usize::MAX))
            .take(usize::try_from(limit).unwrap_or(usize::MAX))
            .collect())
    }

    /// Posts and comments carrying `tag`, newest first.
    pub async fn tagged_content(
        &self,
        tag: &str,
        page: u64,
        limit: Option<u64>,
    ) -> ServiceResult<Vec<Content>> {
        let tag = normalize_tag(tag)?;
        let (skip, limit) = page_window(
            page,
            limit.unwrap_or(DEFAULT_TAGGED_LIMIT),
            MAX_HASHTAG_LIMIT,
        )?;
        Ok(self.store.find_by_hashtag(&tag, skip, limit).await?)
    }
}
