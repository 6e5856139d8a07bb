pub mod content;
pub mod counters;
pub mod feed;
pub mod hashtags;
pub mod media;
pub mod mentions;
pub mod notifications;
pub mod ranking;
pub mod text_extraction;
pub mod users;

pub use content::{ContentEdit, ContentService, NewContent};
pub use counters::CounterService;
pub use feed::FeedService;
pub use hashtags::HashtagService;
pub use media::{LocalMediaStore, MediaStore, MediaUpload};
pub use mentions::{diff_mentions, MentionDiff, MentionSynchronizer};
pub use notifications::{FanoutDispatcher, FollowerFanout, NotificationService};
pub use ranking::RankingPolicy;
pub use text_extraction::{RegexTextExtractor, TextExtractor};
pub use users::{PictureSlot, ProfileUpdate, UserService};

use crate::domain::Principal;
use crate::error::{ServiceError, ServiceResult};

/// Unwraps the caller or fails with AuthenticationRequired for `action`.
pub(crate) fn require_principal<'a>(
    principal: Option<&'a Principal>,
    action: &str,
) -> ServiceResult<&'a Principal> {
    principal.ok_or_else(|| {
        ServiceError::authentication(format!("You must be logged in to {}", action))
    })
}

/// Turns a 1-based page into a `(skip, limit)` store window. The offset must
/// fit the store's signed OFFSET, so oversized pages are rejected, not wrapped.
pub(crate) fn page_window(page: u64, limit: u64, max_limit: u64) -> ServiceResult<(u64, u64)> {
    if page == 0 {
        return Err(ServiceError::validation("page must be at least 1"));
    }
    if limit == 0 || limit > max_limit {
        return Err(ServiceError::validation(format!(
            "limit must be between 1 and {}",
            max_limit
        )));
    }
    let skip = (page - 1)
        .checked_mul(limit)
        .filter(|skip| *skip <= i64::MAX as u64)
        .ok_or_else(|| ServiceError::validation(format!("page {} is out of range", page)))?;
    Ok((skip, limit))
}

/// Text length as clients measure it: UTF-16 code units.
pub(crate) fn text_length(text: &str) -> usize {
    text.encode_utf16().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_window_offsets() {
        assert_eq!(page_window(1, 10, 100).unwrap(), (0, 10));
        assert_eq!(page_window(3, 25, 100).unwrap(), (50, 25));
    }

    #[test]
    fn page_window_rejects_bad_input() {
        let cases = [
            (0, 10),
            (1, 0),
            (1, 101),
            (u64::MAX, 100),
            (u64::MAX / 2, 3),
            // fits u64 but not a signed OFFSET
            (1 << 62, 4),
        ];
        for (page, limit) in cases {
            let err = page_window(page, limit, 100).unwrap_err();
            assert!(matches!(err, ServiceError::ValidationFailed(_)), "{page}/{limit}");
        }
    }

    #[test]
    fn text_length_counts_utf16_units() {
        assert_eq!(text_length("abc"), 3);
        assert_eq!(text_length("ø"), 1);
        assert_eq!(text_length("😀"), 2);
    }
}
