//! Hashtag and mention extraction.
//!
//! Extracts `#tags` and `@mentions` from body text. Mentions come back as
//! lowercased usernames; resolving them to user ids is the caller's job.

use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;

/// Longest hashtag kept; longer tokens are dropped, not truncated.
pub const MAX_HASHTAG_LEN: usize = 30;

static HASHTAG_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#([A-Za-z0-9_]+)").expect("Invalid hashtag regex"));

/// Matches @username where username can contain alphanumeric characters and underscores
static MENTION_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@([A-Za-z0-9_]+)").expect("Invalid mention regex"));

pub trait TextExtractor: Send + Sync {
    fn extract_hashtags(&self, body: &str) -> BTreeSet<String>;

    /// Deduplicated usernames in order of first occurrence, without the `@`.
    fn extract_mentions(&self, body: &str) -> Vec<String>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RegexTextExtractor;

impl TextExtractor for RegexTextExtractor {
    fn extract_hashtags(&self, body: &str) -> BTreeSet<String> {
        extract_hashtags(body)
    }

    fn extract_mentions(&self, body: &str) -> Vec<String> {
        extract_mentions(body)
    }
}

pub fn extract_hashtags(body: &str) -> BTreeSet<String> {
    HASHTAG_REGEX
        .captures_iter(body)
        .filter_map(|cap| cap.get(1).map(|m| m.as_str().to_lowercase()))
        .filter(|tag| tag.chars().count() <= MAX_HASHTAG_LEN)
        .collect()
}

/// Extract @mentions from content text
///
/// # Examples
/// ```
/// use social_service::services::text_extraction::extract_mentions;
///
/// let content = "Hey @alice and @bob, check this out! @alice again";
/// let mentions = extract_mentions(content);
/// assert_eq!(mentions, vec!["alice", "bob"]);
/// ```
pub fn extract_mentions(body: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    MENTION_REGEX
        .captures_iter(body)
        .filter_map(|cap| cap.get(1).map(|m| m.as_str().to_lowercase()))
        .filter(|username| seen.insert(username.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_hashtags_lowercased_and_deduplicated() {
        let tags = extract_hashtags("#Rust is #fun, #rust again");
        assert_eq!(tags.into_iter().collect::<Vec<_>>(), vec!["fun", "rust"]);
    }

    #[test]
    fn test_extract_hashtags_drops_overlong() {
        let long = format!("#{}", "a".repeat(31));
        let exact = format!("#{}", "b".repeat(30));
        let tags = extract_hashtags(&format!("{long} {exact}"));
        assert_eq!(tags.len(), 1);
        assert!(tags.contains(&"b".repeat(30)));
    }

    #[test]
    fn test_extract_hashtags_none() {
        assert!(extract_hashtags("no tags # here").is_empty());
    }

    #[test]
    fn test_extract_single_mention() {
        assert_eq!(extract_mentions("Hello @alice!"), vec!["alice"]);
    }

    #[test]
    fn test_extract_duplicate_mentions() {
        let content = "@alice said hi to @bob, then @alice replied";
        assert_eq!(extract_mentions(content), vec!["alice", "bob"]);
    }

    #[test]
    fn test_extract_mentions_case_insensitive() {
        let content = "@Alice and @ALICE and @alice";
        assert_eq!(extract_mentions(content), vec!["alice"]);
    }

    #[test]
    fn test_extract_mentions_with_underscores() {
        assert_eq!(extract_mentions("Hello @user_name_123!"), vec!["user_name_123"]);
    }

    #[test]
    fn test_hashtags_and_mentions_together() {
        let extractor = RegexTextExtractor;
        let body = "hello #fun @bob";
        assert_eq!(
            extractor.extract_hashtags(body).into_iter().collect::<Vec<_>>(),
            vec!["fun"]
        );
        assert_eq!(extractor.extract_mentions(body), vec!["bob"]);
    }
}
