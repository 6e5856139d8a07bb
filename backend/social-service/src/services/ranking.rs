use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ServiceError;
use crate::repository::PostOrder;

/// Closed set of feed policies. Each call is evaluated on its own inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RankingPolicy {
    Latest,
    Following,
    Popular,
    Controversial,
}

impl RankingPolicy {
    pub const ALL: [RankingPolicy; 4] = [
        RankingPolicy::Latest,
        RankingPolicy::Following,
        RankingPolicy::Popular,
        RankingPolicy::Controversial,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RankingPolicy::Latest => "LATEST",
            RankingPolicy::Following => "FOLLOWING",
            RankingPolicy::Popular => "POPULAR",
            RankingPolicy::Controversial => "CONTROVERSIAL",
        }
    }

    /// LATEST and FOLLOWING merge reposts into the page; the ranked policies don't.
    pub fn includes_reposts(&self) -> bool {
        matches!(self, RankingPolicy::Latest | RankingPolicy::Following)
    }

    pub fn is_author_scoped(&self) -> bool {
        matches!(self, RankingPolicy::Following)
    }

    pub fn post_order(&self) -> PostOrder {
        match self {
            RankingPolicy::Latest | RankingPolicy::Following => PostOrder::Newest,
            RankingPolicy::Popular => PostOrder::MostLiked,
            RankingPolicy::Controversial => PostOrder::MostControversial,
        }
    }
}

impl fmt::Display for RankingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RankingPolicy {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LATEST" => Ok(RankingPolicy::Latest),
            "FOLLOWING" => Ok(RankingPolicy::Following),
            "POPULAR" => Ok(RankingPolicy::Popular),
            "CONTROVERSIAL" => Ok(RankingPolicy::Controversial),
            other => Err(ServiceError::validation(format!(
                "Unknown feed filter '{}'",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_policies_case_insensitively() {
        assert_eq!("latest".parse::<RankingPolicy>().unwrap(), RankingPolicy::Latest);
        assert_eq!(
            "Controversial".parse::<RankingPolicy>().unwrap(),
            RankingPolicy::Controversial
        );
        for policy in RankingPolicy::ALL {
            assert_eq!(policy.as_str().parse::<RankingPolicy>().unwrap(), policy);
        }
    }

    #[test]
    fn unknown_policy_is_a_validation_error() {
        let err = "TRENDING".parse::<RankingPolicy>().unwrap_err();
        assert!(matches!(err, ServiceError::ValidationFailed(_)));
    }

    #[test]
    fn ranked_policies_exclude_reposts() {
        assert!(RankingPolicy::Latest.includes_reposts());
        assert!(RankingPolicy::Following.includes_reposts());
        assert!(!RankingPolicy::Popular.includes_reposts());
        assert!(!RankingPolicy::Controversial.includes_reposts());
        assert_eq!(RankingPolicy::Popular.post_order(), PostOrder::MostLiked);
    }
}
