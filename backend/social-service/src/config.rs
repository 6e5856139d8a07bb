/// Configuration management for Social Service
///
/// Loads configuration from environment variables.
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application settings
    pub app: AppConfig,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Feed composition settings
    pub feed: FeedConfig,
    /// Counter maintenance settings
    pub counters: CountersConfig,
    /// Content validation settings
    pub content: ContentConfig,
    /// Follower fan-out settings
    pub fanout: FanoutConfig,
    /// Local upload storage
    pub uploads: UploadsConfig,
}

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application environment (development, staging, production)
    pub env: String,
    /// Server host to bind to
    pub host: String,
    /// HTTP port
    pub http_port: u16,
}

impl AppConfig {
    pub fn is_production(&self) -> bool {
        matches!(self.env.as_str(), "production" | "prod")
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database URL. Absent selects the in-memory store.
    pub url: Option<String>,
    /// Max connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Min connections in pool
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    pub default_limit: u64,
    pub max_limit: u64,
    /// Reject FOLLOWING without a principal instead of widening it to every author.
    pub following_requires_auth: bool,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            default_limit: 10,
            max_limit: 100,
            following_requires_auth: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CountersConfig {
    /// Let unrepost drive amtReposts below zero, as older deployments did.
    pub legacy_unclamped_unrepost: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentConfig {
    pub standard_body_limit: usize,
    pub extended_body_limit: usize,
    /// Largest comment page; follows FEED_MAX_LIMIT.
    pub max_page_limit: u64,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            standard_body_limit: 281,
            extended_body_limit: 562,
            max_page_limit: FeedConfig::default().max_limit,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FanoutConfig {
    pub queue_capacity: usize,
    /// Deliver FOLLOWING_POST notifications on the calling task.
    pub inline: bool,
}

impl Default for FanoutConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            inline: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadsConfig {
    pub dir: String,
    pub public_prefix: String,
}

impl Default for UploadsConfig {
    fn default() -> Self {
        Self {
            dir: "./uploads".to_string(),
            public_prefix: "/uploads".to_string(),
        }
    }
}

// Default values
fn default_max_connections() -> u32 {
    20
}

fn default_min_connections() -> u32 {
    5
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    lookup(key)
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn flag(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: bool) -> bool {
    match lookup(key) {
        Some(raw) => matches!(
            raw.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        ),
        None => default,
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup; `from_env` passes the process env.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let app = AppConfig {
            env: lookup("APP_ENV").unwrap_or_else(|| "development".to_string()),
            host: lookup("APP_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            http_port: parsed(&lookup, "PORT", 8006), // social-service default HTTP port
        };

        let database = DatabaseConfig {
            url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            max_connections: parsed(&lookup, "DB_MAX_CONNECTIONS", default_max_connections()),
            min_connections: parsed(&lookup, "DB_MIN_CONNECTIONS", default_min_connections()),
        };

        if database.url.is_none() && app.is_production() {
            bail!("DATABASE_URL must be set when APP_ENV is production");
        }

        let feed_defaults = FeedConfig::default();
        let feed = FeedConfig {
            default_limit: parsed(&lookup, "FEED_DEFAULT_LIMIT", feed_defaults.default_limit),
            max_limit: parsed(&lookup, "FEED_MAX_LIMIT", feed_defaults.max_limit),
            following_requires_auth: flag(&lookup, "FEED_FOLLOWING_REQUIRES_AUTH", false),
        };

        if feed.default_limit == 0 || feed.default_limit > feed.max_limit {
            bail!(
                "FEED_DEFAULT_LIMIT ({}) must be between 1 and FEED_MAX_LIMIT ({})",
                feed.default_limit,
                feed.max_limit
            );
        }

        let counters = CountersConfig {
            legacy_unclamped_unrepost: flag(&lookup, "COUNTERS_LEGACY_UNCLAMPED_UNREPOST", false),
        };

        let content_defaults = ContentConfig::default();
        let content = ContentConfig {
            standard_body_limit: parsed(
                &lookup,
                "CONTENT_STANDARD_BODY_LIMIT",
                content_defaults.standard_body_limit,
            ),
            extended_body_limit: parsed(
                &lookup,
                "CONTENT_EXTENDED_BODY_LIMIT",
                content_defaults.extended_body_limit,
            ),
            max_page_limit: feed.max_limit,
        };

        let fanout_defaults = FanoutConfig::default();
        let fanout = FanoutConfig {
            queue_capacity: parsed(&lookup, "FANOUT_QUEUE_CAPACITY", fanout_defaults.queue_capacity)
                .max(1),
            inline: flag(&lookup, "FANOUT_INLINE", false),
        };

        let upload_defaults = UploadsConfig::default();
        let uploads = UploadsConfig {
            dir: lookup("UPLOADS_DIR").unwrap_or(upload_defaults.dir),
            public_prefix: lookup("UPLOADS_PUBLIC_PREFIX").unwrap_or(upload_defaults.public_prefix),
        };

        Ok(Config {
            app,
            database,
            feed,
            counters,
            content,
            fanout,
            uploads,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(move |key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_values() {
        let config = config_from(&[]).unwrap();

        assert_eq!(config.app.env, "development");
        assert_eq!(config.app.host, "0.0.0.0");
        assert_eq!(config.app.http_port, 8006);
        assert!(config.database.url.is_none());
        assert_eq!(config.database.max_connections, 20);
        assert_eq!(config.database.min_connections, 5);
        assert_eq!(config.feed.default_limit, 10);
        assert_eq!(config.feed.max_limit, 100);
        assert!(!config.feed.following_requires_auth);
        assert!(!config.counters.legacy_unclamped_unrepost);
        assert_eq!(config.content.standard_body_limit, 281);
        assert_eq!(config.content.extended_body_limit, 562);
        assert_eq!(config.content.max_page_limit, 100);
        assert_eq!(config.fanout.queue_capacity, 1024);
        assert!(!config.fanout.inline);
        assert_eq!(config.uploads.dir, "./uploads");
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("DATABASE_URL", "postgres://test"),
            ("FEED_FOLLOWING_REQUIRES_AUTH", "true"),
            ("COUNTERS_LEGACY_UNCLAMPED_UNREPOST", "1"),
            ("FANOUT_INLINE", "yes"),
            ("PORT", "9000"),
        ])
        .unwrap();

        assert_eq!(config.database.url.as_deref(), Some("postgres://test"));
        assert!(config.feed.following_requires_auth);
        assert!(config.counters.legacy_unclamped_unrepost);
        assert!(config.fanout.inline);
        assert_eq!(config.app.http_port, 9000);
    }

    #[test]
    fn test_production_requires_database() {
        assert!(config_from(&[("APP_ENV", "production")]).is_err());
        assert!(config_from(&[("APP_ENV", "production"), ("DATABASE_URL", "postgres://db")]).is_ok());
    }

    #[test]
    fn test_comment_pages_share_feed_max() {
        let config = config_from(&[("FEED_MAX_LIMIT", "40")]).unwrap();
        assert_eq!(config.content.max_page_limit, 40);
    }

    #[test]
    fn test_default_limit_must_fit_max() {
        assert!(config_from(&[("FEED_DEFAULT_LIMIT", "500")]).is_err());
    }
}
