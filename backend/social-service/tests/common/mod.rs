//! Shared fixture for integration tests.
//!
//! Builds the full service graph over an in-memory store, with inline
//! fan-out so notifications are settled when a call returns.

#![allow(dead_code)]

use std::sync::Arc;

use social_service::config::Config;
use social_service::domain::{Content, ContentRef, Notification, NotificationType, Principal, User, VerificationTier};
use social_service::handlers::AppState;
use social_service::repository::{ContentStore, InMemoryStore};
use social_service::services::{LocalMediaStore, NewContent};
use tempfile::TempDir;
use uuid::Uuid;

pub struct TestApp {
    pub store: Arc<InMemoryStore>,
    pub state: AppState,
    pub uploads: TempDir,
}

pub fn test_config(overrides: &[(&str, &str)]) -> Config {
    let mut vars: Vec<(String, String)> = vec![("FANOUT_INLINE".into(), "true".into())];
    vars.extend(overrides.iter().map(|(k, v)| (k.to_string(), v.to_string())));
    Config::from_lookup(move |key| {
        vars.iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    })
    .expect("test config")
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(test_config(&[]))
    }

    pub fn with_config(config: Config) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let uploads = tempfile::tempdir().expect("tempdir");
        let media = Arc::new(LocalMediaStore::new(uploads.path(), "/uploads"));
        let bundle = social_service::build_services(&config, store.clone(), media);
        Self {
            store,
            state: bundle.state,
            uploads,
        }
    }

    pub async fn register(&self, username: &str) -> Principal {
        self.register_tier(username, VerificationTier::Unverified).await
    }

    pub async fn register_tier(&self, username: &str, tier: VerificationTier) -> Principal {
        let user = self
            .state
            .users
            .register(username, tier)
            .await
            .expect("register user");
        Principal::from(&user)
    }

    pub async fn user(&self, id: Uuid) -> User {
        self.store
            .find_user(id)
            .await
            .expect("store")
            .expect("user exists")
    }

    pub async fn content(&self, target: ContentRef) -> Option<Content> {
        self.store.find_content(target).await.expect("store")
    }

    pub async fn post(&self, author: &Principal, body: &str) -> Content {
        self.state
            .content
            .create(
                Some(author),
                NewContent {
                    body: body.to_string(),
                    ..Default::default()
                },
            )
            .await
            .expect("create post")
    }

    pub async fn comment(&self, author: &Principal, parent: ContentRef, body: &str) -> Content {
        self.state
            .content
            .create(
                Some(author),
                NewContent {
                    body: body.to_string(),
                    parent: Some(parent),
                    media: None,
                },
            )
            .await
            .expect("create comment")
    }

    pub async fn notifications_of(
        &self,
        kind: NotificationType,
        recipient: Uuid,
    ) -> Vec<Notification> {
        self.store
            .all_notifications()
            .await
            .into_iter()
            .filter(|n| n.kind == kind && n.recipient_id == recipient)
            .collect()
    }
}
