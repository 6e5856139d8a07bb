//! HTTP surface. Handlers stay thin: decode, resolve the caller, delegate.

use actix_web::{web, HttpRequest, HttpResponse};
use base64::Engine;
use serde::Deserialize;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{ContentKind, ContentRef, Principal};
use crate::error::{ServiceError, ServiceResult};
use crate::metrics::serve_metrics;
use crate::repository::ContentStore;
use crate::services::{
    ContentService, CounterService, FeedService, HashtagService, MediaStore, MediaUpload,
    NotificationService, UserService,
};

pub mod content;
pub mod feed;
pub mod notifications;
pub mod social;

/// Identity forwarded by the gateway after it has verified credentials.
pub const USER_ID_HEADER: &str = "x-user-id";

#[derive(Clone)]
pub struct AppState {
    pub users: UserService,
    pub counters: CounterService,
    pub content: ContentService,
    pub feed: FeedService,
    pub notifications: NotificationService,
    pub hashtags: HashtagService,
}

impl AppState {
    pub fn new(
        store: Arc<dyn ContentStore>,
        media: Arc<dyn MediaStore>,
        counters: CounterService,
        content: ContentService,
        feed: FeedService,
        notifications: NotificationService,
    ) -> Self {
        Self {
            users: UserService::new(
                store.clone(),
                media,
                content.clone(),
                counters.clone(),
                notifications.clone(),
            ),
            hashtags: HashtagService::new(store),
            counters,
            content,
            feed,
            notifications,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

impl PageQuery {
    pub fn page(&self) -> u64 {
        self.page.unwrap_or(1)
    }
}

/// Base64 media attached to a content or profile request.
#[derive(Debug, Deserialize)]
pub struct MediaPayload {
    pub filename: String,
    pub data: String,
}

impl MediaPayload {
    pub fn decode(self) -> ServiceResult<MediaUpload> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(self.data.as_bytes())
            .map_err(|_| ServiceError::validation("media data is not valid base64"))?;
        Ok(MediaUpload::new(self.filename, bytes))
    }
}

/// Resolves the `x-user-id` header into a principal. No header means an
/// anonymous caller; a malformed or unknown id is rejected.
pub async fn resolve_principal(
    req: &HttpRequest,
    users: &UserService,
) -> ServiceResult<Option<Principal>> {
    let Some(header_value) = req.headers().get(USER_ID_HEADER) else {
        return Ok(None);
    };

    let value = header_value
        .to_str()
        .map_err(|_| ServiceError::authentication("Invalid x-user-id header"))?;
    let id = Uuid::parse_str(value.trim())
        .map_err(|_| ServiceError::authentication("Invalid x-user-id header value"))?;

    match users.get(id).await {
        Ok(user) => Ok(Some(Principal::from(&user))),
        Err(ServiceError::NotFound(_)) => Err(ServiceError::authentication("Unknown user")),
        Err(err) => Err(err),
    }
}

pub fn parse_uuid(raw: &str, what: &str) -> ServiceResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| ServiceError::validation(format!("Invalid {} ID", what)))
}

pub fn parse_content_ref(kind: &str, id: &str) -> ServiceResult<ContentRef> {
    let kind = ContentKind::from_str(kind).map_err(ServiceError::validation)?;
    Ok(ContentRef::new(parse_uuid(id, kind.as_str())?, kind))
}

pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "service": "social-service",
    }))
}

/// Registers every route. Shared by the binary and the HTTP tests.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health))
        .route("/metrics", web::get().to(serve_metrics))
        .service(
            web::scope("/api/v1")
                .route("/feed", web::get().to(feed::get_feed))
                .route("/users", web::post().to(social::register_user))
                .route("/users/{username}", web::get().to(social::get_user))
                .route("/users/{username}", web::delete().to(social::delete_user))
                .route("/users/{username}/reposts", web::get().to(feed::get_user_reposts))
                .route("/users/{username}/follow", web::post().to(social::follow))
                .route("/users/{username}/follow", web::delete().to(social::unfollow))
                .route("/profile", web::put().to(social::update_profile))
                .route("/profile/picture", web::put().to(social::change_profile_picture))
                .route("/profile/background", web::put().to(social::change_background_picture))
                .route("/contents", web::post().to(content::create_content))
                .route("/contents/{kind}/{id}", web::get().to(content::get_content))
                .route("/contents/{kind}/{id}", web::put().to(content::edit_content))
                .route("/contents/{kind}/{id}", web::delete().to(content::delete_content))
                .route("/contents/{kind}/{id}/comments", web::get().to(content::list_comments))
                .route("/contents/{kind}/{id}/like", web::post().to(social::like))
                .route("/contents/{kind}/{id}/like", web::delete().to(social::unlike))
                .route("/contents/{kind}/{id}/repost", web::post().to(social::repost))
                .route("/contents/{kind}/{id}/repost", web::delete().to(social::unrepost))
                .route("/notifications", web::get().to(notifications::list_notifications))
                .route("/notifications", web::delete().to(notifications::delete_all_notifications))
                .route("/notifications/{id}", web::delete().to(notifications::delete_notification))
                .route("/hashtags/trending", web::get().to(feed::trending_hashtags))
                .route("/hashtags/{tag}/contents", web::get().to(feed::tagged_content)),
        );
}
