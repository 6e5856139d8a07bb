/// Feed handlers - ranked feed, user reposts and hashtags
use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;

use super::{resolve_principal, AppState, PageQuery};
use crate::error::ServiceResult;
use crate::services::RankingPolicy;

#[derive(Debug, Deserialize)]
pub struct FeedQuery {
    pub filter: Option<String>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

/// Get the feed for a ranking policy (default: LATEST)
pub async fn get_feed(
    req: HttpRequest,
    state: web::Data<AppState>,
    query: web::Query<FeedQuery>,
) -> ServiceResult<HttpResponse> {
    let policy: RankingPolicy = query.filter.as_deref().unwrap_or("LATEST").parse()?;
    let principal = resolve_principal(&req, &state.users).await?;

    let items = state
        .feed
        .get_feed(
            policy,
            query.page.unwrap_or(1),
            query.limit,
            principal.as_ref(),
        )
        .await?;

    Ok(HttpResponse::Ok().json(items))
}

pub async fn get_user_reposts(
    state: web::Data<AppState>,
    username: web::Path<String>,
    query: web::Query<PageQuery>,
) -> ServiceResult<HttpResponse> {
    let reposts = state
        .feed
        .get_reposts_by_user(&username, query.page(), query.limit)
        .await?;
    Ok(HttpResponse::Ok().json(reposts))
}

pub async fn trending_hashtags(
    state: web::Data<AppState>,
    query: web::Query<PageQuery>,
) -> ServiceResult<HttpResponse> {
    let tags = state.hashtags.trending(query.page(), query.limit).await?;
    Ok(HttpResponse::Ok().json(tags))
}

/// Posts and comments carrying a hashtag, newest first
pub async fn tagged_content(
    state: web::Data<AppState>,
    tag: web::Path<String>,
    query: web::Query<PageQuery>,
) -> ServiceResult<HttpResponse> {
    let contents = state
        .hashtags
        .tagged_content(&tag, query.page(), query.limit)
        .await?;
    Ok(HttpResponse::Ok().json(contents))
}
