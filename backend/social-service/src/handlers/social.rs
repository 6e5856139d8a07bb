/// Social handlers - likes, reposts, follows and user accounts
use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;

use super::{parse_content_ref, resolve_principal, AppState, MediaPayload};
use crate::domain::VerificationTier;
use crate::error::ServiceResult;
use crate::services::{PictureSlot, ProfileUpdate};

#[derive(Debug, Deserialize)]
pub struct RegisterUserRequest {
    pub username: String,
    #[serde(default)]
    pub verification: VerificationTier,
}

pub async fn register_user(
    state: web::Data<AppState>,
    body: web::Json<RegisterUserRequest>,
) -> ServiceResult<HttpResponse> {
    let user = state
        .users
        .register(&body.username, body.verification)
        .await?;
    Ok(HttpResponse::Created().json(user))
}

pub async fn get_user(
    state: web::Data<AppState>,
    username: web::Path<String>,
) -> ServiceResult<HttpResponse> {
    let user = state.users.get_by_username(&username).await?;
    Ok(HttpResponse::Ok().json(user))
}

pub async fn delete_user(
    req: HttpRequest,
    state: web::Data<AppState>,
    username: web::Path<String>,
) -> ServiceResult<HttpResponse> {
    let principal = resolve_principal(&req, &state.users).await?;
    let user = state
        .users
        .delete_user(principal.as_ref(), &username)
        .await?;
    Ok(HttpResponse::Ok().json(user))
}

pub async fn update_profile(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<ProfileUpdate>,
) -> ServiceResult<HttpResponse> {
    let principal = resolve_principal(&req, &state.users).await?;
    let user = state
        .users
        .update_profile(principal.as_ref(), body.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(user))
}

/// Body of a picture change; no media clears the picture.
#[derive(Debug, Deserialize)]
pub struct PictureRequest {
    pub media: Option<MediaPayload>,
}

async fn change_picture(
    req: HttpRequest,
    state: web::Data<AppState>,
    slot: PictureSlot,
    body: PictureRequest,
) -> ServiceResult<HttpResponse> {
    let principal = resolve_principal(&req, &state.users).await?;
    let file = body.media.map(MediaPayload::decode).transpose()?;
    let user = state
        .users
        .change_picture(principal.as_ref(), slot, file)
        .await?;
    Ok(HttpResponse::Ok().json(user))
}

pub async fn change_profile_picture(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<PictureRequest>,
) -> ServiceResult<HttpResponse> {
    change_picture(req, state, PictureSlot::Profile, body.into_inner()).await
}

pub async fn change_background_picture(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<PictureRequest>,
) -> ServiceResult<HttpResponse> {
    change_picture(req, state, PictureSlot::Background, body.into_inner()).await
}

pub async fn like(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> ServiceResult<HttpResponse> {
    let principal = resolve_principal(&req, &state.users).await?;
    let (kind, id) = path.into_inner();
    let content = state
        .counters
        .like(principal.as_ref(), parse_content_ref(&kind, &id)?)
        .await?;
    Ok(HttpResponse::Ok().json(content))
}

pub async fn unlike(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> ServiceResult<HttpResponse> {
    let principal = resolve_principal(&req, &state.users).await?;
    let (kind, id) = path.into_inner();
    let content = state
        .counters
        .unlike(principal.as_ref(), parse_content_ref(&kind, &id)?)
        .await?;
    Ok(HttpResponse::Ok().json(content))
}

pub async fn repost(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> ServiceResult<HttpResponse> {
    let principal = resolve_principal(&req, &state.users).await?;
    let (kind, id) = path.into_inner();
    let view = state
        .counters
        .repost(principal.as_ref(), parse_content_ref(&kind, &id)?)
        .await?;
    Ok(HttpResponse::Created().json(view))
}

pub async fn unrepost(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> ServiceResult<HttpResponse> {
    let principal = resolve_principal(&req, &state.users).await?;
    let (kind, id) = path.into_inner();
    let target = parse_content_ref(&kind, &id)?;
    let repost = state
        .counters
        .unrepost(principal.as_ref(), target.id)
        .await?;
    Ok(HttpResponse::Ok().json(repost))
}

pub async fn follow(
    req: HttpRequest,
    state: web::Data<AppState>,
    username: web::Path<String>,
) -> ServiceResult<HttpResponse> {
    let principal = resolve_principal(&req, &state.users).await?;
    let followee = state.users.get_by_username(&username).await?;
    let user = state
        .counters
        .follow(principal.as_ref(), followee.id)
        .await?;
    Ok(HttpResponse::Ok().json(user))
}

pub async fn unfollow(
    req: HttpRequest,
    state: web::Data<AppState>,
    username: web::Path<String>,
) -> ServiceResult<HttpResponse> {
    let principal = resolve_principal(&req, &state.users).await?;
    let followee = state.users.get_by_username(&username).await?;
    let user = state
        .counters
        .unfollow(principal.as_ref(), followee.id)
        .await?;
    Ok(HttpResponse::Ok().json(user))
}
