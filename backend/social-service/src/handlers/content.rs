/// Content handlers - create, read, edit and delete posts and comments
use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;
use std::str::FromStr;

use super::{parse_content_ref, parse_uuid, resolve_principal, AppState, MediaPayload, PageQuery};
use crate::domain::{ContentKind, ContentRef};
use crate::error::{ServiceError, ServiceResult};
use crate::services::{ContentEdit, NewContent};

#[derive(Debug, Deserialize)]
pub struct CreateContentRequest {
    #[serde(default)]
    pub body: String,
    pub parent_id: Option<String>,
    pub parent_type: Option<String>,
    pub media: Option<MediaPayload>,
}

impl CreateContentRequest {
    fn parent(&self) -> ServiceResult<Option<ContentRef>> {
        match (&self.parent_id, &self.parent_type) {
            (None, None) => Ok(None),
            (Some(id), Some(kind)) => {
                let kind = ContentKind::from_str(kind).map_err(ServiceError::validation)?;
                Ok(Some(ContentRef::new(parse_uuid(id, "parent")?, kind)))
            }
            _ => Err(ServiceError::validation(
                "parent_id and parent_type must be given together",
            )),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct EditContentRequest {
    #[serde(default)]
    pub body: String,
    pub media: Option<MediaPayload>,
}

/// Create a post, or a comment when a parent is given
pub async fn create_content(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<CreateContentRequest>,
) -> ServiceResult<HttpResponse> {
    let principal = resolve_principal(&req, &state.users).await?;
    let body = body.into_inner();
    let parent = body.parent()?;
    let media = body.media.map(MediaPayload::decode).transpose()?;

    let content = state
        .content
        .create(
            principal.as_ref(),
            NewContent {
                body: body.body,
                parent,
                media,
            },
        )
        .await?;

    Ok(HttpResponse::Created().json(content))
}

pub async fn get_content(
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> ServiceResult<HttpResponse> {
    let (kind, id) = path.into_inner();
    let content = state.content.get(parse_content_ref(&kind, &id)?).await?;
    Ok(HttpResponse::Ok().json(content))
}

pub async fn edit_content(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
    body: web::Json<EditContentRequest>,
) -> ServiceResult<HttpResponse> {
    let principal = resolve_principal(&req, &state.users).await?;
    let (kind, id) = path.into_inner();
    let target = parse_content_ref(&kind, &id)?;
    let body = body.into_inner();
    let media = body.media.map(MediaPayload::decode).transpose()?;

    let content = state
        .content
        .edit(
            principal.as_ref(),
            target,
            ContentEdit {
                body: body.body,
                media,
            },
        )
        .await?;

    Ok(HttpResponse::Ok().json(content))
}

pub async fn delete_content(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> ServiceResult<HttpResponse> {
    let principal = resolve_principal(&req, &state.users).await?;
    let (kind, id) = path.into_inner();
    let content = state
        .content
        .delete(principal.as_ref(), parse_content_ref(&kind, &id)?)
        .await?;
    Ok(HttpResponse::Ok().json(content))
}

/// Direct replies, newest first
pub async fn list_comments(
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
    query: web::Query<PageQuery>,
) -> ServiceResult<HttpResponse> {
    let (kind, id) = path.into_inner();
    let comments = state
        .content
        .list_comments(
            parse_content_ref(&kind, &id)?,
            query.page(),
            query.limit.unwrap_or(state.feed.config().default_limit),
        )
        .await?;
    Ok(HttpResponse::Ok().json(comments))
}
