/// Notification inbox handlers
use actix_web::{web, HttpRequest, HttpResponse};

use super::{parse_uuid, resolve_principal, AppState, PageQuery};
use crate::error::ServiceResult;
use crate::services::notifications::DEFAULT_INBOX_LIMIT;
use crate::services::require_principal;

pub async fn list_notifications(
    req: HttpRequest,
    state: web::Data<AppState>,
    query: web::Query<PageQuery>,
) -> ServiceResult<HttpResponse> {
    let principal = resolve_principal(&req, &state.users).await?;
    let principal = require_principal(principal.as_ref(), "view notifications")?;

    let notifications = state
        .notifications
        .list(
            principal,
            query.page(),
            query.limit.unwrap_or(DEFAULT_INBOX_LIMIT),
        )
        .await?;
    Ok(HttpResponse::Ok().json(notifications))
}

pub async fn delete_notification(
    req: HttpRequest,
    state: web::Data<AppState>,
    id: web::Path<String>,
) -> ServiceResult<HttpResponse> {
    let principal = resolve_principal(&req, &state.users).await?;
    let principal = require_principal(principal.as_ref(), "delete notifications")?;

    state
        .notifications
        .delete(principal, parse_uuid(&id, "notification")?)
        .await?;
    Ok(HttpResponse::NoContent().finish())
}

pub async fn delete_all_notifications(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> ServiceResult<HttpResponse> {
    let principal = resolve_principal(&req, &state.users).await?;
    let principal = require_principal(principal.as_ref(), "delete notifications")?;

    let removed = state.notifications.delete_all(principal).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "removed": removed })))
}
