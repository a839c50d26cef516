//! Notification list and read-state routes.

use super::{db_error, redirect_to};
use crate::middleware::ClientCtx;
use crate::notifications;
use actix_web::{get, post, web, Error, HttpResponse};
use serde::Deserialize;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(unread_count)
        .service(view_notifications)
        .service(mark_all_read);
}

#[derive(Deserialize)]
struct PageQuery {
    page: Option<u64>,
}

/// Lists a page of notifications. Items on the returned page are marked
/// read, so the unread count in the response already excludes them.
#[get("/notifications")]
async fn view_notifications(
    client: ClientCtx,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse, Error> {
    let user_id = client.require_login()?;
    let page = query.page.unwrap_or(1).max(1);

    let items = notifications::list_page(user_id, page)
        .await
        .map_err(db_error)?;

    let unread_ids: Vec<i32> = items.iter().filter(|n| !n.is_read).map(|n| n.id).collect();
    if !unread_ids.is_empty() {
        notifications::mark_read(user_id, &unread_ids)
            .await
            .map_err(db_error)?;
    }

    let unread = notifications::count_unread(user_id)
        .await
        .map_err(db_error)?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "page": page,
        "unread": unread,
        "notifications": items,
    })))
}

#[get("/notifications/unread_count")]
async fn unread_count(client: ClientCtx) -> Result<HttpResponse, Error> {
    let user_id = client.require_login()?;
    let unread = notifications::count_unread(user_id)
        .await
        .map_err(db_error)?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "count": unread })))
}

#[post("/notifications/read_all")]
async fn mark_all_read(client: ClientCtx) -> Result<HttpResponse, Error> {
    let user_id = client.require_login()?;
    notifications::mark_all_read(user_id)
        .await
        .map_err(db_error)?;

    Ok(redirect_to("/notifications"))
}
