//! Article listing, threads, and the moderation/reaction endpoints.

use super::{db_error, redirect_to};
use crate::app_config;
use crate::article::{self, vote};
use crate::middleware::{ClientCtx, RequirePermission};
use crate::orm::article_votes::VoteType;
use crate::permission::{ArticleAction, PermissionId};
use crate::settings::get_settings;
use actix_web::{error, get, post, web, Error, HttpResponse};
use serde::Deserialize;

const CREATE: &[PermissionId] = &[PermissionId::Article(ArticleAction::Create)];
const REPLY: &[PermissionId] = &[PermissionId::Article(ArticleAction::Reply)];
const EDIT: &[PermissionId] = &[PermissionId::Article(ArticleAction::EditMine)];
const DELETE: &[PermissionId] = &[PermissionId::Article(ArticleAction::DeleteMine)];
const REACT: &[PermissionId] = &[PermissionId::Article(ArticleAction::React)];
const SAVE: &[PermissionId] = &[PermissionId::Article(ArticleAction::Save)];
const SUBSCRIBE: &[PermissionId] = &[PermissionId::Article(ArticleAction::Subscribe)];
const LOCK: &[PermissionId] = &[PermissionId::Article(ArticleAction::Lock)];
const PIN: &[PermissionId] = &[PermissionId::Article(ArticleAction::Pin)];

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(
        web::resource("/articles/new")
            .wrap(RequirePermission::new(CREATE))
            .route(web::get().to(view_compose)),
    )
    .service(
        web::resource("/articles")
            .wrap(RequirePermission::new(CREATE))
            .route(web::post().to(create_article)),
    )
    .service(
        web::resource("/articles/{article_id}/reply")
            .wrap(RequirePermission::new(REPLY))
            .route(web::post().to(create_reply)),
    )
    .service(
        web::resource("/articles/{article_id}/edit")
            .wrap(RequirePermission::new(EDIT))
            .route(web::get().to(view_edit))
            .route(web::post().to(update_article)),
    )
    .service(
        web::resource("/articles/{article_id}/delete")
            .wrap(RequirePermission::new(DELETE))
            .route(web::post().to(delete_article)),
    )
    .service(
        web::resource("/articles/{article_id}/react")
            .wrap(RequirePermission::new(REACT))
            .route(web::post().to(react_article)),
    )
    .service(
        web::resource("/articles/{article_id}/save")
            .wrap(RequirePermission::new(SAVE))
            .route(web::post().to(save_article)),
    )
    .service(
        web::resource("/articles/{article_id}/subscribe")
            .wrap(RequirePermission::new(SUBSCRIBE))
            .route(web::post().to(subscribe_article)),
    )
    .service(
        web::resource("/articles/{article_id}/lock")
            .wrap(RequirePermission::new(LOCK))
            .route(web::post().to(lock_article)),
    )
    .service(
        web::resource("/articles/{article_id}/pin")
            .wrap(RequirePermission::new(PIN))
            .route(web::post().to(pin_article)),
    )
    .service(vote_article)
    .service(view_index)
    .service(view_saved)
    .service(view_article);
}

#[derive(Deserialize)]
struct ListQuery {
    category: Option<String>,
    page: Option<u64>,
}

#[derive(Deserialize)]
struct ArticleForm {
    title: String,
    content: String,
    link: Option<String>,
    category: Option<String>,
}

#[derive(Deserialize)]
struct ReplyForm {
    content: String,
}

#[derive(Deserialize)]
struct VoteForm {
    vote_type: String,
}

#[derive(Deserialize)]
struct ReactForm {
    react_id: String,
}

#[derive(Deserialize)]
struct LockForm {
    locked: bool,
}

#[derive(Deserialize)]
struct PinForm {
    hours: i64,
}

fn validated_title(title: &str) -> Result<String, Error> {
    let title = title.trim();
    if title.is_empty() {
        return Err(error::ErrorBadRequest("Title is required."));
    }
    if title.chars().count() > app_config::limits().max_title_length as usize {
        return Err(error::ErrorBadRequest("Title is too long."));
    }
    Ok(title.to_owned())
}

fn validated_content(content: &str) -> Result<String, Error> {
    let content = content.trim();
    if content.is_empty() {
        return Err(error::ErrorBadRequest("Content is required."));
    }
    if content.chars().count() > app_config::limits().max_content_length as usize {
        return Err(error::ErrorBadRequest("Content is too long."));
    }
    Ok(content.to_owned())
}

/// A fresh article may be just a title and a link; replies and edits
/// cannot be empty.
fn validated_optional_content(content: &str) -> Result<String, Error> {
    if content.trim().is_empty() {
        return Ok(String::new());
    }
    validated_content(content)
}

fn validated_link(link: &Option<String>) -> Result<Option<String>, Error> {
    let link = match link.as_deref().map(str::trim) {
        Some(link) if !link.is_empty() => link,
        _ => return Ok(None),
    };
    match url::Url::parse(link) {
        Ok(parsed) if ["http", "https"].contains(&parsed.scheme()) => Ok(Some(link.to_owned())),
        _ => Err(error::ErrorBadRequest("Link must be an http(s) URL.")),
    }
}

fn validated_category(category: &Option<String>) -> Result<Option<String>, Error> {
    let category = match category.as_deref().map(str::trim) {
        Some(category) if !category.is_empty() => category,
        _ => return Ok(None),
    };
    if category.chars().count() > 50 {
        return Err(error::ErrorBadRequest("Category name is too long."));
    }
    Ok(Some(category.to_owned()))
}

/// Thread roots always sit in a category.
fn required_category(category: &Option<String>) -> Result<String, Error> {
    validated_category(category)?.ok_or_else(|| error::ErrorBadRequest("Category is required."))
}

/// Front page: pinned articles first, then by decayed vote score.
#[get("/")]
async fn view_index(query: web::Query<ListQuery>) -> Result<HttpResponse, Error> {
    let page = query.page.unwrap_or(1).max(1);
    let articles = article::fetch_article_list(query.category.as_deref(), page)
        .await
        .map_err(db_error)?;

    let site = app_config::site();
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "site_name": site.name,
        "notice": get_settings().site_notice(),
        "category": query.category,
        "page": page,
        "articles": articles,
    })))
}

/// An article with its nested reply tree, evaluated for the viewer.
#[get("/articles/{article_id}")]
async fn view_article(client: ClientCtx, path: web::Path<i32>) -> Result<HttpResponse, Error> {
    let article_id = path.into_inner();
    let viewer_id = client.get_id().unwrap_or(0);

    let tree = article::fetch_article_tree(article_id, viewer_id)
        .await
        .map_err(db_error)?
        .ok_or_else(|| error::ErrorNotFound("Article not found."))?;

    Ok(HttpResponse::Ok().json(tree))
}

/// Articles the signed-in user saved.
#[get("/saved")]
async fn view_saved(client: ClientCtx, query: web::Query<ListQuery>) -> Result<HttpResponse, Error> {
    let user_id = client.require_login()?;
    let page = query.page.unwrap_or(1).max(1);

    let articles = article::fetch_saved_list(user_id, page)
        .await
        .map_err(db_error)?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "page": page,
        "articles": articles,
    })))
}

/// Compose-form metadata so the frontend can mirror the server limits.
async fn view_compose() -> Result<HttpResponse, Error> {
    let limits = app_config::limits();
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "max_title_length": limits.max_title_length,
        "max_content_length": limits.max_content_length,
    })))
}

async fn create_article(
    client: ClientCtx,
    form: web::Form<ArticleForm>,
) -> Result<HttpResponse, Error> {
    let author_id = client.require_login()?;

    let title = validated_title(&form.title)?;
    let content = validated_optional_content(&form.content)?;
    let link = validated_link(&form.link)?;
    let category = required_category(&form.category)?;

    let article_id =
        article::create_article(author_id, &title, &content, link.as_deref(), Some(&category))
            .await
            .map_err(db_error)?;

    Ok(redirect_to(&format!("/articles/{}", article_id)))
}

async fn create_reply(
    client: ClientCtx,
    path: web::Path<i32>,
    form: web::Form<ReplyForm>,
) -> Result<HttpResponse, Error> {
    let author_id = client.require_login()?;
    let parent_id = path.into_inner();
    let content = validated_content(&form.content)?;

    let reply_id = article::create_reply(author_id, parent_id, &content)
        .await
        .map_err(db_error)?;

    Ok(redirect_to(&format!("/articles/{}#a{}", parent_id, reply_id)))
}

/// The current field values for an edit form.
async fn view_edit(client: ClientCtx, path: web::Path<i32>) -> Result<HttpResponse, Error> {
    client.require_login()?;
    let article_id = path.into_inner();

    let article = article::get_article(article_id)
        .await
        .map_err(db_error)?
        .ok_or_else(|| error::ErrorNotFound("Article not found."))?;

    if !client.can_modify(
        article.author_id,
        PermissionId::Article(ArticleAction::EditOthers),
    ) {
        return Err(error::ErrorForbidden("Insufficient permissions"));
    }

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "id": article.id,
        "title": article.title,
        "content": article.content,
        "link": article.link,
        "category": article.category,
        "is_reply": article.reply_to != 0,
    })))
}

async fn update_article(
    client: ClientCtx,
    path: web::Path<i32>,
    form: web::Form<ArticleForm>,
) -> Result<HttpResponse, Error> {
    client.require_login()?;
    let article_id = path.into_inner();

    let existing = article::get_article(article_id)
        .await
        .map_err(db_error)?
        .ok_or_else(|| error::ErrorNotFound("Article not found."))?;

    if !client.can_modify(
        existing.author_id,
        PermissionId::Article(ArticleAction::EditOthers),
    ) {
        return Err(error::ErrorForbidden("Insufficient permissions"));
    }

    let content = validated_content(&form.content)?;
    // Replies carry no title, link or category of their own; skip those
    // rules for them.
    let (title, link, category) = if existing.reply_to == 0 {
        (
            validated_title(&form.title)?,
            validated_link(&form.link)?,
            Some(required_category(&form.category)?),
        )
    } else {
        (String::new(), None, None)
    };

    article::update_article(article_id, &title, &content, link.as_deref(), category.as_deref())
        .await
        .map_err(db_error)?;

    Ok(redirect_to(&format!("/articles/{}", article_id)))
}

async fn delete_article(client: ClientCtx, path: web::Path<i32>) -> Result<HttpResponse, Error> {
    client.require_login()?;
    let article_id = path.into_inner();

    let existing = article::get_article(article_id)
        .await
        .map_err(db_error)?
        .ok_or_else(|| error::ErrorNotFound("Article not found."))?;

    if !client.can_modify(
        existing.author_id,
        PermissionId::Article(ArticleAction::DeleteOthers),
    ) {
        return Err(error::ErrorForbidden("Insufficient permissions"));
    }

    article::delete_article(article_id).await.map_err(db_error)?;

    Ok(redirect_to("/"))
}

/// Vote endpoint. The direction decides which permission applies, so the
/// check happens here instead of in a route guard.
#[post("/articles/{article_id}/vote")]
async fn vote_article(
    client: ClientCtx,
    path: web::Path<i32>,
    form: web::Form<VoteForm>,
) -> Result<HttpResponse, Error> {
    let user_id = client.require_login()?;
    let article_id = path.into_inner();

    let vote_type = match form.vote_type.as_str() {
        "up" => VoteType::Up,
        "down" => VoteType::Down,
        _ => return Err(error::ErrorBadRequest("Unknown vote type.")),
    };
    let needed = match vote_type {
        VoteType::Up => PermissionId::Article(ArticleAction::VoteUp),
        VoteType::Down => PermissionId::Article(ArticleAction::VoteDown),
    };
    client.require_permission(needed)?;

    article::get_article(article_id)
        .await
        .map_err(db_error)?
        .ok_or_else(|| error::ErrorNotFound("Article not found."))?;

    let signal = vote::toggle_vote(article_id, user_id, vote_type)
        .await
        .map_err(db_error)?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "signal": signal.as_i8() })))
}

async fn react_article(
    client: ClientCtx,
    path: web::Path<i32>,
    form: web::Form<ReactForm>,
) -> Result<HttpResponse, Error> {
    let user_id = client.require_login()?;
    let article_id = path.into_inner();

    if !vote::valid_react_id(&form.react_id) {
        return Err(error::ErrorBadRequest("Unknown react id."));
    }

    article::get_article(article_id)
        .await
        .map_err(db_error)?
        .ok_or_else(|| error::ErrorNotFound("Article not found."))?;

    let (signal, previous) = vote::toggle_react(article_id, user_id, &form.react_id)
        .await
        .map_err(db_error)?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "signal": signal.as_i8(),
        "previous": previous,
    })))
}

async fn save_article(client: ClientCtx, path: web::Path<i32>) -> Result<HttpResponse, Error> {
    let user_id = client.require_login()?;
    let article_id = path.into_inner();

    article::get_article(article_id)
        .await
        .map_err(db_error)?
        .ok_or_else(|| error::ErrorNotFound("Article not found."))?;

    let signal = vote::toggle_save(article_id, user_id)
        .await
        .map_err(db_error)?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "signal": signal.as_i8() })))
}

async fn subscribe_article(client: ClientCtx, path: web::Path<i32>) -> Result<HttpResponse, Error> {
    let user_id = client.require_login()?;
    let article_id = path.into_inner();

    article::get_article(article_id)
        .await
        .map_err(db_error)?
        .ok_or_else(|| error::ErrorNotFound("Article not found."))?;

    let signal = vote::toggle_subscribe(article_id, user_id)
        .await
        .map_err(db_error)?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "signal": signal.as_i8() })))
}

async fn lock_article(
    client: ClientCtx,
    path: web::Path<i32>,
    form: web::Form<LockForm>,
) -> Result<HttpResponse, Error> {
    client.require_login()?;
    let article_id = path.into_inner();

    article::get_article(article_id)
        .await
        .map_err(db_error)?
        .ok_or_else(|| error::ErrorNotFound("Article not found."))?;

    article::set_locked(article_id, form.locked)
        .await
        .map_err(db_error)?;

    Ok(redirect_to(&format!("/articles/{}", article_id)))
}

async fn pin_article(
    client: ClientCtx,
    path: web::Path<i32>,
    form: web::Form<PinForm>,
) -> Result<HttpResponse, Error> {
    client.require_login()?;
    let article_id = path.into_inner();

    if form.hours < 0 {
        return Err(error::ErrorBadRequest("Pin hours cannot be negative."));
    }

    article::get_article(article_id)
        .await
        .map_err(db_error)?
        .ok_or_else(|| error::ErrorNotFound("Article not found."))?;

    article::set_pinned(article_id, form.hours)
        .await
        .map_err(db_error)?;

    Ok(redirect_to("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_is_required_and_capped() {
        assert!(validated_title("This is Title").is_ok());
        assert_eq!(validated_title("  padded  ").unwrap(), "padded");
        assert!(validated_title("").is_err());
        assert!(validated_title("   ").is_err());

        let max = app_config::limits().max_title_length as usize;
        assert!(validated_title(&"x".repeat(max)).is_ok());
        assert!(validated_title(&"x".repeat(max + 1)).is_err());
    }

    #[test]
    fn content_is_optional_only_where_said_so() {
        assert!(validated_content(" ").is_err());
        assert_eq!(validated_optional_content(" ").unwrap(), "");
        assert_eq!(validated_optional_content("hello").unwrap(), "hello");

        let max = app_config::limits().max_content_length as usize;
        assert!(validated_content(&"x".repeat(max)).is_ok());
        assert!(validated_content(&"x".repeat(max + 1)).is_err());
        assert!(validated_optional_content(&"x".repeat(max + 1)).is_err());
    }

    #[test]
    fn links_must_be_absolute_http() {
        assert_eq!(validated_link(&None).unwrap(), None);
        assert_eq!(validated_link(&Some("  ".into())).unwrap(), None);
        assert_eq!(
            validated_link(&Some("https://test.com".into()))
                .unwrap()
                .as_deref(),
            Some("https://test.com")
        );
        assert!(validated_link(&Some("abc.com".into())).is_err());
        assert!(validated_link(&Some("ftp://test.com".into())).is_err());
    }

    #[test]
    fn roots_need_a_category() {
        assert_eq!(
            required_category(&Some("general".into())).unwrap(),
            "general"
        );
        assert!(required_category(&None).is_err());
        assert!(required_category(&Some("  ".into())).is_err());
        assert!(required_category(&Some("x".repeat(51))).is_err());
    }
}
