//! Registration, the account page, and public profiles.

use super::{db_error, redirect_to};
use crate::app_config;
use crate::middleware::ClientCtx;
use crate::notifications;
use crate::permission::{PermissionId, UserAction};
use crate::session;
use crate::settings::get_settings;
use crate::user::{self, Profile};
use actix_web::{error, get, post, web, Error, HttpResponse};
use serde::Deserialize;
use validator::Validate;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(view_register)
        .service(post_register)
        .service(view_account)
        .service(update_account)
        .service(view_profile);
}

#[derive(Deserialize, Validate)]
pub struct RegisterForm {
    #[validate(length(min = 1, max = 32))]
    username: String,
    #[validate(length(min = 8, max = 1000))]
    password: String,
    #[validate(email)]
    email: String,
}

#[derive(Deserialize)]
struct IntroForm {
    introduction: String,
}

#[get("/register")]
async fn view_register() -> Result<HttpResponse, Error> {
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "registration_enabled": get_settings().registration_enabled(),
    })))
}

#[post("/register")]
async fn post_register(
    session: actix_session::Session,
    form: web::Form<RegisterForm>,
) -> Result<HttpResponse, Error> {
    if !get_settings().registration_enabled() {
        return Err(error::ErrorForbidden("Registration is closed."));
    }

    form.validate().map_err(|err| {
        log::debug!("Registration validation failed: {}", err);
        error::ErrorBadRequest("Invalid registration data")
    })?;

    let username = form.username.trim();
    let email = form.email.trim();
    if username.is_empty() {
        return Err(error::ErrorBadRequest("Invalid registration data"));
    }

    let new_user = user::create_user(username, email, &form.password)
        .await
        .map_err(db_error)?;

    // A fresh account is signed in right away.
    session::log_in(&session, new_user.id)?;

    Ok(redirect_to("/"))
}

/// The signed-in user's own account page.
#[get("/settings/account")]
async fn view_account(client: ClientCtx) -> Result<HttpResponse, Error> {
    let user_id = client.require_login()?;
    let user = match client.get_user() {
        Some(user) => user,
        None => return Err(error::ErrorUnauthorized("Login required")),
    };

    let unread = notifications::count_unread(user_id)
        .await
        .map_err(db_error)?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "id": user.id,
        "name": user.name,
        "email": user.email,
        "introduction": user.introduction,
        "created_at": user.created_at,
        "banned": user.banned,
        "permissions": client.permissions().enabled_front_ids(),
        "unread_notifications": unread,
    })))
}

/// Updates the introduction text. This route carries a single permission
/// on POST only, so the check lives here rather than in a route guard.
#[post("/settings/account")]
async fn update_account(
    client: ClientCtx,
    form: web::Form<IntroForm>,
) -> Result<HttpResponse, Error> {
    let user_id = client.require_login()?;
    client.require_permission(PermissionId::User(UserAction::UpdateIntroMine))?;

    let introduction = form.introduction.trim();
    if introduction.chars().count() > app_config::limits().max_content_length as usize {
        return Err(error::ErrorBadRequest("Introduction is too long."));
    }
    let introduction = if introduction.is_empty() {
        None
    } else {
        Some(introduction.to_owned())
    };

    user::update_introduction(user_id, introduction)
        .await
        .map_err(db_error)?;

    Ok(redirect_to("/settings/account"))
}

/// A public profile.
#[get("/users/{user_id}")]
async fn view_profile(path: web::Path<i32>) -> Result<HttpResponse, Error> {
    let profile = Profile::get_by_id(path.into_inner())
        .await
        .map_err(db_error)?
        .ok_or_else(|| error::ErrorNotFound("User not found."))?;

    Ok(HttpResponse::Ok().json(profile))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(username: &str, password: &str, email: &str) -> RegisterForm {
        RegisterForm {
            username: username.to_string(),
            password: password.to_string(),
            email: email.to_string(),
        }
    }

    #[test]
    fn usernames_are_1_to_32_characters() {
        assert!(form("alice", "longenough", "a@example.com").validate().is_ok());
        assert!(form("", "longenough", "a@example.com").validate().is_err());
        assert!(form(&"a".repeat(32), "longenough", "a@example.com")
            .validate()
            .is_ok());
        assert!(form(&"a".repeat(33), "longenough", "a@example.com")
            .validate()
            .is_err());
    }

    #[test]
    fn passwords_need_at_least_8_characters() {
        assert!(form("alice", "12345678", "a@example.com").validate().is_ok());
        assert!(form("alice", "1234567", "a@example.com").validate().is_err());
    }

    #[test]
    fn emails_must_parse() {
        assert!(form("alice", "longenough", "not-an-email").validate().is_err());
        assert!(form("alice", "longenough", "").validate().is_err());
    }
}
