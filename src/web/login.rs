//! Session establishment.

use super::redirect_to;
use crate::middleware::ClientCtx;
use crate::session;
use crate::user::{self, LoginResultStatus};
use actix_web::{error, get, post, web, Error, HttpResponse};
use serde::Deserialize;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(post_login).service(view_login);
}

#[derive(Deserialize)]
pub struct FormData {
    username: String,
    password: String,
}

/// Login form state. Tells a signed-in client it has nothing to do here.
#[get("/login")]
async fn view_login(client: ClientCtx) -> Result<HttpResponse, Error> {
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "logged_in": client.is_user(),
        "user_id": client.get_id(),
    })))
}

#[post("/login")]
async fn post_login(
    session: actix_session::Session,
    form: web::Form<FormData>,
) -> Result<HttpResponse, Error> {
    let result = user::login(form.username.trim(), &form.password)
        .await
        .map_err(|err| {
            log::error!("Login check failed against storage: {:?}", err);
            error::ErrorInternalServerError("Database error")
        })?;

    let user = match (result.result, result.user) {
        (LoginResultStatus::Success, Some(user)) => user,
        // One message for every failure; the response reveals nothing
        // about which field was wrong.
        _ => return Err(error::ErrorUnauthorized("Invalid username or password.")),
    };

    session::log_in(&session, user.id)?;

    let target = session::take_target(&session).unwrap_or_else(|| "/".to_owned());
    Ok(redirect_to(&target))
}
