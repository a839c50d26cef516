//! Session teardown.

use super::redirect_to;
use crate::session;
use actix_web::{post, Error, HttpResponse};

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(post_logout);
}

/// Clears the whole session, including any saved redirect target.
#[post("/logout")]
async fn post_logout(session: actix_session::Session) -> Result<HttpResponse, Error> {
    session::log_out(&session);
    Ok(redirect_to("/"))
}
