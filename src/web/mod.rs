pub mod account;
pub mod admin;
pub mod article;
pub mod error;
pub mod login;
pub mod logout;
pub mod notifications;

use sea_orm::DbErr;

/// Configures the web app by adding services from each web file.
///
/// @see https://docs.rs/actix-web/4.0.1/actix_web/struct.App.html#method.configure
pub fn configure(conf: &mut actix_web::web::ServiceConfig) {
    // Route resolution will stop at the first match.
    article::configure(conf);
    account::configure(conf);
    admin::configure(conf);
    login::configure(conf);
    logout::configure(conf);
    notifications::configure(conf);
}

/// Maps storage errors at the handler boundary. Domain rejections travel
/// as `DbErr::Custom` and surface as 400; anything else is a logged 500.
pub(crate) fn db_error(err: DbErr) -> actix_web::Error {
    match err {
        DbErr::Custom(msg) => actix_web::error::ErrorBadRequest(msg),
        err => {
            log::error!("Database error: {:?}", err);
            actix_web::error::ErrorInternalServerError("Database error")
        }
    }
}

/// 302 response used after successful form posts.
pub(crate) fn redirect_to(location: &str) -> actix_web::HttpResponse {
    actix_web::HttpResponse::Found()
        .insert_header((actix_web::http::header::LOCATION, location.to_owned()))
        .finish()
}
