//! Cookie session keys and helpers.
//!
//! The session carries exactly two values: "user_id" while logged in, and
//! "target_url" while an anonymous visitor is being walked through login.

use actix_session::Session;
use actix_web::{error, Error};
use argon2::Argon2;
use once_cell::sync::Lazy;

pub const USER_ID_KEY: &str = "user_id";
pub const TARGET_URL_KEY: &str = "target_url";

static ARGON2: Lazy<Argon2<'static>> = Lazy::new(Argon2::default);

/// Shared Argon2id hasher for passwords.
pub fn get_argon2() -> &'static Argon2<'static> {
    &ARGON2
}

/// Logged-in user id, if any. Non-positive or unreadable values count as
/// logged out.
pub fn get_user_id(session: &Session) -> Option<i32> {
    match session.get::<i32>(USER_ID_KEY) {
        Ok(Some(id)) if id > 0 => Some(id),
        Ok(_) => None,
        Err(err) => {
            log::warn!("Unreadable user id in session: {}", err);
            None
        }
    }
}

/// Marks the session as logged in. Renews the cookie first so the session
/// id rotates across the privilege change.
pub fn log_in(session: &Session, user_id: i32) -> Result<(), Error> {
    session.renew();
    session
        .insert(USER_ID_KEY, user_id)
        .map_err(|_| error::ErrorInternalServerError("session error"))
}

/// Drops the whole session, cookie included.
pub fn log_out(session: &Session) {
    session.purge();
}

/// Remembers where an anonymous GET was headed so login can send the
/// visitor back afterwards.
pub fn remember_target(session: &Session, target: &str) -> Result<(), Error> {
    session
        .insert(TARGET_URL_KEY, target)
        .map_err(|_| error::ErrorInternalServerError("session error"))
}

/// Takes the saved target out of the session.
pub fn take_target(session: &Session) -> Option<String> {
    let target = session.get::<String>(TARGET_URL_KEY).ok().flatten();
    if target.is_some() {
        session.remove(TARGET_URL_KEY);
    }
    target
}
