//! Integration tests for the login wall.
//!
//! The gate only reads the cookie session, so these run against an
//! in-memory app with stub handlers on the real route shapes.

use actix_session::storage::CookieSessionStore;
use actix_session::{Session, SessionMiddleware};
use actix_web::cookie::{Cookie, Key};
use actix_web::dev::ServiceResponse;
use actix_web::http::{header, StatusCode};
use actix_web::{test, web, App, HttpResponse};
use palaver::middleware::AuthGate;

async fn ok() -> HttpResponse {
    HttpResponse::Ok().body("ok")
}

/// Stub for the login form: answers with the remembered target, if any.
async fn read_target(session: Session) -> HttpResponse {
    HttpResponse::Ok().body(palaver::session::take_target(&session).unwrap_or_default())
}

/// Open stub that signs the session in without touching the database.
async fn fake_login(session: Session) -> actix_web::Result<HttpResponse> {
    palaver::session::log_in(&session, 42)?;
    Ok(HttpResponse::Ok().finish())
}

fn session_cookie<B>(resp: &ServiceResponse<B>) -> Option<Cookie<'static>> {
    resp.response().cookies().next().map(|c| c.into_owned())
}

fn session_layer() -> SessionMiddleware<CookieSessionStore> {
    SessionMiddleware::builder(CookieSessionStore::default(), Key::from(&[0; 64]))
        .cookie_secure(false)
        .build()
}

#[actix_rt::test]
async fn test_open_routes_pass_without_a_session() {
    let app = test::init_service(
        App::new()
            .wrap(AuthGate::default())
            .wrap(session_layer())
            .route("/", web::get().to(ok)),
    )
    .await;

    let req = test::TestRequest::get().uri("/").to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_rt::test]
async fn test_anonymous_get_redirects_to_login() {
    let app = test::init_service(
        App::new()
            .wrap(AuthGate::default())
            .wrap(session_layer())
            .route("/settings/account", web::get().to(ok)),
    )
    .await;

    let req = test::TestRequest::get().uri("/settings/account").to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(
        resp.headers().get(header::LOCATION).unwrap(),
        "/login",
        "anonymous requests should land on the login form"
    );
}

#[actix_rt::test]
async fn test_permission_routes_redirect_anonymous_too() {
    // Routes governed by a permission are behind the wall even though they
    // are not in the session-only list.
    let app = test::init_service(
        App::new()
            .wrap(AuthGate::default())
            .wrap(session_layer())
            .route("/articles/new", web::get().to(ok)),
    )
    .await;

    let req = test::TestRequest::get().uri("/articles/new").to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(resp.headers().get(header::LOCATION).unwrap(), "/login");
}

#[actix_rt::test]
async fn test_get_redirect_remembers_the_target() {
    let app = test::init_service(
        App::new()
            .wrap(AuthGate::default())
            .wrap(session_layer())
            .route("/login", web::get().to(read_target))
            .route("/settings/account", web::get().to(ok)),
    )
    .await;

    let req = test::TestRequest::get()
        .uri("/settings/account?page=2")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);

    let cookie = session_cookie(&resp).expect("the redirect should carry a session cookie");

    // The login form can now read the target back, query string included.
    let req = test::TestRequest::get()
        .uri("/login")
        .cookie(cookie)
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let body = test::read_body(resp).await;
    assert_eq!(body, "/settings/account?page=2");
}

#[actix_rt::test]
async fn test_post_redirect_remembers_nothing() {
    let app = test::init_service(
        App::new()
            .wrap(AuthGate::default())
            .wrap(session_layer())
            .route("/login", web::get().to(read_target))
            .route("/logout", web::post().to(ok)),
    )
    .await;

    let req = test::TestRequest::post().uri("/logout").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);

    // A POST target would be useless to redirect back to, so the gate
    // writes nothing into the session.
    let mut probe = test::TestRequest::get().uri("/login");
    if let Some(cookie) = session_cookie(&resp) {
        probe = probe.cookie(cookie);
    }
    let resp = test::call_service(&app, probe.to_request()).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let body = test::read_body(resp).await;
    assert!(body.is_empty(), "no target should be remembered for a POST");
}

#[actix_rt::test]
async fn test_logged_in_requests_pass_the_gate() {
    let app = test::init_service(
        App::new()
            .wrap(AuthGate::default())
            .wrap(session_layer())
            .route("/probe/login", web::post().to(fake_login))
            .route("/settings/account", web::get().to(ok)),
    )
    .await;

    let req = test::TestRequest::post().uri("/probe/login").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let cookie = session_cookie(&resp).expect("login should set a session cookie");

    let req = test::TestRequest::get()
        .uri("/settings/account")
        .cookie(cookie)
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let body = test::read_body(resp).await;
    assert_eq!(body, "ok");
}
