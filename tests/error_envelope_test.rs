//! Integration tests for the JSON error envelope.
//!
//! The error handlers rewrite 4xx/5xx bodies into a fixed JSON shape,
//! keeping the handler's message everywhere except on 500s.

use actix_web::http::StatusCode;
use actix_web::middleware::ErrorHandlers;
use actix_web::{error, test, web, App, HttpResponse};
use palaver::middleware::RequirePermission;
use palaver::permission::{ArticleAction, PermissionId};
use palaver::web::error::{render_400, render_401, render_403, render_404, render_500};
use serde_json::Value;

const CREATE: &[PermissionId] = &[PermissionId::Article(ArticleAction::Create)];

async fn bad_request() -> actix_web::Result<HttpResponse> {
    Err(error::ErrorBadRequest("Title is required."))
}

async fn unauthorized() -> actix_web::Result<HttpResponse> {
    Err(error::ErrorUnauthorized("Login required"))
}

async fn missing() -> actix_web::Result<HttpResponse> {
    Err(error::ErrorNotFound("Article not found."))
}

async fn blow_up() -> actix_web::Result<HttpResponse> {
    Err(error::ErrorInternalServerError(
        "connection refused on 10.0.0.3",
    ))
}

async fn ok() -> HttpResponse {
    HttpResponse::Ok().body("ok")
}

fn envelopes<B: 'static>() -> ErrorHandlers<B> {
    ErrorHandlers::new()
        .handler(StatusCode::BAD_REQUEST, render_400)
        .handler(StatusCode::UNAUTHORIZED, render_401)
        .handler(StatusCode::FORBIDDEN, render_403)
        .handler(StatusCode::NOT_FOUND, render_404)
        .handler(StatusCode::INTERNAL_SERVER_ERROR, render_500)
}

#[actix_rt::test]
async fn test_handler_messages_survive_into_the_envelope() {
    let app = test::init_service(
        App::new()
            .wrap(envelopes())
            .route("/bad", web::get().to(bad_request))
            .route("/gone", web::get().to(missing))
            .route("/wall", web::get().to(unauthorized)),
    )
    .await;

    let resp = test::call_service(&app, test::TestRequest::get().uri("/bad").to_request()).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], 400);
    assert_eq!(body["error"], "Title is required.");

    let resp = test::call_service(&app, test::TestRequest::get().uri("/gone").to_request()).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Article not found.");

    let resp = test::call_service(&app, test::TestRequest::get().uri("/wall").to_request()).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Login required");
}

#[actix_rt::test]
async fn test_unmatched_routes_get_the_fallback_text() {
    let app = test::init_service(App::new().wrap(envelopes()).route("/", web::get().to(ok))).await;

    let req = test::TestRequest::get().uri("/nope").to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], 404);
    assert_eq!(body["error"], "Not found");
}

#[actix_rt::test]
async fn test_internal_errors_never_echo_detail() {
    let app = test::init_service(
        App::new()
            .wrap(envelopes())
            .route("/boom", web::get().to(blow_up)),
    )
    .await;

    let req = test::TestRequest::get().uri("/boom").to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], 500);
    assert_eq!(body["error"], "Internal server error");
}

#[actix_rt::test]
async fn test_guard_denials_are_enveloped() {
    let app = test::init_service(
        App::new().wrap(envelopes()).service(
            web::resource("/articles/new")
                .wrap(RequirePermission::new(CREATE))
                .route(web::get().to(ok)),
        ),
    )
    .await;

    let req = test::TestRequest::get().uri("/articles/new").to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], 403);
    assert_eq!(body["error"], "Insufficient permissions");
}
