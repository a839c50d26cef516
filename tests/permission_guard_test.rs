//! Integration tests for the permission route guard.
//!
//! The guard reads the client context out of request extensions, so a
//! snapshot can be planted there directly and no database is involved.

use actix_web::dev::Service;
use actix_web::http::StatusCode;
use actix_web::web::Data;
use actix_web::{test, web, App, HttpMessage, HttpResponse};
use palaver::middleware::{ClientCtx, ClientCtxInner, RequirePermission};
use palaver::permission::{ArticleAction, PermissionData, PermissionId, UserAction};
use std::collections::HashSet;

const CREATE: &[PermissionId] = &[PermissionId::Article(ArticleAction::Create)];
const BAN: &[PermissionId] = &[
    PermissionId::User(UserAction::Manage),
    PermissionId::User(UserAction::Ban),
];
const OPEN: &[PermissionId] = &[];

async fn ok() -> HttpResponse {
    HttpResponse::Ok().body("ok")
}

/// Snapshot for a pretend member holding exactly the given front ids.
fn snapshot(front_ids: &[&str]) -> PermissionData {
    let grants: HashSet<String> = front_ids.iter().map(|id| id.to_string()).collect();
    PermissionData::update(&grants, false)
}

#[actix_rt::test]
async fn test_requests_without_a_context_are_denied() {
    // No client context middleware at all; the guard falls back to the
    // guest snapshot.
    let app = test::init_service(App::new().service(
        web::resource("/articles/new").wrap(RequirePermission::new(CREATE)).route(web::get().to(ok)),
    ))
    .await;

    let req = test::TestRequest::get().uri("/articles/new").to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[actix_rt::test]
async fn test_guests_are_denied() {
    let app = test::init_service(
        App::new().wrap(ClientCtx::default()).service(
            web::resource("/articles/new")
                .wrap(RequirePermission::new(CREATE))
                .route(web::get().to(ok)),
        ),
    )
    .await;

    let req = test::TestRequest::get().uri("/articles/new").to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[actix_rt::test]
async fn test_denials_carry_the_standard_message() {
    let app = test::init_service(App::new().service(
        web::resource("/articles/new").wrap(RequirePermission::new(CREATE)).route(web::get().to(ok)),
    ))
    .await;

    let req = test::TestRequest::get().uri("/articles/new").to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let body = test::read_body(resp).await;
    assert_eq!(body, "Insufficient permissions");
}

#[actix_rt::test]
async fn test_empty_requirement_admits_guests() {
    let app = test::init_service(App::new().service(
        web::resource("/articles").wrap(RequirePermission::new(OPEN)).route(web::get().to(ok)),
    ))
    .await;

    let req = test::TestRequest::get().uri("/articles").to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_rt::test]
async fn test_holding_one_of_two_permissions_is_not_enough() {
    let app = test::init_service(
        App::new()
            .wrap_fn(|req, srv| {
                req.extensions_mut().insert(Data::new(ClientCtxInner {
                    user: None,
                    permissions: snapshot(&["user_manage"]),
                }));
                srv.call(req)
            })
            .service(
                web::resource("/users/1/ban")
                    .wrap(RequirePermission::new(BAN))
                    .route(web::post().to(ok)),
            ),
    )
    .await;

    let req = test::TestRequest::post().uri("/users/1/ban").to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[actix_rt::test]
async fn test_holding_every_permission_passes() {
    let app = test::init_service(
        App::new()
            .wrap_fn(|req, srv| {
                req.extensions_mut().insert(Data::new(ClientCtxInner {
                    user: None,
                    permissions: snapshot(&["user_manage", "user_ban"]),
                }));
                srv.call(req)
            })
            .service(
                web::resource("/users/1/ban")
                    .wrap(RequirePermission::new(BAN))
                    .route(web::post().to(ok)),
            ),
    )
    .await;

    let req = test::TestRequest::post().uri("/users/1/ban").to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_rt::test]
async fn test_super_admins_bypass_grants() {
    let app = test::init_service(
        App::new()
            .wrap_fn(|req, srv| {
                req.extensions_mut().insert(Data::new(ClientCtxInner {
                    user: None,
                    permissions: PermissionData::update(&HashSet::new(), true),
                }));
                srv.call(req)
            })
            .service(
                web::resource("/users/1/ban")
                    .wrap(RequirePermission::new(BAN))
                    .route(web::post().to(ok)),
            ),
    )
    .await;

    let req = test::TestRequest::post().uri("/users/1/ban").to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
}
