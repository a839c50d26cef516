use crate::permission::RouteTable;
use crate::session;
use actix_session::Session;
use actix_web::body::EitherBody;
use actix_web::dev::{self, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::http::{header, Method};
use actix_web::{Error, FromRequest, HttpResponse};
use futures::future::{ready, LocalBoxFuture, Ready};
use std::rc::Rc;

/// Redirects anonymous requests away from routes that need a session.
///
/// The wall is derived from the route table: every route shape governed by
/// a permission, plus the session-only routes. A GET that hits the wall has
/// its path remembered so login can send the visitor back afterwards.
pub struct AuthGate {
    table: Rc<RouteTable>,
}

impl Default for AuthGate {
    fn default() -> Self {
        Self {
            table: Rc::new(RouteTable::compile()),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AuthGate
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthGateMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthGateMiddleware {
            service: Rc::new(service),
            table: self.table.clone(),
        }))
    }
}

pub struct AuthGateMiddleware<S> {
    service: Rc<S>,
    table: Rc<RouteTable>,
}

impl<S, B> Service<ServiceRequest> for AuthGateMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    dev::forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let svc = self.service.clone();
        let table = self.table.clone();

        // Borrows of `req` must happen in this order to avoid conflicts.
        let (httpreq, payload) = req.into_parts();
        let session = Session::extract(&httpreq).into_inner();
        let req = ServiceRequest::from_parts(httpreq, payload);

        Box::pin(async move {
            if !table.requires_auth(req.method().as_str(), req.path()) {
                return svc.call(req).await.map(|res| res.map_into_left_body());
            }

            match &session {
                Ok(session) => {
                    if session::get_user_id(session).is_some() {
                        return svc.call(req).await.map(|res| res.map_into_left_body());
                    }

                    // Best effort; login still works if this fails.
                    if req.method() == Method::GET {
                        let target = req
                            .uri()
                            .path_and_query()
                            .map(|pq| pq.as_str().to_owned())
                            .unwrap_or_else(|| req.path().to_owned());

                        if let Err(err) = session::remember_target(session, &target) {
                            log::warn!("Failed to remember login target '{}': {}", target, err);
                        }
                    }
                }
                Err(err) => {
                    // An unreadable session cannot prove a login.
                    log::error!("Unable to extract Session data in middleware: {}", err);
                }
            }

            let response = HttpResponse::Found()
                .insert_header((header::LOCATION, "/login"))
                .finish()
                .map_into_right_body();

            Ok(req.into_response(response))
        })
    }
}
