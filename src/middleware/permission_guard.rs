use super::ClientCtx;
use crate::permission::PermissionId;
use actix_web::body::EitherBody;
use actix_web::dev::{self, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::{error, Error, HttpMessage, HttpResponse};
use futures::future::{ready, LocalBoxFuture, Ready};
use std::rc::Rc;

/// Route guard requiring every listed permission.
///
/// Wired at service registration with a static list. An empty list lets
/// everyone through, guests included; a request without a client context
/// evaluates as a guest and is denied.
#[derive(Clone, Copy)]
pub struct RequirePermission {
    required: &'static [PermissionId],
}

impl RequirePermission {
    pub fn new(required: &'static [PermissionId]) -> Self {
        Self { required }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RequirePermission
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = RequirePermissionMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequirePermissionMiddleware {
            service: Rc::new(service),
            required: self.required,
        }))
    }
}

pub struct RequirePermissionMiddleware<S> {
    service: Rc<S>,
    required: &'static [PermissionId],
}

impl<S, B> Service<ServiceRequest> for RequirePermissionMiddleware<S>
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
        if !self.required.is_empty() {
            let ctx = ClientCtx::get_or_default_from_extensions(&mut req.extensions_mut());

            if let Some(missing) = self.required.iter().find(|id| !ctx.permit(**id)) {
                log::debug!(
                    "Denied {} {} without '{}'",
                    req.method(),
                    req.path(),
                    missing
                );

                // Denial is a response, not an Err. An Err here would leave
                // the app before the error handlers can shape the body.
                let response =
                    HttpResponse::from_error(error::ErrorForbidden("Insufficient permissions"))
                        .map_into_right_body();

                return Box::pin(ready(Ok(req.into_response(response))));
            }
        }

        let fut = self.service.call(req);
        Box::pin(async move { fut.await.map(|res| res.map_into_left_body()) })
    }
}
