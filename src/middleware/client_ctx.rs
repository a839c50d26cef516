use crate::db::get_db_pool;
use crate::orm::users;
use crate::permission::{self, PermissionData, PermissionId};
use actix_session::Session;
use actix_web::dev::{
    self, Extensions, Payload, Service, ServiceRequest, ServiceResponse, Transform,
};
use actix_web::{web::Data, Error, FromRequest, HttpMessage, HttpRequest};
use futures::future::{ready, LocalBoxFuture, Ready};
use sea_orm::EntityTrait;
use std::rc::Rc;

/// Client data stored for a single request cycle.
/// Distinct from ClientCtx because it is defined through request data.
#[derive(Clone, Debug, Default)]
pub struct ClientCtxInner {
    /// User data. Optional. None is a guest.
    pub user: Option<users::Model>,
    /// Permission snapshot evaluated for this request. The guest snapshot
    /// denies everything.
    pub permissions: PermissionData,
}

impl ClientCtxInner {
    pub async fn from_session(session: &Session) -> Self {
        let user = match crate::session::get_user_id(session) {
            Some(id) => match users::Entity::find_by_id(id).one(get_db_pool()).await {
                Ok(Some(user)) if !user.deleted => Some(user),
                Ok(_) => None,
                Err(err) => {
                    log::error!("Failed to load session user {}: {}", id, err);
                    None
                }
            },
            None => None,
        };

        let permissions = match &user {
            Some(user) => match permission::snapshot_for_user(user).await {
                Ok(snapshot) => snapshot,
                Err(err) => {
                    log::error!(
                        "Failed to build the permission snapshot for user {}: {}",
                        user.id,
                        err
                    );
                    PermissionData::default()
                }
            },
            None => PermissionData::default(),
        };

        ClientCtxInner { user, permissions }
    }
}

/// Client context passed to routes.
/// Wraps ClientCtxInner, which is set at the beginning of the request.
#[derive(Clone, Debug)]
pub struct ClientCtx(Data<ClientCtxInner>);

impl Default for ClientCtx {
    fn default() -> Self {
        Self(Data::new(ClientCtxInner::default()))
    }
}

impl ClientCtx {
    pub fn get_or_default_from_extensions(extensions: &mut Extensions) -> Self {
        match extensions.get::<Data<ClientCtxInner>>() {
            // Existing record in extensions; pull it and return clone.
            Some(cbox) => Self(cbox.clone()),
            // No existing record; a request that skipped the middleware is
            // treated as a guest.
            None => {
                let cbox = Data::new(ClientCtxInner::default());
                extensions.insert(cbox.clone());
                Self(cbox)
            }
        }
    }

    /// Returns either the user's id or None.
    pub fn get_id(&self) -> Option<i32> {
        self.inner_user().map(|u| u.id)
    }

    pub fn get_user(&self) -> Option<&users::Model> {
        self.inner_user()
    }

    pub fn is_user(&self) -> bool {
        self.inner_user().is_some()
    }

    pub fn permit(&self, id: PermissionId) -> bool {
        self.0.permissions.permit(id)
    }

    pub fn permissions(&self) -> &PermissionData {
        &self.0.permissions
    }

    /// Require user to be logged in. Returns user_id or ErrorUnauthorized.
    pub fn require_login(&self) -> Result<i32, actix_web::Error> {
        self.get_id()
            .ok_or_else(|| actix_web::error::ErrorUnauthorized("Login required"))
    }

    /// Require a specific permission. Returns () or ErrorForbidden.
    pub fn require_permission(&self, id: PermissionId) -> Result<(), actix_web::Error> {
        if !self.permit(id) {
            return Err(actix_web::error::ErrorForbidden("Insufficient permissions"));
        }
        Ok(())
    }

    /// Check if the user can modify content, by ownership or through the
    /// escalated permission.
    pub fn can_modify(&self, owner_id: i32, escalated: PermissionId) -> bool {
        if self.permit(escalated) {
            return true;
        }
        self.get_id() == Some(owner_id)
    }

    fn inner_user(&self) -> Option<&users::Model> {
        self.0.user.as_ref()
    }
}

/// This implementation is what actually provides the `client: ClientCtx` in
/// the parameters of route functions.
impl FromRequest for ClientCtx {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(Ok(ClientCtx::get_or_default_from_extensions(
            &mut req.extensions_mut(),
        )))
    }
}

impl<S: 'static, B> Transform<S, ServiceRequest> for ClientCtx
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = ClientCtxMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(ClientCtxMiddleware {
            service: Rc::new(service),
        }))
    }
}

/// Client context middleware
pub struct ClientCtxMiddleware<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for ClientCtxMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    dev::forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let svc = self.service.clone();

        // Borrows of `req` must happen in this order to avoid conflicts.
        let (httpreq, payload) = req.into_parts();
        let session = Session::extract(&httpreq).into_inner();
        let req = ServiceRequest::from_parts(httpreq, payload);

        Box::pin(async move {
            match session {
                Ok(session) => {
                    let inner = ClientCtxInner::from_session(&session).await;
                    req.extensions_mut().insert(Data::new(inner));
                }
                Err(err) => {
                    log::error!("Unable to extract Session data in middleware: {}", err);
                }
            }

            svc.call(req).await
        })
    }
}
