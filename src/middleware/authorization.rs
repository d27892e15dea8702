/// Role / premium authorization guard
///
/// Runs behind [`JwtMiddleware`](super::JwtMiddleware) and decides, from the
/// attached [`Identity`], whether the caller may reach the wrapped scope:
/// either their role must be in a fixed set, or they must hold an active
/// premium subscription (admins always pass the premium check).

use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpMessage,
};
use chrono::{DateTime, Utc};
use futures::future::LocalBoxFuture;
use std::rc::Rc;
use std::sync::Arc;

use crate::auth::Identity;
use crate::error::{AppError, AuthError};
use crate::store::{Role, User, UserStore};

#[derive(Clone)]
enum Policy {
    Roles(Vec<Role>),
    Premium(Arc<dyn UserStore>),
}

pub fn check_roles(identity: &Identity, allowed: &[Role]) -> Result<(), AppError> {
    if allowed.contains(&identity.role) {
        return Ok(());
    }
    let names = allowed.iter().map(Role::as_str).collect::<Vec<_>>().join(", ");
    Err(AppError::Auth(AuthError::Forbidden(format!(
        "requires role {}",
        names
    ))))
}

/// `user` is the current record for `identity`; premium status is never
/// taken from the token.
pub fn check_premium(
    identity: &Identity,
    user: Option<&User>,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    let user = user.ok_or(AppError::Auth(AuthError::TokenInvalid))?;
    if !user.is_active {
        return Err(AuthError::Forbidden("account is inactive".to_string()).into());
    }
    if identity.role == Role::Admin || user.role == Role::Admin || user.has_active_premium(now) {
        return Ok(());
    }
    Err(AuthError::PremiumRequired.into())
}

pub struct Authorization {
    policy: Policy,
}

impl Authorization {
    pub fn require_roles(roles: &[Role]) -> Self {
        Self {
            policy: Policy::Roles(roles.to_vec()),
        }
    }

    pub fn require_premium(users: Arc<dyn UserStore>) -> Self {
        Self {
            policy: Policy::Premium(users),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for Authorization
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthorizationService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(AuthorizationService {
            service: Rc::new(service),
            policy: self.policy.clone(),
        }))
    }
}

pub struct AuthorizationService<S> {
    service: Rc<S>,
    policy: Policy,
}

impl<S, B> Service<ServiceRequest> for AuthorizationService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let policy = self.policy.clone();
        let identity = req.extensions().get::<Identity>().cloned();

        Box::pin(async move {
            let verdict = match identity {
                // Mounted without JwtMiddleware in front: treat as unauthenticated
                None => Err(AppError::Auth(AuthError::MissingToken)),
                Some(identity) => {
                    let verdict = match &policy {
                        Policy::Roles(allowed) => check_roles(&identity, allowed),
                        Policy::Premium(users) => users
                            .find_by_id(identity.id)
                            .await
                            .and_then(|user| check_premium(&identity, user.as_ref(), Utc::now())),
                    };
                    if let Err(e) = &verdict {
                        tracing::warn!(user_id = %identity.id, path = %req.path(), "Access denied: {}", e);
                    }
                    verdict
                }
            };

            match verdict {
                Ok(()) => service
                    .call(req)
                    .await
                    .map(ServiceResponse::map_into_left_body),
                Err(e) => Ok(req.error_response(e).map_into_right_body()),
            }
        })
    }
}
