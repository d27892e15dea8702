/// JWT Authentication Middleware
///
/// Validates the bearer access token from the Authorization header and
/// injects the caller's [`Identity`] into request extensions for handlers
/// (`web::ReqData<Identity>`) and the authorization guard.

use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header,
    Error, HttpMessage,
};
use futures::future::LocalBoxFuture;
use std::rc::Rc;

use crate::auth::{Identity, TokenIssuer, TokenKind};
use crate::error::{AppError, AuthError};

/// Pull the token out of `Bearer <token>`; anything else counts as missing.
fn bearer_token(req: &ServiceRequest) -> Option<String> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

fn authenticate(req: &ServiceRequest, tokens: &TokenIssuer) -> Result<Identity, AppError> {
    let token = bearer_token(req).ok_or(AppError::Auth(AuthError::MissingToken))?;
    tokens.verify(&token, TokenKind::Access)?.identity()
}

/// JWT middleware for protecting routes
pub struct JwtMiddleware {
    tokens: TokenIssuer,
}

impl JwtMiddleware {
    pub fn new(tokens: TokenIssuer) -> Self {
        Self { tokens }
    }
}

impl<S, B> Transform<S, ServiceRequest> for JwtMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = JwtMiddlewareService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(JwtMiddlewareService {
            service: Rc::new(service),
            tokens: self.tokens.clone(),
        }))
    }
}

pub struct JwtMiddlewareService<S> {
    service: Rc<S>,
    tokens: TokenIssuer,
}

impl<S, B> Service<ServiceRequest> for JwtMiddlewareService<S>
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
        match authenticate(&req, &self.tokens) {
            Ok(identity) => {
                tracing::debug!(
                    user_id = %identity.id,
                    role = %identity.role,
                    "JWT validated successfully"
                );
                req.extensions_mut().insert(identity);

                let service = self.service.clone();
                Box::pin(async move {
                    service
                        .call(req)
                        .await
                        .map(ServiceResponse::map_into_left_body)
                })
            }
            Err(e) => {
                tracing::warn!(path = %req.path(), "JWT authentication failed: {}", e);
                let res = req.error_response(e).map_into_right_body();
                Box::pin(async move { Ok(res) })
            }
        }
    }
}
