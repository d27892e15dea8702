/// Development-mode error details
///
/// Error responses are rendered by [`AppError`]'s `ResponseError` impl with
/// internal messages stripped. In development this middleware re-renders
/// storage and internal errors with the underlying message in
/// `error.details`, keeping the error id that was already logged.

use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error,
};
use futures::future::LocalBoxFuture;
use std::rc::Rc;

use crate::configuration::Environment;
use crate::error::{AppError, ERROR_ID_HEADER};

pub struct ErrorDetails {
    environment: Environment,
}

impl ErrorDetails {
    pub fn new(environment: Environment) -> Self {
        Self { environment }
    }
}

impl<S, B> Transform<S, ServiceRequest> for ErrorDetails
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = ErrorDetailsService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(ErrorDetailsService {
            service: Rc::new(service),
            expose: self.environment.is_development(),
        }))
    }
}

pub struct ErrorDetailsService<S> {
    service: Rc<S>,
    expose: bool,
}

impl<S, B> Service<ServiceRequest> for ErrorDetailsService<S>
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
        let expose = self.expose;
        let fut = self.service.call(req);

        // Guards render their rejections, so only `Ok` responses carry errors here
        Box::pin(async move {
            let res = fut.await?;
            Ok(if expose {
                with_details(res)
            } else {
                res.map_into_left_body()
            })
        })
    }
}

fn with_details<B>(res: ServiceResponse<B>) -> ServiceResponse<EitherBody<B>> {
    let detailed = res
        .response()
        .error()
        .and_then(|e| e.as_error::<AppError>())
        .filter(|e| e.internal_detail().is_some())
        .map(|e| {
            let error_id = res
                .headers()
                .get(ERROR_ID_HEADER)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default();
            e.render(error_id, true)
        });

    match detailed {
        Some(response) => res.into_response(response).map_into_right_body(),
        None => res.map_into_left_body(),
    }
}
