//! Bearer-token middleware for the operator routes (`/cron/*` and `/orders/*`).
//!
//! The scheduler that triggers the escalation sweeps, and operators looking up orders, present a shared secret in an
//! `Authorization: Bearer <secret>` header. If no secret is configured, the middleware lets every request through.

use std::{pin::Pin, rc::Rc};

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    error::ErrorUnauthorized,
    http::header::AUTHORIZATION,
    Error,
};
use constant_time_eq::constant_time_eq;
use futures::{
    future::{ok, Ready},
    Future,
};
use log::*;
use mkt_common::Secret;

pub struct BearerAuthMiddlewareFactory {
    secret: Option<Secret<String>>,
}

impl BearerAuthMiddlewareFactory {
    pub fn new(secret: Option<Secret<String>>) -> Self {
        BearerAuthMiddlewareFactory { secret }
    }
}

impl<S, B> Transform<S, ServiceRequest> for BearerAuthMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = BearerAuthMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(BearerAuthMiddlewareService { secret: self.secret.clone(), service: Rc::new(service) })
    }
}

pub struct BearerAuthMiddlewareService<S> {
    secret: Option<Secret<String>>,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for BearerAuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let secret = self.secret.clone();
        Box::pin(async move {
            let Some(secret) = secret else {
                return service.call(req).await;
            };
            let token = req
                .headers()
                .get(AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.strip_prefix("Bearer "))
                .map(str::trim);
            match token {
                Some(token) if constant_time_eq(token.as_bytes(), secret.reveal().as_bytes()) => {
                    service.call(req).await
                },
                Some(_) => {
                    warn!("Invalid bearer token presented for {}. Denying access.", req.path());
                    Err(ErrorUnauthorized("Invalid token."))
                },
                None => {
                    debug!("No bearer token presented for {}. Denying access.", req.path());
                    Err(ErrorUnauthorized("Missing bearer token."))
                },
            }
        })
    }
}
