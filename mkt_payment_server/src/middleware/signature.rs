//! Webhook signature middleware for Actix Web.
//!
//! Every payment provider signs its webhook bodies with an HMAC keyed by a secret shared with the marketplace. The
//! scheme differs per provider, so the actual check is delegated to the provider's [`PaymentProviderAdapter`]. This
//! middleware only reads the raw body, finds the signature header and decides what to do with the result.
//!
//! * A secret is configured: a missing or wrong signature is rejected with `401` before the handler (and therefore
//!   the database) is ever reached. A body that cannot be canonicalized for verification is rejected with `400`.
//! * No secret is configured: the request is let through with a warning, unless signatures are required, in which case
//!   it is rejected with `401`.
//!
//! The body is put back on the request afterwards so that the handler can read it again.

use std::{
    future::{ready, Ready},
    rc::Rc,
    sync::Arc,
};

use actix_http::h1;
use actix_web::{
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    error::{ErrorBadRequest, ErrorUnauthorized},
    web,
    Error,
};
use bytes::Bytes;
use futures::future::LocalBoxFuture;
use log::*;
use mkt_common::Secret;
use mkt_payment_engine::providers::{PaymentProviderAdapter, SignatureError};

pub struct SignatureMiddlewareFactory {
    adapter: Arc<dyn PaymentProviderAdapter>,
    secret: Option<Secret<String>>,
    required: bool,
}

impl SignatureMiddlewareFactory {
    pub fn new(adapter: Arc<dyn PaymentProviderAdapter>, secret: Option<Secret<String>>, required: bool) -> Self {
        SignatureMiddlewareFactory { adapter, secret, required }
    }
}

impl<S, B> Transform<S, ServiceRequest> for SignatureMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = SignatureMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(SignatureMiddlewareService {
            adapter: Arc::clone(&self.adapter),
            secret: self.secret.clone(),
            required: self.required,
            service: Rc::new(service),
        }))
    }
}

pub struct SignatureMiddlewareService<S> {
    adapter: Arc<dyn PaymentProviderAdapter>,
    secret: Option<Secret<String>>,
    required: bool,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for SignatureMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, mut req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let adapter = Arc::clone(&self.adapter);
        let secret = self.secret.clone();
        let required = self.required;
        Box::pin(async move {
            let provider = adapter.provider();
            let Some(secret) = secret else {
                if required {
                    warn!(
                        "🪝 {provider} webhook rejected. Signatures are required, but no signing secret is configured."
                    );
                    return Err(ErrorUnauthorized("Webhook signatures cannot be verified."));
                }
                warn!("🪝 No signing secret is configured for {provider}. Processing the webhook UNAUTHENTICATED.");
                return service.call(req).await;
            };
            trace!("🪝 Checking {provider} webhook signature");
            let data = req.extract::<web::Bytes>().await.map_err(|e| {
                warn!("🪝 Failed to extract request data: {e:?}");
                ErrorBadRequest("Failed to extract request data.")
            })?;
            let signature = req
                .headers()
                .get(adapter.signature_header())
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string())
                .unwrap_or_default();
            match adapter.verify_signature(secret.reveal(), data.as_ref(), &signature) {
                Ok(()) => {
                    trace!("🪝 {provider} webhook signature ✅️");
                    req.set_payload(bytes_to_payload(data));
                    service.call(req).await
                },
                Err(SignatureError::InvalidBody(e)) => {
                    warn!("🪝 {provider} webhook body could not be canonicalized. {e}");
                    Err(ErrorBadRequest("Invalid webhook body."))
                },
                Err(e) => {
                    warn!("🪝 {provider} webhook rejected. {e}");
                    Err(ErrorUnauthorized("Invalid webhook signature."))
                },
            }
        })
    }
}

fn bytes_to_payload(buf: Bytes) -> Payload {
    let (_, mut pl) = h1::Payload::create(true);
    pl.unread_data(buf);
    Payload::from(pl)
}
